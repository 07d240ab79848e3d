//! Policy conditions
//!
//! Conditions are declared in configuration as
//!
//! ```yaml
//! conditions:
//!   remoteIP:
//!     type: CIDRCondition
//!     options:
//!       cidr: 192.168.0.0/16
//! ```
//!
//! where the key names the context entry the condition is checked against.
//! Descriptors are compiled at load time; a malformed descriptor is a load
//! error, never an evaluation failure.

use crate::error::{AuthzError, Result};
use crate::types::{Context, ContextValue};
use indexmap::IndexMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::net::IpAddr;

/// Condition descriptor as written in configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawCondition")]
pub enum ConditionDefinition {
    /// Context string equals `equals`
    StringEqual { equals: String },
    /// Context string contains a match of the `matches` expression
    StringMatch { matches: String },
    /// Context string is an IP address inside `cidr`
    Cidr { cidr: String },
    /// Context list of strings contains `value`
    ListContains { value: String },
    /// Context boolean equals `value`
    Boolean { value: bool },
    /// Context string equals the principal being evaluated
    EqualsSubject,
}

/// Wire shape: `{type: <name>, options: {...}}`
#[derive(Deserialize)]
struct RawCondition {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    options: Option<serde_yaml::Value>,
}

#[derive(Deserialize)]
struct EqualsOptions {
    equals: String,
}

#[derive(Deserialize)]
struct MatchesOptions {
    matches: String,
}

#[derive(Deserialize)]
struct CidrOptions {
    cidr: String,
}

#[derive(Deserialize)]
struct ValueOptions<T> {
    value: T,
}

fn options<T: DeserializeOwned>(kind: &str, options: Option<serde_yaml::Value>) -> std::result::Result<T, String> {
    let value = options.unwrap_or(serde_yaml::Value::Null);
    serde_yaml::from_value(value).map_err(|e| format!("{kind}: {e}"))
}

impl TryFrom<RawCondition> for ConditionDefinition {
    type Error = String;

    fn try_from(raw: RawCondition) -> std::result::Result<Self, Self::Error> {
        let kind = raw.kind.as_str();
        match kind {
            "StringEqualCondition" => {
                let o: EqualsOptions = options(kind, raw.options)?;
                Ok(ConditionDefinition::StringEqual { equals: o.equals })
            }
            "StringMatchCondition" => {
                let o: MatchesOptions = options(kind, raw.options)?;
                Ok(ConditionDefinition::StringMatch { matches: o.matches })
            }
            "CIDRCondition" => {
                let o: CidrOptions = options(kind, raw.options)?;
                Ok(ConditionDefinition::Cidr { cidr: o.cidr })
            }
            "ListContainsCondition" => {
                let o: ValueOptions<String> = options(kind, raw.options)?;
                Ok(ConditionDefinition::ListContains { value: o.value })
            }
            "BooleanCondition" => {
                let o: ValueOptions<bool> = options(kind, raw.options)?;
                Ok(ConditionDefinition::Boolean { value: o.value })
            }
            "EqualsSubjectCondition" => Ok(ConditionDefinition::EqualsSubject),
            other => Err(format!("unknown condition type {other:?}")),
        }
    }
}

/// An IPv4 or IPv6 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    network: IpAddr,
    prefix: u8,
}

impl CidrBlock {
    pub fn parse(cidr: &str) -> std::result::Result<Self, String> {
        let (address, prefix) = cidr
            .split_once('/')
            .ok_or_else(|| format!("missing prefix length in {cidr:?}"))?;
        let network: IpAddr = address
            .parse()
            .map_err(|e| format!("invalid address {address:?}: {e}"))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|e| format!("invalid prefix length {prefix:?}: {e}"))?;

        let max = if network.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("prefix length {prefix} exceeds {max}"));
        }

        Ok(Self { network, prefix })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            (IpAddr::V4(_), IpAddr::V6(ip)) => match ip.to_ipv4_mapped() {
                Some(v4) => self.contains(IpAddr::V4(v4)),
                None => false,
            },
            (IpAddr::V6(_), IpAddr::V4(_)) => false,
        }
    }
}

/// A compiled condition
#[derive(Debug, Clone)]
pub enum Condition {
    StringEqual(String),
    StringMatch(Regex),
    Cidr(CidrBlock),
    ListContains(String),
    Boolean(bool),
    EqualsSubject,
}

impl Condition {
    /// Compile a descriptor; `name` is the context key, used in errors
    pub fn compile(name: &str, definition: &ConditionDefinition) -> Result<Self> {
        let invalid = |reason: String| AuthzError::InvalidCondition {
            name: name.to_string(),
            reason,
        };

        Ok(match definition {
            ConditionDefinition::StringEqual { equals } => Condition::StringEqual(equals.clone()),
            ConditionDefinition::StringMatch { matches } => {
                Condition::StringMatch(Regex::new(matches).map_err(|e| invalid(e.to_string()))?)
            }
            ConditionDefinition::Cidr { cidr } => Condition::Cidr(CidrBlock::parse(cidr).map_err(invalid)?),
            ConditionDefinition::ListContains { value } => Condition::ListContains(value.clone()),
            ConditionDefinition::Boolean { value } => Condition::Boolean(*value),
            ConditionDefinition::EqualsSubject => Condition::EqualsSubject,
        })
    }

    /// Check the context value; a value of the wrong type never matches
    pub fn fulfills(&self, value: &ContextValue, subject: &str) -> bool {
        match self {
            Condition::StringEqual(expected) => value.as_str() == Some(expected.as_str()),
            Condition::StringMatch(regex) => value.as_str().is_some_and(|s| regex.is_match(s)),
            Condition::Cidr(block) => value
                .as_str()
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
                .is_some_and(|ip| block.contains(ip)),
            Condition::ListContains(expected) => value
                .as_list()
                .is_some_and(|items| items.iter().any(|item| item == expected)),
            Condition::Boolean(expected) => value.as_bool() == Some(*expected),
            Condition::EqualsSubject => value.as_str() == Some(subject),
        }
    }
}

/// All conditions of one policy, keyed by context entry
#[derive(Debug, Clone, Default)]
pub struct Conditions(Vec<(String, Condition)>);

impl Conditions {
    pub fn compile(definitions: &IndexMap<String, ConditionDefinition>) -> Result<Self> {
        definitions
            .iter()
            .map(|(name, definition)| Ok((name.clone(), Condition::compile(name, definition)?)))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// True when every condition holds; no conditions means always satisfied
    pub fn all_fulfilled(&self, context: &Context, subject: &str) -> bool {
        self.0.iter().all(|(key, condition)| {
            context
                .get(key)
                .is_some_and(|value| condition.fulfills(value, subject))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ConditionDefinition {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_descriptors() {
        assert_eq!(
            parse("{type: StringEqualCondition, options: {equals: foo}}"),
            ConditionDefinition::StringEqual { equals: "foo".into() }
        );
        assert_eq!(
            parse("{type: CIDRCondition, options: {cidr: 10.0.0.0/8}}"),
            ConditionDefinition::Cidr { cidr: "10.0.0.0/8".into() }
        );
        assert_eq!(
            parse("{type: BooleanCondition, options: {value: true}}"),
            ConditionDefinition::Boolean { value: true }
        );
        assert_eq!(parse("{type: EqualsSubjectCondition}"), ConditionDefinition::EqualsSubject);
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let result: std::result::Result<ConditionDefinition, _> =
            serde_yaml::from_str("{type: MagicCondition, options: {}}");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_missing_options() {
        let result: std::result::Result<ConditionDefinition, _> =
            serde_yaml::from_str("{type: StringEqualCondition}");
        assert!(result.is_err());
    }

    #[test]
    fn test_compile_rejects_bad_cidr() {
        let def = ConditionDefinition::Cidr { cidr: "10.0.0.0".into() };
        assert!(matches!(
            Condition::compile("remoteIP", &def),
            Err(AuthzError::InvalidCondition { .. })
        ));

        let def = ConditionDefinition::Cidr { cidr: "10.0.0.0/33".into() };
        assert!(Condition::compile("remoteIP", &def).is_err());
    }

    #[test]
    fn test_compile_rejects_bad_regex() {
        let def = ConditionDefinition::StringMatch { matches: "(".into() };
        assert!(Condition::compile("x", &def).is_err());
    }

    #[test]
    fn test_cidr_contains() {
        let block = CidrBlock::parse("192.168.0.0/16").unwrap();
        assert!(block.contains("192.168.4.2".parse().unwrap()));
        assert!(!block.contains("192.169.0.1".parse().unwrap()));
        assert!(block.contains("::ffff:192.168.1.1".parse().unwrap()));

        let all = CidrBlock::parse("0.0.0.0/0").unwrap();
        assert!(all.contains("8.8.8.8".parse().unwrap()));

        let v6 = CidrBlock::parse("2001:db8::/32").unwrap();
        assert!(v6.contains("2001:db8::1".parse().unwrap()));
        assert!(!v6.contains("2001:db9::1".parse().unwrap()));
        assert!(!v6.contains("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_fulfills() {
        let eq = Condition::StringEqual("prod".into());
        assert!(eq.fulfills(&"prod".into(), "userid:1"));
        assert!(!eq.fulfills(&"dev".into(), "userid:1"));
        assert!(!eq.fulfills(&true.into(), "userid:1"));

        let cidr = Condition::Cidr(CidrBlock::parse("10.0.0.0/8").unwrap());
        assert!(cidr.fulfills(&"10.1.2.3".into(), "userid:1"));
        assert!(!cidr.fulfills(&"not an ip".into(), "userid:1"));

        let list = Condition::ListContains("admin".into());
        assert!(list.fulfills(&vec!["user".to_string(), "admin".to_string()].into(), "userid:1"));
        assert!(!list.fulfills(&"admin".into(), "userid:1"));

        let subject = Condition::EqualsSubject;
        assert!(subject.fulfills(&"userid:1".into(), "userid:1"));
        assert!(!subject.fulfills(&"userid:2".into(), "userid:1"));

        let matches = Condition::StringMatch(Regex::new("^/api/").unwrap());
        assert!(matches.fulfills(&"/api/v1".into(), "userid:1"));
    }

    #[test]
    fn test_missing_context_key_fails() {
        let mut defs = IndexMap::new();
        defs.insert("env".to_string(), ConditionDefinition::StringEqual { equals: "prod".into() });
        let conditions = Conditions::compile(&defs).unwrap();

        assert!(!conditions.all_fulfilled(&Context::new(), "userid:1"));

        let mut context = Context::new();
        context.insert("env".into(), "prod".into());
        assert!(conditions.all_fulfilled(&context, "userid:1"));
    }

    #[test]
    fn test_no_conditions_always_satisfied() {
        assert!(Conditions::default().all_fulfilled(&Context::new(), "userid:1"));
    }
}
