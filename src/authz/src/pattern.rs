//! Subject, resource and action patterns
//!
//! Patterns are compiled once when a configuration is loaded:
//!
//! - `*` matches any value
//! - a string containing `<...>` segments is a regular expression; literal
//!   parts are escaped, each delimited segment is kept as a group, and the
//!   whole pattern must match the full value (`doc:<[0-9]+>`)
//! - anything else is compared by exact equality

use crate::error::{AuthzError, Result};
use regex::Regex;
use std::fmt;

const DELIMITER_START: char = '<';
const DELIMITER_END: char = '>';

/// A compiled pattern
#[derive(Clone)]
pub enum Pattern {
    /// Exact string equality
    Literal(String),
    /// Matches everything
    Wildcard,
    /// Anchored regular expression (source kept for display)
    Regex { source: String, regex: Regex },
}

impl Pattern {
    /// Compile a raw pattern string
    pub fn compile(raw: &str) -> Result<Self> {
        if raw == "*" {
            return Ok(Pattern::Wildcard);
        }

        if !raw.contains(DELIMITER_START) {
            return Ok(Pattern::Literal(raw.to_string()));
        }

        let expression = build_expression(raw)?;
        let regex = Regex::new(&expression).map_err(|e| AuthzError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Pattern::Regex {
            source: raw.to_string(),
            regex,
        })
    }

    /// Check whether the value is matched by this pattern
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Pattern::Literal(literal) => literal == value,
            Pattern::Wildcard => true,
            Pattern::Regex { regex, .. } => regex.is_match(value),
        }
    }

    /// Raw pattern as written in configuration
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(literal) => literal,
            Pattern::Wildcard => "*",
            Pattern::Regex { source, .. } => source,
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(literal) => f.debug_tuple("Literal").field(literal).finish(),
            Pattern::Wildcard => f.write_str("Wildcard"),
            Pattern::Regex { source, .. } => f.debug_tuple("Regex").field(source).finish(),
        }
    }
}

/// Ordered list of compiled patterns; matches when any member matches
#[derive(Debug, Clone, Default)]
pub struct PatternSet(Vec<Pattern>);

impl PatternSet {
    pub fn compile<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        raw.iter()
            .map(|p| Pattern::compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    pub fn matches(&self, value: &str) -> bool {
        self.0.iter().any(|p| p.matches(value))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Byte ranges of top-level `<...>` segments, delimiters included
fn delimiter_ranges(raw: &str) -> Result<Vec<(usize, usize)>> {
    let unbalanced = || AuthzError::InvalidPattern {
        pattern: raw.to_string(),
        reason: "unbalanced delimiters".to_string(),
    };

    let mut ranges = Vec::new();
    let mut level = 0usize;
    let mut start = 0usize;

    for (i, c) in raw.char_indices() {
        match c {
            DELIMITER_START => {
                if level == 0 {
                    start = i;
                }
                level += 1;
            }
            DELIMITER_END => {
                level = level.checked_sub(1).ok_or_else(unbalanced)?;
                if level == 0 {
                    ranges.push((start, i + c.len_utf8()));
                }
            }
            _ => {}
        }
    }

    if level != 0 {
        return Err(unbalanced());
    }
    Ok(ranges)
}

fn build_expression(raw: &str) -> Result<String> {
    let mut expression = String::with_capacity(raw.len() + 8);
    expression.push('^');

    let mut end = 0;
    for (start, stop) in delimiter_ranges(raw)? {
        expression.push_str(&regex::escape(&raw[end..start]));
        expression.push('(');
        expression.push_str(&raw[start + 1..stop - 1]);
        expression.push(')');
        end = stop;
    }
    expression.push_str(&regex::escape(&raw[end..]));
    expression.push('$');

    Ok(expression)
}
