//! Tag expansion
//!
//! Tags group principals under a name. A caller asserting any member of a
//! tag also asserts `tag:<name>`.

use crate::config::Tags;
use crate::principal::{Principal, Principals};

/// Expands principals with the tags they belong to
#[derive(Debug, Clone, Default)]
pub struct TagExpander {
    tags: Tags,
}

impl TagExpander {
    pub fn new(tags: Tags) -> Self {
        Self { tags }
    }

    /// Append `tag:<name>` for every member match
    ///
    /// Input principals come first and are kept as-is. Appended tags follow
    /// tag declaration order, then member order. A tag is appended once per
    /// matching member, so repeats are possible.
    pub fn expand(&self, principals: &[Principal]) -> Principals {
        let mut expanded = principals.to_vec();

        for (name, members) in &self.tags {
            for member in members {
                for principal in principals {
                    if principal == member {
                        expanded.push(Principal::tag(name));
                    }
                }
            }
        }

        expanded
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn expander() -> TagExpander {
        let mut tags = Tags::new();
        tags.insert("admins".into(), vec!["userid:maria".into(), "group:admins".into()]);
        tags.insert("readers".into(), vec!["userid:bob".into(), "userid:maria".into()]);
        TagExpander::new(tags)
    }

    #[test]
    fn test_expand_single_member() {
        let expanded = expander().expand(&[Principal::userid("bob")]);
        assert_eq!(expanded, vec![Principal::userid("bob"), Principal::tag("readers")]);
    }

    #[test]
    fn test_expand_declaration_order() {
        let expanded = expander().expand(&[Principal::userid("maria")]);
        assert_eq!(
            expanded,
            vec![Principal::userid("maria"), Principal::tag("admins"), Principal::tag("readers")]
        );
    }

    #[test]
    fn test_expand_repeats_per_matching_member() {
        let expanded = expander().expand(&[Principal::userid("maria"), Principal::group("admins")]);
        assert_eq!(
            expanded,
            vec![
                Principal::userid("maria"),
                Principal::group("admins"),
                Principal::tag("admins"),
                Principal::tag("admins"),
                Principal::tag("readers"),
            ]
        );
    }

    #[test]
    fn test_expand_no_match() {
        let input = vec![Principal::userid("nobody")];
        assert_eq!(expander().expand(&input), input);
        assert!(TagExpander::default().expand(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_expansion_is_additive(ids in proptest::collection::vec("[a-z]{1,6}", 0..8)) {
            let input: Vec<Principal> = ids.iter().map(|id| Principal::userid(id)).collect();
            let expanded = expander().expand(&input);

            prop_assert!(expanded.len() >= input.len());
            prop_assert_eq!(&expanded[..input.len()], &input[..]);
            for extra in &expanded[input.len()..] {
                prop_assert!(extra.as_str().starts_with("tag:"));
            }
        }
    }
}
