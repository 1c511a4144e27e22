//! Key layout for the Redis vault.
//!
//! Every key starts with the configured prefix followed by a per-kind
//! namespace, so credentials and resource sets for the same principal never
//! share a key:
//!
//! | Entry          | Key                          | Redis type |
//! | -------------- | ---------------------------- | ---------- |
//! | credential     | `<prefix>token:<principal>`  | string     |
//! | resource set   | `<prefix>cards:<principal>`  | set        |

use progress_common_vault::PrincipalId;

const CREDENTIAL_NAMESPACE: &str = "token:";
const RESOURCES_NAMESPACE: &str = "cards:";

#[derive(Debug, Clone)]
pub(crate) struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub(crate) fn credential_key(&self, principal: &PrincipalId) -> String {
        format!("{}{CREDENTIAL_NAMESPACE}{}", self.prefix, principal.as_str())
    }

    pub(crate) fn resources_key(&self, principal: &PrincipalId) -> String {
        format!("{}{RESOURCES_NAMESPACE}{}", self.prefix, principal.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_default_layout() {
        let keys = KeySpace::new("ext:");
        let principal = PrincipalId::from("user-1");

        assert_eq!(keys.credential_key(&principal), "ext:token:user-1");
        assert_eq!(keys.resources_key(&principal), "ext:cards:user-1");
    }

    proptest! {
        #[test]
        fn prop_kinds_never_collide(a in "[ -~]{1,32}", b in "[ -~]{1,32}") {
            let keys = KeySpace::new("ext:");
            let credential = keys.credential_key(&PrincipalId::from(a.as_str()));
            let resources = keys.resources_key(&PrincipalId::from(b.as_str()));
            prop_assert_ne!(credential, resources);
        }

        #[test]
        fn prop_distinct_principals_distinct_keys(a in "[ -~]{1,32}", b in "[ -~]{1,32}") {
            prop_assume!(a != b);
            let keys = KeySpace::new("ext:");
            prop_assert_ne!(
                keys.credential_key(&PrincipalId::from(a.as_str())),
                keys.credential_key(&PrincipalId::from(b.as_str()))
            );
            prop_assert_ne!(
                keys.resources_key(&PrincipalId::from(a.as_str())),
                keys.resources_key(&PrincipalId::from(b.as_str()))
            );
        }

        #[test]
        fn prop_keys_stay_inside_prefix(prefix in "[a-z]{1,8}:", principal in "[ -~]{1,32}") {
            let keys = KeySpace::new(prefix.clone());
            let principal = PrincipalId::from(principal.as_str());
            prop_assert!(keys.credential_key(&principal).starts_with(&prefix));
            prop_assert!(keys.resources_key(&principal).starts_with(&prefix));
        }
    }
}
