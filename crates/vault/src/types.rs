//! Identifier types shared by the vault, the token codec and the broker.
//!
//! Both identifiers are opaque strings handed to us by the upstream
//! academic-records system. Wrapping them prevents passing a resource id
//! where a principal id is expected.

use std::{borrow::Borrow, fmt};

use zeroize::Zeroizing;

/// Macro to define a newtype wrapper around `String` with standard trait
/// implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `String`
/// - Derives `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<String>`, `From<&str>` and `Display`
/// - Implements `Borrow<str>` so sets of ids can be queried with `&str`
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` if the identifier is empty or only whitespace.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Consumes the identifier, returning the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(
    /// Stable identifier of an authenticated user.
    ///
    /// Issued by the upstream system at login (a UUID in practice) and used
    /// as the subject of every session token.
    ///
    /// # Examples
    ///
    /// ```
    /// use progress_common_vault::PrincipalId;
    ///
    /// let principal = PrincipalId::from("3f0c-u1");
    /// assert_eq!(principal.as_str(), "3f0c-u1");
    /// assert!(!principal.is_blank());
    /// assert!(PrincipalId::from("  ").is_blank());
    /// ```
    PrincipalId
);

define_id!(
    /// Identifier of an academic record ("card") owned by exactly one principal.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashSet;
    /// use progress_common_vault::ResourceId;
    ///
    /// let owned: HashSet<ResourceId> = ["101", "102"].into_iter().map(ResourceId::from).collect();
    /// assert!(owned.contains("101"));
    /// ```
    ResourceId
);

/// Opaque bearer value used to call the upstream system on a principal's behalf.
///
/// The value is scrubbed from memory on drop and never printed by `Debug`.
///
/// # Examples
///
/// ```
/// use progress_common_vault::UpstreamCredential;
///
/// let credential = UpstreamCredential::new("Bearer abc");
/// assert_eq!(credential.expose(), "Bearer abc");
/// assert_eq!(format!("{credential:?}"), "UpstreamCredential(***)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamCredential(Zeroizing<String>);

impl UpstreamCredential {
    /// Wraps a raw upstream credential.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Returns the raw credential for forwarding to the upstream system.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the credential is empty or only whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        is_blank(&self.0)
    }
}

impl fmt::Debug for UpstreamCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UpstreamCredential(***)")
    }
}

impl From<String> for UpstreamCredential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for UpstreamCredential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Returns `true` if a raw string value is empty or only whitespace.
#[must_use]
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
