//! Newtype wrappers for package identifiers.
//!
//! Both newtypes serialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Bare opam package name, e.g. `lambda-term`.
    PackageName
);

string_newtype!(
    /// Package name inside an npm-style scope, e.g. `@opam-alpha/lambda-term`.
    ScopedName
);

impl PackageName {
    /// Name with `-` replaced by `_`, used to build exported variable names.
    pub fn env_stem(&self) -> String {
        self.0.replace('-', "_")
    }

    pub fn scoped(&self, scope: &str) -> ScopedName {
        ScopedName(format!("@{scope}/{}", self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_name_has_scope_prefix() {
        let name = PackageName::new("lambda-term");
        assert_eq!(name.scoped("opam-alpha"), "@opam-alpha/lambda-term");
    }

    #[test]
    fn env_stem_replaces_dashes() {
        assert_eq!(PackageName::from("ocaml-data-notation").env_stem(), "ocaml_data_notation");
        assert_eq!(PackageName::from("lwt").env_stem(), "lwt");
    }

    #[test]
    fn serializes_as_plain_string() {
        let name = ScopedName::new("@opam-alpha/foo");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"@opam-alpha/foo\"");
        let back: ScopedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn display_matches_inner() {
        let name = PackageName::from(String::from("cppo"));
        assert_eq!(name.to_string(), "cppo");
        assert_eq!(name.into_inner(), "cppo");
    }
}
