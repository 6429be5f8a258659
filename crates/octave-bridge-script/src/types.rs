//! Newtype wrappers for Octave identifiers, validated on construction.
//!
//! All newtypes serialize/deserialize as plain strings.

use crate::MarshalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! identifier_newtype {
    ($(#[$meta:meta])* $name:ident, $valid:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap an identifier.
            pub fn parse(s: impl Into<String>) -> Result<Self, MarshalError> {
                let s = s.into();
                if $valid(&s) {
                    Ok(Self(s))
                } else {
                    Err(MarshalError::InvalidName {
                        kind: stringify!($name),
                        name: s,
                    })
                }
            }

            /// Wrap a name generated by this crate, skipping validation.
            #[allow(dead_code)]
            pub(crate) fn trusted(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
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

        impl TryFrom<String> for $name {
            type Error = MarshalError;
            fn try_from(s: String) -> Result<Self, MarshalError> {
                Self::parse(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = MarshalError;
            fn try_from(s: &str) -> Result<Self, MarshalError> {
                Self::parse(s)
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.0
            }
        }
    };
}

/// Octave variable names: a letter followed by letters, digits, or underscores.
pub fn is_variable_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Function names additionally allow dotted package/class qualification.
pub fn is_function_name(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_variable_name)
}

identifier_newtype!(
    /// Name of the Octave function an invocation calls.
    FunctionName,
    is_function_name
);

identifier_newtype!(
    /// Name of an Octave workspace variable, such as a result binding.
    VarName,
    is_variable_name
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_name_display_and_as_ref() {
        let f = FunctionName::parse("sim_lcmrawbasis").unwrap();
        assert_eq!(f.to_string(), "sim_lcmrawbasis");
        assert_eq!(f.as_str(), "sim_lcmrawbasis");
        assert_eq!(AsRef::<str>::as_ref(&f), "sim_lcmrawbasis");
    }

    #[test]
    fn function_name_accepts_package_qualification() {
        assert!(FunctionName::parse("pkg.sub.run").is_ok());
        assert!(FunctionName::parse("pkg..run").is_err());
        assert!(FunctionName::parse(".run").is_err());
    }

    #[test]
    fn var_name_rejects_invalid_identifiers() {
        assert!(VarName::parse("result0").is_ok());
        assert!(VarName::parse("out_coeffs").is_ok());
        assert!(VarName::parse("0result").is_err());
        assert!(VarName::parse("_hidden").is_err());
        assert!(VarName::parse("a b").is_err());
        assert!(VarName::parse("").is_err());
        assert!(VarName::parse("x.y").is_err());
    }

    #[test]
    fn invalid_name_error_mentions_kind() {
        let err = VarName::parse("bad-name").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("VarName"));
        assert!(msg.contains("bad-name"));
    }

    #[test]
    fn var_name_serde_roundtrip() {
        let v = VarName::parse("spectrum").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"spectrum\"");
        let back: VarName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn var_name_deserialize_validates() {
        let res: Result<VarName, _> = serde_json::from_str("\"not valid\"");
        assert!(res.is_err());
    }

    #[test]
    fn var_name_into_inner() {
        let v = VarName::parse("result").unwrap();
        assert_eq!(v.into_inner(), "result");
    }
}
