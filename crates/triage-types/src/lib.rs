//! Validated identifier types shared across the triage crates.
//!
//! Identifiers arrive from forms and request bodies as free text; these
//! wrappers guarantee at construction time that the text is usable as a
//! key, so the core engine never has to re-check.

/// Errors that can occur when creating validated identifier types.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The input was empty or contained only whitespace.
    #[error("identifier cannot be empty")]
    Empty,
}

macro_rules! trimmed_id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the given input.
            ///
            /// The input is trimmed of leading and trailing whitespace. If the
            /// trimmed result is empty, an error is returned.
            pub fn new(input: impl AsRef<str>) -> Result<Self, IdError> {
                let trimmed = input.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty);
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Returns the inner identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = <String as serde::Deserialize>::deserialize(deserializer)?;
                $name::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

trimmed_id_type! {
    /// A patient identifier.
    ///
    /// Guaranteed non-empty and trimmed, so it can be used directly as a
    /// queue key and as a bed binding.
    PatientId
}

trimmed_id_type! {
    /// A bed label as displayed on the ward (e.g. `ER-002`).
    BedNumber
}
