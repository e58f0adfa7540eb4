#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ids are allocated by the store as `<PREFIX><seq>` with at least three digits.
macro_rules! sequence_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                validate_sequence_id(&value, $prefix)?;
                Ok(Self(value))
            }

            pub fn from_seq(seq: i64) -> Self {
                Self(format!("{}{seq:03}", $prefix))
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::try_new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

sequence_id!(JobId, "JOB-");
sequence_id!(BatchId, "BATCH-");
sequence_id!(GearId, "GEAR-");

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdError {
    Empty,
    MissingPrefix { expected: &'static str },
    TooFewDigits,
    InvalidDigit { ch: char, index: usize },
}

impl IdError {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "id must not be empty".to_string(),
            Self::MissingPrefix { expected } => format!("id must start with {expected}"),
            Self::TooFewDigits => "id must end with at least three digits".to_string(),
            Self::InvalidDigit { ch, index } => {
                format!("id has a non-digit {ch:?} at position {index}")
            }
        }
    }
}

impl fmt::Display for IdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for IdError {}

fn validate_sequence_id(value: &str, prefix: &'static str) -> Result<(), IdError> {
    if value.is_empty() {
        return Err(IdError::Empty);
    }
    let Some(digits) = value.strip_prefix(prefix) else {
        return Err(IdError::MissingPrefix { expected: prefix });
    };
    if digits.len() < 3 {
        return Err(IdError::TooFewDigits);
    }
    for (offset, ch) in digits.char_indices() {
        if !ch.is_ascii_digit() {
            return Err(IdError::InvalidDigit {
                ch,
                index: prefix.len() + offset,
            });
        }
    }
    Ok(())
}
