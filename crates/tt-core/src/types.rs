//! Core type definitions with validation.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid rider status code.
    #[error("invalid status code: {value}")]
    InvalidComment { value: String },

    /// Invalid intermediate split label.
    #[error("invalid split point: {value}")]
    InvalidSplit { value: String },

    /// Invalid places source tag.
    #[error("invalid places source: {value}")]
    InvalidSource { value: String },

    /// A number appeared twice in one places list.
    #[error("duplicate rider {bib} in places")]
    DuplicatePlace { bib: String },

    /// A places list named a rider not in the event.
    #[error("rider {bib} in places is not in the event")]
    UnknownRider { bib: String },

    /// A rider out of the race was named in the finish places.
    #[error("rider {bib} in places is out of the race")]
    RiderOut { bib: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into().trim().to_string();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A rider number, optionally with a series suffix (`"12"`, `"12.u23"`).
    ///
    /// Bibs must be non-empty. They are unique within one event.
    Bib, "rider number"
);

impl Bib {
    /// Splits the bib into number and series parts.
    pub fn split_series(&self) -> (&str, &str) {
        self.0.split_once('.').unwrap_or((&self.0, ""))
    }

    /// Sort key: numeric part first, then the raw text.
    pub fn sort_key(&self) -> (u64, &str) {
        let (number, _) = self.split_series();
        let digits: String = number.chars().take_while(char::is_ascii_digit).collect();
        (digits.parse().unwrap_or(u64::MAX), &self.0)
    }
}

impl PartialOrd for Bib {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bib {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Rider status code set by the commissaires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Comment {
    /// Racing normally.
    #[default]
    None,
    /// Did not start.
    Dns,
    /// Did not finish.
    Dnf,
    /// Disqualified.
    Dsq,
    /// Outside time limit.
    Otl,
    /// Withdrawn from a team race.
    Wd,
}

impl Comment {
    /// Every code that removes a rider from the ranked result.
    pub const OUT: [Self; 5] = [Self::Otl, Self::Dnf, Self::Wd, Self::Dsq, Self::Dns];

    /// String representation for storage and display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Dns => "dns",
            Self::Dnf => "dnf",
            Self::Dsq => "dsq",
            Self::Otl => "otl",
            Self::Wd => "wd",
        }
    }

    /// True for any code that excludes the rider from a ranked time.
    #[must_use]
    pub const fn is_out(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Ordering key after all numeric places: otl, dnf, wd, dsq, dns last.
    #[must_use]
    pub const fn rank_key(&self) -> u32 {
        match self {
            Self::None => 8500,
            Self::Otl => 8800,
            Self::Dnf => 9000,
            Self::Wd => 9100,
            Self::Dsq => 9500,
            Self::Dns => 10_000,
        }
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Comment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Self::None),
            "dns" => Ok(Self::Dns),
            "dnf" => Ok(Self::Dnf),
            "dsq" => Ok(Self::Dsq),
            "otl" => Ok(Self::Otl),
            "wd" => Ok(Self::Wd),
            _ => Err(ValidationError::InvalidComment {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Comment {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Comment> for String {
    fn from(value: Comment) -> Self {
        value.as_str().to_string()
    }
}

/// One of the fixed intermediate split slots on an individual course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SplitPoint {
    A,
    B,
    C,
    D,
    E,
}

impl SplitPoint {
    /// All split points, nearest the start first.
    pub const ALL: [Self; 5] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    /// Slot index, 0 for A.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
            Self::E => 4,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        }
    }
}

impl fmt::Display for SplitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SplitPoint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" => Ok(Self::E),
            _ => Err(ValidationError::InvalidSplit {
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for SplitPoint {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SplitPoint> for String {
    fn from(value: SplitPoint) -> Self {
        value.as_str().to_string()
    }
}
