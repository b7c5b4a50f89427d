//! FDI two-digit tooth codes.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToothNumberError {
    #[error("{0} is not an FDI tooth code")]
    OutOfRange(u64),
    #[error("'{0}' is not a numeric tooth code")]
    NotNumeric(String),
}

/// Permanent (quadrants 1-4) or temporary (quadrants 5-8) dentition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dentition {
    Permanent,
    Temporary,
}

/// A valid FDI tooth code: quadrant digit followed by position digit.
///
/// Permanent teeth use quadrants 1-4 with positions 1-8, temporary teeth use quadrants 5-8
/// with positions 1-5. Ordering is numeric, which is the order charts are iterated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToothNumber(u8);

impl ToothNumber {
    pub fn new(code: u8) -> Result<Self, ToothNumberError> {
        let quadrant = code / 10;
        let position = code % 10;
        let valid = match quadrant {
            1..=4 => (1..=8).contains(&position),
            5..=8 => (1..=5).contains(&position),
            _ => false,
        };
        if valid {
            Ok(Self(code))
        } else {
            Err(ToothNumberError::OutOfRange(u64::from(code)))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn quadrant(self) -> u8 {
        self.0 / 10
    }

    /// Position within the quadrant, 1 being the central incisor.
    pub fn position(self) -> u8 {
        self.0 % 10
    }

    pub fn dentition(self) -> Dentition {
        if self.quadrant() <= 4 {
            Dentition::Permanent
        } else {
            Dentition::Temporary
        }
    }
}

impl fmt::Display for ToothNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ToothNumber {
    type Err = ToothNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code: u64 = trimmed
            .parse()
            .map_err(|_| ToothNumberError::NotNumeric(trimmed.to_owned()))?;
        let code = u8::try_from(code).map_err(|_| ToothNumberError::OutOfRange(code))?;
        Self::new(code)
    }
}

impl TryFrom<u8> for ToothNumber {
    type Error = ToothNumberError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for ToothNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for ToothNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Map keys arrive as strings in JSON and as integers in YAML.
        struct ToothVisitor;

        impl Visitor<'_> for ToothVisitor {
            type Value = ToothNumber;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an FDI tooth code such as 16 or \"16\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                let code = u8::try_from(v)
                    .map_err(|_| E::custom(ToothNumberError::OutOfRange(v)))?;
                ToothNumber::new(code).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                let v = u64::try_from(v).map_err(|_| E::custom(format!("{v} is negative")))?;
                self.visit_u64(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ToothVisitor)
    }
}
