/// Bidirectional mapping between symbolic names and protocol integer codes.
///
/// The forward table on [`CodedName::TABLE`] is the only source of truth.
/// Decoding searches it in reverse, so the two directions cannot drift apart.
use serde::{Deserialize, Serialize};

use crate::errors::{DriverError, DriverResult};

pub trait CodedName: Copy + PartialEq + 'static {
    /// `(value, wire name, protocol code)` entries. Codes must be unique.
    const TABLE: &'static [(Self, &'static str, i64)];

    /// Label used in error messages.
    const LABEL: &'static str;

    fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(v, _, _)| *v == self)
            .map(|(_, n, _)| *n)
            .unwrap_or("")
    }

    fn code(self) -> i64 {
        Self::TABLE
            .iter()
            .find(|(v, _, _)| *v == self)
            .map(|(_, _, c)| *c)
            .unwrap_or_default()
    }
}

/// Result of decoding a protocol code. Unknown codes are carried through
/// verbatim so newer servers do not break older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Decoded<T> {
    Known(T),
    Unknown(i64),
}

impl<T: CodedName> Decoded<T> {
    pub fn known(self) -> Option<T> {
        match self {
            Decoded::Known(v) => Some(v),
            Decoded::Unknown(_) => None,
        }
    }

    /// The raw protocol code, whether or not it was recognized.
    pub fn code(self) -> i64 {
        match self {
            Decoded::Known(v) => v.code(),
            Decoded::Unknown(c) => c,
        }
    }
}

impl<T: CodedName> std::fmt::Display for Decoded<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decoded::Known(v) => f.write_str(v.name()),
            Decoded::Unknown(c) => write!(f, "{c}"),
        }
    }
}

/// Look up the protocol code for `name`. Unknown names are rejected.
pub fn encode<T: CodedName>(name: &str) -> DriverResult<i64> {
    T::TABLE
        .iter()
        .find(|(_, n, _)| *n == name)
        .map(|(_, _, c)| *c)
        .ok_or_else(|| {
            let known: Vec<&str> = T::TABLE.iter().map(|(_, n, _)| *n).collect();
            DriverError::invalid_argument(format!(
                "unknown {} '{}', expected one of: {}",
                T::LABEL,
                name,
                known.join(", ")
            ))
        })
}

/// Never fails: unknown codes come back as [`Decoded::Unknown`].
pub fn decode<T: CodedName>(code: i64) -> Decoded<T> {
    T::TABLE
        .iter()
        .find(|(_, _, c)| *c == code)
        .map(|(v, _, _)| Decoded::Known(*v))
        .unwrap_or(Decoded::Unknown(code))
}
