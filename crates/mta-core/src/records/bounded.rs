//! Bounded strings for fixed-size record fields
//!
//! Every fixed-size character array of the HAL records maps to a
//! [`BoundedString`]. Values that do not fit are rejected at the write
//! boundary; nothing is truncated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A UTF-8 string of at most `N` bytes with no interior NUL
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoundedString<const N: usize>(String);

/// 16-byte value, used for call quality metrics
pub type ShortValue = BoundedString<16>;

/// 32-byte value, used for battery identity fields
pub type ShortText = BoundedString<32>;

/// 64-byte value, the most common record field size
pub type LongValue = BoundedString<64>;

/// 128-byte value, used for log descriptions
pub type Description = BoundedString<128>;

/// 256-byte value, used for service class names
pub type ClassName = BoundedString<256>;

impl<const N: usize> BoundedString<N> {
    /// Maximum length in bytes
    pub const CAPACITY: usize = N;

    /// Validate and wrap a value
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.len() > N {
            return Err(Error::invalid_input(format!(
                "value of {} bytes exceeds field capacity of {} bytes",
                value.len(),
                N
            )));
        }
        if value.contains('\0') {
            return Err(Error::invalid_input("value contains an interior NUL"));
        }
        Ok(Self(value))
    }

    /// Validate a producer-supplied value, mapping a bad one to `None`
    pub fn lenient(value: impl Into<String>) -> Option<Self> {
        Self::new(value).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<const N: usize> Deref for BoundedString<N> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> fmt::Display for BoundedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> FromStr for BoundedString<N> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl<const N: usize> TryFrom<String> for BoundedString<N> {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl<const N: usize> TryFrom<&str> for BoundedString<N> {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl<const N: usize> From<BoundedString<N>> for String {
    fn from(value: BoundedString<N>) -> Self {
        value.0
    }
}

impl<const N: usize> PartialEq<str> for BoundedString<N> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl<const N: usize> PartialEq<&str> for BoundedString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_value_at_capacity() {
        let value = ShortValue::new("a".repeat(16)).unwrap();
        assert_eq!(value.len(), 16);
    }

    #[test]
    fn test_rejects_oversized_value() {
        let err = ShortValue::new("a".repeat(17)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_capacity_counts_bytes_not_chars() {
        // 6 chars, 12 bytes
        assert!(BoundedString::<11>::new("éééééé").is_err());
        assert!(BoundedString::<12>::new("éééééé").is_ok());
    }

    #[test]
    fn test_rejects_interior_nul() {
        assert!(LongValue::new("G.7\011").is_err());
        assert!(LongValue::lenient("bad\0").is_none());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ShortValue = serde_json::from_str("\"40\"").unwrap();
        assert_eq!(ok, "40");

        let too_long = format!("\"{}\"", "9".repeat(17));
        assert!(serde_json::from_str::<ShortValue>(&too_long).is_err());
    }
}
