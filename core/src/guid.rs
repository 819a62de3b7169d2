//! 128-bit identifiers in the mixed-endian "native" layout.
//!
//! The native layout groups the 16 bytes into four fields of 4, 2, 2 and 8
//! bytes. The first three fields are stored little-endian, the last one
//! byte-for-byte. The canonical (network, big-endian) byte order is what the
//! name-based derivation hashes and what other platforms' UUID libraries
//! exchange, so every conversion to or from the outside world goes through
//! [`Guid::to_canonical_bytes`] / [`Guid::from_canonical_bytes`].
//!
//! ```text
//!   native:    d3 d2 d1 d0 | d5 d4 | d7 d6 | d8 .. d15
//!   canonical: d0 d1 d2 d3 | d4 d5 | d6 d7 | d8 .. d15
//! ```

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when bytes or text cannot be turned into a [`Guid`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("identifier must be exactly 16 bytes, got {0}")]
    InvalidLength(usize),
    #[error("malformed identifier text {text:?}: {reason}")]
    InvalidText { text: String, reason: String },
}

/// A 128-bit identifier held in native (mixed-endian) byte layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid([u8; 16]);

/// Reverses bytes 0..4, 4..6 and 6..8. The swap is its own inverse.
const fn swap_leading_fields(b: [u8; 16]) -> [u8; 16] {
    [
        b[3], b[2], b[1], b[0], //
        b[5], b[4], //
        b[7], b[6], //
        b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15],
    ]
}

impl Guid {
    pub const NIL: Guid = Guid([0; 16]);

    pub const fn from_native_bytes(bytes: [u8; 16]) -> Self {
        Guid(bytes)
    }

    pub const fn native_bytes(&self) -> [u8; 16] {
        self.0
    }

    pub const fn as_native_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Network-order bytes, as hashed by name-based derivation.
    pub const fn to_canonical_bytes(&self) -> [u8; 16] {
        swap_leading_fields(self.0)
    }

    pub const fn from_canonical_bytes(bytes: [u8; 16]) -> Self {
        Guid(swap_leading_fields(bytes))
    }

    pub fn try_from_canonical_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| EncodingError::InvalidLength(bytes.len()))?;
        Ok(Self::from_canonical_bytes(arr))
    }

    /// Rebuilds an identifier from a stored native-layout buffer (e.g. a BLOB column).
    pub fn try_from_native_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| EncodingError::InvalidLength(bytes.len()))?;
        Ok(Guid(arr))
    }

    /// Random (version 4) identifier.
    pub fn new_random() -> Self {
        Self::from(Uuid::new_v4())
    }

    /// Version nibble: high four bits of canonical byte 6.
    pub fn version(&self) -> u8 {
        self.to_canonical_bytes()[6] >> 4
    }

    /// True when canonical byte 8 carries the RFC 4122 variant (`10xx_xxxx`).
    pub fn is_rfc4122_variant(&self) -> bool {
        self.to_canonical_bytes()[8] & 0xC0 == 0x80
    }

    pub fn as_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.to_canonical_bytes())
    }

    pub fn is_nil(&self) -> bool {
        self.0 == [0; 16]
    }
}

impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        Guid::from_canonical_bytes(*value.as_bytes())
    }
}

impl From<Guid> for Uuid {
    fn from(value: Guid) -> Self {
        value.as_uuid()
    }
}

/// Canonical textual form: lowercase, hyphenated, network order.
impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_uuid().hyphenated(), f)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

impl FromStr for Guid {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Guid::from)
            .map_err(|e| EncodingError::InvalidText {
                text: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
