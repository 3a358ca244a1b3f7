//! Identity, domain and version types
//!
//! These are the plain value types every colony component passes around.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier of the root domain of every colony
pub const ROOT_DOMAIN_ID: DomainId = DomainId(1);

/// Errors produced while parsing textual identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not valid hex
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Wrong number of bytes
    #[error("Expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// An opaque 20-byte account reference
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Length of an address in bytes
    pub const LEN: usize = 20;

    /// The all-zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create an address from raw bytes
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address from a slice, which must be exactly 20 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let array: [u8; 20] = bytes.try_into().map_err(|_| ParseError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Parse a hex string, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, ParseError> {
        let trimmed = s.trim_start_matches("0x");
        let bytes = hex::decode(trimmed).map_err(|e| ParseError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Get the bytes of the address
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex representation without prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Identifier of an organizational domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DomainId(pub u64);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier into the reputation skill tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillId(pub u64);

impl SkillId {
    /// Encode the skill id as a 32-byte big-endian word
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&self.0.to_be_bytes());
        word
    }

    /// Decode a 32-byte big-endian word. Values that do not fit in 64 bits
    /// are not valid skill ids.
    pub fn from_word(word: &[u8; 32]) -> Option<Self> {
        if word[..24].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&word[24..]);
        Some(Self(u64::from_be_bytes(low)))
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An organizational subdivision and the skill it accrues reputation in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Domain identifier
    pub id: DomainId,
    /// Skill associated with the domain
    pub skill_id: SkillId,
}

impl Domain {
    /// Create a new domain record
    pub fn new(id: DomainId, skill_id: SkillId) -> Self {
        Self { id, skill_id }
    }
}

/// Roles a caller can hold within a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// May recover the colony
    Recovery,
    /// Full control of the colony
    Root,
    /// Resolves disputes and moves locked stake
    Arbitration,
    /// Manages the domain structure
    Architecture,
    /// Moves funds between pots
    Funding,
    /// Administers tasks and payments
    Administration,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Recovery => "recovery",
            Role::Root => "root",
            Role::Arbitration => "arbitration",
            Role::Architecture => "architecture",
            Role::Funding => "funding",
            Role::Administration => "administration",
        };
        f.write_str(name)
    }
}

/// Version of the colony logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    /// The version directly after this one, if representable
    pub fn next(&self) -> Option<Version> {
        self.0.checked_add(1).map(Version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Reference to the code implementing a logic version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolver(pub Address);

impl fmt::Display for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resolver {}", self.0)
    }
}
