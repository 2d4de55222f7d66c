//! Validated primitive types used by every entity in the store.
//!
//! These newtypes provide type safety (can't pass a block number where a
//! timestamp is expected) and carry the fixed-width encoding used for the
//! `TEXT`-typed bigint columns of the schema.

use std::fmt;

use alloy::primitives::{Address as AlloyAddress, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding;
use crate::error::Result as StoreResult;

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 20-byte Ethereum address, lowercase-hex `0x…` on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(AlloyAddress);

impl Address {
    /// The zero address (`0x0000…0000`).
    pub const ZERO: Self = Self(AlloyAddress::ZERO);

    /// Parse from hex string (with or without `0x` prefix).
    ///
    /// # Errors
    /// Returns [`InvalidAddress`] if the string is not valid 20-byte hex.
    pub fn from_hex(s: &str) -> std::result::Result<Self, InvalidAddress> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 40 {
            return Err(InvalidAddress::WrongLength(stripped.len() / 2));
        }
        stripped
            .parse::<AlloyAddress>()
            .map(Self)
            .map_err(|_| InvalidAddress::InvalidHex)
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Convert to lowercase hex string with `0x` prefix.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }

    /// Interop with `alloy`'s address type.
    #[must_use]
    pub const fn into_inner(self) -> AlloyAddress {
        self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<AlloyAddress> for Address {
    fn from(addr: AlloyAddress) -> Self {
        Self(addr)
    }
}

impl From<Address> for AlloyAddress {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_hex()
    }
}

impl TryFrom<String> for Address {
    type Error = InvalidAddress;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Errors parsing an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidAddress {
    /// Wrong number of bytes (expected 20).
    #[error("expected 20 address bytes, got {0}")]
    WrongLength(usize),
    /// Not valid hex.
    #[error("invalid hex in address")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// HASH (block hash, transaction hash, topic)
// ═══════════════════════════════════════════════════════════════════════════════

/// A 32-byte hash: block hash, transaction hash, or log topic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(B256);

impl Hash {
    /// Parse from hex string (with or without `0x` prefix).
    ///
    /// # Errors
    /// Returns [`InvalidHash`] if the string is not valid 32-byte hex.
    pub fn from_hex(s: &str) -> std::result::Result<Self, InvalidHash> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        if stripped.len() != 64 {
            return Err(InvalidHash::WrongLength(stripped.len() / 2));
        }
        stripped
            .parse::<B256>()
            .map(Self)
            .map_err(|_| InvalidHash::InvalidHex)
    }

    /// Convert to lowercase hex string with `0x` prefix.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }

    /// Low 20 bytes of the hash, reinterpreted as an [`Address`] — used to
    /// derive factory child addresses from an indexed topic.
    #[must_use]
    pub fn low_20_bytes(self) -> Address {
        let bytes = self.0.as_slice();
        #[allow(clippy::unwrap_used)]
        Address::from_hex(&hex::encode(&bytes[12..32])).unwrap()
    }

    /// Interop with `alloy`'s hash type.
    #[must_use]
    pub const fn into_inner(self) -> B256 {
        self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<B256> for Hash {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

impl From<Hash> for B256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for Hash {
    type Error = InvalidHash;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Errors parsing a [`Hash`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidHash {
    /// Wrong number of bytes (expected 32).
    #[error("expected 32 hash bytes, got {0}")]
    WrongLength(usize),
    /// Not valid hex.
    #[error("invalid hex in hash")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK NUMBER
// ═══════════════════════════════════════════════════════════════════════════════

/// A block number. Block numbers never approach `u64::MAX`; only the storage
/// column needs the 256-bit-headroom encoding shared with `U256Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Create a new block number.
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get the value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the next block number (saturating at `u64::MAX`).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the previous block number (saturating at 0).
    #[must_use]
    pub const fn prev(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    /// Encode for storage in a `TEXT` column.
    #[must_use]
    pub fn encode(self) -> String {
        encoding::encode_u64_as_text(self.0)
    }

    /// Decode from a stored `TEXT` column.
    ///
    /// # Errors
    /// Propagates [`crate::error::StoreError::EncodeOverflow`] if the column
    /// holds a value wider than a `u64`.
    pub fn decode(text: &str) -> StoreResult<Self> {
        encoding::decode_to_u64(text).map(Self)
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<BlockNumber> for u64 {
    fn from(b: BlockNumber) -> Self {
        b.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TIMESTAMP
// ═══════════════════════════════════════════════════════════════════════════════

/// Unix timestamp in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp.
    #[must_use]
    pub const fn new(seconds: u64) -> Self {
        Self(seconds)
    }

    /// Get the value in whole seconds.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Encode for storage in a `TEXT` column.
    #[must_use]
    pub fn encode(self) -> String {
        encoding::encode_u64_as_text(self.0)
    }

    /// Decode from a stored `TEXT` column.
    ///
    /// # Errors
    /// Propagates [`crate::error::StoreError::EncodeOverflow`] if the column
    /// holds a value wider than a `u64`.
    pub fn decode(text: &str) -> StoreResult<Self> {
        encoding::decode_to_u64(text).map(Self)
    }
}

impl From<u64> for Timestamp {
    fn from(seconds: u64) -> Self {
        Self(seconds)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// U256 TEXT (genuinely 256-bit columns: difficulty, value, gas price, …)
// ═══════════════════════════════════════════════════════════════════════════════

/// A 256-bit unsigned integer column (`difficulty`, `totalDifficulty`,
/// `value`, `gas`, `gasPrice`, …) stored with the fixed-width encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct U256Text(alloy::primitives::U256);

impl U256Text {
    /// Wrap a `U256`.
    #[must_use]
    pub const fn new(value: alloy::primitives::U256) -> Self {
        Self(value)
    }

    /// Unwrap to the underlying `U256`.
    #[must_use]
    pub const fn get(self) -> alloy::primitives::U256 {
        self.0
    }

    /// Encode for storage in a `TEXT` column.
    ///
    /// # Errors
    /// Propagates [`crate::error::StoreError::EncodeOverflow`] — unreachable
    /// for any `U256`, kept for interface symmetry with [`Self::decode`].
    pub fn encode(self) -> StoreResult<String> {
        encoding::encode_as_text(self.0)
    }

    /// Decode from a stored `TEXT` column.
    ///
    /// # Errors
    /// Propagates [`crate::error::StoreError::EncodeOverflow`] if the column
    /// does not hold a valid `U256`.
    pub fn decode(text: &str) -> StoreResult<Self> {
        encoding::decode_to_big_int(text).map(Self)
    }
}

impl From<alloy::primitives::U256> for U256Text {
    fn from(value: alloy::primitives::U256) -> Self {
        Self(value)
    }
}

impl From<U256Text> for alloy::primitives::U256 {
    fn from(value: U256Text) -> Self {
        value.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
