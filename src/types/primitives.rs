//! Validated primitive types for domain entities.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass an amount as an address)
//! - Validation at construction time
//! - Domain semantics in function signatures

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// INTENT ID
// ═══════════════════════════════════════════════════════════════════════════════

/// 32-byte intent identifier.
///
/// Canonical form is a lowercase hex string with `0x` prefix
/// (`0x[0-9a-f]{64}`); this is the primary key in the store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntentId([u8; 32]);

impl IntentId {
    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from hex string (with or without 0x prefix).
    ///
    /// # Errors
    /// Returns `InvalidId` if the string is not 32 bytes of valid hex.
    pub fn from_hex(s: &str) -> Result<Self, InvalidId> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 64 {
            return Err(InvalidId::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidId::InvalidHex)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InvalidId::WrongLength(0))?;
        Ok(Self(arr))
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntentId({})", self.to_hex())
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<B256> for IntentId {
    fn from(hash: B256) -> Self {
        Self(hash.0)
    }
}

impl From<IntentId> for B256 {
    fn from(id: IntentId) -> Self {
        Self::from(id.0)
    }
}

impl From<IntentId> for String {
    fn from(id: IntentId) -> Self {
        id.to_hex()
    }
}

impl TryFrom<String> for IntentId {
    type Error = InvalidId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

/// Error for invalid intent ids.
#[derive(Debug, Clone, Error)]
pub enum InvalidId {
    /// Id has wrong byte length.
    #[error("wrong length: expected 32 bytes, got {0}")]
    WrongLength(usize),
    /// Id contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ETHEREUM ADDRESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Validated 20-byte Ethereum address.
///
/// This newtype ensures addresses are always exactly 20 bytes and
/// serialize as lowercase hex. Use `Address` from `alloy-primitives`
/// for on-chain interaction, this type for persistence and domain logic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EthAddress([u8; 20]);

impl EthAddress {
    /// The zero address (0x0000...0000).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create from a fixed-size array (infallible).
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Try to create from a byte slice.
    ///
    /// # Errors
    /// Returns `InvalidAddress::WrongLength` if the slice is not exactly 20 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, InvalidAddress> {
        let bytes: [u8; 20] = slice
            .try_into()
            .map_err(|_| InvalidAddress::WrongLength(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Extract an address from an opaque receiver payload.
    ///
    /// Cross-chain receivers are carried as variable-length bytes; the
    /// address is the trailing 20 bytes (right-aligned extraction).
    ///
    /// # Errors
    /// Returns `InvalidAddress::WrongLength` for payloads under 20 bytes.
    pub fn from_receiver_bytes(payload: &[u8]) -> Result<Self, InvalidAddress> {
        if payload.len() < 20 {
            return Err(InvalidAddress::WrongLength(payload.len()));
        }
        Self::from_slice(&payload[payload.len() - 20..])
    }

    /// Parse from hex string (with or without 0x prefix).
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the string is not valid hex or wrong length.
    pub fn from_hex(s: &str) -> Result<Self, InvalidAddress> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() != 40 {
            return Err(InvalidAddress::WrongLength(s.len() / 2));
        }
        let bytes = hex::decode(s).map_err(|_| InvalidAddress::InvalidHex)?;
        Self::from_slice(&bytes)
    }

    /// Get the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Convert to lowercase hex string with 0x prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Check if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EthAddress({})", self.to_hex())
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<EthAddress> for String {
    fn from(addr: EthAddress) -> Self {
        addr.to_hex()
    }
}

impl TryFrom<String> for EthAddress {
    type Error = InvalidAddress;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<Address> for EthAddress {
    fn from(addr: Address) -> Self {
        Self::new(addr.0.0)
    }
}

impl From<EthAddress> for Address {
    fn from(addr: EthAddress) -> Self {
        Self::from(addr.0)
    }
}

/// Error for invalid Ethereum addresses.
#[derive(Debug, Clone, Error)]
pub enum InvalidAddress {
    /// Address has wrong byte length.
    #[error("wrong length: expected 20 bytes, got {0}")]
    WrongLength(usize),
    /// Address contains invalid hex characters.
    #[error("invalid hex encoding")]
    InvalidHex,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKEN AMOUNT
// ═══════════════════════════════════════════════════════════════════════════════

/// Non-negative integral token amount in raw (wei-scale) units.
///
/// Backed by `U256`; the protocol caps intent amounts at 10^27. The
/// canonical persisted form is a base-10 decimal string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(U256);

impl TokenAmount {
    /// Zero amount.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Protocol-wide cap on intent amounts (10^27).
    #[must_use]
    pub fn max_intent_amount() -> U256 {
        U256::from(10u64).pow(U256::from(27u64))
    }

    /// Create from a raw `U256` value.
    #[must_use]
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Parse from a base-10 string.
    ///
    /// # Errors
    /// Returns `InvalidAmount::ParseError` if the string is not a
    /// non-negative base-10 integer.
    pub fn parse(s: &str) -> Result<Self, InvalidAmount> {
        let value = U256::from_str_radix(s, 10).map_err(|_| InvalidAmount::ParseError)?;
        Ok(Self(value))
    }

    /// Get the raw value.
    #[must_use]
    pub const fn value(&self) -> U256 {
        self.0
    }

    /// Check if zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whether the amount is inside the valid intent range `(0, 10^27]`.
    #[must_use]
    pub fn is_valid_intent_amount(&self) -> bool {
        !self.0.is_zero() && self.0 <= Self::max_intent_amount()
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({})", self.0)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for String {
    fn from(amount: TokenAmount) -> Self {
        amount.0.to_string()
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = InvalidAmount;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl Default for TokenAmount {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FromStr for TokenAmount {
    type Err = InvalidAmount;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error for invalid token amounts.
#[derive(Debug, Clone, Error)]
pub enum InvalidAmount {
    /// Failed to parse amount string.
    #[error("failed to parse amount")]
    ParseError,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Chain identifier newtype (non-zero unsigned 64-bit).
///
/// Zero is representable (events carry raw integers) but never valid;
/// validation happens at the decoder boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u64);

impl ChainId {
    /// Create a new chain id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Whether the id is the invalid zero value.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK NUMBER
// ═══════════════════════════════════════════════════════════════════════════════

/// Block number newtype for clarity in function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    /// Create a new block number.
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Get the value.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the next block number (saturating at `u64::MAX`).
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the block `n` positions back (saturating at 0).
    #[must_use]
    pub const fn saturating_back(&self, n: u64) -> Self {
        Self(self.0.saturating_sub(n))
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

impl From<BlockNumber> for i64 {
    #[allow(clippy::cast_possible_wrap)]
    fn from(b: BlockNumber) -> Self {
        b.0 as Self
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod intent_id_tests {
        use super::*;

        #[test]
        fn from_hex_roundtrip() {
            let hex = "0x1111111111111111111111111111111111111111111111111111111111111111";
            let id = IntentId::from_hex(hex).unwrap();
            assert_eq!(id.to_hex(), hex);
        }

        #[test]
        fn from_hex_uppercase_normalizes() {
            let id = IntentId::from_hex(
                "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            )
            .unwrap();
            assert_eq!(
                id.to_hex(),
                "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
            );
        }

        #[test]
        fn from_hex_wrong_length() {
            assert!(IntentId::from_hex("0x1234").is_err());
        }

        #[test]
        fn b256_roundtrip() {
            let hash = B256::repeat_byte(0x42);
            let id: IntentId = hash.into();
            let back: B256 = id.into();
            assert_eq!(hash, back);
        }
    }

    mod eth_address_tests {
        use super::*;

        #[test]
        fn from_hex_with_prefix() {
            let addr = EthAddress::from_hex("0x1234567890123456789012345678901234567890").unwrap();
            assert_eq!(addr.to_hex(), "0x1234567890123456789012345678901234567890");
        }

        #[test]
        fn from_hex_wrong_length() {
            assert!(EthAddress::from_hex("0x1234").is_err());
        }

        #[test]
        fn receiver_bytes_exact() {
            let payload = [0x11u8; 20];
            let addr = EthAddress::from_receiver_bytes(&payload).unwrap();
            assert_eq!(addr.as_bytes(), &payload);
        }

        #[test]
        fn receiver_bytes_right_aligned() {
            let mut payload = vec![0u8; 12];
            payload.extend_from_slice(&[0x22u8; 20]);
            let addr = EthAddress::from_receiver_bytes(&payload).unwrap();
            assert_eq!(addr.as_bytes(), &[0x22u8; 20]);
        }

        #[test]
        fn receiver_bytes_too_short() {
            assert!(EthAddress::from_receiver_bytes(&[0u8; 19]).is_err());
        }

        #[test]
        fn zero_address() {
            assert!(EthAddress::ZERO.is_zero());
            assert_eq!(
                EthAddress::ZERO.to_hex(),
                "0x0000000000000000000000000000000000000000"
            );
        }

        #[test]
        fn alloy_address_roundtrip() {
            let eth_addr =
                EthAddress::from_hex("0x1234567890123456789012345678901234567890").unwrap();
            let alloy_addr: Address = eth_addr.into();
            let back: EthAddress = alloy_addr.into();
            assert_eq!(eth_addr, back);
        }
    }

    mod token_amount_tests {
        use super::*;

        #[test]
        fn zero_is_zero() {
            assert!(TokenAmount::ZERO.is_zero());
        }

        #[test]
        fn parse_and_display() {
            let amount = TokenAmount::parse("1000000000000000000").unwrap();
            assert_eq!(amount.to_string(), "1000000000000000000");
        }

        #[test]
        fn parse_negative_fails() {
            assert!(TokenAmount::parse("-100").is_err());
        }

        #[test]
        fn parse_garbage_fails() {
            assert!(TokenAmount::parse("1.5").is_err());
            assert!(TokenAmount::parse("abc").is_err());
        }

        #[test]
        fn zero_is_not_valid_intent_amount() {
            assert!(!TokenAmount::ZERO.is_valid_intent_amount());
        }

        #[test]
        fn cap_is_inclusive() {
            let at_cap = TokenAmount::new(TokenAmount::max_intent_amount());
            assert!(at_cap.is_valid_intent_amount());

            let over_cap = TokenAmount::new(TokenAmount::max_intent_amount() + U256::from(1));
            assert!(!over_cap.is_valid_intent_amount());
        }
    }

    mod chain_id_tests {
        use super::*;

        #[test]
        fn zero_detection() {
            assert!(ChainId::new(0).is_zero());
            assert!(!ChainId::new(7001).is_zero());
        }
    }

    mod block_number_tests {
        use super::*;

        #[test]
        fn next() {
            assert_eq!(BlockNumber::new(100).next().value(), 101);
        }

        #[test]
        fn saturating_back() {
            assert_eq!(BlockNumber::new(100).saturating_back(30).value(), 70);
            assert_eq!(BlockNumber::new(10).saturating_back(30).value(), 0);
        }
    }
}
