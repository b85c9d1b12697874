//! ABI bindings for the intent gateway contract events.
//!
//! The gateway emits three event families, each with a plain and a
//! `WithCall` variant:
//! - `IntentInitiated(WithCall)` on the source chain when a user opens
//!   an intent
//! - `IntentFulfilled(WithCall)` on the destination chain when a
//!   fulfiller delivers tokens to the recipient
//! - `IntentSettled(WithCall)` on the destination chain when the
//!   protocol performs terminal accounting
//!
//! # Solidity Contract
//!
//! ```solidity
//! contract IntentGateway {
//!     event IntentInitiated(bytes32 indexed intentId, address indexed asset, uint256 amount, uint256 targetChain, bytes receiver, uint256 tip, uint256 salt);
//!     event IntentFulfilled(bytes32 indexed intentId, address indexed asset, uint256 amount, address indexed receiver);
//!     event IntentSettled(bytes32 indexed intentId, address indexed asset, uint256 amount, address indexed receiver, bool fulfilled, address fulfiller, uint256 actualAmount, uint256 paidTip);
//!     // ... plus WithCall variants carrying a trailing `bytes data`
//! }
//! ```

use alloy::sol;

sol! {
    /// Emitted when a user opens an intent on the source chain.
    ///
    /// # Indexed Fields
    /// - `intentId`: 32-byte intent identifier
    /// - `asset`: token being transferred
    ///
    /// # Data Fields
    /// - `amount`: raw token amount
    /// - `targetChain`: destination chain id
    /// - `receiver`: opaque receiver payload (trailing 20 bytes are the address)
    /// - `tip`: fulfiller fee
    /// - `salt`: uniqueness salt
    #[derive(Debug, PartialEq, Eq)]
    event IntentInitiated(
        bytes32 indexed intentId,
        address indexed asset,
        uint256 amount,
        uint256 targetChain,
        bytes receiver,
        uint256 tip,
        uint256 salt
    );

    /// `IntentInitiated` with an attached contract call on the
    /// destination chain. The trailing `data` field is the call payload.
    #[derive(Debug, PartialEq, Eq)]
    event IntentInitiatedWithCall(
        bytes32 indexed intentId,
        address indexed asset,
        uint256 amount,
        uint256 targetChain,
        bytes receiver,
        uint256 tip,
        uint256 salt,
        bytes data
    );

    /// Emitted when a fulfiller delivers tokens on the destination chain.
    ///
    /// # Indexed Fields
    /// - `intentId`: intent being fulfilled
    /// - `asset`: delivered token
    /// - `receiver`: recipient of the delivery
    ///
    /// # Data Fields
    /// - `amount`: delivered amount
    #[derive(Debug, PartialEq, Eq)]
    event IntentFulfilled(
        bytes32 indexed intentId,
        address indexed asset,
        uint256 amount,
        address indexed receiver
    );

    /// `IntentFulfilled` with the destination-chain call payload.
    #[derive(Debug, PartialEq, Eq)]
    event IntentFulfilledWithCall(
        bytes32 indexed intentId,
        address indexed asset,
        uint256 amount,
        address indexed receiver,
        bytes data
    );

    /// Emitted at terminal settlement of an intent.
    ///
    /// # Indexed Fields
    /// - `intentId`: intent being settled
    /// - `asset`: settled token
    /// - `receiver`: final recipient
    ///
    /// # Data Fields
    /// - `amount`: intent amount
    /// - `fulfilled`: whether a fulfiller was reimbursed
    /// - `fulfiller`: reimbursed fulfiller (zero address if none)
    /// - `actualAmount`: amount actually moved
    /// - `paidTip`: tip paid out
    #[derive(Debug, PartialEq, Eq)]
    event IntentSettled(
        bytes32 indexed intentId,
        address indexed asset,
        uint256 amount,
        address indexed receiver,
        bool fulfilled,
        address fulfiller,
        uint256 actualAmount,
        uint256 paidTip
    );

    /// `IntentSettled` with the destination-chain call payload.
    #[derive(Debug, PartialEq, Eq)]
    event IntentSettledWithCall(
        bytes32 indexed intentId,
        address indexed asset,
        uint256 amount,
        address indexed receiver,
        bool fulfilled,
        address fulfiller,
        uint256 actualAmount,
        uint256 paidTip,
        bytes data
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
