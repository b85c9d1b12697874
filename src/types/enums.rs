//! Lifecycle enumerations for the intent protocol.
//!
//! The central piece is [`IntentStatus`], whose transition rules form a
//! DAG with no regressing edge:
//!
//! ```text
//!              ┌──────────► Fulfilled ──────────┐
//!              │                                ▼
//!   Pending ───┼──────────────────────────► Settled
//!              │
//!              └──────────► Completed   (settled with no fulfiller)
//! ```
//!
//! Status advancement is settlement-driven: ingesting a fulfillment
//! records a row but does not move the status; the *Settled* event decides
//! between `Settled` (a fulfiller was reimbursed) and `Completed` (no
//! fulfiller).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// INTENT STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status of an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
    /// Initiated on the source chain, not yet settled.
    Pending,
    /// At least one fulfillment was reimbursed (set at settlement).
    Fulfilled,
    /// Settled with a fulfiller. Terminal.
    Settled,
    /// Settled without a fulfiller. Terminal.
    Completed,
}

impl IntentStatus {
    /// Canonical string form (matches the persisted representation).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Settled => "settled",
            Self::Completed => "completed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Completed)
    }

    /// Whether moving to `next` is a strict forward edge of the DAG.
    ///
    /// Self-transitions are not forward moves; terminal states have no
    /// outgoing edges.
    #[must_use]
    pub const fn can_advance_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fulfilled | Self::Settled | Self::Completed)
                | (Self::Fulfilled, Self::Settled)
        )
    }

    /// Target status for a settlement event.
    ///
    /// `fulfilled = true` means a fulfiller was reimbursed and the intent
    /// ends `Settled`; otherwise it completed without a fulfiller.
    #[must_use]
    pub const fn settlement_target(fulfilled: bool) -> Self {
        if fulfilled { Self::Settled } else { Self::Completed }
    }
}

impl fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IntentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "fulfilled" => Ok(Self::Fulfilled),
            "settled" => Ok(Self::Settled),
            "completed" => Ok(Self::Completed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FULFILLMENT STATUS
// ═══════════════════════════════════════════════════════════════════════════════

/// Status of a fulfillment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FulfillmentStatus {
    /// Recorded, settlement outcome not yet known.
    Pending,
    /// Covered by a settlement.
    Completed,
}

impl FulfillmentStatus {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FulfillmentStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

/// Error for unknown status strings.
#[derive(Debug, Clone, Error)]
#[error("unknown status: {0}")]
pub struct InvalidStatus(pub String);

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT FAMILY
// ═══════════════════════════════════════════════════════════════════════════════

/// The three ingested event groups, each with a `WithCall` variant.
///
/// Subscribers, fetchers, and checkpoints are all keyed by
/// `(chain, family)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventFamily {
    /// `IntentInitiated` / `IntentInitiatedWithCall` on the source chain.
    Initiated,
    /// `IntentFulfilled` / `IntentFulfilledWithCall` on the destination chain.
    Fulfilled,
    /// `IntentSettled` / `IntentSettledWithCall` on the destination chain.
    Settled,
}

impl EventFamily {
    /// All families, in ingestion order.
    pub const ALL: [Self; 3] = [Self::Initiated, Self::Fulfilled, Self::Settled];

    /// Canonical string form (used in checkpoint keys and task names).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Fulfilled => "fulfilled",
            Self::Settled => "settled",
        }
    }
}

impl fmt::Display for EventFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            IntentStatus::Pending,
            IntentStatus::Fulfilled,
            IntentStatus::Settled,
            IntentStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<IntentStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        assert!("finalized".parse::<IntentStatus>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!IntentStatus::Pending.is_terminal());
        assert!(!IntentStatus::Fulfilled.is_terminal());
        assert!(IntentStatus::Settled.is_terminal());
        assert!(IntentStatus::Completed.is_terminal());
    }

    #[test]
    fn dag_forward_edges() {
        use IntentStatus::{Completed, Fulfilled, Pending, Settled};

        assert!(Pending.can_advance_to(Fulfilled));
        assert!(Pending.can_advance_to(Settled));
        assert!(Pending.can_advance_to(Completed));
        assert!(Fulfilled.can_advance_to(Settled));
    }

    #[test]
    fn dag_has_no_regressing_edges() {
        use IntentStatus::{Completed, Fulfilled, Pending, Settled};

        let all = [Pending, Fulfilled, Settled, Completed];

        // No self edges, nothing leaves a terminal state, nothing re-enters Pending.
        for status in all {
            assert!(!status.can_advance_to(status));
            assert!(!status.can_advance_to(Pending));
        }
        for next in all {
            assert!(!Settled.can_advance_to(next));
            assert!(!Completed.can_advance_to(next));
        }
        assert!(!Fulfilled.can_advance_to(Completed));
    }

    #[test]
    fn settlement_fork() {
        assert_eq!(IntentStatus::settlement_target(true), IntentStatus::Settled);
        assert_eq!(
            IntentStatus::settlement_target(false),
            IntentStatus::Completed
        );
    }

    #[test]
    fn family_strings_are_distinct() {
        let names: Vec<_> = EventFamily::ALL.iter().map(EventFamily::as_str).collect();
        assert_eq!(names, vec!["initiated", "fulfilled", "settled"]);
    }
}
