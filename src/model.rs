//! Core domain types for the escrow engine.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::Amount;

/// User identifier.
pub type UserId = u32;

/// Product identifier.
pub type ProductId = u32;

/// Escrow transaction identifier, assigned by the engine at capture.
pub type TxId = u64;

/// Lifecycle status of an escrow transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowStatus {
    /// Payment captured, funds held, awaiting confirmation.
    Pending,
    /// Confirmed by seller code or buyer receipt; awaiting admin release.
    Completed,
    /// Buyer reported the product as not received.
    Disputed,
    /// Seller share moved to earned funds. Terminal.
    Released,
    /// Buyer refunded in full. Terminal.
    Refunded,
    /// Cancelled by admin; financially identical to a refund. Terminal.
    Cancelled,
}

impl EscrowStatus {
    /// Held states keep the seller share parked in `pending_earnings`.
    pub fn is_held(self) -> bool {
        matches!(self, Self::Pending | Self::Completed | Self::Disputed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_held()
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Disputed => "disputed",
            Self::Released => "released",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Buyer-side receipt confirmation sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuyerConfirmation {
    #[default]
    Pending,
    Received,
    NotReceived,
}

/// The buyer's answer when asked whether the product arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptOutcome {
    Received,
    NotReceived,
}

/// One immutable entry in a transaction's audit trail.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub status: EscrowStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// The user who triggered the transition; `None` for system entries.
    pub actor: Option<UserId>,
}

/// An already-verified incoming payment, ready to be captured as a held
/// escrow transaction.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub reference: String,
    pub provider_tx_id: String,
    pub buyer: UserId,
    pub product: ProductId,
    pub amount: Amount,
    pub paid_at: DateTime<Utc>,
}

/// The durable record of a buyer's payment held by the platform pending
/// delivery confirmation. Created exactly once per payment reference and
/// mutated only by the engine.
#[derive(Debug, Clone)]
pub struct EscrowTransaction {
    pub id: TxId,
    /// Payment reference, unique across the marketplace.
    pub reference: String,
    /// The payment provider's own transaction id.
    pub provider_tx_id: String,
    pub buyer: UserId,
    pub seller: UserId,
    pub product: ProductId,
    pub total_amount: Amount,
    pub admin_share: Amount,
    pub seller_share: Amount,
    pub status: EscrowStatus,
    pub buyer_confirmation: BuyerConfirmation,
    pub buyer_confirmed_at: Option<DateTime<Utc>>,
    pub buyer_confirmation_note: Option<String>,
    /// Short numeric code the seller presents for out-of-band confirmation.
    pub confirmation_code: String,
    pub code_expires_at: DateTime<Utc>,
    /// Set once by the first successful confirmation, never unset.
    pub is_confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<UserId>,
    pub paid_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub seller_payout_reference: Option<String>,
    pub admin_payout_reference: Option<String>,
    /// Append-only audit trail; entries are never mutated or reordered.
    pub log: Vec<LogEntry>,
}

impl EscrowTransaction {
    pub(crate) fn push_log(
        &mut self,
        status: EscrowStatus,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        actor: Option<UserId>,
    ) {
        self.log.push(LogEntry {
            status,
            message: message.into(),
            timestamp,
            actor,
        });
    }
}

/// An operation the engine can replay from an input stream.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Register an approved listing so it can be purchased.
    ListProduct {
        product: ProductId,
        seller: UserId,
        price: Amount,
    },
    /// Mark an account as admin, allowing terminal transitions.
    GrantAdmin { user: UserId },
    /// Record a verified payment as a held escrow transaction.
    Capture(CaptureRequest),
    /// Seller-side confirmation via the numeric code.
    ConfirmCode {
        tx: TxId,
        seller: UserId,
        code: String,
    },
    /// Buyer-side receipt confirmation; no code involved.
    ConfirmReceipt {
        reference: String,
        buyer: UserId,
        outcome: ReceiptOutcome,
        note: Option<String>,
    },
    Release { tx: TxId, admin: UserId },
    Refund { tx: TxId, admin: UserId },
    Cancel { tx: TxId, admin: UserId },
}
