//! Error types for escrow processing.

use std::fmt;

use thiserror::Error;

use crate::Amount;
use crate::model::{EscrowStatus, ProductId, TxId, UserId};

/// Top-level error returned by [`EscrowEngine::apply`](super::EscrowEngine::apply).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("listing failed: {0}")]
    Listing(#[from] ListingError),

    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("confirmation failed: {0}")]
    Confirm(#[from] ConfirmError),

    #[error("{0}")]
    Admin(#[from] AdminActionError),
}

/// Error during product listing.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("product {0} is already listed")]
    DuplicateProduct(ProductId),
}

/// Error during payment capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    #[error("product {0} is not available for purchase")]
    ProductUnavailable(ProductId),
    #[error("buyer {0} cannot purchase their own listing")]
    SelfPurchase(UserId),
    #[error("captured amount {0} must be positive")]
    InvalidAmount(Amount),
    #[error("{0}")]
    Settlement(#[from] SettlementError),
}

/// Error during buyer or seller confirmation. Expired and invalid codes are
/// distinct so the client can prompt correctly (regenerate vs re-enter).
#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("transaction {0} not found")]
    TxNotFound(TxId),
    #[error("no transaction for payment reference '{0}'")]
    ReferenceNotFound(String),
    #[error("user {actor} is not authorized to confirm this transaction")]
    Unauthorized { actor: UserId },
    #[error("transaction {0} is already confirmed")]
    AlreadyConfirmed(TxId),
    #[error("confirmation code for transaction {0} has expired")]
    CodeExpired(TxId),
    #[error("invalid confirmation code for transaction {0}")]
    InvalidCode(TxId),
    #[error("transaction {0} already processed (status {1})")]
    AlreadyFinalized(TxId, EscrowStatus),
    #[error("transaction {0} cannot be confirmed while {1}")]
    NotConfirmable(TxId, EscrowStatus),
}

/// The terminal transition an admin is applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Release,
    Refund,
    Cancel,
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Release => "release",
            Self::Refund => "refund",
            Self::Cancel => "cancel",
        };
        f.write_str(name)
    }
}

/// Unified error for admin terminal transitions (release, refund, cancel).
#[derive(Debug, Error)]
pub enum AdminActionError {
    #[error("{0}: transaction {1} not found")]
    TxNotFound(AdminAction, TxId),

    #[error("{0}: user {1} is not an admin")]
    Unauthorized(AdminAction, UserId),

    #[error("{0}: transaction {1} already processed (status {2})")]
    AlreadyFinalized(AdminAction, TxId, EscrowStatus),

    #[error("{0}: {1}")]
    Settlement(AdminAction, SettlementError),
}

/// Data-integrity fault: an entity referenced by an existing transaction is
/// missing from the ledger. Surfaced rather than silently defaulted.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("referenced product {0} is missing from the ledger")]
    ProductMissing(ProductId),
    #[error("referenced account {0} is missing from the ledger")]
    AccountMissing(UserId),
}
