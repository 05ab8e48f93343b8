//! Validation gate applied before the engine mutates an escrow transaction.
//!
//! Every check returns a structured rejection so the API layer can map it to
//! a precise user-facing error instead of a generic failure.

use chrono::{DateTime, Utc};

use crate::engine::error::{AdminAction, AdminActionError, ConfirmError};
use crate::engine::state::UserAccount;
use crate::model::{EscrowStatus, EscrowTransaction, UserId};

/// Seller-side code confirmation: identity, finality, single-use, freshness,
/// and the code itself, in that order.
pub(crate) fn seller_code(
    tx: &EscrowTransaction,
    seller: UserId,
    code: &str,
    now: DateTime<Utc>,
) -> Result<(), ConfirmError> {
    if tx.seller != seller {
        return Err(ConfirmError::Unauthorized { actor: seller });
    }
    if tx.status.is_terminal() {
        return Err(ConfirmError::AlreadyFinalized(tx.id, tx.status));
    }
    if tx.is_confirmed {
        return Err(ConfirmError::AlreadyConfirmed(tx.id));
    }
    if tx.status != EscrowStatus::Pending {
        return Err(ConfirmError::NotConfirmable(tx.id, tx.status));
    }
    // Expiry before code match, so the client knows whether to re-enter or
    // regenerate.
    if now > tx.code_expires_at {
        return Err(ConfirmError::CodeExpired(tx.id));
    }
    if tx.confirmation_code != code {
        return Err(ConfirmError::InvalidCode(tx.id));
    }
    Ok(())
}

/// Buyer receipt confirmation: identity and finality only; no code involved.
pub(crate) fn buyer_receipt(tx: &EscrowTransaction, buyer: UserId) -> Result<(), ConfirmError> {
    if tx.buyer != buyer {
        return Err(ConfirmError::Unauthorized { actor: buyer });
    }
    if tx.status.is_terminal() {
        return Err(ConfirmError::AlreadyFinalized(tx.id, tx.status));
    }
    Ok(())
}

/// Admin terminal transition: role check plus at-most-one finalization.
pub(crate) fn admin_action(
    action: AdminAction,
    account: Option<&UserAccount>,
    actor: UserId,
    tx: &EscrowTransaction,
) -> Result<(), AdminActionError> {
    if !account.is_some_and(UserAccount::is_admin) {
        return Err(AdminActionError::Unauthorized(action, actor));
    }
    if tx.status.is_terminal() {
        return Err(AdminActionError::AlreadyFinalized(action, tx.id, tx.status));
    }
    Ok(())
}
