//! Upstream seams: payment verification, payouts, and notifications.
//!
//! The engine never talks to a provider. The service layer drives these
//! traits, bounds every call with a timeout, and feeds only verified facts
//! into the engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ProductId, UserId};
use crate::Amount;

/// A payment the provider has confirmed as successful, with the facts the
/// engine needs to capture it.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub reference: String,
    pub provider_tx_id: String,
    pub amount: Amount,
    pub currency: String,
    pub paid_at: DateTime<Utc>,
    pub buyer: UserId,
    pub product: ProductId,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment '{0}' not found at the provider")]
    PaymentNotFound(String),
    #[error("payment '{reference}' is not successful (provider status '{status}')")]
    PaymentNotSuccessful { reference: String, status: String },
    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Looks a payment reference up at the provider and reports its outcome.
pub trait PaymentGateway {
    fn verify(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<VerifiedPayment, GatewayError>> + Send;
}

/// Provider acknowledgement of an initiated transfer.
#[derive(Debug, Clone)]
pub struct PayoutReceipt {
    pub reference: String,
}

/// Initiates a bank transfer of released escrow funds to a seller.
pub trait PayoutProvider {
    fn transfer(
        &self,
        seller: UserId,
        amount: Amount,
        reason: &str,
    ) -> impl Future<Output = Result<PayoutReceipt, GatewayError>> + Send;
}

/// Failure in a best-effort side channel. Logged by the caller, never
/// propagated into an operation result.
#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct SinkError(pub String);

/// What happened, from the recipient's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    OrderPlaced,
    OrderCompleted,
    OrderDisputed,
    EscrowReleased,
    EscrowRefunded,
    EscrowCancelled,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::OrderPlaced => "order_placed",
            Self::OrderCompleted => "order_completed",
            Self::OrderDisputed => "order_disputed",
            Self::EscrowReleased => "escrow_released",
            Self::EscrowRefunded => "escrow_refunded",
            Self::EscrowCancelled => "escrow_cancelled",
        };
        f.write_str(name)
    }
}

/// In-app notification delivery.
pub trait NotificationSink {
    fn notify(
        &self,
        user: UserId,
        kind: NotificationKind,
        message: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Transactional email delivery for the two mails the escrow flow sends.
pub trait EmailSink {
    /// Mailed to the seller when a buyer's payment lands in escrow.
    fn send_received_notification(
        &self,
        seller: UserId,
        buyer: UserId,
        reference: &str,
        amount: Amount,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Mailed to the seller when their share is released.
    fn send_released_notification(
        &self,
        seller: UserId,
        reference: &str,
        amount: Amount,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}
