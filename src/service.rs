//! Orchestration around the engine: verify payments upstream, drive payouts,
//! and fan out notifications.
//!
//! Every provider call is bounded by the configured upstream timeout. Side
//! channels (notifications, email) are best-effort; their failures are logged
//! and never change an operation's outcome.

use thiserror::Error;
use tokio::time::timeout;
use tracing::warn;

use crate::engine::{AdminAction, EngineError, EscrowEngine};
use crate::gateway::{
    EmailSink, GatewayError, NotificationKind, NotificationSink, PaymentGateway, PayoutProvider,
    SinkError,
};
use crate::model::{CaptureRequest, EscrowTransaction, ReceiptOutcome, TxId, UserId};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("payment '{0}' not found at the provider")]
    PaymentNotFound(String),

    #[error("payment '{reference}' was not successful (provider status '{status}')")]
    PaymentNotSuccessful { reference: String, status: String },

    #[error("payment provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("payment '{reference}' belongs to a different buyer")]
    BuyerMismatch { reference: String },
}

/// The escrow engine plus its upstream dependencies.
pub struct EscrowService<G, P, N, E> {
    engine: EscrowEngine,
    gateway: G,
    payouts: P,
    notifications: N,
    email: E,
}

impl<G, P, N, E> EscrowService<G, P, N, E>
where
    G: PaymentGateway,
    P: PayoutProvider,
    N: NotificationSink,
    E: EmailSink,
{
    pub fn new(engine: EscrowEngine, gateway: G, payouts: P, notifications: N, email: E) -> Self {
        Self {
            engine,
            gateway,
            payouts,
            notifications,
            email,
        }
    }

    pub fn engine(&self) -> &EscrowEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut EscrowEngine {
        &mut self.engine
    }

    /// Verifies a payment with the provider and captures it into escrow.
    ///
    /// A reference the engine already holds is served locally without a
    /// second provider round trip, so retries and webhook/callback races
    /// stay idempotent even while the provider is down.
    pub async fn capture_payment(
        &mut self,
        reference: &str,
        buyer: UserId,
    ) -> Result<EscrowTransaction, ServiceError> {
        if let Some(existing) = self.engine.find_by_reference(reference) {
            if existing.buyer != buyer {
                return Err(ServiceError::BuyerMismatch {
                    reference: reference.to_string(),
                });
            }
            return Ok(existing.clone());
        }

        let deadline = self.engine.config().upstream_timeout();
        let verified = match timeout(deadline, self.gateway.verify(reference)).await {
            Ok(Ok(payment)) => payment,
            Ok(Err(GatewayError::PaymentNotFound(r))) => {
                return Err(ServiceError::PaymentNotFound(r));
            }
            Ok(Err(GatewayError::PaymentNotSuccessful { reference, status })) => {
                return Err(ServiceError::PaymentNotSuccessful { reference, status });
            }
            Ok(Err(GatewayError::ProviderUnavailable(detail))) => {
                warn!(reference, %detail, "payment verification unavailable");
                return Err(ServiceError::UpstreamUnavailable(detail));
            }
            Err(_) => {
                warn!(reference, "payment verification timed out");
                return Err(ServiceError::UpstreamUnavailable(
                    "verification timed out".to_string(),
                ));
            }
        };

        if verified.buyer != buyer {
            return Err(ServiceError::BuyerMismatch {
                reference: reference.to_string(),
            });
        }

        let tx = self
            .engine
            .capture(CaptureRequest {
                reference: verified.reference,
                provider_tx_id: verified.provider_tx_id,
                buyer: verified.buyer,
                product: verified.product,
                amount: verified.amount,
                paid_at: verified.paid_at,
            })
            .map_err(EngineError::from)?
            .clone();

        self.dispatch(
            "notify",
            self.notifications.notify(
                tx.buyer,
                NotificationKind::OrderPlaced,
                "payment received, your order is in escrow",
            ),
        )
        .await;
        self.dispatch(
            "notify",
            self.notifications.notify(
                tx.seller,
                NotificationKind::OrderPlaced,
                "your product has been purchased",
            ),
        )
        .await;
        self.dispatch(
            "email",
            self.email
                .send_received_notification(tx.seller, tx.buyer, &tx.reference, tx.total_amount),
        )
        .await;
        Ok(tx)
    }

    /// Seller confirms delivery with the numeric code.
    pub async fn confirm_delivery_code(
        &mut self,
        tx_id: TxId,
        seller: UserId,
        code: &str,
    ) -> Result<EscrowTransaction, ServiceError> {
        let tx = self
            .engine
            .confirm_with_code(tx_id, seller, code)
            .map_err(EngineError::from)?
            .clone();
        self.dispatch(
            "notify",
            self.notifications.notify(
                tx.buyer,
                NotificationKind::OrderCompleted,
                "the seller confirmed delivery of your order",
            ),
        )
        .await;
        Ok(tx)
    }

    /// Buyer answers whether the product arrived.
    pub async fn confirm_receipt(
        &mut self,
        reference: &str,
        buyer: UserId,
        outcome: ReceiptOutcome,
        note: Option<String>,
    ) -> Result<EscrowTransaction, ServiceError> {
        let tx = self
            .engine
            .confirm_receipt(reference, buyer, outcome, note)
            .map_err(EngineError::from)?
            .clone();

        let (kind, message) = match outcome {
            ReceiptOutcome::Received => (
                NotificationKind::OrderCompleted,
                "the buyer confirmed receipt of your product",
            ),
            ReceiptOutcome::NotReceived => (
                NotificationKind::OrderDisputed,
                "the buyer reported your product as not received",
            ),
        };
        self.dispatch("notify", self.notifications.notify(tx.seller, kind, message))
            .await;
        Ok(tx)
    }

    /// Admin release: initiates the seller payout, then settles.
    ///
    /// The transition is validated first so a doomed release never spends a
    /// payout attempt. A failed or timed-out transfer does not block the
    /// settlement; the payout is marked for manual follow-up instead.
    pub async fn release(
        &mut self,
        tx_id: TxId,
        admin: UserId,
    ) -> Result<EscrowTransaction, ServiceError> {
        self.engine
            .check_admin_action(AdminAction::Release, tx_id, admin)
            .map_err(EngineError::from)?;

        let (seller, share) = {
            let tx = self.engine.transaction(tx_id).expect("validated above");
            (tx.seller, tx.seller_share)
        };

        let deadline = self.engine.config().upstream_timeout();
        let payout_reference =
            match timeout(deadline, self.payouts.transfer(seller, share, "escrow release")).await {
                Ok(Ok(receipt)) => Some(receipt.reference),
                Ok(Err(e)) => {
                    warn!(tx = tx_id, error = %e, "payout failed, marking for manual transfer");
                    None
                }
                Err(_) => {
                    warn!(tx = tx_id, "payout timed out, marking for manual transfer");
                    None
                }
            };

        let tx = self
            .engine
            .release(tx_id, admin, payout_reference)
            .map_err(EngineError::from)?
            .clone();

        self.dispatch(
            "email",
            self.email
                .send_released_notification(tx.seller, &tx.reference, tx.seller_share),
        )
        .await;
        self.dispatch(
            "notify",
            self.notifications.notify(
                tx.seller,
                NotificationKind::EscrowReleased,
                "your escrow funds have been released",
            ),
        )
        .await;
        Ok(tx)
    }

    /// Admin refund: full amount back to the buyer's wallet.
    pub async fn refund(
        &mut self,
        tx_id: TxId,
        admin: UserId,
    ) -> Result<EscrowTransaction, ServiceError> {
        let tx = self
            .engine
            .refund(tx_id, admin)
            .map_err(EngineError::from)?
            .clone();
        self.dispatch(
            "notify",
            self.notifications.notify(
                tx.buyer,
                NotificationKind::EscrowRefunded,
                "your payment has been refunded to your wallet",
            ),
        )
        .await;
        Ok(tx)
    }

    /// Admin cancel: financially a refund, communicated as a cancellation.
    pub async fn cancel(
        &mut self,
        tx_id: TxId,
        admin: UserId,
    ) -> Result<EscrowTransaction, ServiceError> {
        let tx = self
            .engine
            .cancel(tx_id, admin)
            .map_err(EngineError::from)?
            .clone();
        self.dispatch(
            "notify",
            self.notifications.notify(
                tx.buyer,
                NotificationKind::EscrowCancelled,
                "your order was cancelled and refunded to your wallet",
            ),
        )
        .await;
        Ok(tx)
    }

    /// Awaits a best-effort side channel under the upstream timeout.
    async fn dispatch<F>(&self, channel: &str, fut: F)
    where
        F: Future<Output = Result<(), SinkError>>,
    {
        match timeout(self.engine.config().upstream_timeout(), fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(channel, error = %e, "delivery failed"),
            Err(_) => warn!(channel, "delivery timed out"),
        }
    }
}
