//! Escrow transaction engine.
//!
//! Holds captured marketplace payments until delivery is confirmed, then
//! settles them through exactly one terminal transition:
//!
//! ```text
//!              capture
//!                 |
//!                 v
//!             [pending] --seller code / buyer "received"--> [completed]
//!                 |                                              |
//!         buyer "not received"                                   |
//!                 v                                              |
//!             [disputed]                                         |
//!                 |                                              |
//!                 +------- admin release/refund/cancel ----------+
//!                                     |
//!                                     v
//!                 [released] | [refunded] | [cancelled]
//! ```
//!
//! All state lives behind `&mut self`, so callers serialize operations by
//! holding the engine exclusively. The replay binary drives it from a single
//! channel consumer.

mod error;
mod gate;
mod settlement;
mod state;

use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, RandomState};

use chrono::{DateTime, Utc};
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::config::EscrowConfig;
use crate::model::{
    BuyerConfirmation, CaptureRequest, EscrowStatus, EscrowTransaction, Operation, ProductId,
    ReceiptOutcome, TxId, UserId,
};
use crate::Amount;

pub use error::{
    AdminAction, AdminActionError, CaptureError, ConfirmError, EngineError, ListingError,
    SettlementError,
};
pub use settlement::OrderView;
pub use state::{ProductRecord, ProductStatus, Role, UserAccount};

/// Source of the current time. Injected so tests can pin or shift the clock.
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Source of seller confirmation codes, given the configured digit count.
pub type CodeSource = Box<dyn Fn(u8) -> String + Send + Sync>;

/// The escrow state machine plus the marketplace ledger it settles against.
pub struct EscrowEngine {
    config: EscrowConfig,
    transactions: HashMap<TxId, EscrowTransaction>,
    by_reference: HashMap<String, TxId>,
    ledger: settlement::Ledger,
    next_tx: TxId,
    clock: Clock,
    code_source: CodeSource,
}

impl EscrowEngine {
    pub fn new(config: EscrowConfig) -> Self {
        Self::with_sources(config, Box::new(Utc::now), Box::new(random_code))
    }

    /// Engine with injected time and code sources, for deterministic tests.
    pub fn with_sources(config: EscrowConfig, clock: Clock, code_source: CodeSource) -> Self {
        Self {
            config,
            transactions: HashMap::new(),
            by_reference: HashMap::new(),
            ledger: settlement::Ledger::new(),
            next_tx: 1,
            clock,
            code_source,
        }
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    /// Consumes operations from the stream until it closes. Rejected
    /// operations are logged and skipped; the stream keeps going.
    pub async fn run<S>(&mut self, mut stream: S)
    where
        S: Stream<Item = Operation> + Unpin,
    {
        while let Some(op) = stream.next().await {
            let _ = self.apply(op);
        }
    }

    /// Dispatches one operation, logging the outcome either way.
    pub fn apply(&mut self, op: Operation) -> Result<(), EngineError> {
        match op {
            Operation::ListProduct {
                product,
                seller,
                price,
            } => log_result(
                "list_product",
                self.list_product(product, seller, price)
                    .map_err(EngineError::from),
            ),
            Operation::GrantAdmin { user } => {
                self.grant_admin(user);
                info!(user, "grant_admin applied");
                Ok(())
            }
            Operation::Capture(req) => log_result(
                "capture",
                self.capture(req).map(drop).map_err(EngineError::from),
            ),
            Operation::ConfirmCode { tx, seller, code } => log_result(
                "confirm_code",
                self.confirm_with_code(tx, seller, &code)
                    .map(drop)
                    .map_err(EngineError::from),
            ),
            Operation::ConfirmReceipt {
                reference,
                buyer,
                outcome,
                note,
            } => log_result(
                "confirm_receipt",
                self.confirm_receipt(&reference, buyer, outcome, note)
                    .map(drop)
                    .map_err(EngineError::from),
            ),
            Operation::Release { tx, admin } => log_result(
                "release",
                self.release(tx, admin, None)
                    .map(drop)
                    .map_err(EngineError::from),
            ),
            Operation::Refund { tx, admin } => log_result(
                "refund",
                self.refund(tx, admin).map(drop).map_err(EngineError::from),
            ),
            Operation::Cancel { tx, admin } => log_result(
                "cancel",
                self.cancel(tx, admin).map(drop).map_err(EngineError::from),
            ),
        }
    }

    /// Registers an approved listing so it can be purchased.
    pub fn list_product(
        &mut self,
        product: ProductId,
        seller: UserId,
        price: Amount,
    ) -> Result<(), ListingError> {
        if !self.ledger.insert_product(product, seller, price) {
            return Err(ListingError::DuplicateProduct(product));
        }
        self.ledger.account_mut(seller);
        Ok(())
    }

    /// Marks an account as admin, allowing terminal transitions.
    pub fn grant_admin(&mut self, user: UserId) {
        self.ledger.grant_admin(user);
    }

    /// Records a verified payment as a held escrow transaction. Capturing the
    /// same payment reference again returns the existing transaction without
    /// touching any balance.
    pub fn capture(&mut self, req: CaptureRequest) -> Result<&EscrowTransaction, CaptureError> {
        let id = match self.by_reference.get(&req.reference).copied() {
            Some(id) => id,
            None => self.capture_new(req)?,
        };
        Ok(self
            .transactions
            .get(&id)
            .expect("reference index points at a live transaction"))
    }

    fn capture_new(&mut self, req: CaptureRequest) -> Result<TxId, CaptureError> {
        if !req.amount.is_positive() {
            return Err(CaptureError::InvalidAmount(req.amount));
        }
        let record = self
            .ledger
            .product(req.product)
            .ok_or(CaptureError::ProductNotFound(req.product))?;
        if record.status() != ProductStatus::Approved {
            return Err(CaptureError::ProductUnavailable(req.product));
        }
        let seller = record.seller();
        if seller == req.buyer {
            return Err(CaptureError::SelfPurchase(req.buyer));
        }

        let (admin_share, seller_share) = req.amount.split_fee(self.config.fee_bps);
        let now = (self.clock)();
        let code = (self.code_source)(self.config.code_length);

        self.ledger.capture_funds(
            &req.reference,
            req.buyer,
            seller,
            req.product,
            req.amount,
            seller_share,
        )?;

        let id = self.next_tx;
        self.next_tx += 1;
        let mut tx = EscrowTransaction {
            id,
            reference: req.reference.clone(),
            provider_tx_id: req.provider_tx_id,
            buyer: req.buyer,
            seller,
            product: req.product,
            total_amount: req.amount,
            admin_share,
            seller_share,
            status: EscrowStatus::Pending,
            buyer_confirmation: BuyerConfirmation::Pending,
            buyer_confirmed_at: None,
            buyer_confirmation_note: None,
            confirmation_code: code,
            code_expires_at: now + self.config.code_ttl(),
            is_confirmed: false,
            confirmed_at: None,
            confirmed_by: None,
            paid_at: req.paid_at,
            released_at: None,
            refunded_at: None,
            cancelled_at: None,
            seller_payout_reference: None,
            admin_payout_reference: None,
            log: Vec::new(),
        };
        tx.push_log(
            EscrowStatus::Pending,
            "payment verified, funds held in escrow awaiting confirmation",
            now,
            None,
        );
        self.by_reference.insert(req.reference, id);
        self.transactions.insert(id, tx);
        Ok(id)
    }

    /// Seller-side confirmation with the single-use numeric code.
    pub fn confirm_with_code(
        &mut self,
        id: TxId,
        seller: UserId,
        code: &str,
    ) -> Result<&EscrowTransaction, ConfirmError> {
        let now = (self.clock)();
        let Some(tx) = self.transactions.get_mut(&id) else {
            return Err(ConfirmError::TxNotFound(id));
        };
        gate::seller_code(tx, seller, code, now)?;

        tx.is_confirmed = true;
        tx.confirmed_at = Some(now);
        tx.confirmed_by = Some(seller);
        tx.status = EscrowStatus::Completed;
        tx.push_log(
            EscrowStatus::Completed,
            "delivery confirmed by seller code",
            now,
            Some(seller),
        );
        let reference = tx.reference.clone();
        self.ledger
            .set_order_status(&reference, EscrowStatus::Completed);
        Ok(self
            .transactions
            .get(&id)
            .expect("transaction confirmed above"))
    }

    /// Buyer-side receipt confirmation. The receipt answer and note are always
    /// recorded; the escrow status only moves out of `pending`.
    pub fn confirm_receipt(
        &mut self,
        reference: &str,
        buyer: UserId,
        outcome: ReceiptOutcome,
        note: Option<String>,
    ) -> Result<&EscrowTransaction, ConfirmError> {
        let now = (self.clock)();
        let Some(id) = self.by_reference.get(reference).copied() else {
            return Err(ConfirmError::ReferenceNotFound(reference.to_string()));
        };
        let tx = self
            .transactions
            .get_mut(&id)
            .expect("reference index points at a live transaction");
        gate::buyer_receipt(tx, buyer)?;

        tx.buyer_confirmed_at = Some(now);
        tx.buyer_confirmation_note = note;
        match outcome {
            ReceiptOutcome::Received => {
                tx.buyer_confirmation = BuyerConfirmation::Received;
                if tx.status == EscrowStatus::Pending {
                    tx.status = EscrowStatus::Completed;
                    if !tx.is_confirmed {
                        tx.is_confirmed = true;
                        tx.confirmed_at = Some(now);
                        tx.confirmed_by = Some(buyer);
                    }
                    tx.push_log(
                        EscrowStatus::Completed,
                        "buyer confirmed receipt of the product",
                        now,
                        Some(buyer),
                    );
                    self.ledger
                        .set_order_status(reference, EscrowStatus::Completed);
                }
            }
            ReceiptOutcome::NotReceived => {
                tx.buyer_confirmation = BuyerConfirmation::NotReceived;
                if tx.status == EscrowStatus::Pending {
                    tx.status = EscrowStatus::Disputed;
                    tx.push_log(
                        EscrowStatus::Disputed,
                        "buyer reported the product as not received",
                        now,
                        Some(buyer),
                    );
                    self.ledger
                        .set_order_status(reference, EscrowStatus::Disputed);
                }
            }
        }
        Ok(self
            .transactions
            .get(&id)
            .expect("reference index points at a live transaction"))
    }

    /// Validates an admin transition without applying it. The service layer
    /// calls this before spending a payout attempt on a doomed release.
    pub fn check_admin_action(
        &self,
        action: AdminAction,
        id: TxId,
        admin: UserId,
    ) -> Result<(), AdminActionError> {
        let Some(tx) = self.transactions.get(&id) else {
            return Err(AdminActionError::TxNotFound(action, id));
        };
        gate::admin_action(action, self.ledger.account(admin), admin, tx)
    }

    /// Admin release: moves the held seller share to earned funds. When no
    /// payout reference is supplied the payout is marked for manual follow-up.
    pub fn release(
        &mut self,
        id: TxId,
        admin: UserId,
        payout_reference: Option<String>,
    ) -> Result<&EscrowTransaction, AdminActionError> {
        let now = (self.clock)();
        self.check_admin_action(AdminAction::Release, id, admin)?;
        let (reference, seller, seller_share) = {
            let tx = self.transactions.get(&id).expect("checked above");
            (tx.reference.clone(), tx.seller, tx.seller_share)
        };
        self.ledger
            .release_funds(&reference, seller, seller_share)
            .map_err(|e| AdminActionError::Settlement(AdminAction::Release, e))?;

        let tx = self.transactions.get_mut(&id).expect("checked above");
        tx.status = EscrowStatus::Released;
        tx.released_at = Some(now);
        tx.seller_payout_reference = Some(
            payout_reference
                .unwrap_or_else(|| format!("MANUAL_{reference}_{}", now.timestamp())),
        );
        tx.push_log(
            EscrowStatus::Released,
            "escrow released to seller",
            now,
            Some(admin),
        );
        Ok(&*tx)
    }

    /// Admin refund: returns the full amount to the buyer's wallet.
    pub fn refund(
        &mut self,
        id: TxId,
        admin: UserId,
    ) -> Result<&EscrowTransaction, AdminActionError> {
        self.revert(AdminAction::Refund, EscrowStatus::Refunded, id, admin)
    }

    /// Admin cancel: financially identical to a refund, recorded separately.
    pub fn cancel(
        &mut self,
        id: TxId,
        admin: UserId,
    ) -> Result<&EscrowTransaction, AdminActionError> {
        self.revert(AdminAction::Cancel, EscrowStatus::Cancelled, id, admin)
    }

    fn revert(
        &mut self,
        action: AdminAction,
        final_status: EscrowStatus,
        id: TxId,
        admin: UserId,
    ) -> Result<&EscrowTransaction, AdminActionError> {
        let now = (self.clock)();
        self.check_admin_action(action, id, admin)?;
        let (reference, buyer, seller, product, total, seller_share) = {
            let tx = self.transactions.get(&id).expect("checked above");
            (
                tx.reference.clone(),
                tx.buyer,
                tx.seller,
                tx.product,
                tx.total_amount,
                tx.seller_share,
            )
        };
        self.ledger
            .refund_funds(
                &reference,
                buyer,
                seller,
                product,
                total,
                seller_share,
                final_status,
            )
            .map_err(|e| AdminActionError::Settlement(action, e))?;

        let tx = self.transactions.get_mut(&id).expect("checked above");
        tx.status = final_status;
        let message = match action {
            AdminAction::Refund => {
                tx.refunded_at = Some(now);
                "escrow refunded to buyer"
            }
            _ => {
                tx.cancelled_at = Some(now);
                "escrow cancelled, buyer refunded"
            }
        };
        tx.push_log(final_status, message, now, Some(admin));
        Ok(&*tx)
    }

    pub fn transaction(&self, id: TxId) -> Option<&EscrowTransaction> {
        self.transactions.get(&id)
    }

    pub fn find_by_reference(&self, reference: &str) -> Option<&EscrowTransaction> {
        let id = self.by_reference.get(reference)?;
        self.transactions.get(id)
    }

    pub fn transactions(&self) -> impl Iterator<Item = &EscrowTransaction> + '_ {
        self.transactions.values()
    }

    pub fn account(&self, user: UserId) -> Option<&UserAccount> {
        self.ledger.account(user)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &UserAccount> + '_ {
        self.ledger.accounts()
    }

    pub fn product(&self, id: ProductId) -> Option<&ProductRecord> {
        self.ledger.product(id)
    }

    pub fn order(&self, reference: &str) -> Option<&OrderView> {
        self.ledger.order(reference)
    }
}

impl Default for EscrowEngine {
    fn default() -> Self {
        Self::new(EscrowConfig::default())
    }
}

fn log_result<T, E: fmt::Display>(op: &str, result: Result<T, E>) -> Result<T, E> {
    match &result {
        Ok(_) => info!("{op} applied"),
        Err(e) => info!(reason = %e, "{op} skipped"),
    }
    result
}

/// Default code source. Not cryptographic; the code is a short-lived
/// out-of-band check, not a credential.
fn random_code(length: u8) -> String {
    let width = usize::from(length.min(9));
    let modulus = 10_u64.pow(width as u32);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let value = RandomState::new().hash_one(nanos) % modulus;
    format!("{value:0width$}")
}
