//! Ledger state and the settlement effects that mutate it.
//!
//! The engine never touches balance fields directly: every transition maps to
//! one named effect here, and an effect applies all of its field updates or
//! none (each referenced entity is validated before the first write).

use std::collections::HashMap;

use crate::Amount;
use crate::engine::error::SettlementError;
use crate::engine::state::{ProductRecord, UserAccount};
use crate::model::{EscrowStatus, ProductId, UserId};

/// Denormalized read-model of a purchase, keyed by payment reference.
/// Never authoritative; rebuilt by the settlement effects as the owning
/// escrow transaction moves through its lifecycle.
#[derive(Debug, Clone)]
pub struct OrderView {
    pub reference: String,
    pub buyer: UserId,
    pub seller: UserId,
    pub product: ProductId,
    pub total_amount: Amount,
    pub status: EscrowStatus,
}

/// Durable marketplace state: user balances, product availability, and the
/// order projection.
#[derive(Debug, Default)]
pub struct Ledger {
    users: HashMap<UserId, UserAccount>,
    products: HashMap<ProductId, ProductRecord>,
    orders: HashMap<String, OrderView>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, user: UserId) -> Option<&UserAccount> {
        self.users.get(&user)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &UserAccount> + '_ {
        self.users.values()
    }

    pub fn product(&self, id: ProductId) -> Option<&ProductRecord> {
        self.products.get(&id)
    }

    pub fn order(&self, reference: &str) -> Option<&OrderView> {
        self.orders.get(reference)
    }

    pub(crate) fn account_mut(&mut self, user: UserId) -> &mut UserAccount {
        self.users.entry(user).or_insert_with(|| UserAccount::new(user))
    }

    /// Returns false if the product id is already taken.
    pub(crate) fn insert_product(
        &mut self,
        id: ProductId,
        seller: UserId,
        price: Amount,
    ) -> bool {
        if self.products.contains_key(&id) {
            return false;
        }
        self.products.insert(id, ProductRecord::new(id, seller, price));
        true
    }

    pub(crate) fn grant_admin(&mut self, user: UserId) {
        self.account_mut(user).promote_to_admin();
    }

    pub(crate) fn set_order_status(&mut self, reference: &str, status: EscrowStatus) {
        if let Some(order) = self.orders.get_mut(reference) {
            order.status = status;
        }
    }

    /// Capture effect: hold the seller share, hand the product to the buyer,
    /// create the order projection.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn capture_funds(
        &mut self,
        reference: &str,
        buyer: UserId,
        seller: UserId,
        product: ProductId,
        total_amount: Amount,
        seller_share: Amount,
    ) -> Result<(), SettlementError> {
        let Some(record) = self.products.get_mut(&product) else {
            return Err(SettlementError::ProductMissing(product));
        };
        record.mark_sold(buyer);
        self.account_mut(seller).add_pending(seller_share);
        self.account_mut(buyer);
        self.orders.insert(
            reference.to_string(),
            OrderView {
                reference: reference.to_string(),
                buyer,
                seller,
                product,
                total_amount,
                status: EscrowStatus::Pending,
            },
        );
        Ok(())
    }

    /// Release effect: move the held seller share into earned funds.
    pub(crate) fn release_funds(
        &mut self,
        reference: &str,
        seller: UserId,
        seller_share: Amount,
    ) -> Result<(), SettlementError> {
        let Some(account) = self.users.get_mut(&seller) else {
            return Err(SettlementError::AccountMissing(seller));
        };
        account.settle_pending(seller_share);
        self.set_order_status(reference, EscrowStatus::Released);
        Ok(())
    }

    /// Refund/cancel effect: credit the buyer wallet with the full amount,
    /// drop the seller hold, and put the product back on the shelf.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn refund_funds(
        &mut self,
        reference: &str,
        buyer: UserId,
        seller: UserId,
        product: ProductId,
        total_amount: Amount,
        seller_share: Amount,
        final_status: EscrowStatus,
    ) -> Result<(), SettlementError> {
        // Validate every entity before the first write so the effect stays
        // all-or-nothing.
        if !self.users.contains_key(&buyer) {
            return Err(SettlementError::AccountMissing(buyer));
        }
        if !self.users.contains_key(&seller) {
            return Err(SettlementError::AccountMissing(seller));
        }
        if !self.products.contains_key(&product) {
            return Err(SettlementError::ProductMissing(product));
        }

        if let Some(account) = self.users.get_mut(&buyer) {
            account.credit_wallet(total_amount);
        }
        if let Some(account) = self.users.get_mut(&seller) {
            account.revoke_pending(seller_share);
        }
        if let Some(record) = self.products.get_mut(&product) {
            record.revert_to_approved();
        }
        self.set_order_status(reference, final_status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::ProductStatus;

    const SELLER: UserId = 10;
    const BUYER: UserId = 20;
    const PRODUCT: ProductId = 101;

    fn captured_ledger() -> Ledger {
        let mut ledger = Ledger::new();
        assert!(ledger.insert_product(PRODUCT, SELLER, Amount::from_major(10_000)));
        ledger
            .capture_funds(
                "REF001",
                BUYER,
                SELLER,
                PRODUCT,
                Amount::from_major(10_000),
                Amount::from_major(8_500),
            )
            .unwrap();
        ledger
    }

    #[test]
    fn capture_holds_share_and_sells_product() {
        let ledger = captured_ledger();

        let seller = ledger.account(SELLER).unwrap();
        assert_eq!(seller.pending_earnings(), Amount::from_major(8_500));
        assert_eq!(seller.total_earnings(), Amount::ZERO);

        let product = ledger.product(PRODUCT).unwrap();
        assert_eq!(product.status(), ProductStatus::Sold);
        assert_eq!(product.buyer(), Some(BUYER));

        let order = ledger.order("REF001").unwrap();
        assert_eq!(order.status, EscrowStatus::Pending);
        assert_eq!(order.total_amount, Amount::from_major(10_000));
    }

    #[test]
    fn capture_missing_product_fails() {
        let mut ledger = Ledger::new();
        let result = ledger.capture_funds(
            "REF001",
            BUYER,
            SELLER,
            999,
            Amount::from_major(100),
            Amount::from_major(85),
        );
        assert!(matches!(result, Err(SettlementError::ProductMissing(999))));
        assert!(ledger.account(SELLER).is_none());
        assert!(ledger.order("REF001").is_none());
    }

    #[test]
    fn release_moves_pending_to_earned() {
        let mut ledger = captured_ledger();
        ledger
            .release_funds("REF001", SELLER, Amount::from_major(8_500))
            .unwrap();

        let seller = ledger.account(SELLER).unwrap();
        assert_eq!(seller.pending_earnings(), Amount::ZERO);
        assert_eq!(seller.total_earnings(), Amount::from_major(8_500));
        assert_eq!(ledger.order("REF001").unwrap().status, EscrowStatus::Released);

        // Product stays sold after a release.
        assert_eq!(ledger.product(PRODUCT).unwrap().status(), ProductStatus::Sold);
    }

    #[test]
    fn release_missing_account_fails() {
        let mut ledger = Ledger::new();
        let result = ledger.release_funds("REF001", 99, Amount::from_major(1));
        assert!(matches!(result, Err(SettlementError::AccountMissing(99))));
    }

    #[test]
    fn refund_restores_wallet_and_product() {
        let mut ledger = captured_ledger();
        ledger
            .refund_funds(
                "REF001",
                BUYER,
                SELLER,
                PRODUCT,
                Amount::from_major(10_000),
                Amount::from_major(8_500),
                EscrowStatus::Refunded,
            )
            .unwrap();

        let buyer = ledger.account(BUYER).unwrap();
        assert_eq!(buyer.wallet_balance(), Amount::from_major(10_000));

        let seller = ledger.account(SELLER).unwrap();
        assert_eq!(seller.pending_earnings(), Amount::ZERO);
        assert_eq!(seller.total_earnings(), Amount::ZERO);

        let product = ledger.product(PRODUCT).unwrap();
        assert_eq!(product.status(), ProductStatus::Approved);
        assert_eq!(product.buyer(), None);

        assert_eq!(ledger.order("REF001").unwrap().status, EscrowStatus::Refunded);
    }

    #[test]
    fn refund_missing_product_leaves_balances_untouched() {
        let mut ledger = captured_ledger();
        let result = ledger.refund_funds(
            "REF001",
            BUYER,
            SELLER,
            999,
            Amount::from_major(10_000),
            Amount::from_major(8_500),
            EscrowStatus::Refunded,
        );
        assert!(matches!(result, Err(SettlementError::ProductMissing(999))));

        // No partial application.
        assert_eq!(ledger.account(BUYER).unwrap().wallet_balance(), Amount::ZERO);
        assert_eq!(
            ledger.account(SELLER).unwrap().pending_earnings(),
            Amount::from_major(8_500)
        );
    }

    #[test]
    fn duplicate_product_rejected() {
        let mut ledger = Ledger::new();
        assert!(ledger.insert_product(PRODUCT, SELLER, Amount::from_major(1)));
        assert!(!ledger.insert_product(PRODUCT, SELLER, Amount::from_major(2)));
    }
}
