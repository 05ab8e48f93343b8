use crate::Amount;
use crate::model::{ProductId, UserId};

/// Marketplace role attached to a ledger account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Member,
    Admin,
}

/// A user's balance fields as tracked by the ledger: spendable wallet funds,
/// seller funds awaiting release, and seller funds already released.
#[derive(Debug)]
pub struct UserAccount {
    id: UserId,
    role: Role,
    wallet_balance: Amount,
    pending_earnings: Amount,
    total_earnings: Amount,
}

impl UserAccount {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            role: Role::default(),
            wallet_balance: Amount::ZERO,
            pending_earnings: Amount::ZERO,
            total_earnings: Amount::ZERO,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn wallet_balance(&self) -> Amount {
        self.wallet_balance
    }

    pub fn pending_earnings(&self) -> Amount {
        self.pending_earnings
    }

    pub fn total_earnings(&self) -> Amount {
        self.total_earnings
    }

    pub(crate) fn promote_to_admin(&mut self) {
        self.role = Role::Admin;
    }

    pub(crate) fn credit_wallet(&mut self, amount: Amount) {
        self.wallet_balance += amount;
    }

    pub(crate) fn add_pending(&mut self, amount: Amount) {
        self.pending_earnings += amount;
    }

    /// Move funds from pending to earned, as one step.
    pub(crate) fn settle_pending(&mut self, amount: Amount) {
        self.pending_earnings -= amount;
        self.total_earnings += amount;
    }

    /// Drop held funds without earning them (refund/cancel path).
    pub(crate) fn revoke_pending(&mut self, amount: Amount) {
        self.pending_earnings -= amount;
    }
}

/// Availability of a listed product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductStatus {
    Approved,
    Sold,
}

/// A listed product and who currently holds it.
#[derive(Debug)]
pub struct ProductRecord {
    id: ProductId,
    seller: UserId,
    price: Amount,
    status: ProductStatus,
    buyer: Option<UserId>,
}

impl ProductRecord {
    pub fn new(id: ProductId, seller: UserId, price: Amount) -> Self {
        Self {
            id,
            seller,
            price,
            status: ProductStatus::Approved,
            buyer: None,
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn seller(&self) -> UserId {
        self.seller
    }

    pub fn price(&self) -> Amount {
        self.price
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn buyer(&self) -> Option<UserId> {
        self.buyer
    }

    pub(crate) fn mark_sold(&mut self, buyer: UserId) {
        self.status = ProductStatus::Sold;
        self.buyer = Some(buyer);
    }

    pub(crate) fn revert_to_approved(&mut self) {
        self.status = ProductStatus::Approved;
        self.buyer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_empty() {
        let account = UserAccount::new(7);
        assert_eq!(account.id(), 7);
        assert_eq!(account.role(), Role::Member);
        assert_eq!(account.wallet_balance(), Amount::ZERO);
        assert_eq!(account.pending_earnings(), Amount::ZERO);
        assert_eq!(account.total_earnings(), Amount::ZERO);
    }

    #[test]
    fn settle_pending_moves_both_fields() {
        let mut account = UserAccount::new(1);
        account.add_pending(Amount::from_major(85));
        account.settle_pending(Amount::from_major(85));
        assert_eq!(account.pending_earnings(), Amount::ZERO);
        assert_eq!(account.total_earnings(), Amount::from_major(85));
    }

    #[test]
    fn revoke_pending_leaves_total_untouched() {
        let mut account = UserAccount::new(1);
        account.add_pending(Amount::from_major(40));
        account.revoke_pending(Amount::from_major(40));
        assert_eq!(account.pending_earnings(), Amount::ZERO);
        assert_eq!(account.total_earnings(), Amount::ZERO);
    }

    #[test]
    fn product_sold_and_reverted() {
        let mut product = ProductRecord::new(5, 10, Amount::from_major(100));
        assert_eq!(product.status(), ProductStatus::Approved);

        product.mark_sold(20);
        assert_eq!(product.status(), ProductStatus::Sold);
        assert_eq!(product.buyer(), Some(20));

        product.revert_to_approved();
        assert_eq!(product.status(), ProductStatus::Approved);
        assert_eq!(product.buyer(), None);
    }
}
