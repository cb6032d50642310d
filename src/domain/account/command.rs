use serde::Deserialize;

use crate::domain::props::{Amount, PurchaseId, UserId};

#[derive(Debug, Clone, Deserialize)]
pub enum AccountCommand {
    Deposit(DepositPayload),
    Debit(DebitPayload),
    Refund(RefundPayload),
    Settle(SettlePayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositPayload {
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebitPayload {
    pub user_id: UserId,
    pub purchase_id: PurchaseId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundPayload {
    pub user_id: UserId,
    pub purchase_id: PurchaseId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlePayload {
    pub user_id: UserId,
    pub purchase_id: PurchaseId,
}
