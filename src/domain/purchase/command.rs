use serde::Deserialize;

use crate::domain::props::{Amount, PurchaseId, UserId};

#[derive(Debug, Clone, Deserialize)]
pub enum PurchaseCommand {
    RecordDebit(RecordDebitPayload),
    MarkDelivered(MarkDeliveredPayload),
    MarkRefunded(MarkRefundedPayload),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordDebitPayload {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub item: String,
    pub command: String,
    pub price: Amount,
    pub debited_at_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkDeliveredPayload {
    pub id: PurchaseId,
    pub response: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkRefundedPayload {
    pub id: PurchaseId,
    pub reason: String,
}
