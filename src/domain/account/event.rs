use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::domain::props::{Amount, PurchaseId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AccountEvent {
    Deposited(DepositedPayload),
    Debited(DebitedPayload),
    DebitRefunded(DebitRefundedPayload),
    DebitSettled(DebitSettledPayload),
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> String {
        let event_type: &str = match self {
            AccountEvent::Deposited(_) => "Deposited",
            AccountEvent::Debited(_) => "Debited",
            AccountEvent::DebitRefunded(_) => "DebitRefunded",
            AccountEvent::DebitSettled(_) => "DebitSettled",
        };
        event_type.to_string()
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DepositedPayload {
    pub user_id: UserId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebitedPayload {
    pub user_id: UserId,
    pub purchase_id: PurchaseId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebitRefundedPayload {
    pub user_id: UserId,
    pub purchase_id: PurchaseId,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebitSettledPayload {
    pub user_id: UserId,
    pub purchase_id: PurchaseId,
    pub amount: Amount,
}
