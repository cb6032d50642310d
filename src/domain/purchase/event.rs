use cqrs_es::DomainEvent;
use serde::{Deserialize, Serialize};

use crate::domain::props::{Amount, PurchaseId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PurchaseEvent {
    PurchaseDebited(PurchaseDebitedPayload),
    PurchaseDelivered(PurchaseDeliveredPayload),
    PurchaseRefunded(PurchaseRefundedPayload),
}

impl DomainEvent for PurchaseEvent {
    fn event_type(&self) -> String {
        let event_type: &str = match self {
            PurchaseEvent::PurchaseDebited(_) => "PurchaseDebited",
            PurchaseEvent::PurchaseDelivered(_) => "PurchaseDelivered",
            PurchaseEvent::PurchaseRefunded(_) => "PurchaseRefunded",
        };
        event_type.to_string()
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}

// Persisted before the command goes out, so an interrupted delivery can be found and refunded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseDebitedPayload {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub item: String,
    pub command: String,
    pub price: Amount,
    pub debited_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseDeliveredPayload {
    pub id: PurchaseId,
    pub response: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseRefundedPayload {
    pub id: PurchaseId,
    pub reason: String,
}
