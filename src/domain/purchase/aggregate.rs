use async_trait::async_trait;
use cqrs_es::Aggregate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    props::PurchaseState,
    purchase::{
        command::{
            MarkDeliveredPayload, MarkRefundedPayload, PurchaseCommand, RecordDebitPayload,
        },
        error::PurchaseError,
        event::{
            PurchaseDebitedPayload, PurchaseDeliveredPayload, PurchaseEvent,
            PurchaseRefundedPayload,
        },
    },
};

// Aggregate
#[derive(Serialize, Default, Deserialize)]
pub struct Purchase {
    pub state: PurchaseState,
}

// Interface to the outside world, not used in this case.
pub struct PurchaseServices {}

#[async_trait]
impl Aggregate for Purchase {
    type Command = PurchaseCommand;
    type Event = PurchaseEvent;
    type Error = PurchaseError;
    type Services = PurchaseServices;

    fn aggregate_type() -> String {
        "Purchase".to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        _services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseCommand::RecordDebit(p) => self.record_debit(p).await,
            PurchaseCommand::MarkDelivered(p) => self.mark_delivered(p).await,
            PurchaseCommand::MarkRefunded(p) => self.mark_refunded(p).await,
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PurchaseEvent::PurchaseDebited(_) => {
                self.state = PurchaseState::Debited;
            }
            PurchaseEvent::PurchaseDelivered(_) => {
                self.state = PurchaseState::Delivered;
            }
            PurchaseEvent::PurchaseRefunded(_) => {
                self.state = PurchaseState::RefundedFailed;
            }
        }
    }
}

impl Purchase {
    async fn record_debit(
        &self,
        p: RecordDebitPayload,
    ) -> Result<Vec<<Purchase as Aggregate>::Event>, <Purchase as Aggregate>::Error> {
        debug!("Recording debit {} of {} for {}", p.id, p.price, p.user_id);

        require_pending(self)?;

        Ok(vec![PurchaseEvent::PurchaseDebited(PurchaseDebitedPayload {
            id: p.id,
            user_id: p.user_id,
            item: p.item,
            command: p.command,
            price: p.price,
            debited_at_ms: p.debited_at_ms,
        })])
    }

    async fn mark_delivered(
        &self,
        p: MarkDeliveredPayload,
    ) -> Result<Vec<<Purchase as Aggregate>::Event>, <Purchase as Aggregate>::Error> {
        debug!("Marking {} delivered", p.id);

        require_debited(self)?;

        Ok(vec![PurchaseEvent::PurchaseDelivered(
            PurchaseDeliveredPayload {
                id: p.id,
                response: p.response,
            },
        )])
    }

    async fn mark_refunded(
        &self,
        p: MarkRefundedPayload,
    ) -> Result<Vec<<Purchase as Aggregate>::Event>, <Purchase as Aggregate>::Error> {
        debug!("Marking {} refunded: {}", p.id, p.reason);

        require_debited(self)?;

        Ok(vec![PurchaseEvent::PurchaseRefunded(PurchaseRefundedPayload {
            id: p.id,
            reason: p.reason,
        })])
    }
}

fn require_pending(purchase: &Purchase) -> Result<(), <Purchase as Aggregate>::Error> {
    if purchase.state != PurchaseState::Pending {
        return Err(PurchaseError::DuplicatePurchase);
    }

    Ok(())
}

fn require_debited(purchase: &Purchase) -> Result<(), <Purchase as Aggregate>::Error> {
    if purchase.state != PurchaseState::Debited {
        return Err(PurchaseError::NotDebited);
    }

    Ok(())
}

pub fn purchase_aggregate_id(id: &str) -> String {
    format!("Purchase-{}", id)
}

#[cfg(test)]
mod tests {
    use cqrs_es::test::TestFramework;
    use rust_decimal::dec;

    use crate::domain::{
        props::{Amount, PurchaseId, UserId},
        purchase::{
            aggregate::{Purchase, PurchaseServices},
            command::{
                MarkDeliveredPayload, MarkRefundedPayload, PurchaseCommand, RecordDebitPayload,
            },
            error::PurchaseError,
            event::{
                PurchaseDebitedPayload, PurchaseDeliveredPayload, PurchaseEvent,
                PurchaseRefundedPayload,
            },
        },
    };

    type PurchaseTestFramework = TestFramework<Purchase>;

    fn debited() -> PurchaseEvent {
        PurchaseEvent::PurchaseDebited(PurchaseDebitedPayload {
            id: PurchaseId("p-1".to_owned()),
            user_id: UserId("u-1".to_owned()),
            item: "Rex Saddle".to_owned(),
            command: "GiveItemToPlayer 765 saddle".to_owned(),
            price: Amount(dec!(40)),
            debited_at_ms: 1_700_000_000_000,
        })
    }

    fn refunded() -> PurchaseEvent {
        PurchaseEvent::PurchaseRefunded(PurchaseRefundedPayload {
            id: PurchaseId("p-1".to_owned()),
            reason: "connection refused".to_owned(),
        })
    }

    #[test]
    fn test_record_debit() {
        PurchaseTestFramework::with(PurchaseServices {})
            .given_no_previous_events()
            .when(PurchaseCommand::RecordDebit(RecordDebitPayload {
                id: PurchaseId("p-1".to_owned()),
                user_id: UserId("u-1".to_owned()),
                item: "Rex Saddle".to_owned(),
                command: "GiveItemToPlayer 765 saddle".to_owned(),
                price: Amount(dec!(40)),
                debited_at_ms: 1_700_000_000_000,
            }))
            .then_expect_events(vec![debited()]);
    }

    #[test]
    fn test_record_debit_twice() {
        PurchaseTestFramework::with(PurchaseServices {})
            .given(vec![debited()])
            .when(PurchaseCommand::RecordDebit(RecordDebitPayload {
                id: PurchaseId("p-1".to_owned()),
                user_id: UserId("u-1".to_owned()),
                item: "Rex Saddle".to_owned(),
                command: "GiveItemToPlayer 765 saddle".to_owned(),
                price: Amount(dec!(40)),
                debited_at_ms: 1_700_000_000_001,
            }))
            .then_expect_error(PurchaseError::DuplicatePurchase);
    }

    #[test]
    fn test_mark_delivered() {
        PurchaseTestFramework::with(PurchaseServices {})
            .given(vec![debited()])
            .when(PurchaseCommand::MarkDelivered(MarkDeliveredPayload {
                id: PurchaseId("p-1".to_owned()),
                response: None,
            }))
            .then_expect_events(vec![PurchaseEvent::PurchaseDelivered(
                PurchaseDeliveredPayload {
                    id: PurchaseId("p-1".to_owned()),
                    response: None,
                },
            )]);
    }

    #[test]
    fn test_mark_delivered_before_debit() {
        PurchaseTestFramework::with(PurchaseServices {})
            .given_no_previous_events()
            .when(PurchaseCommand::MarkDelivered(MarkDeliveredPayload {
                id: PurchaseId("p-1".to_owned()),
                response: Some("done".to_owned()),
            }))
            .then_expect_error(PurchaseError::NotDebited);
    }

    #[test]
    fn test_mark_refunded() {
        PurchaseTestFramework::with(PurchaseServices {})
            .given(vec![debited()])
            .when(PurchaseCommand::MarkRefunded(MarkRefundedPayload {
                id: PurchaseId("p-1".to_owned()),
                reason: "connection refused".to_owned(),
            }))
            .then_expect_events(vec![refunded()]);
    }

    #[test]
    fn test_refunded_is_terminal() {
        PurchaseTestFramework::with(PurchaseServices {})
            .given(vec![debited(), refunded()])
            .when(PurchaseCommand::MarkDelivered(MarkDeliveredPayload {
                id: PurchaseId("p-1".to_owned()),
                response: None,
            }))
            .then_expect_error(PurchaseError::NotDebited);
    }
}
