use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime},
};

use color_eyre::eyre::Result;
use cqrs_es::{AggregateError, CqrsFramework, persist::PersistedEventStore};
use derive_more::Display;
use rust_decimal::Decimal;
use sqlite_es::{SqliteEventRepository, SqliteViewRepository, sqlite_aggregate_cqrs};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    catalog::CatalogItem,
    domain::{
        account::error::AccountError,
        props::{Amount, PlayerId, PurchaseId, PurchaseState, UserId},
        purchase::{
            aggregate::{Purchase, PurchaseServices, purchase_aggregate_id},
            command::{
                MarkDeliveredPayload, MarkRefundedPayload, PurchaseCommand, RecordDebitPayload,
            },
        },
    },
    ledger::Ledger,
    query::purchase::{PurchaseQueryRepository, PurchaseView, stale_purchases},
    rcon::{
        client::{CommandTransport, RconTarget},
        dispatch::DispatchOutcome,
        error::RconError,
    },
};

const NO_OUTPUT_TEXT: &str = "Command sent (no output from server)";

// Ark answers output-less commands with this instead of staying silent.
const SERVER_NO_RESPONSE_MARKER: &str = "Server received, But no response";

const RECOVERY_REASON: &str = "interrupted before delivery was confirmed";

pub struct PurchaseRequest {
    pub user_id: UserId,
    pub player_id: PlayerId,
    pub item: CatalogItem,
    pub target: RconTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    Delivered { response: Option<String> },
    Refunded { failure: RconError },
    /// Delivery failed and the refund could not be stored; recovery will finish it.
    RefundPending { failure: RconError },
}

#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    pub purchase_id: PurchaseId,
    pub item: String,
    pub price: Decimal,
    pub outcome: PurchaseOutcome,
}

impl PurchaseReceipt {
    pub fn state(&self) -> PurchaseState {
        match self.outcome {
            PurchaseOutcome::Delivered { .. } => PurchaseState::Delivered,
            PurchaseOutcome::Refunded { .. } => PurchaseState::RefundedFailed,
            PurchaseOutcome::RefundPending { .. } => PurchaseState::Debited,
        }
    }

    /// Text shown to the buyer.
    pub fn message(&self) -> String {
        match &self.outcome {
            PurchaseOutcome::Delivered { response } => {
                let shown = match response.as_deref().map(str::trim) {
                    Some(text) if !text.is_empty() && !text.contains(SERVER_NO_RESPONSE_MARKER) => {
                        text
                    }
                    _ => NO_OUTPUT_TEXT,
                };
                format!("Purchased {}. Server response: {}", self.item, shown)
            }
            PurchaseOutcome::Refunded { failure } => format!(
                "Purchase of {} failed and was refunded. Error: {}",
                self.item, failure
            ),
            PurchaseOutcome::RefundPending { failure } => format!(
                "Purchase of {} failed, refund is pending. Error: {}",
                self.item, failure
            ),
        }
    }
}

/// Why a purchase stopped before anything was sent. Nothing is left charged.
#[derive(Debug, PartialEq, Display)]
pub enum DeliveryError {
    #[display("insufficient funds: balance {balance}, price {price}")]
    InsufficientFunds { balance: Decimal, price: Decimal },
    #[display("ledger unavailable: {_0}")]
    Ledger(String),
}

impl std::error::Error for DeliveryError {}

// Debit, attempt delivery once, refund on failure. Each step is persisted so a purchase
// interrupted between debit and outcome is picked up by `recover_stale`.
pub struct DeliveryService<T: CommandTransport> {
    ledger: Ledger,
    purchase_cqrs: CqrsFramework<Purchase, PersistedEventStore<SqliteEventRepository, Purchase>>,
    sqlite_pool: SqlitePool,
    transport: T,
    id_prefix: u64,
    id_sequence: AtomicU64,
}

impl<T: CommandTransport> DeliveryService<T> {
    pub fn new(sqlite_pool: SqlitePool, transport: T) -> Self {
        let view_repo =
            SqliteViewRepository::<PurchaseView, Purchase>::new("purchases", sqlite_pool.clone());
        let purchase_query = PurchaseQueryRepository::new(Arc::new(view_repo));
        let purchase_cqrs = sqlite_aggregate_cqrs(
            sqlite_pool.clone(),
            vec![Box::new(purchase_query)],
            PurchaseServices {},
        );

        DeliveryService {
            ledger: Ledger::new(sqlite_pool.clone()),
            purchase_cqrs,
            sqlite_pool,
            transport,
            id_prefix: now_ms(),
            id_sequence: AtomicU64::new(1),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub async fn purchase(
        &self,
        request: PurchaseRequest,
    ) -> Result<PurchaseReceipt, DeliveryError> {
        let PurchaseRequest {
            user_id,
            player_id,
            item,
            target,
        } = request;
        let purchase_id = self.next_purchase_id();
        let command = item.command.render(&player_id);
        let price = item.price;

        if let Err(e) = self.ledger.debit(&user_id, &purchase_id, price).await {
            return Err(match e {
                AggregateError::UserError(AccountError::InsufficientFunds) => {
                    match self.ledger.balance(&user_id).await {
                        Ok(balance) => DeliveryError::InsufficientFunds { balance, price },
                        Err(e) => DeliveryError::Ledger(e.to_string()),
                    }
                }
                e => DeliveryError::Ledger(e.to_string()),
            });
        }

        let recorded = self
            .purchase_cqrs
            .execute(
                &purchase_aggregate_id(&purchase_id),
                PurchaseCommand::RecordDebit(RecordDebitPayload {
                    id: purchase_id.clone(),
                    user_id: user_id.clone(),
                    item: item.name.clone(),
                    command: command.clone(),
                    price: Amount(price),
                    debited_at_ms: now_ms(),
                }),
            )
            .await;
        if let Err(e) = recorded {
            error!("Could not record purchase {}: {}", purchase_id, e);
            if let Err(refund_err) = self.ledger.refund(&user_id, &purchase_id).await {
                error!("Could not return debit {}: {}", purchase_id, refund_err);
            }
            return Err(DeliveryError::Ledger(e.to_string()));
        }

        let outcome = match self.transport.send_command(&target, &command).await {
            DispatchOutcome::Output(text) => {
                self.complete_delivery(&user_id, &purchase_id, Some(text))
                    .await
            }
            DispatchOutcome::NoOutput => self.complete_delivery(&user_id, &purchase_id, None).await,
            DispatchOutcome::Error(failure) => {
                self.refund_failed(&user_id, &purchase_id, failure).await
            }
        };

        match &outcome {
            PurchaseOutcome::Delivered { response } => info!(
                "Purchase {}: {} bought {} for player {}. CMD: {}. RESP: {:?}",
                purchase_id, user_id, item.name, player_id, command, response
            ),
            PurchaseOutcome::Refunded { failure } => warn!(
                "Purchase {} refunded: user {}. CMD: {}. {} error: {}",
                purchase_id,
                user_id,
                command,
                failure.kind(),
                failure
            ),
            PurchaseOutcome::RefundPending { failure } => error!(
                "Purchase {} failed and is awaiting refund: user {}. CMD: {}. Error: {}",
                purchase_id, user_id, command, failure
            ),
        }

        Ok(PurchaseReceipt {
            purchase_id,
            item: item.name,
            price,
            outcome,
        })
    }

    /// Closes purchases left `Debited` for longer than `grace`. Returns how many were closed.
    ///
    /// A purchase whose debit was settled is marked delivered, any other is refunded.
    pub async fn recover_stale(&self, grace: Duration) -> Result<usize> {
        let cutoff_ms = now_ms().saturating_sub(grace.as_millis() as u64);
        let mut recovered = 0;

        for view in stale_purchases(&self.sqlite_pool, cutoff_ms).await? {
            let user_id = UserId(view.user_id);
            let purchase_id = PurchaseId(view.purchase_id);

            match self.ledger.is_settled(&user_id, &purchase_id).await {
                Ok(true) => {
                    if self.mark_delivered(&purchase_id, None).await {
                        info!(
                            "Recovered purchase {} of {}: delivery was already settled",
                            purchase_id, view.item
                        );
                        recovered += 1;
                    }
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Recovery could not load account of {}: {}", purchase_id, e);
                    continue;
                }
            }

            match self.ledger.refund(&user_id, &purchase_id).await {
                // Already returned by an attempt that stopped before marking the purchase.
                Ok(()) | Err(AggregateError::UserError(AccountError::DebitNotFound)) => {}
                Err(e) => {
                    error!("Recovery could not refund {}: {}", purchase_id, e);
                    continue;
                }
            }

            if self.mark_refunded(&purchase_id, RECOVERY_REASON).await {
                warn!(
                    "Recovered purchase {} of {}: refunded {} to {}",
                    purchase_id, view.item, view.price, user_id
                );
                recovered += 1;
            }
        }

        Ok(recovered)
    }

    // Settling comes first: a settled debit is what recovery reads as "delivered" when the
    // purchase itself could not be marked.
    async fn complete_delivery(
        &self,
        user_id: &UserId,
        purchase_id: &PurchaseId,
        response: Option<String>,
    ) -> PurchaseOutcome {
        let settled = self
            .ledger
            .settle(user_id, purchase_id)
            .await
            .inspect_err(|e| error!("Could not settle debit {}: {}", purchase_id, e))
            .is_ok();

        if !self.mark_delivered(purchase_id, response.clone()).await && !settled {
            error!(
                "Delivered purchase {} is not recorded anywhere, recovery will refund it",
                purchase_id
            );
        }

        PurchaseOutcome::Delivered { response }
    }

    async fn refund_failed(
        &self,
        user_id: &UserId,
        purchase_id: &PurchaseId,
        failure: RconError,
    ) -> PurchaseOutcome {
        match self.ledger.refund(user_id, purchase_id).await {
            Ok(()) | Err(AggregateError::UserError(AccountError::DebitNotFound)) => {}
            Err(e) => {
                error!("Could not refund {}: {}", purchase_id, e);
                return PurchaseOutcome::RefundPending { failure };
            }
        }

        self.mark_refunded(purchase_id, &failure.to_string()).await;
        PurchaseOutcome::Refunded { failure }
    }

    async fn mark_delivered(&self, purchase_id: &PurchaseId, response: Option<String>) -> bool {
        self.purchase_cqrs
            .execute(
                &purchase_aggregate_id(purchase_id),
                PurchaseCommand::MarkDelivered(MarkDeliveredPayload {
                    id: purchase_id.clone(),
                    response,
                }),
            )
            .await
            .inspect_err(|e| error!("Could not mark {} delivered: {}", purchase_id, e))
            .is_ok()
    }

    async fn mark_refunded(&self, purchase_id: &PurchaseId, reason: &str) -> bool {
        self.purchase_cqrs
            .execute(
                &purchase_aggregate_id(purchase_id),
                PurchaseCommand::MarkRefunded(MarkRefundedPayload {
                    id: purchase_id.clone(),
                    reason: reason.to_owned(),
                }),
            )
            .await
            .inspect_err(|e| error!("Could not mark {} refunded: {}", purchase_id, e))
            .is_ok()
    }

    fn next_purchase_id(&self) -> PurchaseId {
        let seq = self.id_sequence.fetch_add(1, Ordering::SeqCst);
        PurchaseId(format!("{}-{}", self.id_prefix, seq))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
