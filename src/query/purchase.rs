use color_eyre::eyre::{Result, eyre};
use cqrs_es::{EventEnvelope, View, persist::GenericQuery};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlite_es::SqliteViewRepository;
use sqlx::{Row, SqlitePool};

use crate::domain::{
    props::PurchaseState,
    purchase::{aggregate::Purchase, event::PurchaseEvent},
};

pub(crate) type PurchaseQueryRepository =
    GenericQuery<SqliteViewRepository<PurchaseView, Purchase>, PurchaseView, Purchase>;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub(crate) struct PurchaseView {
    pub purchase_id: String,
    pub user_id: String,
    pub item: String,
    pub price: Decimal,
    pub state: PurchaseState,
    pub debited_at_ms: u64,
    pub detail: Option<String>,
}

impl View<Purchase> for PurchaseView {
    fn update(&mut self, event: &EventEnvelope<Purchase>) {
        match &event.payload {
            PurchaseEvent::PurchaseDebited(p) => {
                self.purchase_id = p.id.to_string();
                self.user_id = p.user_id.to_string();
                self.item = p.item.clone();
                self.price = *p.price;
                self.state = PurchaseState::Debited;
                self.debited_at_ms = p.debited_at_ms;
            }
            PurchaseEvent::PurchaseDelivered(p) => {
                self.state = PurchaseState::Delivered;
                self.detail = p.response.clone();
            }
            PurchaseEvent::PurchaseRefunded(p) => {
                self.state = PurchaseState::RefundedFailed;
                self.detail = Some(p.reason.clone());
            }
        }
    }
}

pub async fn init_purchases_table(sqlite_pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS purchases
            (
                view_id text                        NOT NULL,
                version bigint CHECK (version >= 0) NOT NULL,
                payload json                        NOT NULL,
                PRIMARY KEY (view_id)
            );",
    )
    .execute(sqlite_pool)
    .await
    .map_err(|e| eyre!("Failed to initialize purchases table: {}", e))?;

    Ok(())
}

/// Purchases still `Debited` that were debited at or before `cutoff_ms`.
pub(crate) async fn stale_purchases(
    sqlite_pool: &SqlitePool,
    cutoff_ms: u64,
) -> Result<Vec<PurchaseView>> {
    let mut stale = vec![];

    let mut query = sqlx::query("select payload from purchases").fetch(sqlite_pool);
    while let Some(row) = query.try_next().await.map_err(|e| eyre!(e))? {
        let s: String = row.get("payload");
        match serde_json::from_str::<PurchaseView>(&s) {
            Ok(view) if view.state == PurchaseState::Debited && view.debited_at_ms <= cutoff_ms => {
                stale.push(view)
            }
            _ => {}
        }
    }

    Ok(stale)
}
