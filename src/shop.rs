use color_eyre::eyre::{OptionExt, Result, eyre};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    catalog::Catalog,
    csv::{CsvOrderRecord, CsvReportRecord, OrderType},
    delivery::{DeliveryService, PurchaseRequest},
    domain::props::{PlayerId, PurchaseState, UserId},
    rcon::client::{CommandTransport, RconTarget},
};

/// Applies order rows against one game server.
pub struct Shop<T: CommandTransport> {
    service: DeliveryService<T>,
    catalog: Catalog,
    target: RconTarget,
}

impl<T: CommandTransport> Shop<T> {
    pub fn new(service: DeliveryService<T>, catalog: Catalog, target: RconTarget) -> Self {
        Shop {
            service,
            catalog,
            target,
        }
    }

    /// Deposits produce no report line; every purchase row does, even when rejected.
    pub async fn handle(&self, r: CsvOrderRecord) -> Result<Option<CsvReportRecord>> {
        match r.order_type {
            OrderType::Deposit => {
                self.handle_deposit(r).await?;
                Ok(None)
            }
            OrderType::Purchase => self.handle_purchase(r).await.map(Some),
        }
    }

    async fn handle_deposit(&self, r: CsvOrderRecord) -> Result<()> {
        let amount = r
            .amount
            .ok_or_eyre(format!("Amount is required for deposit of {}", r.user_id))?;

        self.service
            .ledger()
            .deposit(&UserId(r.user_id), amount)
            .await
            .map_err(|e| eyre!(e))
    }

    async fn handle_purchase(&self, r: CsvOrderRecord) -> Result<CsvReportRecord> {
        let user_id = UserId(r.user_id);
        let item_name = r.item.unwrap_or_default();

        let Some(item) = self.catalog.find(&item_name) else {
            return self
                .rejected(user_id, item_name.clone(), None, format!("Unknown item '{}'", item_name))
                .await;
        };
        let Some(player_id) = r.player_id.as_deref().and_then(PlayerId::parse) else {
            return self
                .rejected(
                    user_id,
                    item.name.clone(),
                    Some(item.price),
                    "Player is not registered".to_owned(),
                )
                .await;
        };

        let request = PurchaseRequest {
            user_id: user_id.clone(),
            player_id,
            item: item.clone(),
            target: self.target.clone(),
        };
        match self.service.purchase(request).await {
            Ok(receipt) => Ok(CsvReportRecord {
                purchase_id: Some(receipt.purchase_id.to_string()),
                user_id: user_id.to_string(),
                item: receipt.item.clone(),
                price: Some(receipt.price),
                state: receipt.state(),
                balance: self.balance(&user_id).await?,
                detail: receipt.message(),
            }),
            Err(e) => {
                self.rejected(user_id, item.name.clone(), Some(item.price), e.to_string())
                    .await
            }
        }
    }

    async fn rejected(
        &self,
        user_id: UserId,
        item: String,
        price: Option<Decimal>,
        reason: String,
    ) -> Result<CsvReportRecord> {
        debug!("Purchase of '{}' by {} rejected: {}", item, user_id, reason);

        Ok(CsvReportRecord {
            purchase_id: None,
            balance: self.balance(&user_id).await?,
            user_id: user_id.to_string(),
            item,
            price,
            state: PurchaseState::Pending,
            detail: reason,
        })
    }

    async fn balance(&self, user_id: &UserId) -> Result<Decimal> {
        self.service
            .ledger()
            .balance(user_id)
            .await
            .map_err(|e| eyre!(e))
    }
}
