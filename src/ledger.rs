use cqrs_es::{AggregateError, CqrsFramework, EventStore, persist::PersistedEventStore};
use rust_decimal::Decimal;
use sqlite_es::{SqliteEventRepository, sqlite_aggregate_cqrs};
use sqlx::SqlitePool;
use tracing::debug;

use crate::domain::{
    account::{
        aggregate::{Account, AccountServices, acc_aggregate_id},
        command::{AccountCommand, DebitPayload, DepositPayload, RefundPayload, SettlePayload},
        error::AccountError,
    },
    props::{Amount, PurchaseId, UserId},
};

pub type LedgerError = AggregateError<AccountError>;

// Attempts per command when another writer got to the same account first.
const CONFLICT_ATTEMPTS: usize = 5;

/// User balances, event-sourced per account.
///
/// A debit stays open until it is either refunded or settled, and each of those can happen once.
pub struct Ledger {
    account_cqrs: CqrsFramework<Account, PersistedEventStore<SqliteEventRepository, Account>>,
    accounts_store: PersistedEventStore<SqliteEventRepository, Account>,
}

impl Ledger {
    pub fn new(sqlite_pool: SqlitePool) -> Self {
        let account_cqrs = sqlite_aggregate_cqrs(sqlite_pool.clone(), vec![], AccountServices {});
        let accounts_store =
            PersistedEventStore::new_aggregate_store(SqliteEventRepository::new(sqlite_pool));

        Ledger {
            account_cqrs,
            accounts_store,
        }
    }

    pub async fn balance(&self, user_id: &UserId) -> Result<Decimal, LedgerError> {
        Ok(self.load(user_id).await?.balance)
    }

    /// Whether the debit for `purchase_id` was settled, i.e. its delivery was confirmed.
    pub async fn is_settled(
        &self,
        user_id: &UserId,
        purchase_id: &PurchaseId,
    ) -> Result<bool, LedgerError> {
        Ok(self.load(user_id).await?.is_settled(purchase_id))
    }

    pub async fn deposit(&self, user_id: &UserId, amount: Decimal) -> Result<(), LedgerError> {
        self.execute(
            user_id,
            AccountCommand::Deposit(DepositPayload {
                user_id: user_id.clone(),
                amount: Amount(amount),
            }),
        )
        .await
    }

    pub async fn debit(
        &self,
        user_id: &UserId,
        purchase_id: &PurchaseId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        self.execute(
            user_id,
            AccountCommand::Debit(DebitPayload {
                user_id: user_id.clone(),
                purchase_id: purchase_id.clone(),
                amount: Amount(amount),
            }),
        )
        .await
    }

    pub async fn refund(
        &self,
        user_id: &UserId,
        purchase_id: &PurchaseId,
    ) -> Result<(), LedgerError> {
        self.execute(
            user_id,
            AccountCommand::Refund(RefundPayload {
                user_id: user_id.clone(),
                purchase_id: purchase_id.clone(),
            }),
        )
        .await
    }

    pub async fn settle(
        &self,
        user_id: &UserId,
        purchase_id: &PurchaseId,
    ) -> Result<(), LedgerError> {
        self.execute(
            user_id,
            AccountCommand::Settle(SettlePayload {
                user_id: user_id.clone(),
                purchase_id: purchase_id.clone(),
            }),
        )
        .await
    }

    async fn load(&self, user_id: &UserId) -> Result<Account, LedgerError> {
        Ok(self
            .accounts_store
            .load_aggregate(&acc_aggregate_id(user_id))
            .await?
            .aggregate)
    }

    // Every attempt reloads the account, so a retried command is validated against the
    // events that won the race.
    async fn execute(&self, user_id: &UserId, command: AccountCommand) -> Result<(), LedgerError> {
        let aggregate_id = acc_aggregate_id(user_id);
        let mut attempt = 1;
        loop {
            match self.account_cqrs.execute(&aggregate_id, command.clone()).await {
                Err(AggregateError::AggregateConflict) if attempt < CONFLICT_ATTEMPTS => {
                    debug!("Account {} changed concurrently, attempt {}", user_id, attempt);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
