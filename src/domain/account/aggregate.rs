use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use cqrs_es::Aggregate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    account::{
        command::{AccountCommand, DebitPayload, DepositPayload, RefundPayload, SettlePayload},
        error::AccountError,
        event::{
            AccountEvent, DebitRefundedPayload, DebitSettledPayload, DebitedPayload,
            DepositedPayload,
        },
    },
    props::{Amount, PurchaseId},
};

// Aggregate
#[derive(Serialize, Default, Deserialize)]
pub struct Account {
    pub balance: Decimal,
    // Debits whose delivery outcome is not known yet.
    open_debits: HashMap<PurchaseId, Decimal>,
    #[serde(default)]
    settled_debits: HashSet<PurchaseId>,
}

// Interface to the outside world, not used in this case.
pub struct AccountServices {}

#[async_trait]
impl Aggregate for Account {
    type Command = AccountCommand;
    type Event = AccountEvent;
    type Error = AccountError;
    type Services = AccountServices;

    fn aggregate_type() -> String {
        "Account".to_string()
    }

    async fn handle(
        &self,
        command: Self::Command,
        _services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AccountCommand::Deposit(p) => self.deposit(p).await,
            AccountCommand::Debit(p) => self.debit(p).await,
            AccountCommand::Refund(p) => self.refund(p).await,
            AccountCommand::Settle(p) => self.settle(p).await,
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            AccountEvent::Deposited(p) => {
                self.balance += *p.amount;
            }
            AccountEvent::Debited(p) => {
                self.open_debits.insert(p.purchase_id, *p.amount);
                self.balance -= *p.amount;
            }
            AccountEvent::DebitRefunded(p) => {
                self.open_debits.remove(&p.purchase_id);
                self.balance += *p.amount;
            }
            AccountEvent::DebitSettled(p) => {
                self.open_debits.remove(&p.purchase_id);
                self.settled_debits.insert(p.purchase_id);
            }
        }
    }
}

impl Account {
    pub fn is_settled(&self, purchase_id: &PurchaseId) -> bool {
        self.settled_debits.contains(purchase_id)
    }

    async fn deposit(
        &self,
        p: DepositPayload,
    ) -> Result<Vec<<Account as Aggregate>::Event>, <Account as Aggregate>::Error> {
        debug!("Depositing {} to {}", p.amount, p.user_id);

        require_legal_amount(&p.amount)?;

        Ok(vec![AccountEvent::Deposited(DepositedPayload {
            user_id: p.user_id,
            amount: p.amount,
        })])
    }

    async fn debit(
        &self,
        p: DebitPayload,
    ) -> Result<Vec<<Account as Aggregate>::Event>, <Account as Aggregate>::Error> {
        debug!("Debiting {} from {} for {}", p.amount, p.user_id, p.purchase_id);

        require_legal_amount(&p.amount)?;
        require_no_open_debit(self, &p.purchase_id)?;
        require_sufficient_funds(self, &p.amount)?;

        Ok(vec![AccountEvent::Debited(DebitedPayload {
            user_id: p.user_id,
            purchase_id: p.purchase_id,
            amount: p.amount,
        })])
    }

    async fn refund(
        &self,
        p: RefundPayload,
    ) -> Result<Vec<<Account as Aggregate>::Event>, <Account as Aggregate>::Error> {
        debug!("Refunding {} to {}", p.purchase_id, p.user_id);

        let amount = require_open_debit(self, &p.purchase_id)?;

        Ok(vec![AccountEvent::DebitRefunded(DebitRefundedPayload {
            user_id: p.user_id,
            purchase_id: p.purchase_id,
            amount: Amount(amount),
        })])
    }

    async fn settle(
        &self,
        p: SettlePayload,
    ) -> Result<Vec<<Account as Aggregate>::Event>, <Account as Aggregate>::Error> {
        debug!("Settling {} for {}", p.purchase_id, p.user_id);

        let amount = require_open_debit(self, &p.purchase_id)?;

        Ok(vec![AccountEvent::DebitSettled(DebitSettledPayload {
            user_id: p.user_id,
            purchase_id: p.purchase_id,
            amount: Amount(amount),
        })])
    }
}

fn require_legal_amount(amount: &Amount) -> Result<(), <Account as Aggregate>::Error> {
    if amount.0 <= Decimal::ZERO {
        return Err(AccountError::IllegalAmount);
    }

    if amount.scale() > 4 {
        return Err(AccountError::IllegalAmount);
    }

    Ok(())
}

fn require_sufficient_funds(
    account: &Account,
    amount: &Amount,
) -> Result<(), <Account as Aggregate>::Error> {
    if account.balance < amount.0 {
        return Err(AccountError::InsufficientFunds);
    }

    Ok(())
}

fn require_open_debit(
    account: &Account,
    purchase_id: &PurchaseId,
) -> Result<Decimal, <Account as Aggregate>::Error> {
    account
        .open_debits
        .get(purchase_id)
        .map(|x| x.to_owned())
        .ok_or(AccountError::DebitNotFound)
}

fn require_no_open_debit(
    account: &Account,
    purchase_id: &PurchaseId,
) -> Result<(), <Account as Aggregate>::Error> {
    if account.open_debits.contains_key(purchase_id) || account.is_settled(purchase_id) {
        return Err(AccountError::DuplicateDebit);
    }

    Ok(())
}

pub fn acc_aggregate_id(id: &str) -> String {
    format!("Account-{}", id)
}
