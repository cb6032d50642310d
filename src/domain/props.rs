use derive_more::Display;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shrinkwraprs::Shrinkwrap;

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
pub struct UserId(pub String);

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
pub struct PurchaseId(pub String);

#[derive(Shrinkwrap, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Display, Hash)]
pub struct Amount(pub Decimal);

/// In-game player identity (a Steam id) substituted into delivery commands.
///
/// Only built through [`PlayerId::parse`].
#[derive(Shrinkwrap, Clone, Debug, PartialEq, Eq, Display, Hash)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(PlayerId(raw.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Display, PartialEq, Eq)]
pub enum PurchaseState {
    #[default]
    Pending,
    Debited,
    Delivered,
    RefundedFailed,
}
