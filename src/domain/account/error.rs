use derive_more::Display;

#[derive(Debug, PartialEq, Display)]
pub enum AccountError {
    InsufficientFunds,
    IllegalAmount,
    DuplicateDebit,
    DebitNotFound,
}

impl std::error::Error for AccountError {}
