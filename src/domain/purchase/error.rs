use derive_more::Display;

#[derive(Debug, PartialEq, Display)]
pub enum PurchaseError {
    DuplicatePurchase,
    NotDebited,
}

impl std::error::Error for PurchaseError {}
