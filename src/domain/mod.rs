pub mod account;
pub mod props;
pub mod purchase;
