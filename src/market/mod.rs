pub mod adapters;
pub mod book;
pub mod ledger;
pub mod mechanism;
