pub mod gate;
pub mod handlers;
pub mod ledger;
pub mod packages;
