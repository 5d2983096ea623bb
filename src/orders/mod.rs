//! Order book, gas-credit ledger and pending-execution set
//!
//! Created: 2026-10-18

pub mod book;
pub mod ledger;
pub mod pending;

pub use book::OrderBook;
pub use ledger::GasCreditLedger;
pub use pending::{PendingExecution, PendingGuard};
