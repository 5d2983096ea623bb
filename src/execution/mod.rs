//! Transaction submission: dispatcher and nonce-managed signer
//!
//! Created: 2026-10-18

pub mod dispatcher;
pub mod signer;

pub use dispatcher::{DispatchSettings, ExecutionDispatcher, Submitted};
pub use signer::{NonceManagedSigner, TransactionSender};
