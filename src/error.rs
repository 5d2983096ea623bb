//! Error taxonomy
//!
//! One error type per failure class. Transient RPC failures, malformed
//! events and simulation faults are recoverable and handled per block;
//! startup errors are fatal.
//!
//! Created: 2026-10-18

use alloy::primitives::{Address, B256};
use thiserror::Error;

/// Transport or contract-call failure. Never leaves partial state behind.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport error during {context}: {message}")]
    Transport { context: &'static str, message: String },

    #[error("contract call {call} on {address} failed: {message}")]
    Call {
        call: &'static str,
        address: Address,
        message: String,
    },

    #[error("order {0} not found on router")]
    OrderNotFound(B256),
}

impl RpcError {
    pub fn transport(context: &'static str, err: impl std::fmt::Display) -> Self {
        RpcError::Transport {
            context,
            message: err.to_string(),
        }
    }

    pub fn call(call: &'static str, address: Address, err: impl std::fmt::Display) -> Self {
        RpcError::Call {
            call,
            address,
            message: err.to_string(),
        }
    }
}

/// Malformed or unexpected event payload. The offending log is dropped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has no topics")]
    MissingTopic,

    #[error("unknown event topic {0}")]
    UnknownTopic(B256),

    #[error("event data too short: need {needed} bytes, got {actual}")]
    ShortData { needed: usize, actual: usize },

    #[error("event expects {expected} topics, got {actual}")]
    TopicCount { expected: usize, actual: usize },

    #[error("order id array length {0} does not fit in payload")]
    BadArrayLength(u64),

    #[error("field {0} out of range")]
    OutOfRange(&'static str),
}

/// Arithmetic the simulator cannot perform. A swap that merely misses its
/// minimum output is not an error.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("pool has zero reserves")]
    ZeroReserves,

    #[error("swap input must be positive")]
    ZeroInput,

    #[error("numeric overflow in {0}")]
    Overflow(&'static str),

    #[error("transfer tax rate {0} exceeds 100000")]
    InvalidTaxRate(u32),

    #[error("no pool available for token {0}")]
    NoPool(Address),

    #[error("quote failed: {0}")]
    Quote(#[from] RpcError),
}

/// Failure while encoding, signing, submitting or confirming a transaction.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("submission failed: {0}")]
    Submission(String),

    #[error("transaction {0} not confirmed before timeout")]
    Timeout(B256),

    #[error("submission failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<ExecutionError> },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Fatal initialisation failure.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("node unreachable: {0}")]
    NodeUnreachable(#[source] RpcError),

    #[error("no USD/WETH reference pool found for {usd_token} on any venue")]
    ReferencePoolMissing { usd_token: Address },

    #[error("backfill failed: {0}")]
    Backfill(#[source] RpcError),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}
