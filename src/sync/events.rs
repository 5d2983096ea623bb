//! Chain events consumed by the synchronizer
//!
//! Every log the synchronizer fetches is classified into exactly one
//! [`ChainEvent`] variant or rejected with a [`DecodeError`]. Handling
//! code matches exhaustively on the enum, so a new topic cannot be added
//! without a handler.
//!
//! Event payload layouts:
//! - order lifecycle: ABI `bytes32[]`, length word at data[0x20..0x40],
//!   then one 32-byte id per entry
//! - gas credit: owner in topics[1], absolute balance in topics[2]
//! - V2 Sync: reserve0, reserve1 in data words 0 and 1
//! - V3 Swap: sqrtPriceX96 in data word 2, liquidity in data word 3
//!
//! Created: 2026-10-18

use crate::contracts::{ILimitOrderRouter, IUniswapV2Pair, UniswapV3Pool};
use crate::error::DecodeError;
use crate::types::{LogPosition, OrderId};
use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;

const WORD: usize = 32;

/// Topics emitted by the limit-order router
pub fn router_topics() -> Vec<B256> {
    vec![
        ILimitOrderRouter::OrderPlaced::SIGNATURE_HASH,
        ILimitOrderRouter::OrderCancelled::SIGNATURE_HASH,
        ILimitOrderRouter::OrderUpdated::SIGNATURE_HASH,
        ILimitOrderRouter::OrderRefreshed::SIGNATURE_HASH,
        ILimitOrderRouter::GasCreditEvent::SIGNATURE_HASH,
    ]
}

/// Reserve-update topics emitted by liquidity venues
pub fn venue_topics() -> Vec<B256> {
    vec![
        IUniswapV2Pair::Sync::SIGNATURE_HASH,
        UniswapV3Pool::Swap::SIGNATURE_HASH,
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    OrderPlaced(Vec<OrderId>),
    OrderCancelled(Vec<OrderId>),
    OrderUpdated(Vec<OrderId>),
    OrderRefreshed(Vec<OrderId>),
    GasCredit {
        owner: Address,
        balance: U256,
    },
    ReserveSyncV2 {
        pool: Address,
        reserve0: U256,
        reserve1: U256,
    },
    ReserveSyncV3 {
        pool: Address,
        sqrt_price_x96: U256,
        liquidity: u128,
    },
}

/// (block, log index) of a log, when the node reported both.
pub fn log_position(log: &Log) -> Option<LogPosition> {
    Some((log.block_number?, log.log_index?))
}

/// Read the order-id array from a lifecycle event payload.
pub fn parse_order_ids(data: &[u8]) -> Result<Vec<OrderId>, DecodeError> {
    if data.len() < 2 * WORD {
        return Err(DecodeError::ShortData {
            needed: 2 * WORD,
            actual: data.len(),
        });
    }
    let length_word = U256::from_be_slice(&data[WORD..2 * WORD]);
    let length: usize = length_word
        .try_into()
        .map_err(|_| DecodeError::BadArrayLength(u64::MAX))?;
    let needed = length
        .checked_mul(WORD)
        .and_then(|n| n.checked_add(2 * WORD))
        .ok_or(DecodeError::BadArrayLength(length as u64))?;
    if data.len() < needed {
        return Err(DecodeError::BadArrayLength(length as u64));
    }
    Ok(data[2 * WORD..needed]
        .chunks_exact(WORD)
        .map(B256::from_slice)
        .collect())
}

fn data_word(data: &[u8], index: usize) -> Result<U256, DecodeError> {
    let end = (index + 1) * WORD;
    if data.len() < end {
        return Err(DecodeError::ShortData {
            needed: end,
            actual: data.len(),
        });
    }
    Ok(U256::from_be_slice(&data[index * WORD..end]))
}

/// Classify a fetched log.
pub fn classify(log: &Log) -> Result<ChainEvent, DecodeError> {
    let topics = log.topics();
    let signature = *topics.first().ok_or(DecodeError::MissingTopic)?;
    let data: &[u8] = &log.inner.data.data;

    let event = if signature == ILimitOrderRouter::OrderPlaced::SIGNATURE_HASH {
        ChainEvent::OrderPlaced(parse_order_ids(data)?)
    } else if signature == ILimitOrderRouter::OrderCancelled::SIGNATURE_HASH {
        ChainEvent::OrderCancelled(parse_order_ids(data)?)
    } else if signature == ILimitOrderRouter::OrderUpdated::SIGNATURE_HASH {
        ChainEvent::OrderUpdated(parse_order_ids(data)?)
    } else if signature == ILimitOrderRouter::OrderRefreshed::SIGNATURE_HASH {
        ChainEvent::OrderRefreshed(parse_order_ids(data)?)
    } else if signature == ILimitOrderRouter::GasCreditEvent::SIGNATURE_HASH {
        if topics.len() < 3 {
            return Err(DecodeError::TopicCount {
                expected: 3,
                actual: topics.len(),
            });
        }
        ChainEvent::GasCredit {
            owner: Address::from_word(topics[1]),
            balance: U256::from_be_slice(topics[2].as_slice()),
        }
    } else if signature == IUniswapV2Pair::Sync::SIGNATURE_HASH {
        ChainEvent::ReserveSyncV2 {
            pool: log.address(),
            reserve0: data_word(data, 0)?,
            reserve1: data_word(data, 1)?,
        }
    } else if signature == UniswapV3Pool::Swap::SIGNATURE_HASH {
        let liquidity = data_word(data, 3)?;
        ChainEvent::ReserveSyncV3 {
            pool: log.address(),
            sqrt_price_x96: data_word(data, 2)?,
            liquidity: liquidity
                .try_into()
                .map_err(|_| DecodeError::OutOfRange("liquidity"))?,
        }
    } else {
        return Err(DecodeError::UnknownTopic(signature));
    };
    Ok(event)
}
