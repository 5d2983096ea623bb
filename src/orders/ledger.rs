//! Gas-credit ledger
//!
//! `owner -> balance` as last reported by the router. Each event carries
//! the absolute balance, so updates overwrite (last write wins) and
//! replaying history is idempotent.
//!
//! Created: 2026-10-18

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct GasCreditLedger {
    balances: Arc<DashMap<Address, U256>>,
}

impl GasCreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, owner: Address, balance: U256) {
        debug!("Gas credit {:?} = {}", owner, balance);
        self.balances.insert(owner, balance);
    }

    pub fn balance(&self, owner: &Address) -> U256 {
        self.balances.get(owner).map(|b| *b).unwrap_or(U256::ZERO)
    }

    pub fn has_credit(&self, owner: &Address) -> bool {
        !self.balance(owner).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let ledger = GasCreditLedger::new();
        let owner = Address::repeat_byte(0xDE);
        ledger.set(owner, U256::from(100u64));
        ledger.set(owner, U256::from(150u64));
        assert_eq!(ledger.balance(&owner), U256::from(150u64));

        ledger.set(owner, U256::ZERO);
        assert!(!ledger.has_credit(&owner));
        assert!(!ledger.has_credit(&Address::ZERO));
    }
}
