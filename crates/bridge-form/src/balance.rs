use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;

use crate::error::Error;
use crate::token::{BalanceKey, Token};

/// A token balance in smallest units. `value` is `None` when the lookup had nothing to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Balance {
    pub value: Option<BigUint>,
}

impl Balance {
    pub fn new(value: BigUint) -> Self {
        Self { value: Some(value) }
    }

    /// Absent or zero.
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().is_none_or(|v| v.is_zero())
    }
}

/// Arguments of a balance lookup.
#[derive(Debug, Clone)]
pub struct BalanceQuery {
    pub user_address: String,
    pub token: Token,
    pub src_chain_id: u64,
}

impl BalanceQuery {
    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.src_chain_id, &self.user_address, &self.token.address)
    }
}

/// Arguments of a max-bridgeable-amount estimation.
#[derive(Debug, Clone)]
pub struct MaxAmountRequest {
    pub to: String,
    pub token: Token,
    pub balance: BigUint,
    pub fee: BigUint,
    pub src_chain_id: u64,
    pub dest_chain_id: Option<u64>,
    /// Nominal amount used to probe gas costs.
    pub amount: BigUint,
}

/// Trait for balance providers (RPC node, indexer, etc.).
#[async_trait]
pub trait BalanceFetcher: Send + Sync {
    async fn fetch_balance(&self, query: &BalanceQuery) -> Result<Balance, Error>;
}

/// Trait for fee-aware estimation of the maximum amount that can be bridged.
#[async_trait]
pub trait MaxAmountEstimator: Send + Sync {
    async fn max_amount_to_bridge(&self, request: &MaxAmountRequest) -> Result<BigUint, Error>;
}

/// In-memory balance source for testing and embedding.
pub struct StaticBalanceSource {
    balances: HashMap<BalanceKey, BigUint>,
    lookups: Mutex<Vec<BalanceKey>>,
}

impl StaticBalanceSource {
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&mut self, chain_id: u64, user: &str, token: &str, value: BigUint) {
        self.balances
            .insert(BalanceKey::new(chain_id, user, token), value);
    }

    /// Keys looked up so far, in order.
    pub fn lookups(&self) -> Vec<BalanceKey> {
        self.lookups
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }
}

impl Default for StaticBalanceSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceFetcher for StaticBalanceSource {
    async fn fetch_balance(&self, query: &BalanceQuery) -> Result<Balance, Error> {
        let key = query.key();
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(key.clone());
        }
        Ok(Balance {
            value: self.balances.get(&key).cloned(),
        })
    }
}

/// Estimator returning `balance - reserve` for native tokens and the full balance otherwise.
pub struct FixedMaxAmount {
    reserve: BigUint,
}

impl FixedMaxAmount {
    pub fn new(reserve: BigUint) -> Self {
        Self { reserve }
    }
}

#[async_trait]
impl MaxAmountEstimator for FixedMaxAmount {
    async fn max_amount_to_bridge(&self, request: &MaxAmountRequest) -> Result<BigUint, Error> {
        if !request.token.is_native() {
            return Ok(request.balance.clone());
        }
        let cost = &self.reserve + &request.fee;
        if request.balance <= cost {
            return Err(Error::Estimate(format!(
                "balance {} does not cover fees {}",
                request.balance, cost
            )));
        }
        Ok(&request.balance - cost)
    }
}
