//! Engine configuration: the contract address book of the chain the channels
//! live on, protocol timeouts, lock tuning and free balance constants.
//!
//! ```toml
//! protocol_timeout_ms = 90000
//!
//! [network]
//! chain_id = 1337
//! challenge_registry = "0x..."
//! # ...
//!
//! [lock]
//! max_waiters = 100
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::abiencode::types::Address;

/// Addresses of the on-chain contracts the commitments point at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    pub chain_id: u64,
    pub challenge_registry: Address,
    pub conditional_transaction_delegate_target: Address,
    /// App definition of the free balance app.
    pub identity_app: Address,
    pub multi_asset_multi_party_coin_transfer_interpreter: Address,
    pub single_asset_two_party_coin_transfer_interpreter: Address,
    pub two_party_fixed_outcome_interpreter: Address,
    pub proxy_factory: Address,
    pub multisig_mastercopy: Address,
}

impl NetworkContext {
    /// Random address book, for tests and local simulations.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            chain_id: 1337,
            challenge_registry: rng.gen(),
            conditional_transaction_delegate_target: rng.gen(),
            identity_app: rng.gen(),
            multi_asset_multi_party_coin_transfer_interpreter: rng.gen(),
            single_asset_two_party_coin_transfer_interpreter: rng.gen(),
            two_party_fixed_outcome_interpreter: rng.gen(),
            proxy_factory: rng.gen(),
            multisig_mastercopy: rng.gen(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Callers allowed to wait for one key at the same time, not counting
    /// the holder.
    #[serde(default = "default_max_waiters")]
    pub max_waiters: usize,
    /// Lease duration. Runs renew their lease while in progress, a holder
    /// that stopped renewing loses the lock after this long.
    #[serde(default = "default_lock_ttl_ms")]
    pub ttl_ms: u64,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            max_waiters: default_max_waiters(),
            ttl_ms: default_lock_ttl_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl LockConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

fn default_max_waiters() -> usize {
    100
}

fn default_lock_ttl_ms() -> u64 {
    30_000
}

fn default_acquire_timeout_ms() -> u64 {
    60_000
}

/// Constants of the free balance app, which is installed with every channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeBalanceConfig {
    #[serde(default = "default_free_balance_timeout")]
    pub default_timeout: u64,
    #[serde(default)]
    pub state_timeout: u64,
}

impl Default for FreeBalanceConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_free_balance_timeout(),
            state_timeout: 0,
        }
    }
}

/// Two days, in seconds.
fn default_free_balance_timeout() -> u64 {
    172_800
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub network: NetworkContext,

    /// How long a send-and-wait step waits for the counterparty.
    #[serde(default = "default_protocol_timeout_ms")]
    pub protocol_timeout_ms: u64,

    #[serde(default)]
    pub lock: LockConfig,

    #[serde(default)]
    pub free_balance: FreeBalanceConfig,
}

fn default_protocol_timeout_ms() -> u64 {
    90_000
}

impl EngineConfig {
    pub fn new(network: NetworkContext) -> Self {
        Self {
            network,
            protocol_timeout_ms: default_protocol_timeout_ms(),
            lock: LockConfig::default(),
            free_balance: FreeBalanceConfig::default(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    pub fn protocol_timeout(&self) -> Duration {
        Duration::from_millis(self.protocol_timeout_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {message}")]
    Parse { message: String },
}
