use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::abiencode::{
    types::{Address, Hash, U256},
    Token,
};

pub const FREE_BALANCE_STATE_ENCODING: &str = "tuple(address[] tokenAddresses, tuple(address to, uint256 amount)[][] balances, bytes32[] activeApps)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinTransfer {
    pub to: Address,
    pub amount: U256,
}

impl CoinTransfer {
    pub fn new(to: Address, amount: U256) -> Self {
        Self { to, amount }
    }
}

/// token -> recipient -> amount.
///
/// Two entries for the same token always end up in the same inner map, so a
/// same-asset deposit of both parties is never overwritten.
pub type TokenIndexedCoinTransferMap = BTreeMap<Address, BTreeMap<Address, U256>>;

/// Typed view of the free balance app state.
///
/// Balances are kept per token in owner order, tokens sorted by address, so
/// both parties encode the same state byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeBalance {
    owners: [Address; 2],
    balances: BTreeMap<Address, [U256; 2]>,
    active_apps: Vec<Hash>,
}

impl FreeBalance {
    /// Zero balance of the native token (the zero address).
    pub fn new(owners: [Address; 2]) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(Address::ZERO, [U256::zero(); 2]);
        Self {
            owners,
            balances,
            active_apps: Vec::new(),
        }
    }

    pub fn owners(&self) -> &[Address; 2] {
        &self.owners
    }

    pub fn active_apps(&self) -> &[Hash] {
        &self.active_apps
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Address> {
        self.balances.keys()
    }

    fn owner_index(&self, owner: Address) -> Result<usize, ModelError> {
        self.owners
            .iter()
            .position(|o| *o == owner)
            .ok_or(ModelError::NotAnOwner(owner))
    }

    pub fn balance(&self, token: Address, owner: Address) -> U256 {
        match (self.balances.get(&token), self.owner_index(owner)) {
            (Some(balances), Ok(idx)) => balances[idx],
            _ => U256::zero(),
        }
    }

    /// Sum of both owners' balances of `token`.
    pub fn total(&self, token: Address) -> Result<U256, ModelError> {
        match self.balances.get(&token) {
            Some([a, b]) => a.checked_add(*b).ok_or(ModelError::Overflow),
            None => Ok(U256::zero()),
        }
    }

    pub fn apply_decrements(
        &self,
        decrements: &TokenIndexedCoinTransferMap,
    ) -> Result<Self, ModelError> {
        let mut next = self.clone();
        for (token, per_owner) in decrements {
            for (owner, amount) in per_owner {
                let idx = next.owner_index(*owner)?;
                let entry = next.balances.entry(*token).or_insert([U256::zero(); 2]);
                entry[idx] =
                    entry[idx]
                        .checked_sub(*amount)
                        .ok_or(ModelError::InsufficientFunds {
                            owner: *owner,
                            token: *token,
                            available: entry[idx],
                            requested: *amount,
                        })?;
            }
        }
        Ok(next)
    }

    pub fn apply_increments(
        &self,
        increments: &TokenIndexedCoinTransferMap,
    ) -> Result<Self, ModelError> {
        let mut next = self.clone();
        for (token, per_owner) in increments {
            for (owner, amount) in per_owner {
                let idx = next.owner_index(*owner)?;
                let entry = next.balances.entry(*token).or_insert([U256::zero(); 2]);
                entry[idx] = entry[idx]
                    .checked_add(*amount)
                    .ok_or(ModelError::Overflow)?;
            }
        }
        Ok(next)
    }

    /// Credit `amount` of `token` to `owner`, the bookkeeping side of an
    /// on-chain deposit.
    pub fn deposit(
        &self,
        token: Address,
        owner: Address,
        amount: U256,
    ) -> Result<Self, ModelError> {
        let mut increments = TokenIndexedCoinTransferMap::new();
        increments.entry(token).or_default().insert(owner, amount);
        self.apply_increments(&increments)
    }

    pub fn add_active_app(&self, app: Hash) -> Result<Self, ModelError> {
        if self.active_apps.contains(&app) {
            return Err(ModelError::AppAlreadyInstalled(app));
        }
        let mut next = self.clone();
        next.active_apps.push(app);
        Ok(next)
    }

    pub fn remove_active_app(&self, app: Hash) -> Result<Self, ModelError> {
        let mut next = self.clone();
        let before = next.active_apps.len();
        next.active_apps.retain(|a| *a != app);
        if next.active_apps.len() == before {
            return Err(ModelError::NoSuchApp(app));
        }
        Ok(next)
    }

    /// Encode as the free balance app state, see [FREE_BALANCE_STATE_ENCODING].
    pub fn to_state(&self) -> Token {
        let tokens = self.balances.keys().copied().map(Token::Address).collect();
        let balances = self
            .balances
            .values()
            .map(|amounts| {
                Token::Array(
                    self.owners
                        .iter()
                        .zip(amounts)
                        .map(|(to, amount)| {
                            Token::Tuple(vec![Token::Address(*to), Token::Uint(*amount)])
                        })
                        .collect(),
                )
            })
            .collect();
        let active_apps = self.active_apps.iter().map(|h| Token::from(*h)).collect();

        Token::Tuple(vec![
            Token::Array(tokens),
            Token::Array(balances),
            Token::Array(active_apps),
        ])
    }

    pub fn from_state(owners: [Address; 2], state: &Token) -> Result<Self, ModelError> {
        let tokens = state.field(0)?.as_items()?;
        let balances = state.field(1)?.as_items()?;
        if tokens.len() != balances.len() {
            return Err(crate::abiencode::Error::mismatch(
                FREE_BALANCE_STATE_ENCODING,
                "token and balance lists differ in length",
            )
            .into());
        }

        let mut fb = Self {
            owners,
            balances: BTreeMap::new(),
            active_apps: Vec::new(),
        };
        for (token, transfers) in tokens.iter().zip(balances) {
            let token = token.as_address()?;
            let mut amounts = [U256::zero(); 2];
            for transfer in transfers.as_items()? {
                let idx = fb.owner_index(transfer.field(0)?.as_address()?)?;
                amounts[idx] = amounts[idx]
                    .checked_add(transfer.field(1)?.as_uint()?)
                    .ok_or(ModelError::Overflow)?;
            }
            fb.balances.insert(token, amounts);
        }
        for app in state.field(2)?.as_items()? {
            fb.active_apps.push(Hash(app.as_bytes32()?.0));
        }
        Ok(fb)
    }
}
