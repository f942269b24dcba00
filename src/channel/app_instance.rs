use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    interpreter::{
        InterpreterError, InterpreterParams, MultiAssetMultiPartyCoinTransferInterpreterParams,
    },
    AppInstanceProposal, FreeBalance, ModelError, TokenIndexedCoinTransferMap,
    FREE_BALANCE_APP_SEQ_NO, FREE_BALANCE_STATE_ENCODING,
};
use crate::{
    abiencode::{
        check_encoding, to_hash,
        types::{Address, Hash, U256},
        Token,
    },
    commitment::AppIdentity,
    config::FreeBalanceConfig,
    sig::Identifier,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInterface {
    /// The app definition contract.
    pub addr: Address,
    pub state_encoding: String,
    #[serde(default)]
    pub action_encoding: Option<String>,
}

/// What each party moves from its free balance into an app at install.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposits {
    pub initiator_deposit: U256,
    pub initiator_deposit_asset_id: Address,
    pub responder_deposit: U256,
    pub responder_deposit_asset_id: Address,
}

impl Deposits {
    /// Combined deposit, only meaningful if both deposit the same asset.
    pub fn total(&self) -> Result<U256, InterpreterError> {
        self.initiator_deposit
            .checked_add(self.responder_deposit)
            .ok_or(InterpreterError::Overflow)
    }

    /// Free balance decrements, `players` being the free balance addresses of
    /// initiator and responder.
    pub fn decrements(&self, players: [Address; 2]) -> TokenIndexedCoinTransferMap {
        let mut decrements = TokenIndexedCoinTransferMap::new();
        let [initiator, responder] = players;
        for (token, owner, amount) in [
            (self.initiator_deposit_asset_id, initiator, self.initiator_deposit),
            (self.responder_deposit_asset_id, responder, self.responder_deposit),
        ] {
            if amount.is_zero() {
                continue;
            }
            decrements.entry(token).or_default().insert(owner, amount);
        }
        decrements
    }

    /// Deposited value per token.
    pub fn per_token(&self) -> Result<BTreeMap<Address, U256>, ModelError> {
        let mut totals: BTreeMap<Address, U256> = BTreeMap::new();
        for (token, amount) in [
            (self.initiator_deposit_asset_id, self.initiator_deposit),
            (self.responder_deposit_asset_id, self.responder_deposit),
        ] {
            let total = totals.entry(token).or_default();
            *total = total.checked_add(amount).ok_or(ModelError::Overflow)?;
        }
        Ok(totals)
    }
}

/// An app installed in a channel, including the free balance app.
///
/// Updates never mutate in place, [AppInstance::set_state] and friends return
/// the next instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstance {
    multisig_address: Address,
    initiator_identifier: Identifier,
    responder_identifier: Identifier,
    app_interface: AppInterface,
    app_seq_no: u64,
    default_timeout: u64,
    state_timeout: u64,
    latest_state: Token,
    latest_version_number: u64,
    #[serde(default)]
    latest_action: Option<Token>,
    interpreter_params: InterpreterParams,
    #[serde(default)]
    deposits: Deposits,
    #[serde(default)]
    meta: BTreeMap<String, String>,
}

impl AppInstance {
    /// Install a proposal, its initial state becomes version 1.
    pub fn from_proposal(
        proposal: &AppInstanceProposal,
        interpreter_params: InterpreterParams,
    ) -> Self {
        Self {
            multisig_address: proposal.multisig_address,
            initiator_identifier: proposal.initiator_identifier,
            responder_identifier: proposal.responder_identifier,
            app_interface: proposal.app_interface.clone(),
            app_seq_no: proposal.app_seq_no,
            default_timeout: proposal.default_timeout,
            state_timeout: proposal.state_timeout,
            latest_state: proposal.initial_state.clone(),
            latest_version_number: 1,
            latest_action: None,
            interpreter_params,
            deposits: proposal.deposits.clone(),
            meta: proposal.meta.clone(),
        }
    }

    /// The free balance app of a freshly set up channel: all balances zero.
    pub fn free_balance(
        multisig_address: Address,
        identifiers: [Identifier; 2],
        identity_app: Address,
        config: &FreeBalanceConfig,
    ) -> Self {
        let [initiator, responder] = identifiers;
        let state = FreeBalance::new([initiator.signer_address(), responder.signer_address()]);
        Self {
            multisig_address,
            initiator_identifier: initiator,
            responder_identifier: responder,
            app_interface: AppInterface {
                addr: identity_app,
                state_encoding: FREE_BALANCE_STATE_ENCODING.to_string(),
                action_encoding: None,
            },
            app_seq_no: FREE_BALANCE_APP_SEQ_NO,
            default_timeout: config.default_timeout,
            state_timeout: config.state_timeout,
            latest_state: state.to_state(),
            latest_version_number: 1,
            latest_action: None,
            interpreter_params: InterpreterParams::MultiAssetMultiPartyCoinTransfer(
                MultiAssetMultiPartyCoinTransferInterpreterParams {
                    limit: Vec::new(),
                    token_addresses: Vec::new(),
                },
            ),
            deposits: Deposits::default(),
            meta: BTreeMap::new(),
        }
    }

    pub fn multisig_address(&self) -> Address {
        self.multisig_address
    }

    pub fn initiator_identifier(&self) -> Identifier {
        self.initiator_identifier
    }

    pub fn responder_identifier(&self) -> Identifier {
        self.responder_identifier
    }

    pub fn app_interface(&self) -> &AppInterface {
        &self.app_interface
    }

    pub fn app_seq_no(&self) -> u64 {
        self.app_seq_no
    }

    pub fn default_timeout(&self) -> u64 {
        self.default_timeout
    }

    pub fn state_timeout(&self) -> u64 {
        self.state_timeout
    }

    pub fn latest_state(&self) -> &Token {
        &self.latest_state
    }

    pub fn latest_version_number(&self) -> u64 {
        self.latest_version_number
    }

    pub fn latest_action(&self) -> Option<&Token> {
        self.latest_action.as_ref()
    }

    pub fn interpreter_params(&self) -> &InterpreterParams {
        &self.interpreter_params
    }

    pub fn deposits(&self) -> &Deposits {
        &self.deposits
    }

    pub fn meta(&self) -> &BTreeMap<String, String> {
        &self.meta
    }

    /// Signer addresses of initiator and responder.
    pub fn participants(&self) -> [Address; 2] {
        [
            self.initiator_identifier.signer_address(),
            self.responder_identifier.signer_address(),
        ]
    }

    pub fn identity(&self) -> AppIdentity {
        AppIdentity {
            multisig_address: self.multisig_address,
            channel_nonce: self.app_seq_no,
            participants: self.participants(),
            app_definition: self.app_interface.addr,
            default_timeout: self.default_timeout,
        }
    }

    pub fn identity_hash(&self) -> Hash {
        self.identity().hash()
    }

    /// `keccak256(abi.encode(latestState))`
    pub fn hash_of_latest_state(&self) -> Hash {
        to_hash(core::slice::from_ref(&self.latest_state))
    }

    /// Replace the state, `version_number` must follow the current one.
    pub fn set_state(
        &self,
        state: Token,
        version_number: u64,
        state_timeout: u64,
    ) -> Result<Self, ModelError> {
        let expected = self
            .latest_version_number
            .checked_add(1)
            .ok_or(ModelError::Overflow)?;
        if version_number != expected {
            return Err(ModelError::InvalidVersionNumber {
                current: self.latest_version_number,
                proposed: version_number,
            });
        }
        check_encoding(&self.app_interface.state_encoding, &state)?;

        let mut next = self.clone();
        next.latest_state = state;
        next.latest_version_number = version_number;
        next.state_timeout = state_timeout;
        Ok(next)
    }

    /// Like [AppInstance::set_state], additionally recording the action that
    /// led to `state`.
    pub fn apply_action(
        &self,
        action: Token,
        state: Token,
        version_number: u64,
        state_timeout: u64,
    ) -> Result<Self, ModelError> {
        let encoding = self
            .app_interface
            .action_encoding
            .as_deref()
            .ok_or(ModelError::NoActionEncoding)?;
        check_encoding(encoding, &action)?;

        let mut next = self.set_state(state, version_number, state_timeout)?;
        next.latest_action = Some(action);
        Ok(next)
    }

    /// Decode the state as free balance, owned by the participants.
    pub fn as_free_balance(&self) -> Result<FreeBalance, ModelError> {
        FreeBalance::from_state(self.participants(), &self.latest_state)
    }
}
