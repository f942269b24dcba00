//! Apps that were proposed, but not yet installed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    interpreter::{compute_interpreter_parameters, InterpreterError, InterpreterParams, OutcomeType},
    AppInterface, Deposits, ModelError,
};
use crate::{
    abiencode::{
        check_encoding, to_hash, AbiType,
        types::{Address, Hash},
        Token,
    },
    commitment::AppIdentity,
    sig::Identifier,
};

/// Everything both parties agree on before funds are moved into an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInstanceProposal {
    pub identity_hash: Hash,
    pub multisig_address: Address,
    pub initiator_identifier: Identifier,
    pub responder_identifier: Identifier,
    pub app_interface: AppInterface,
    pub app_seq_no: u64,
    pub deposits: Deposits,
    pub default_timeout: u64,
    pub state_timeout: u64,
    pub initial_state: Token,
    pub outcome_type: OutcomeType,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    /// Let coin transfer outcomes pay out more than was deposited. Only safe
    /// if the app bounds payouts itself.
    #[serde(default)]
    pub disable_limit: bool,
}

impl AppInstanceProposal {
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

    /// `keccak256(abi.encode(initialState))`
    pub fn hash_of_initial_state(&self) -> Hash {
        to_hash(core::slice::from_ref(&self.initial_state))
    }

    /// Structural checks, independent of any channel: distinct parties, a
    /// correct identity hash and an initial state matching its encoding.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.initiator_identifier == self.responder_identifier {
            return Err(ModelError::SameParticipant(self.initiator_identifier));
        }
        let computed = self.identity().hash();
        if computed != self.identity_hash {
            return Err(ModelError::IdentityHashMismatch {
                computed,
                claimed: self.identity_hash,
            });
        }
        check_encoding(&self.app_interface.state_encoding, &self.initial_state)?;
        if let Some(action) = &self.app_interface.action_encoding {
            action.parse::<AbiType>()?;
        }
        Ok(())
    }

    pub fn interpreter_params(&self) -> Result<InterpreterParams, InterpreterError> {
        compute_interpreter_parameters(
            self.outcome_type,
            &self.deposits,
            self.participants(),
            self.disable_limit,
        )
    }
}
