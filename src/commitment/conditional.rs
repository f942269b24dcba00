use serde::{Deserialize, Serialize};

use super::{
    Commitment, CommitmentSignatures, MinimalTransaction, MultisigOperation, MultisigTransaction,
};
use crate::{
    abiencode::{
        as_hex, encode_call,
        types::{Address, Hash, Signature, U256},
        Token,
    },
    config::NetworkContext,
};

/// Funds an installed app: once the app is finalized on-chain, the multisig
/// pays out whatever the interpreter makes of the app's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalTransactionCommitment {
    pub multisig_address: Address,
    pub owners: [Address; 2],
    pub challenge_registry: Address,
    pub delegate_target: Address,
    pub app_identity_hash: Hash,
    pub free_balance_identity_hash: Hash,
    pub interpreter_addr: Address,
    #[serde(with = "as_hex")]
    pub interpreter_params: Vec<u8>,
    #[serde(default)]
    pub signatures: CommitmentSignatures,
}

impl ConditionalTransactionCommitment {
    pub fn new(
        network: &NetworkContext,
        multisig_address: Address,
        owners: [Address; 2],
        app_identity_hash: Hash,
        free_balance_identity_hash: Hash,
        interpreter_addr: Address,
        interpreter_params: Vec<u8>,
    ) -> Self {
        Self {
            multisig_address,
            owners,
            challenge_registry: network.challenge_registry,
            delegate_target: network.conditional_transaction_delegate_target,
            app_identity_hash,
            free_balance_identity_hash,
            interpreter_addr,
            interpreter_params,
            signatures: CommitmentSignatures::default(),
        }
    }

    fn multisig_transaction(&self) -> MultisigTransaction {
        MultisigTransaction {
            to: self.delegate_target,
            value: U256::zero(),
            data: encode_call(
                "executeEffectOfInterpretedAppOutcome(address,bytes32,bytes32,address,bytes)",
                &[
                    Token::Address(self.challenge_registry),
                    self.free_balance_identity_hash.into(),
                    self.app_identity_hash.into(),
                    Token::Address(self.interpreter_addr),
                    Token::Bytes(self.interpreter_params.clone()),
                ],
            ),
            operation: MultisigOperation::DelegateCall,
        }
    }
}

impl Commitment for ConditionalTransactionCommitment {
    fn hash_to_sign(&self) -> Hash {
        self.multisig_transaction()
            .hash_to_sign(self.multisig_address)
    }

    fn owners(&self) -> &[Address; 2] {
        &self.owners
    }

    fn signatures(&self) -> &CommitmentSignatures {
        &self.signatures
    }

    fn set_signatures(&mut self, signatures: CommitmentSignatures) {
        self.signatures = signatures;
    }

    fn transaction(&self, signatures: [Signature; 2]) -> MinimalTransaction {
        self.multisig_transaction()
            .exec(self.multisig_address, signatures)
    }
}
