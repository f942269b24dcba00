use serde::{Deserialize, Serialize};

use super::{
    Commitment, CommitmentSignatures, MinimalTransaction, MultisigOperation, MultisigTransaction,
};
use crate::{
    abiencode::{
        encode_call,
        types::{Address, Hash, Signature, U256},
        Token,
    },
    config::NetworkContext,
};

/// Lets the multisig pay out according to the free balance, signed when the
/// channel is created so funds can always be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupCommitment {
    pub multisig_address: Address,
    pub owners: [Address; 2],
    pub challenge_registry: Address,
    pub delegate_target: Address,
    pub interpreter: Address,
    pub free_balance_identity_hash: Hash,
    #[serde(default)]
    pub signatures: CommitmentSignatures,
}

impl SetupCommitment {
    pub fn new(
        network: &NetworkContext,
        multisig_address: Address,
        owners: [Address; 2],
        free_balance_identity_hash: Hash,
    ) -> Self {
        Self {
            multisig_address,
            owners,
            challenge_registry: network.challenge_registry,
            delegate_target: network.conditional_transaction_delegate_target,
            interpreter: network.multi_asset_multi_party_coin_transfer_interpreter,
            free_balance_identity_hash,
            signatures: CommitmentSignatures::default(),
        }
    }

    fn multisig_transaction(&self) -> MultisigTransaction {
        MultisigTransaction {
            to: self.delegate_target,
            value: U256::zero(),
            data: encode_call(
                "executeEffectOfFreeBalance(address,bytes32,address)",
                &[
                    Token::Address(self.challenge_registry),
                    self.free_balance_identity_hash.into(),
                    Token::Address(self.interpreter),
                ],
            ),
            operation: MultisigOperation::DelegateCall,
        }
    }
}

impl Commitment for SetupCommitment {
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
