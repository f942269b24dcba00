use serde::{Deserialize, Serialize};

use super::{
    signatures_token, Commitment, CommitmentSignatures, CommitmentTarget, MinimalTransaction,
};
use crate::abiencode::{
    encode_call, keccak_packed,
    types::{Address, Hash, Signature, U256},
    Packed, Token,
};

/// The fields the challenge registry identifies an app by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentity {
    pub multisig_address: Address,
    /// The app sequence number within the channel.
    pub channel_nonce: u64,
    pub participants: [Address; 2],
    pub app_definition: Address,
    pub default_timeout: u64,
}

impl AppIdentity {
    /// `keccak256(abi.encodePacked(multisig, channelNonce,
    /// keccak256(abi.encodePacked(participants)), appDefinition,
    /// defaultTimeout))`
    pub fn hash(&self) -> Hash {
        let participants = keccak_packed(&[Packed::AddressArray(&self.participants)]);
        keccak_packed(&[
            Packed::Address(self.multisig_address),
            Packed::Uint256(U256::from(self.channel_nonce)),
            participants.into(),
            Packed::Address(self.app_definition),
            Packed::Uint256(U256::from(self.default_timeout)),
        ])
    }

    fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.multisig_address),
            self.channel_nonce.into(),
            Token::Array(self.participants.iter().copied().map(Token::Address).collect()),
            Token::Address(self.app_definition),
            self.default_timeout.into(),
        ])
    }
}

/// Registers a (state hash, version) pair of an app with the challenge
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStateCommitment {
    pub challenge_registry: Address,
    pub app_identity: AppIdentity,
    pub app_identity_hash: Hash,
    pub app_state_hash: Hash,
    pub version_number: u64,
    pub state_timeout: u64,
    pub owners: [Address; 2],
    #[serde(default)]
    pub signatures: CommitmentSignatures,
}

impl SetStateCommitment {
    pub fn new(
        challenge_registry: Address,
        app_identity: AppIdentity,
        app_state_hash: Hash,
        version_number: u64,
        state_timeout: u64,
        owners: [Address; 2],
    ) -> Self {
        Self {
            challenge_registry,
            app_identity_hash: app_identity.hash(),
            app_identity,
            app_state_hash,
            version_number,
            state_timeout,
            owners,
            signatures: CommitmentSignatures::default(),
        }
    }
}

impl Commitment for SetStateCommitment {
    fn hash_to_sign(&self) -> Hash {
        keccak_packed(&[
            Packed::Uint8(CommitmentTarget::SetState as u8),
            self.app_identity_hash.into(),
            self.app_state_hash.into(),
            Packed::Uint256(U256::from(self.version_number)),
            Packed::Uint256(U256::from(self.state_timeout)),
        ])
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
        let data = encode_call(
            "setState((address,uint256,address[],address,uint256),(bytes32,uint256,uint256,bytes[]))",
            &[
                self.app_identity.to_token(),
                Token::Tuple(vec![
                    self.app_state_hash.into(),
                    self.version_number.into(),
                    self.state_timeout.into(),
                    signatures_token(signatures),
                ]),
            ],
        );
        MinimalTransaction {
            to: self.challenge_registry,
            value: U256::zero(),
            data,
        }
    }
}
