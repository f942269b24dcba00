//! Commitments are deterministic descriptions of on-chain transactions that
//! both channel owners sign off-chain. Once both signatures are present a
//! commitment can be turned into a transaction and submitted, which is what
//! makes the off-chain state enforceable.

mod conditional;
mod set_state;
mod setup;

use serde::{Deserialize, Serialize};

use crate::{
    abiencode::{
        as_hex, encode_call, keccak256, keccak_packed,
        types::{Address, Hash, Signature, U256},
        Packed, Token,
    },
    sig,
};

pub use conditional::ConditionalTransactionCommitment;
pub use set_state::{AppIdentity, SetStateCommitment};
pub use setup::SetupCommitment;

#[cfg(test)]
mod tests;

/// Domain separator, first byte of every commitment digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommitmentTarget {
    Multisig = 0,
    SetState = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MultisigOperation {
    Call = 0,
    DelegateCall = 1,
}

#[derive(Debug, thiserror::Error)]
pub enum CommitmentError {
    #[error("{0} is not an owner of this commitment")]
    NotAnOwner(Address),
    #[error("commitment is missing the signature of owner {0}")]
    MissingSignature(usize),
    #[error("signature of owner {position} is invalid: {source}")]
    InvalidSignature {
        position: usize,
        #[source]
        source: sig::Error,
    },
}

/// A transaction ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimalTransaction {
    pub to: Address,
    pub value: U256,
    #[serde(with = "as_hex")]
    pub data: Vec<u8>,
}

/// Up to two signatures, stored in the order of the multisig owners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentSignatures([Option<Signature>; 2]);

impl CommitmentSignatures {
    /// Place `mine` and `theirs` by comparing the counterparty's signer
    /// address against the owners. Arrival order or role never matter.
    pub fn assemble(
        owners: &[Address; 2],
        counterparty: Address,
        mine: Signature,
        theirs: Signature,
    ) -> Result<Self, CommitmentError> {
        if owners[0] == counterparty {
            Ok(Self([Some(theirs), Some(mine)]))
        } else if owners[1] == counterparty {
            Ok(Self([Some(mine), Some(theirs)]))
        } else {
            Err(CommitmentError::NotAnOwner(counterparty))
        }
    }

    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn get(&self) -> Result<[Signature; 2], CommitmentError> {
        match self.0 {
            [Some(a), Some(b)] => Ok([a, b]),
            [None, _] => Err(CommitmentError::MissingSignature(0)),
            [_, None] => Err(CommitmentError::MissingSignature(1)),
        }
    }

    /// Check that position `i` holds a valid signature of `owners[i]`.
    pub fn verify(&self, digest: Hash, owners: &[Address; 2]) -> Result<(), CommitmentError> {
        let sigs = self.get()?;
        for (position, (sig, owner)) in sigs.iter().zip(owners).enumerate() {
            sig::verify(*owner, digest, *sig)
                .map_err(|source| CommitmentError::InvalidSignature { position, source })?;
        }
        Ok(())
    }
}

/// Behaviour shared by all commitments.
pub trait Commitment {
    fn hash_to_sign(&self) -> Hash;

    /// Signers in canonical order.
    fn owners(&self) -> &[Address; 2];

    fn signatures(&self) -> &CommitmentSignatures;

    fn set_signatures(&mut self, signatures: CommitmentSignatures);

    /// Build the transaction from the already verified signatures.
    fn transaction(&self, signatures: [Signature; 2]) -> MinimalTransaction;

    /// Store our own and the counterparty's signature in owner order.
    fn add_signatures(
        &mut self,
        counterparty: Address,
        mine: Signature,
        theirs: Signature,
    ) -> Result<(), CommitmentError> {
        let signatures = CommitmentSignatures::assemble(self.owners(), counterparty, mine, theirs)?;
        self.set_signatures(signatures);
        Ok(())
    }

    fn assert_signatures(&self) -> Result<(), CommitmentError> {
        self.signatures().verify(self.hash_to_sign(), self.owners())
    }

    /// Fails unless both signatures are present and valid.
    fn signed_transaction(&self) -> Result<MinimalTransaction, CommitmentError> {
        self.assert_signatures()?;
        Ok(self.transaction(self.signatures().get()?))
    }
}

/// A delegate call executed by the multisig, common to the setup and
/// conditional transaction commitments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MultisigTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub operation: MultisigOperation,
}

impl MultisigTransaction {
    pub fn hash_to_sign(&self, multisig: Address) -> Hash {
        keccak_packed(&[
            Packed::Uint8(CommitmentTarget::Multisig as u8),
            Packed::Address(multisig),
            Packed::Address(self.to),
            Packed::Uint256(self.value),
            keccak256(&self.data).into(),
            Packed::Uint8(self.operation as u8),
        ])
    }

    /// `execTransaction` call on the multisig.
    pub fn exec(&self, multisig: Address, signatures: [Signature; 2]) -> MinimalTransaction {
        let data = encode_call(
            "execTransaction(address,uint256,bytes,uint8,bytes[])",
            &[
                Token::Address(self.to),
                Token::Uint(self.value),
                Token::Bytes(self.data.clone()),
                Token::Uint(U256::from(self.operation as u8)),
                signatures_token(signatures),
            ],
        );
        MinimalTransaction {
            to: multisig,
            value: U256::zero(),
            data,
        }
    }
}

fn signatures_token(signatures: [Signature; 2]) -> Token {
    Token::Array(
        signatures
            .iter()
            .map(|sig| Token::Bytes(sig.0.to_vec()))
            .collect(),
    )
}
