//! Handles the creation and verification of (Ethereum) Signatures.
//!
//! The k256 backend is always available and is used for recovery. Enabling
//! the `secp256k1` feature adds a second [ChannelSigner] backed by the
//! libsecp256k1 bindings.

use core::fmt::Debug;

use crate::abiencode::types::{Address, Hash, Signature};
use sha3::{Digest, Keccak256};

mod identifier;
mod k256;
#[cfg(feature = "secp256k1")]
mod secp256k1;

pub use self::k256::Signer;
#[cfg(feature = "secp256k1")]
pub use self::secp256k1::Signer as Secp256k1Signer;
pub use identifier::Identifier;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("ecdsa failure: {0}")]
    Ecdsa(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("signature was made by {recovered}, expected {expected}")]
    WrongSigner {
        expected: Address,
        recovered: Address,
    },
}

/// Signing capability handed to the protocol runner.
///
/// Only the digest is given to the signer, the Ethereum message prefix is
/// added by the implementation.
pub trait ChannelSigner: Send + Sync + Debug {
    /// Ethereum address of the key, used as multisig owner.
    fn address(&self) -> Address;

    fn identifier(&self) -> Identifier;

    fn sign_message(&self, digest: Hash) -> Result<Signature, Error>;
}

/// Add the `\x19Ethereum Signed Message\n<length>` prefix to hash.
///
/// This is the format expected by the Solidity contracts.
fn hash_to_eth_signed_msg_hash(hash: Hash) -> Hash {
    // Packed encoding => We can't use the encoder
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash.0);
    Hash(hasher.finalize().into())
}

/// Recover the address that produced `sig` over `digest`.
///
/// `digest` is the value given to [ChannelSigner::sign_message], without the
/// `Ethereum Signed Message` prefix.
pub fn recover_signer(digest: Hash, sig: Signature) -> Result<Address, Error> {
    self::k256::recover_signer(digest, sig)
}

/// Recover the signer of `sig` and compare it against `expected`.
pub fn verify(expected: Address, digest: Hash, sig: Signature) -> Result<(), Error> {
    let recovered = recover_signer(digest, sig)?;
    if recovered == expected {
        Ok(())
    } else {
        Err(Error::WrongSigner {
            expected,
            recovered,
        })
    }
}
