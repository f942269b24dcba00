//! Signer using the k256 Rust crate (implementation of ecdsa in Rust).

use crate::abiencode::types::{Address, Hash, Signature};
use k256::{
    ecdsa::{
        recoverable,
        signature::{hazmat::PrehashSigner, Signature as k256Signature},
        SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand::Rng;
use sha3::{Digest, Keccak256};

use super::{hash_to_eth_signed_msg_hash, ChannelSigner, Error, Identifier};

#[derive(Debug)]
pub struct Signer {
    key: SigningKey,
    addr: Address,
    identifier: Identifier,
}

impl From<VerifyingKey> for Address {
    fn from(key: VerifyingKey) -> Self {
        // The uncompressed EncodedPoint has the public key in bytes [1..], the
        // first byte is the SEC1 tag.
        let point = key.to_encoded_point(false);
        let hash: [u8; 32] = Keccak256::digest(&point.as_bytes()[1..]).into();

        let mut addr = Address([0; 20]);
        addr.0.copy_from_slice(&hash[32 - 20..]);
        addr
    }
}

impl Signer {
    pub fn new<R: Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        // Almost every 32 byte string is a valid scalar, retry on the rest.
        loop {
            let secret: [u8; 32] = rng.gen();
            if let Ok(signer) = Self::from_secret_bytes(&secret) {
                return signer;
            }
        }
    }

    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, Error> {
        let key = SigningKey::from_bytes(secret).map_err(|e| Error::Ecdsa(e.to_string()))?;
        let verifying_key = key.verifying_key();
        Ok(Self {
            addr: verifying_key.into(),
            identifier: verifying_key.into(),
            key,
        })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    pub fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        // "\x19Ethereum Signed Message:\n32" format
        let hash = hash_to_eth_signed_msg_hash(msg);

        let sig: recoverable::Signature = self
            .key
            .sign_prehash(&hash.0)
            .map_err(|e| Error::Ecdsa(e.to_string()))?;

        // This Signature type already has the layout we need: 65 bytes
        // containing r, s and v in this order. v still needs the offset of 27
        // to be valid in the EVM.
        let mut sig_bytes = [0u8; 65];
        sig_bytes.copy_from_slice(sig.as_bytes());
        debug_assert!(sig_bytes[32] & 0x80 == 0);
        sig_bytes[64] += 27;

        Ok(Signature(sig_bytes))
    }

    pub fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        recover_signer(msg, eth_sig)
    }
}

impl ChannelSigner for Signer {
    fn address(&self) -> Address {
        self.addr
    }

    fn identifier(&self) -> Identifier {
        self.identifier
    }

    fn sign_message(&self, digest: Hash) -> Result<Signature, Error> {
        self.sign_eth(digest)
    }
}

pub(super) fn recover_signer(msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
    // "\x19Ethereum Signed Message:\n32" format
    let hash = hash_to_eth_signed_msg_hash(msg);

    // Undo adding the 27, to go back to the format expected below
    let mut sig_bytes: [u8; 65] = eth_sig.0;
    sig_bytes[64] = sig_bytes[64]
        .checked_sub(27)
        .ok_or(Error::InvalidRecoveryId(eth_sig.0[64]))?;

    let sig = recoverable::Signature::from_bytes(&sig_bytes)
        .map_err(|_| Error::InvalidRecoveryId(eth_sig.0[64]))?;

    let verifying_key = sig
        .recover_verifying_key_from_digest_bytes(&hash.0.into())
        .map_err(|e| Error::Ecdsa(e.to_string()))?;
    Ok(verifying_key.into())
}
