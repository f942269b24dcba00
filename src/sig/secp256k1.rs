//! Signer using the secp256k1 crate (bindings to libsecp256k1).

use crate::abiencode::types::{Address, Hash, Signature};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};

use super::{hash_to_eth_signed_msg_hash, ChannelSigner, Error, Identifier};

pub struct Signer {
    secp: Secp256k1<All>,
    sk: SecretKey,
    addr: Address,
    identifier: Identifier,
}

impl core::fmt::Debug for Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signer")
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        Self::from_secret_key(SecretKey::new(rng))
    }

    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, Error> {
        let sk = SecretKey::from_slice(secret).map_err(|e| Error::Ecdsa(e.to_string()))?;
        Ok(Self::from_secret_key(sk))
    }

    fn from_secret_key(sk: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        let addr: Address = pk.into();
        Self {
            secp,
            sk,
            addr,
            identifier: Identifier::from_parts(pk.serialize(), addr),
        }
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    /// Sign a hash using a Ethereum 65-byte recoverable signature.
    ///
    /// Note that this differs from transaction signatures, as it does not
    /// include the chain id.
    pub fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        // "\x19Ethereum Signed Message:\n32" format
        let hash = hash_to_eth_signed_msg_hash(msg);

        // sign_ecdsa_recoverable gives us the additional information needed
        // for v, so the contract can recover the address.
        let sig = self
            .secp
            .sign_ecdsa_recoverable(&Message::from(hash), &self.sk);
        let (v, rs) = sig.serialize_compact();

        // EIP-2 rejects non-canonical s (high bit set). The library already
        // produces canonical signatures, fail early if that ever changes.
        debug_assert!(rs[32] & 0x80 == 0);

        // yParity is offset by 27, like the EVM expects.
        let v: u8 = 27 + v.to_i32() as u8;

        Ok(Signature::new(&rs, v))
    }

    /// Recover the signer address, see [super::recover_signer].
    pub fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        let hash = hash_to_eth_signed_msg_hash(msg);

        let rs = &eth_sig.0[..64];
        let v = eth_sig.0[64]
            .checked_sub(27)
            .ok_or(Error::InvalidRecoveryId(eth_sig.0[64]))?;

        let recid =
            RecoveryId::from_i32(v.into()).map_err(|_| Error::InvalidRecoveryId(eth_sig.0[64]))?;
        let sig = RecoverableSignature::from_compact(rs, recid)
            .map_err(|e| Error::Ecdsa(e.to_string()))?;

        let pk = self
            .secp
            .recover_ecdsa(&Message::from(hash), &sig)
            .map_err(|e| Error::Ecdsa(e.to_string()))?;

        Ok(pk.into())
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
