use super::{encode::Writer, token::Token, types::Hash};

use sha3::{
    digest::{core_api::CoreWrapper, Output},
    Digest, Keccak256, Keccak256Core,
};

pub struct Keccak256Writer {
    hasher: CoreWrapper<Keccak256Core>,
}

impl Default for Keccak256Writer {
    fn default() -> Self {
        Self {
            hasher: Keccak256::new(),
        }
    }
}

impl Writer for Keccak256Writer {
    fn write(&mut self, slot: &[u8]) {
        self.hasher.update(slot);
    }
}

impl Keccak256Writer {
    pub fn finalize(self) -> Output<Keccak256> {
        self.hasher.finalize()
    }

    pub fn finish(self) -> Hash {
        Hash(self.finalize().into())
    }
}

pub fn keccak256(data: &[u8]) -> Hash {
    Hash(Keccak256::digest(data).into())
}

/// `keccak256(abi.encode(tokens...))`
pub fn to_hash(tokens: &[Token]) -> Hash {
    let mut writer = Keccak256Writer::default();
    super::to_writer(tokens, &mut writer);
    writer.finish()
}

/// First four bytes of the hash of a canonical function signature, e.g.
/// `transfer(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash.0[0], hash.0[1], hash.0[2], hash.0[3]]
}
