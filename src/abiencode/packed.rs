//! Packed encoding, `abi.encodePacked(...)` in Solidity.
//!
//! Unlike the standard encoding, values are not padded to 32 bytes and
//! there is no head/tail split, so the exact Solidity type of every value has
//! to be known. Only the types the commitment and identity hashes need are
//! supported. Array elements are still padded to 32 bytes, like Solidity does.

use super::{
    encode::{Writer, SLOT_SIZE},
    hashing::Keccak256Writer,
    types::{Address, Hash, U256},
};

#[derive(Debug, Clone, Copy)]
pub enum Packed<'a> {
    Uint8(u8),
    Uint256(U256),
    Address(Address),
    Bytes32([u8; 32]),
    Bytes(&'a [u8]),
    AddressArray(&'a [Address]),
}

impl From<Hash> for Packed<'_> {
    fn from(h: Hash) -> Self {
        Packed::Bytes32(h.0)
    }
}

pub fn write_packed<W: Writer>(items: &[Packed<'_>], writer: &mut W) {
    for item in items {
        match item {
            Packed::Uint8(v) => writer.write(&[*v]),
            Packed::Uint256(v) => writer.write(&v.to_be_bytes()),
            Packed::Address(a) => writer.write(&a.0),
            Packed::Bytes32(b) => writer.write(b),
            Packed::Bytes(b) => writer.write(b),
            Packed::AddressArray(addrs) => {
                for a in addrs.iter() {
                    writer.write(&[0u8; SLOT_SIZE - 20]);
                    writer.write(&a.0);
                }
            }
        }
    }
}

pub fn encode_packed(items: &[Packed<'_>]) -> Vec<u8> {
    let mut out = Vec::new();
    write_packed(items, &mut out);
    out
}

/// `keccak256(abi.encodePacked(...))`
pub fn keccak_packed(items: &[Packed<'_>]) -> Hash {
    let mut writer = Keccak256Writer::default();
    write_packed(items, &mut writer);
    writer.finish()
}
