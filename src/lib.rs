pub mod abiencode {
    mod abitype;
    pub mod as_hex;
    mod encode;
    mod error;
    mod hashing;
    mod packed;
    mod token;
    pub mod types;

    pub use abitype::{check_encoding, AbiType, MAX_TYPE_DEPTH, MAX_TYPE_LEN};
    pub use encode::{encode, encode_call, to_writer, Writer, SLOT_SIZE};
    pub use error::{Error, Result};
    pub use hashing::{keccak256, selector, to_hash, Keccak256Writer};
    pub use packed::{encode_packed, keccak_packed, write_packed, Packed};
    pub use token::Token;

    #[cfg(test)]
    mod tests;
}
pub mod sig;

pub mod channel;
mod client;
pub mod commitment;
pub mod config;
pub mod lock;
pub mod messages;
pub mod protocol;
pub mod store;
pub mod wire;

pub use abiencode::types::{Address, Bytes32, Hash, Signature, U256};
pub use client::{AppProposal, ChannelClient};
pub use config::EngineConfig;
pub use protocol::{ErrorKind, ProtocolError, ProtocolOutput, ProtocolRunner};
pub use sig::Identifier;
