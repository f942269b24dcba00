//! Solidity value tree.
//!
//! App states, actions and interpreter parameters are not known at compile
//! time (they are described by ABI type strings registered with each app), so
//! they are carried around as a [Token] tree instead of Rust structs.

use serde::{Deserialize, Serialize};

use super::{
    as_hex,
    types::{Address, Bytes32, Hash, U256},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Token {
    Address(Address),
    /// Any unsigned integer width, the width only matters when checking
    /// against a type.
    Uint(U256),
    Bool(bool),
    /// `bytes1` to `bytes32`, stored unpadded.
    FixedBytes(#[serde(with = "as_hex")] Vec<u8>),
    Bytes(#[serde(with = "as_hex")] Vec<u8>),
    String(String),
    FixedArray(Vec<Token>),
    Array(Vec<Token>),
    Tuple(Vec<Token>),
}

impl Token {
    /// Whether the encoding of this value lives in the tail (behind an
    /// offset) instead of inline in the head.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) | Token::String(_) | Token::Array(_) => true,
            Token::FixedArray(items) | Token::Tuple(items) => items.iter().any(Token::is_dynamic),
            Token::Address(_) | Token::Uint(_) | Token::Bool(_) | Token::FixedBytes(_) => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Token::Address(_) => "address",
            Token::Uint(_) => "uint",
            Token::Bool(_) => "bool",
            Token::FixedBytes(_) => "fixed bytes",
            Token::Bytes(_) => "bytes",
            Token::String(_) => "string",
            Token::FixedArray(_) => "fixed array",
            Token::Array(_) => "array",
            Token::Tuple(_) => "tuple",
        }
    }

    pub fn as_address(&self) -> Result<Address> {
        match self {
            Token::Address(a) => Ok(*a),
            other => Err(Error::mismatch("address", other.kind())),
        }
    }

    pub fn as_uint(&self) -> Result<U256> {
        match self {
            Token::Uint(v) => Ok(*v),
            other => Err(Error::mismatch("uint", other.kind())),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Token::Bool(b) => Ok(*b),
            other => Err(Error::mismatch("bool", other.kind())),
        }
    }

    pub fn as_bytes32(&self) -> Result<Bytes32> {
        match self {
            Token::FixedBytes(b) if b.len() == 32 => {
                let mut out = Bytes32::default();
                out.0.copy_from_slice(b);
                Ok(out)
            }
            other => Err(Error::mismatch("bytes32", other.kind())),
        }
    }

    /// Elements of a tuple, fixed or dynamic array.
    pub fn as_items(&self) -> Result<&[Token]> {
        match self {
            Token::Tuple(items) | Token::Array(items) | Token::FixedArray(items) => Ok(items),
            other => Err(Error::mismatch("tuple or array", other.kind())),
        }
    }

    /// Field `index` of a tuple (or element of an array).
    pub fn field(&self, index: usize) -> Result<&Token> {
        self.as_items()?
            .get(index)
            .ok_or_else(|| Error::MissingField(index.to_string()))
    }
}

impl From<Address> for Token {
    fn from(a: Address) -> Self {
        Token::Address(a)
    }
}

impl From<U256> for Token {
    fn from(v: U256) -> Self {
        Token::Uint(v)
    }
}

impl From<u64> for Token {
    fn from(v: u64) -> Self {
        Token::Uint(v.into())
    }
}

impl From<bool> for Token {
    fn from(b: bool) -> Self {
        Token::Bool(b)
    }
}

impl From<Hash> for Token {
    fn from(h: Hash) -> Self {
        Token::FixedBytes(h.0.to_vec())
    }
}

impl From<Bytes32> for Token {
    fn from(b: Bytes32) -> Self {
        Token::FixedBytes(b.0.to_vec())
    }
}
