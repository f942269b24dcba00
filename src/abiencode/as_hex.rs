//! Serialize any `Vec<u8>` (solidity `bytes`) as a `0x`-prefixed hex string.
//!
//! Without this, serde_json would write the bytes as an array of numbers.
//!
//! # Example usage
//! ```ignore
//! # use serde::Serialize;
//! # use statechannel::abiencode::as_hex;
//!
//! #[derive(Serialize, Debug)]
//! pub struct Call {
//!     #[serde(with = "as_hex")]
//!     pub data: Vec<u8>,
//! }
//! ```

use serde::{de, Deserialize, Deserializer, Serializer};

pub fn serialize<S>(v: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{}", hex::encode(v)))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(de::Error::custom)
}
