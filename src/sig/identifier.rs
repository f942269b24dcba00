use core::{fmt, str::FromStr};

use k256::{ecdsa::VerifyingKey, elliptic_curve::sec1::ToEncodedPoint};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::Error;
use crate::abiencode::types::{decode_hex_array, Address};

/// Public identifier of a channel participant.
///
/// It is the compressed secp256k1 public key of the participant's signing
/// key, so the signer address used in commitments can always be derived from
/// it. Counterparty signatures are checked against that derived address,
/// never against anything carried in a message.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    key: [u8; 33],
    address: Address,
}

impl Identifier {
    pub fn from_public_key_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
        Ok(key.into())
    }

    /// For backends that already derived both halves themselves.
    #[cfg(feature = "secp256k1")]
    pub(crate) fn from_parts(key: [u8; 33], address: Address) -> Self {
        Self { key, address }
    }

    pub fn signer_address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &[u8; 33] {
        &self.key
    }
}

impl From<VerifyingKey> for Identifier {
    fn from(key: VerifyingKey) -> Self {
        let mut compressed = [0u8; 33];
        compressed.copy_from_slice(key.to_encoded_point(true).as_bytes());
        Self {
            key: compressed,
            address: key.into(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for b in self.key {
            f.write_fmt(format_args!("{:02x}", b))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 33] =
            decode_hex_array(s).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
        Self::from_public_key_bytes(&bytes)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
