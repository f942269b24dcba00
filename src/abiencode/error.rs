//! Error type and Return values used by the encoder and the type parser.

/// Represents all possible errors that can happen while parsing ABI type
/// strings, checking values against them or decoding primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The type string could not be parsed, e.g. `tuple(uint256` or `uint7`.
    #[error("invalid abi type `{0}`")]
    InvalidType(String),
    /// Although the type is valid Solidity (signed integers, fixed point
    /// numbers, function pointers), the encoder does not implement it.
    #[error("abi type is not yet supported: {0}")]
    TypeNotYetSupported(String),
    /// A value does not conform to the type it is checked or encoded against.
    #[error("value does not conform to `{expected}`: {reason}")]
    Mismatch { expected: String, reason: String },
    /// A tuple field or array element was requested that does not exist.
    #[error("missing field {0}")]
    MissingField(String),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

impl Error {
    pub(crate) fn mismatch(expected: impl ToString, reason: impl Into<String>) -> Self {
        Error::Mismatch {
            expected: expected.to_string(),
            reason: reason.into(),
        }
    }
}

/// Alias for `Result` using the [Error] returned by the encoder.
pub type Result<T> = core::result::Result<T, Error>;
