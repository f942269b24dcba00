use std::time::Duration;

use super::capabilities::AppLogicError;
use crate::{
    abiencode::{self, types::Address},
    channel::{InterpreterError, ModelError},
    commitment::CommitmentError,
    lock::LockError,
    messages::{ProcessId, ProtocolName},
    sig::{self, Identifier},
    store::StoreError,
    wire::TransportError,
};

/// Coarse classification of a [ProtocolError].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The proposed transition is invalid or was rejected.
    Validation,
    Signature,
    /// Lock queue full or lock wait expired.
    Concurrency,
    /// The counterparty did not answer in time or could not be reached.
    Transport,
    Persistence,
    /// The counterparty sent something the protocol does not allow.
    Protocol,
}

/// A failed protocol run. Nothing was persisted by a run that failed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
    #[error(transparent)]
    Abi(#[from] abiencode::Error),
    #[error("{protocol} rejected: {reason}")]
    Rejected {
        protocol: ProtocolName,
        reason: String,
    },
    #[error("invalid signature: expected {expected}, recovered {recovered}")]
    InvalidSignature {
        expected: Address,
        recovered: Address,
    },
    #[error(transparent)]
    Signature(#[from] sig::Error),
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("{protocol} run {process_id} timed out after {after:?}")]
    Timeout {
        protocol: ProtocolName,
        process_id: ProcessId,
        after: Duration,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no state channel with multisig {0}")]
    NoChannel(Address),
    #[error("state channel with multisig {0} already exists")]
    ChannelExists(Address),
    #[error("{0} does not take part in this run")]
    NotAParticipant(Identifier),
    #[error("expected a {expected} payload, got {got}")]
    UnexpectedPayload {
        expected: &'static str,
        got: &'static str,
    },
    #[error(transparent)]
    AppLogic(#[from] AppLogicError),
    #[error("opcode {0} produced an unexpected result")]
    UnexpectedOpcodeResult(&'static str),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Model(_)
            | ProtocolError::Interpreter(_)
            | ProtocolError::Abi(_)
            | ProtocolError::Rejected { .. }
            | ProtocolError::NoChannel(_)
            | ProtocolError::ChannelExists(_)
            | ProtocolError::NotAParticipant(_)
            | ProtocolError::AppLogic(_) => ErrorKind::Validation,
            ProtocolError::InvalidSignature { .. }
            | ProtocolError::Signature(_)
            | ProtocolError::Commitment(_) => ErrorKind::Signature,
            ProtocolError::Lock(_) => ErrorKind::Concurrency,
            ProtocolError::Timeout { .. } | ProtocolError::Transport(_) => ErrorKind::Transport,
            ProtocolError::Store(_) => ErrorKind::Persistence,
            ProtocolError::UnexpectedPayload { .. } | ProtocolError::UnexpectedOpcodeResult(_) => {
                ErrorKind::Protocol
            }
        }
    }

    /// Whether the caller may go on using the channel after this error.
    ///
    /// Validation failures leave the channel untouched and can be corrected
    /// by the caller, lock and transport failures may go away on retry.
    /// Signature and persistence failures end the run for good.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Concurrency | ErrorKind::Transport
        )
    }
}

/// Map signature failures, keeping who was expected and who signed.
pub(crate) fn signature_error(e: sig::Error) -> ProtocolError {
    match e {
        sig::Error::WrongSigner {
            expected,
            recovered,
        } => ProtocolError::InvalidSignature {
            expected,
            recovered,
        },
        other => ProtocolError::Signature(other),
    }
}
