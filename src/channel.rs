//! Canonical data model: state channels, their free balance and the apps
//! proposed and installed in them.
//!
//! All transitions are pure. They borrow the current value and return the
//! next one (or an error), persisting the result is up to the caller.

mod app_instance;
mod free_balance;
pub mod interpreter;
mod proposal;
mod state_channel;

use crate::{
    abiencode::{
        self,
        types::{Address, Hash, U256},
    },
    sig::Identifier,
};

pub use app_instance::{AppInstance, AppInterface, Deposits};
pub use free_balance::{
    CoinTransfer, FreeBalance, TokenIndexedCoinTransferMap, FREE_BALANCE_STATE_ENCODING,
};
pub use interpreter::{
    compute_free_balance_increments, AppOutcome, InterpreterError, InterpreterParams,
    OutcomeType, TwoPartyOutcome,
};
pub use proposal::AppInstanceProposal;
pub use state_channel::{CriticalStateChannelAddresses, StateChannel, SCHEMA_VERSION};

#[cfg(test)]
mod tests;

/// Number of participants of every channel.
pub const PARTICIPANTS: usize = 2;

/// Sequence number of the free balance app, user apps start at 1.
pub const FREE_BALANCE_APP_SEQ_NO: u64 = 0;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("insufficient funds: {owner} has {available} of token {token}, needs {requested}")]
    InsufficientFunds {
        owner: Address,
        token: Address,
        available: U256,
        requested: U256,
    },
    #[error("invalid version number {proposed}, current version is {current}")]
    InvalidVersionNumber { current: u64, proposed: u64 },
    #[error("no app instance with identity hash {0}")]
    NoSuchApp(Hash),
    #[error("no proposal with identity hash {0}")]
    NoSuchProposal(Hash),
    #[error("app {0} is already installed")]
    AppAlreadyInstalled(Hash),
    #[error("proposal {0} already exists")]
    ProposalAlreadyExists(Hash),
    #[error("identity hash mismatch: computed {computed}, claimed {claimed}")]
    IdentityHashMismatch { computed: Hash, claimed: Hash },
    #[error("expected app sequence number {expected}, got {got}")]
    InvalidAppSeqNo { expected: u64, got: u64 },
    #[error("{0} is not a participant of this channel")]
    NotAParticipant(Identifier),
    #[error("both participants are {0}")]
    SameParticipant(Identifier),
    #[error("{0} is not an owner of the free balance")]
    NotAnOwner(Address),
    #[error("proposal belongs to multisig {got}, not {expected}")]
    WrongMultisig { expected: Address, got: Address },
    #[error("value of token {token} not conserved: expected {expected}, got {actual}")]
    ValueNotConserved {
        token: Address,
        expected: U256,
        actual: U256,
    },
    #[error("updated free balance still lists app {0} as active")]
    AppStillActive(Hash),
    #[error("free balance active apps do not match")]
    ActiveAppsChanged,
    #[error("app has no action encoding")]
    NoActionEncoding,
    #[error("arithmetic overflow")]
    Overflow,
    #[error(transparent)]
    Abi(#[from] abiencode::Error),
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}
