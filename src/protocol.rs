//! The protocols two parties run to set up a channel and to propose, install,
//! update and uninstall apps in it.
//!
//! Every protocol has an initiator and a responder flow. A flow computes the
//! post-state of the channel from the snapshot it loaded, exchanges
//! signatures on the commitments backing that state and persists it once,
//! after all signatures are verified. Side effects are requested through
//! [Opcode]s, which the [ProtocolRunner] executes.

mod capabilities;
mod context;
mod error;
mod install;
mod opcode;
mod propose;
mod runner;
mod setup;
mod take_action;
mod uninstall;

pub use capabilities::{AcceptAll, AppLogic, AppLogicError, Validator, Verdict};
pub use error::{ErrorKind, ProtocolError};
pub use opcode::{Effects, Opcode, OpcodeResult, PersistCommand, Role, ValidationContext};
pub use runner::{ProtocolOutput, ProtocolRunner};
