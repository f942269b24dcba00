//! The side effects a protocol flow may request.
//!
//! Flows never touch the signer, network or store directly. They hand an
//! [Opcode] to an [Effects] implementation and continue with its
//! [OpcodeResult], which keeps the flows themselves deterministic.

use core::fmt;

use async_trait::async_trait;

use super::ProtocolError;
use crate::{
    abiencode::types::{Hash, Signature},
    channel::{AppInstance, AppInstanceProposal, StateChannel},
    commitment::{ConditionalTransactionCommitment, SetStateCommitment, SetupCommitment},
    messages::{ProtocolMessage, ProtocolName, ProtocolParams},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => f.write_str("initiator"),
            Role::Responder => f.write_str("responder"),
        }
    }
}

/// What a [super::Validator] gets to see. `state_channel` is the snapshot
/// before the run (for Setup, the channel about to be created),
/// `app_instance` and `proposal` the object the run creates or changes.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub protocol: ProtocolName,
    pub role: Role,
    pub params: ProtocolParams,
    pub state_channel: Option<StateChannel>,
    pub app_instance: Option<AppInstance>,
    pub proposal: Option<AppInstanceProposal>,
}

/// Atomic store writes, one per run.
#[derive(Debug, Clone)]
pub enum PersistCommand {
    CreateChannel {
        channel: StateChannel,
        setup: SetupCommitment,
        free_balance_update: SetStateCommitment,
    },
    CreateProposal {
        channel: StateChannel,
        app_identity_hash: Hash,
        initial_state: SetStateCommitment,
    },
    CreateInstance {
        channel: StateChannel,
        app_identity_hash: Hash,
        free_balance_update: SetStateCommitment,
        conditional: ConditionalTransactionCommitment,
    },
    UpdateInstance {
        channel: StateChannel,
        app_identity_hash: Hash,
        update: SetStateCommitment,
    },
    RemoveInstance {
        channel: StateChannel,
        app_identity_hash: Hash,
        free_balance_update: SetStateCommitment,
    },
}

impl PersistCommand {
    pub fn channel(&self) -> &StateChannel {
        match self {
            PersistCommand::CreateChannel { channel, .. }
            | PersistCommand::CreateProposal { channel, .. }
            | PersistCommand::CreateInstance { channel, .. }
            | PersistCommand::UpdateInstance { channel, .. }
            | PersistCommand::RemoveInstance { channel, .. } => channel,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Opcode {
    Sign(Hash),
    Validate(Box<ValidationContext>),
    Send(Box<ProtocolMessage>),
    /// Send and block until the counterparty replies or the protocol timeout
    /// elapses.
    SendAndWait(Box<ProtocolMessage>),
    Persist(Box<PersistCommand>),
}

impl Opcode {
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Sign(_) => "sign",
            Opcode::Validate(_) => "validate",
            Opcode::Send(_) => "send",
            Opcode::SendAndWait(_) => "send_and_wait",
            Opcode::Persist(_) => "persist",
        }
    }
}

#[derive(Debug, Clone)]
pub enum OpcodeResult {
    Signature(Signature),
    Validated,
    Sent,
    Reply(Box<ProtocolMessage>),
    Persisted,
}

/// Executes opcodes on behalf of a flow.
#[async_trait]
pub trait Effects: Send {
    async fn execute(&mut self, op: Opcode) -> Result<OpcodeResult, ProtocolError>;

    async fn sign(&mut self, digest: Hash) -> Result<Signature, ProtocolError> {
        match self.execute(Opcode::Sign(digest)).await? {
            OpcodeResult::Signature(sig) => Ok(sig),
            _ => Err(ProtocolError::UnexpectedOpcodeResult("sign")),
        }
    }

    async fn validate(&mut self, ctx: ValidationContext) -> Result<(), ProtocolError> {
        match self.execute(Opcode::Validate(Box::new(ctx))).await? {
            OpcodeResult::Validated => Ok(()),
            _ => Err(ProtocolError::UnexpectedOpcodeResult("validate")),
        }
    }

    async fn send(&mut self, msg: ProtocolMessage) -> Result<(), ProtocolError> {
        match self.execute(Opcode::Send(Box::new(msg))).await? {
            OpcodeResult::Sent => Ok(()),
            _ => Err(ProtocolError::UnexpectedOpcodeResult("send")),
        }
    }

    async fn send_and_wait(
        &mut self,
        msg: ProtocolMessage,
    ) -> Result<ProtocolMessage, ProtocolError> {
        match self.execute(Opcode::SendAndWait(Box::new(msg))).await? {
            OpcodeResult::Reply(reply) => Ok(*reply),
            _ => Err(ProtocolError::UnexpectedOpcodeResult("send_and_wait")),
        }
    }

    async fn persist(&mut self, cmd: PersistCommand) -> Result<(), ProtocolError> {
        match self.execute(Opcode::Persist(Box::new(cmd))).await? {
            OpcodeResult::Persisted => Ok(()),
            _ => Err(ProtocolError::UnexpectedOpcodeResult("persist")),
        }
    }
}
