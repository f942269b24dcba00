//! Messages exchanged between the two parties of a protocol run.
//!
//! Every message is a [ProtocolMessage] envelope. Its `params` describe what
//! the run is about and are the same in every message of a run, `customData`
//! carries the payload of the current step.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::{
    abiencode::{
        types::{Address, Hash, Signature},
        Token,
    },
    channel::{AppInterface, Deposits, OutcomeType},
    sig::Identifier,
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtocolName {
    Setup,
    Propose,
    Install,
    TakeAction,
    Uninstall,
}

impl ProtocolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolName::Setup => "setup",
            ProtocolName::Propose => "propose",
            ProtocolName::Install => "install",
            ProtocolName::TakeAction => "takeAction",
            ProtocolName::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for ProtocolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one protocol run, shared by all its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(Uuid);

impl ProcessId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Step index of a message within its run. Replies to a send-and-wait are
/// [Seq::Unassigned] (`-1` on the wire), they are routed by process id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seq {
    Step(u32),
    Unassigned,
}

impl Serialize for Seq {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Seq::Step(n) => serializer.serialize_i64(i64::from(*n)),
            Seq::Unassigned => serializer.serialize_i64(-1),
        }
    }
}

impl<'de> Deserialize<'de> for Seq {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match i64::deserialize(deserializer)? {
            -1 => Ok(Seq::Unassigned),
            n => u32::try_from(n)
                .map(Seq::Step)
                .map_err(|_| serde::de::Error::custom(format!("invalid seq {}", n))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupParams {
    pub initiator_identifier: Identifier,
    pub responder_identifier: Identifier,
    pub multisig_address: Address,
}

/// A new app, before the sequence number and identity hash are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeParams {
    pub initiator_identifier: Identifier,
    pub responder_identifier: Identifier,
    pub multisig_address: Address,
    pub app_interface: AppInterface,
    pub deposits: Deposits,
    pub default_timeout: u64,
    pub state_timeout: u64,
    pub initial_state: Token,
    pub outcome_type: OutcomeType,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    #[serde(default)]
    pub disable_limit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallParams {
    pub initiator_identifier: Identifier,
    pub responder_identifier: Identifier,
    pub multisig_address: Address,
    /// Identity hash of the proposal to install.
    pub app_identity_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeActionParams {
    pub initiator_identifier: Identifier,
    pub responder_identifier: Identifier,
    pub multisig_address: Address,
    pub app_identity_hash: Hash,
    pub action: Token,
    pub state_timeout: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallParams {
    pub initiator_identifier: Identifier,
    pub responder_identifier: Identifier,
    pub multisig_address: Address,
    pub app_identity_hash: Hash,
}

/// Parameters of a run. On the wire the variant is given by the envelope's
/// `protocol` field, so it is serialized untagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProtocolParams {
    Setup(SetupParams),
    Propose(ProposeParams),
    Install(InstallParams),
    TakeAction(TakeActionParams),
    Uninstall(UninstallParams),
}

impl ProtocolParams {
    pub fn protocol(&self) -> ProtocolName {
        match self {
            ProtocolParams::Setup(_) => ProtocolName::Setup,
            ProtocolParams::Propose(_) => ProtocolName::Propose,
            ProtocolParams::Install(_) => ProtocolName::Install,
            ProtocolParams::TakeAction(_) => ProtocolName::TakeAction,
            ProtocolParams::Uninstall(_) => ProtocolName::Uninstall,
        }
    }

    pub fn initiator_identifier(&self) -> Identifier {
        match self {
            ProtocolParams::Setup(p) => p.initiator_identifier,
            ProtocolParams::Propose(p) => p.initiator_identifier,
            ProtocolParams::Install(p) => p.initiator_identifier,
            ProtocolParams::TakeAction(p) => p.initiator_identifier,
            ProtocolParams::Uninstall(p) => p.initiator_identifier,
        }
    }

    pub fn responder_identifier(&self) -> Identifier {
        match self {
            ProtocolParams::Setup(p) => p.responder_identifier,
            ProtocolParams::Propose(p) => p.responder_identifier,
            ProtocolParams::Install(p) => p.responder_identifier,
            ProtocolParams::TakeAction(p) => p.responder_identifier,
            ProtocolParams::Uninstall(p) => p.responder_identifier,
        }
    }

    /// The lock key of the run.
    pub fn multisig_address(&self) -> Address {
        match self {
            ProtocolParams::Setup(p) => p.multisig_address,
            ProtocolParams::Propose(p) => p.multisig_address,
            ProtocolParams::Install(p) => p.multisig_address,
            ProtocolParams::TakeAction(p) => p.multisig_address,
            ProtocolParams::Uninstall(p) => p.multisig_address,
        }
    }
}

/// Payload of one protocol step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepPayload {
    Signature {
        signature: Signature,
    },
    /// Two signatures over different commitments, e.g. the conditional
    /// transaction and the free balance update of Install.
    Signatures {
        signature: Signature,
        signature2: Signature,
    },
    /// Final acknowledgement, the sender has persisted the run's result.
    DataPersisted,
}

impl StepPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            StepPayload::Signature { .. } => "signature",
            StepPayload::Signatures { .. } => "signatures",
            StepPayload::DataPersisted => "dataPersisted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawProtocolMessage")]
pub struct ProtocolMessage {
    #[serde(rename = "processID")]
    pub process_id: ProcessId,
    pub protocol: ProtocolName,
    pub params: ProtocolParams,
    pub seq: Seq,
    pub to: Identifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Identifier>,
    pub custom_data: StepPayload,
}

/// [ProtocolMessage] before its params are interpreted.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProtocolMessage {
    #[serde(rename = "processID")]
    process_id: ProcessId,
    protocol: ProtocolName,
    params: serde_json::Value,
    seq: Seq,
    to: Identifier,
    #[serde(default)]
    from: Option<Identifier>,
    custom_data: StepPayload,
}

impl TryFrom<RawProtocolMessage> for ProtocolMessage {
    type Error = serde_json::Error;

    fn try_from(raw: RawProtocolMessage) -> Result<Self, Self::Error> {
        let params = match raw.protocol {
            ProtocolName::Setup => ProtocolParams::Setup(serde_json::from_value(raw.params)?),
            ProtocolName::Propose => ProtocolParams::Propose(serde_json::from_value(raw.params)?),
            ProtocolName::Install => ProtocolParams::Install(serde_json::from_value(raw.params)?),
            ProtocolName::TakeAction => {
                ProtocolParams::TakeAction(serde_json::from_value(raw.params)?)
            }
            ProtocolName::Uninstall => {
                ProtocolParams::Uninstall(serde_json::from_value(raw.params)?)
            }
        };
        Ok(Self {
            process_id: raw.process_id,
            protocol: raw.protocol,
            params,
            seq: raw.seq,
            to: raw.to,
            from: raw.from,
            custom_data: raw.custom_data,
        })
    }
}

/// Published once a run completed on this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolEvent {
    #[serde(rename = "processID")]
    pub process_id: ProcessId,
    pub protocol: ProtocolName,
    pub multisig_address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_identity_hash: Option<Hash>,
    /// Whether this side started the run.
    pub initiated: bool,
}

impl ProtocolEvent {
    /// Subject the event is published under, e.g. `protocol.install.0xab..`.
    pub fn subject(&self) -> String {
        format!("protocol.{}.{}", self.protocol, self.multisig_address)
    }
}
