use super::{
    capabilities::AppLogic,
    error::signature_error,
    opcode::{Role, ValidationContext},
    ProtocolError,
};
use crate::{
    abiencode::types::{Hash, Signature},
    channel::{AppInstance, AppInstanceProposal, StateChannel},
    commitment::{ConditionalTransactionCommitment, SetStateCommitment, SetupCommitment},
    config::EngineConfig,
    messages::{ProcessId, ProtocolMessage, ProtocolParams, Seq, StepPayload},
    sig::{self, Identifier},
    store::Store,
};

/// Read-only inputs of one run.
pub(crate) struct Context<'a> {
    pub config: &'a EngineConfig,
    pub me: Identifier,
    pub role: Role,
    pub process_id: ProcessId,
    pub params: &'a ProtocolParams,
    pub store: &'a dyn Store,
    pub app_logic: &'a dyn AppLogic,
}

impl<'a> Context<'a> {
    /// The other party of the run. Fails unless we are the party our role
    /// says we are.
    pub fn counterparty(&self) -> Result<Identifier, ProtocolError> {
        let (mine, theirs) = match self.role {
            Role::Initiator => (
                self.params.initiator_identifier(),
                self.params.responder_identifier(),
            ),
            Role::Responder => (
                self.params.responder_identifier(),
                self.params.initiator_identifier(),
            ),
        };
        if mine != self.me {
            return Err(ProtocolError::NotAParticipant(self.me));
        }
        Ok(theirs)
    }

    pub async fn load_channel(&self) -> Result<StateChannel, ProtocolError> {
        let multisig = self.params.multisig_address();
        self.store
            .get_state_channel(multisig)
            .await?
            .ok_or(ProtocolError::NoChannel(multisig))
    }

    pub fn message(&self, to: Identifier, seq: Seq, custom_data: StepPayload) -> ProtocolMessage {
        ProtocolMessage {
            process_id: self.process_id,
            protocol: self.params.protocol(),
            params: self.params.clone(),
            seq,
            to,
            from: Some(self.me),
            custom_data,
        }
    }

    pub fn validation(
        &self,
        state_channel: Option<&StateChannel>,
        app_instance: Option<&AppInstance>,
    ) -> ValidationContext {
        ValidationContext {
            protocol: self.params.protocol(),
            role: self.role,
            params: self.params.clone(),
            state_channel: state_channel.cloned(),
            app_instance: app_instance.cloned(),
            proposal: None,
        }
    }

    pub fn setup_commitment(&self, channel: &StateChannel) -> SetupCommitment {
        SetupCommitment::new(
            &self.config.network,
            channel.multisig_address(),
            *channel.multisig_owners(),
            channel.free_balance().identity_hash(),
        )
    }

    /// SetState commitment of the latest state of `app`.
    pub fn set_state_commitment(
        &self,
        channel: &StateChannel,
        app: &AppInstance,
    ) -> SetStateCommitment {
        SetStateCommitment::new(
            self.config.network.challenge_registry,
            app.identity(),
            app.hash_of_latest_state(),
            app.latest_version_number(),
            app.state_timeout(),
            *channel.multisig_owners(),
        )
    }

    /// SetState commitment of a proposal's initial state, at version 1.
    pub fn proposal_commitment(
        &self,
        channel: &StateChannel,
        proposal: &AppInstanceProposal,
    ) -> SetStateCommitment {
        SetStateCommitment::new(
            self.config.network.challenge_registry,
            proposal.identity(),
            proposal.hash_of_initial_state(),
            1,
            proposal.state_timeout,
            *channel.multisig_owners(),
        )
    }

    pub fn free_balance_commitment(&self, channel: &StateChannel) -> SetStateCommitment {
        self.set_state_commitment(channel, channel.free_balance())
    }

    pub fn conditional_commitment(
        &self,
        channel: &StateChannel,
        app: &AppInstance,
    ) -> ConditionalTransactionCommitment {
        let network = &self.config.network;
        let params = app.interpreter_params();
        ConditionalTransactionCommitment::new(
            network,
            channel.multisig_address(),
            *channel.multisig_owners(),
            app.identity_hash(),
            channel.free_balance().identity_hash(),
            params.interpreter_address(network),
            params.encode(),
        )
    }
}

/// The signature of `counterparty` over `digest`. The expected signer is
/// always derived from the identifier, never taken from the message.
pub(crate) fn verify_counterparty(
    counterparty: &Identifier,
    digest: Hash,
    signature: Signature,
) -> Result<(), ProtocolError> {
    sig::verify(counterparty.signer_address(), digest, signature).map_err(signature_error)
}

pub(crate) fn expect_signature(msg: &ProtocolMessage) -> Result<Signature, ProtocolError> {
    match &msg.custom_data {
        StepPayload::Signature { signature } => Ok(*signature),
        other => Err(ProtocolError::UnexpectedPayload {
            expected: "signature",
            got: other.kind(),
        }),
    }
}

pub(crate) fn expect_signatures(
    msg: &ProtocolMessage,
) -> Result<(Signature, Signature), ProtocolError> {
    match &msg.custom_data {
        StepPayload::Signatures {
            signature,
            signature2,
        } => Ok((*signature, *signature2)),
        other => Err(ProtocolError::UnexpectedPayload {
            expected: "signatures",
            got: other.kind(),
        }),
    }
}

pub(crate) fn expect_persisted(msg: &ProtocolMessage) -> Result<(), ProtocolError> {
    match &msg.custom_data {
        StepPayload::DataPersisted => Ok(()),
        other => Err(ProtocolError::UnexpectedPayload {
            expected: "dataPersisted",
            got: other.kind(),
        }),
    }
}
