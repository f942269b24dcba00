use std::collections::BTreeMap;

use crate::{
    abiencode::{
        types::{Address, Hash},
        Token,
    },
    channel::{AppInterface, Deposits, OutcomeType, StateChannel},
    messages::{
        InstallParams, ProposeParams, ProtocolMessage, ProtocolParams, SetupParams,
        TakeActionParams, UninstallParams,
    },
    protocol::{ProtocolError, ProtocolOutput, ProtocolRunner},
    sig::Identifier,
};

/// An app to propose, see [ChannelClient::propose_install].
#[derive(Debug, Clone)]
pub struct AppProposal {
    pub app_interface: AppInterface,
    pub deposits: Deposits,
    pub default_timeout: u64,
    pub state_timeout: u64,
    pub initial_state: Token,
    pub outcome_type: OutcomeType,
    pub meta: BTreeMap<String, String>,
    pub disable_limit: bool,
}

/// Entry point for applications: one party's view on its channels.
///
/// Every call runs one protocol with this party as initiator, the
/// counterparty is looked up in the channel.
#[derive(Debug, Clone)]
pub struct ChannelClient {
    runner: ProtocolRunner,
}

impl ChannelClient {
    pub fn new(runner: ProtocolRunner) -> Self {
        ChannelClient { runner }
    }

    pub fn runner(&self) -> &ProtocolRunner {
        &self.runner
    }

    pub fn identifier(&self) -> Identifier {
        self.runner.identifier()
    }

    /// Pass an incoming message on to the runner.
    pub fn handle_message(&self, msg: ProtocolMessage) {
        // The responder run reports its own outcome through logs and events.
        let _ = self.runner.handle_message(msg);
    }

    pub async fn get_state_channel(
        &self,
        multisig: Address,
    ) -> Result<Option<StateChannel>, ProtocolError> {
        Ok(self.runner.store().get_state_channel(multisig).await?)
    }

    pub async fn create_channel(
        &self,
        responder: Identifier,
        multisig: Address,
    ) -> Result<StateChannel, ProtocolError> {
        let out = self
            .runner
            .initiate(ProtocolParams::Setup(SetupParams {
                initiator_identifier: self.identifier(),
                responder_identifier: responder,
                multisig_address: multisig,
            }))
            .await?;
        Ok(out.channel)
    }

    /// Propose `app` in the channel of `multisig`, returning the identity
    /// hash it was assigned.
    pub async fn propose_install(
        &self,
        multisig: Address,
        app: AppProposal,
    ) -> Result<Hash, ProtocolError> {
        let me = self.identifier();
        let counterparty = self.counterparty(multisig).await?;
        let out = self
            .runner
            .initiate(ProtocolParams::Propose(ProposeParams {
                initiator_identifier: me,
                responder_identifier: counterparty,
                multisig_address: multisig,
                app_interface: app.app_interface,
                deposits: app.deposits,
                default_timeout: app.default_timeout,
                state_timeout: app.state_timeout,
                initial_state: app.initial_state,
                outcome_type: app.outcome_type,
                meta: app.meta,
                disable_limit: app.disable_limit,
            }))
            .await?;
        identity_hash(out)
    }

    pub async fn install(&self, app_identity_hash: Hash) -> Result<StateChannel, ProtocolError> {
        let (multisig, counterparty) = self.locate(app_identity_hash).await?;
        let out = self
            .runner
            .initiate(ProtocolParams::Install(InstallParams {
                initiator_identifier: self.identifier(),
                responder_identifier: counterparty,
                multisig_address: multisig,
                app_identity_hash,
            }))
            .await?;
        Ok(out.channel)
    }

    pub async fn take_action(
        &self,
        app_identity_hash: Hash,
        action: Token,
        state_timeout: u64,
    ) -> Result<StateChannel, ProtocolError> {
        let (multisig, counterparty) = self.locate(app_identity_hash).await?;
        let out = self
            .runner
            .initiate(ProtocolParams::TakeAction(TakeActionParams {
                initiator_identifier: self.identifier(),
                responder_identifier: counterparty,
                multisig_address: multisig,
                app_identity_hash,
                action,
                state_timeout,
            }))
            .await?;
        Ok(out.channel)
    }

    pub async fn uninstall(&self, app_identity_hash: Hash) -> Result<StateChannel, ProtocolError> {
        let (multisig, counterparty) = self.locate(app_identity_hash).await?;
        let out = self
            .runner
            .initiate(ProtocolParams::Uninstall(UninstallParams {
                initiator_identifier: self.identifier(),
                responder_identifier: counterparty,
                multisig_address: multisig,
                app_identity_hash,
            }))
            .await?;
        Ok(out.channel)
    }

    async fn counterparty(&self, multisig: Address) -> Result<Identifier, ProtocolError> {
        let channel = self
            .get_state_channel(multisig)
            .await?
            .ok_or(ProtocolError::NoChannel(multisig))?;
        Ok(channel.counterparty_of(&self.identifier())?)
    }

    /// Multisig and counterparty of the channel holding an app or proposal.
    async fn locate(
        &self,
        app_identity_hash: Hash,
    ) -> Result<(Address, Identifier), ProtocolError> {
        let channel = self
            .runner
            .store()
            .get_state_channel_by_app_identity_hash(app_identity_hash)
            .await?
            .ok_or(crate::channel::ModelError::NoSuchApp(app_identity_hash))?;
        let counterparty = channel.counterparty_of(&self.identifier())?;
        Ok((channel.multisig_address(), counterparty))
    }
}

fn identity_hash(out: ProtocolOutput) -> Result<Hash, ProtocolError> {
    out.app_identity_hash
        .ok_or(ProtocolError::UnexpectedOpcodeResult("propose"))
}
