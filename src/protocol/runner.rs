use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use tokio::{
    sync::{broadcast, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, info_span, warn, Instrument};

use super::{
    context::Context, install, propose, setup, take_action, uninstall, AcceptAll, AppLogic,
    Effects, Opcode, OpcodeResult, PersistCommand, ProtocolError, Role, Validator, Verdict,
};
use crate::{
    abiencode::types::Hash,
    channel::StateChannel,
    config::EngineConfig,
    lock::LockService,
    messages::{ProcessId, ProtocolEvent, ProtocolMessage, ProtocolParams, Seq},
    sig::{ChannelSigner, Identifier},
    store::Store,
    wire::{Transport, TransportError},
};

type Pending = Arc<Mutex<HashMap<ProcessId, oneshot::Sender<ProtocolMessage>>>>;

/// Capacity of the local event channel, slow subscribers miss events.
const EVENT_CAPACITY: usize = 64;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolOutput {
    /// The channel as persisted by the run.
    pub channel: StateChannel,
    /// The app the run proposed, installed, updated or removed.
    pub app_identity_hash: Option<Hash>,
}

/// Executes protocol runs for one party.
///
/// Runs on the same multisig are serialized through the [LockService], runs
/// on different channels proceed concurrently. Incoming messages have to be
/// handed to [ProtocolRunner::handle_message] by whoever receives them.
#[derive(Debug, Clone)]
pub struct ProtocolRunner {
    config: Arc<EngineConfig>,
    signer: Arc<dyn ChannelSigner>,
    store: Arc<dyn Store>,
    transport: Arc<dyn Transport>,
    app_logic: Arc<dyn AppLogic>,
    validator: Arc<dyn Validator>,
    locks: LockService,
    pending: Pending,
    events: broadcast::Sender<ProtocolEvent>,
}

impl ProtocolRunner {
    /// A runner that accepts every transition and locks in memory.
    pub fn new(
        config: EngineConfig,
        signer: Arc<dyn ChannelSigner>,
        store: Arc<dyn Store>,
        transport: Arc<dyn Transport>,
        app_logic: Arc<dyn AppLogic>,
    ) -> Self {
        let locks = LockService::in_memory(config.lock.clone());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config: Arc::new(config),
            signer,
            store,
            transport,
            app_logic,
            validator: Arc::new(AcceptAll),
            locks,
            pending: Arc::default(),
            events,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// Share locks with other runners, e.g. other processes serving the
    /// same party.
    pub fn with_locks(mut self, locks: LockService) -> Self {
        self.locks = locks;
        self
    }

    pub fn identifier(&self) -> Identifier {
        self.signer.identifier()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Events of all runs completed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.events.subscribe()
    }

    /// Run a protocol as initiator and wait for it to complete.
    pub async fn initiate(&self, params: ProtocolParams) -> Result<ProtocolOutput, ProtocolError> {
        self.run(ProcessId::new(), params, None).await
    }

    /// Route an incoming message.
    ///
    /// Replies go to the run waiting for them. The first message of a run we
    /// did not start spawns the responder side, whose handle is returned.
    /// Everything else, including messages we sent ourselves, is dropped.
    pub fn handle_message(
        &self,
        msg: ProtocolMessage,
    ) -> Option<JoinHandle<Result<ProtocolOutput, ProtocolError>>> {
        let me = self.identifier();
        let process_id = msg.process_id;
        if msg.from == Some(me) {
            debug!(%process_id, protocol = %msg.protocol, "ignoring message sent by us");
            return None;
        }
        if msg.to != me {
            warn!(%process_id, to = %msg.to, "dropping message addressed to someone else");
            return None;
        }

        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&process_id);
        if let Some(waiter) = waiter {
            if waiter.send(msg).is_err() {
                debug!(%process_id, "waiter gave up before the reply arrived");
            }
            return None;
        }

        match msg.seq {
            Seq::Step(1) => {
                let runner = self.clone();
                Some(tokio::spawn(async move {
                    let params = msg.params.clone();
                    runner.run(process_id, params, Some(msg)).await
                }))
            }
            seq => {
                debug!(%process_id, ?seq, "no run is waiting for this message, dropping");
                None
            }
        }
    }

    async fn run(
        &self,
        process_id: ProcessId,
        params: ProtocolParams,
        msg: Option<ProtocolMessage>,
    ) -> Result<ProtocolOutput, ProtocolError> {
        let role = match msg {
            Some(_) => Role::Responder,
            None => Role::Initiator,
        };
        let protocol = params.protocol();
        let multisig = params.multisig_address();
        let span = info_span!("protocol", %protocol, %process_id, %multisig, %role);

        async move {
            info!("run started");
            let key = multisig.to_string();
            let token = self.locks.acquire(&key).await?;
            let result = self
                .locks
                .hold(&key, &token, self.execute(role, process_id, &params, msg.as_ref()))
                .await;
            if let Err(e) = self.locks.release(&key, &token).await {
                warn!(error = %e, "failed to release channel lock");
            }

            match &result {
                Ok(output) => {
                    info!("run finished");
                    self.publish(ProtocolEvent {
                        process_id,
                        protocol,
                        multisig_address: multisig,
                        app_identity_hash: output.app_identity_hash,
                        initiated: role == Role::Initiator,
                    })
                    .await;
                }
                Err(e) => warn!(error = %e, kind = ?e.kind(), "run aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        role: Role,
        process_id: ProcessId,
        params: &ProtocolParams,
        msg: Option<&ProtocolMessage>,
    ) -> Result<ProtocolOutput, ProtocolError> {
        let ctx = Context {
            config: &self.config,
            me: self.identifier(),
            role,
            process_id,
            params,
            store: self.store.as_ref(),
            app_logic: self.app_logic.as_ref(),
        };
        let mut effects = RunEffects { runner: self };
        let fx: &mut dyn Effects = &mut effects;

        match (params, msg) {
            (ProtocolParams::Setup(p), None) => setup::initiate(&ctx, fx, p).await,
            (ProtocolParams::Setup(p), Some(m)) => setup::respond(&ctx, fx, p, m).await,
            (ProtocolParams::Propose(p), None) => propose::initiate(&ctx, fx, p).await,
            (ProtocolParams::Propose(p), Some(m)) => propose::respond(&ctx, fx, p, m).await,
            (ProtocolParams::Install(p), None) => install::initiate(&ctx, fx, p).await,
            (ProtocolParams::Install(p), Some(m)) => install::respond(&ctx, fx, p, m).await,
            (ProtocolParams::TakeAction(p), None) => take_action::initiate(&ctx, fx, p).await,
            (ProtocolParams::TakeAction(p), Some(m)) => {
                take_action::respond(&ctx, fx, p, m).await
            }
            (ProtocolParams::Uninstall(p), None) => uninstall::initiate(&ctx, fx, p).await,
            (ProtocolParams::Uninstall(p), Some(m)) => uninstall::respond(&ctx, fx, p, m).await,
        }
    }

    async fn publish(&self, event: ProtocolEvent) {
        if let Err(e) = self.transport.publish(&event.subject(), &event).await {
            warn!(error = %e, "failed to publish completion event");
        }
        // Nobody listening locally is fine.
        let _ = self.events.send(event);
    }

    async fn send_and_wait(&self, msg: ProtocolMessage) -> Result<ProtocolMessage, ProtocolError> {
        let process_id = msg.process_id;
        let protocol = msg.protocol;
        let (tx, rx) = oneshot::channel();
        let _waiting = WaitingReply::register(&self.pending, process_id, tx);

        self.transport.send(&msg).await?;

        let after = self.config.protocol_timeout();
        match tokio::time::timeout(after, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                let reason = format!("reply to {} was dropped", process_id);
                Err(TransportError::Closed(reason).into())
            }
            Err(_) => Err(ProtocolError::Timeout {
                protocol,
                process_id,
                after,
            }),
        }
    }

    async fn persist(&self, cmd: PersistCommand) -> Result<(), ProtocolError> {
        debug!(multisig = %cmd.channel().multisig_address(), "persisting");
        let store = self.store.as_ref();
        match cmd {
            PersistCommand::CreateChannel {
                channel,
                setup,
                free_balance_update,
            } => {
                store
                    .create_state_channel(&channel, &setup, &free_balance_update)
                    .await?
            }
            PersistCommand::CreateProposal {
                channel,
                app_identity_hash,
                initial_state,
            } => {
                store
                    .create_app_proposal(&channel, app_identity_hash, &initial_state)
                    .await?
            }
            PersistCommand::CreateInstance {
                channel,
                app_identity_hash,
                free_balance_update,
                conditional,
            } => {
                store
                    .create_app_instance(
                        &channel,
                        app_identity_hash,
                        &free_balance_update,
                        &conditional,
                    )
                    .await?
            }
            PersistCommand::UpdateInstance {
                channel,
                app_identity_hash,
                update,
            } => {
                store
                    .update_app_instance(&channel, app_identity_hash, &update)
                    .await?
            }
            PersistCommand::RemoveInstance {
                channel,
                app_identity_hash,
                free_balance_update,
            } => {
                store
                    .remove_app_instance(&channel, app_identity_hash, &free_balance_update)
                    .await?
            }
        }
        Ok(())
    }
}

/// Registration of a send-and-wait, removed again when the wait ends.
struct WaitingReply<'a> {
    pending: &'a Pending,
    process_id: ProcessId,
}

impl<'a> WaitingReply<'a> {
    fn register(
        pending: &'a Pending,
        process_id: ProcessId,
        tx: oneshot::Sender<ProtocolMessage>,
    ) -> Self {
        pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(process_id, tx);
        Self {
            pending,
            process_id,
        }
    }
}

impl Drop for WaitingReply<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.process_id);
    }
}

/// Opcode interpreter of one run.
struct RunEffects<'a> {
    runner: &'a ProtocolRunner,
}

#[async_trait]
impl Effects for RunEffects<'_> {
    async fn execute(&mut self, op: Opcode) -> Result<OpcodeResult, ProtocolError> {
        debug!(opcode = op.name(), "executing");
        let runner = self.runner;
        match op {
            Opcode::Sign(digest) => Ok(OpcodeResult::Signature(
                runner.signer.sign_message(digest)?,
            )),
            Opcode::Validate(ctx) => match runner.validator.validate(&ctx).await {
                Verdict::Accept => Ok(OpcodeResult::Validated),
                Verdict::Reject(reason) => Err(ProtocolError::Rejected {
                    protocol: ctx.protocol,
                    reason,
                }),
            },
            Opcode::Send(msg) => {
                runner.transport.send(&msg).await?;
                Ok(OpcodeResult::Sent)
            }
            Opcode::SendAndWait(msg) => {
                let reply = runner.send_and_wait(*msg).await?;
                Ok(OpcodeResult::Reply(Box::new(reply)))
            }
            Opcode::Persist(cmd) => {
                runner.persist(*cmd).await?;
                Ok(OpcodeResult::Persisted)
            }
        }
    }
}
