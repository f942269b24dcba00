//! Persistence of channel snapshots and the commitments backing them.
//!
//! Every write takes the complete post-state of the channel together with the
//! commitments of the step and applies all of it atomically, a failed write
//! leaves the previous snapshot in place.

mod memory;

use async_trait::async_trait;

pub use memory::MemoryStore;

use crate::{
    abiencode::types::{Address, Hash},
    channel::{AppInstanceProposal, StateChannel},
    commitment::{ConditionalTransactionCommitment, SetStateCommitment, SetupCommitment},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state channel {0} already exists")]
    ChannelExists(Address),
    #[error("no state channel {0}")]
    NoChannel(Address),
    #[error("snapshot schema version {found} is not supported (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },
    #[error("corrupt record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    WriteFailed(String),
}

pub type Result<T> = core::result::Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync + core::fmt::Debug {
    async fn get_state_channel(&self, multisig: Address) -> Result<Option<StateChannel>>;

    /// The channel an installed app or pending proposal belongs to.
    async fn get_state_channel_by_app_identity_hash(
        &self,
        app_identity_hash: Hash,
    ) -> Result<Option<StateChannel>>;

    /// Owners in either order.
    async fn get_state_channel_by_owners(&self, owners: [Address; 2])
        -> Result<Option<StateChannel>>;

    async fn get_app_proposal(&self, app_identity_hash: Hash)
        -> Result<Option<AppInstanceProposal>>;

    /// Latest SetState commitment of an app, including the free balance.
    async fn get_set_state_commitment(
        &self,
        app_identity_hash: Hash,
    ) -> Result<Option<SetStateCommitment>>;

    async fn get_conditional_transaction_commitment(
        &self,
        app_identity_hash: Hash,
    ) -> Result<Option<ConditionalTransactionCommitment>>;

    async fn get_setup_commitment(&self, multisig: Address) -> Result<Option<SetupCommitment>>;

    async fn create_state_channel(
        &self,
        channel: &StateChannel,
        setup: &SetupCommitment,
        free_balance_update: &SetStateCommitment,
    ) -> Result<()>;

    async fn create_app_proposal(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        initial_state: &SetStateCommitment,
    ) -> Result<()>;

    async fn create_app_instance(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        free_balance_update: &SetStateCommitment,
        conditional: &ConditionalTransactionCommitment,
    ) -> Result<()>;

    async fn update_app_instance(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        update: &SetStateCommitment,
    ) -> Result<()>;

    async fn remove_app_instance(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        free_balance_update: &SetStateCommitment,
    ) -> Result<()>;

    async fn remove_app_proposal(&self, channel: &StateChannel, app_identity_hash: Hash)
        -> Result<()>;
}
