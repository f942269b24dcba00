use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Result, Store, StoreError};
use crate::{
    abiencode::types::{Address, Hash},
    channel::{AppInstanceProposal, StateChannel, SCHEMA_VERSION},
    commitment::{ConditionalTransactionCommitment, SetStateCommitment, SetupCommitment},
};

/// Records are kept as JSON strings, like a key value store would.
#[derive(Debug, Default, Clone)]
struct Tables {
    channels: BTreeMap<Address, String>,
    setup: BTreeMap<Address, String>,
    set_state: BTreeMap<Hash, String>,
    conditional: BTreeMap<Hash, String>,
}

impl Tables {
    fn put_channel(&mut self, channel: &StateChannel) -> Result<()> {
        self.channels
            .insert(channel.multisig_address(), serde_json::to_string(channel)?);
        Ok(())
    }

    /// The free balance update, keyed by the free balance identity hash.
    fn put_set_state(&mut self, commitment: &SetStateCommitment) -> Result<()> {
        self.set_state
            .insert(commitment.app_identity_hash, serde_json::to_string(commitment)?);
        Ok(())
    }

    fn require_channel(&self, multisig: Address) -> Result<()> {
        if self.channels.contains_key(&multisig) {
            Ok(())
        } else {
            Err(StoreError::NoChannel(multisig))
        }
    }
}

fn decode<T: DeserializeOwned>(record: Option<&String>) -> Result<Option<T>> {
    record
        .map(|json| serde_json::from_str(json))
        .transpose()
        .map_err(StoreError::from)
}

fn decode_channel(json: &str) -> Result<StateChannel> {
    let channel: StateChannel = serde_json::from_str(json)?;
    if channel.schema_version() != SCHEMA_VERSION {
        return Err(StoreError::UnsupportedSchema {
            found: channel.schema_version(),
            expected: SCHEMA_VERSION,
        });
    }
    Ok(channel)
}

/// In-process [Store].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail, for exercising abort paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored channels.
    pub async fn channel_count(&self) -> usize {
        self.tables.read().await.channels.len()
    }

    /// Apply `write` to a copy of the tables and swap it in only if every
    /// part succeeded.
    async fn write<F>(&self, what: &str, write: F) -> Result<()>
    where
        F: FnOnce(&mut Tables) -> Result<()> + Send,
    {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed(what.to_string()));
        }
        let mut tables = self.tables.write().await;
        let mut next = tables.clone();
        write(&mut next)?;
        *tables = next;
        debug!(what, "store write");
        Ok(())
    }

    async fn find_channel<P>(&self, mut pred: P) -> Result<Option<StateChannel>>
    where
        P: FnMut(&StateChannel) -> bool + Send,
    {
        let tables = self.tables.read().await;
        for json in tables.channels.values() {
            let channel = decode_channel(json)?;
            if pred(&channel) {
                return Ok(Some(channel));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_state_channel(&self, multisig: Address) -> Result<Option<StateChannel>> {
        let tables = self.tables.read().await;
        tables
            .channels
            .get(&multisig)
            .map(|json| decode_channel(json))
            .transpose()
    }

    async fn get_state_channel_by_app_identity_hash(
        &self,
        app_identity_hash: Hash,
    ) -> Result<Option<StateChannel>> {
        self.find_channel(|channel| {
            channel.free_balance().identity_hash() == app_identity_hash
                || channel.app_instances().contains_key(&app_identity_hash)
                || channel
                    .proposed_app_instances()
                    .contains_key(&app_identity_hash)
        })
        .await
    }

    async fn get_state_channel_by_owners(
        &self,
        owners: [Address; 2],
    ) -> Result<Option<StateChannel>> {
        let [a, b] = owners;
        self.find_channel(|channel| {
            let [x, y] = *channel.multisig_owners();
            (x, y) == (a, b) || (x, y) == (b, a)
        })
        .await
    }

    async fn get_app_proposal(
        &self,
        app_identity_hash: Hash,
    ) -> Result<Option<AppInstanceProposal>> {
        Ok(self
            .get_state_channel_by_app_identity_hash(app_identity_hash)
            .await?
            .and_then(|channel| {
                channel
                    .proposed_app_instances()
                    .get(&app_identity_hash)
                    .cloned()
            }))
    }

    async fn get_set_state_commitment(
        &self,
        app_identity_hash: Hash,
    ) -> Result<Option<SetStateCommitment>> {
        decode(self.tables.read().await.set_state.get(&app_identity_hash))
    }

    async fn get_conditional_transaction_commitment(
        &self,
        app_identity_hash: Hash,
    ) -> Result<Option<ConditionalTransactionCommitment>> {
        decode(self.tables.read().await.conditional.get(&app_identity_hash))
    }

    async fn get_setup_commitment(&self, multisig: Address) -> Result<Option<SetupCommitment>> {
        decode(self.tables.read().await.setup.get(&multisig))
    }

    async fn create_state_channel(
        &self,
        channel: &StateChannel,
        setup: &SetupCommitment,
        free_balance_update: &SetStateCommitment,
    ) -> Result<()> {
        self.write("create_state_channel", |tables| {
            let multisig = channel.multisig_address();
            if tables.channels.contains_key(&multisig) {
                return Err(StoreError::ChannelExists(multisig));
            }
            tables.put_channel(channel)?;
            tables
                .setup
                .insert(multisig, serde_json::to_string(setup)?);
            tables.put_set_state(free_balance_update)
        })
        .await
    }

    async fn create_app_proposal(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        initial_state: &SetStateCommitment,
    ) -> Result<()> {
        self.write("create_app_proposal", |tables| {
            tables.require_channel(channel.multisig_address())?;
            tables.put_channel(channel)?;
            tables
                .set_state
                .insert(app_identity_hash, serde_json::to_string(initial_state)?);
            Ok(())
        })
        .await
    }

    async fn create_app_instance(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        free_balance_update: &SetStateCommitment,
        conditional: &ConditionalTransactionCommitment,
    ) -> Result<()> {
        self.write("create_app_instance", |tables| {
            tables.require_channel(channel.multisig_address())?;
            tables.put_channel(channel)?;
            tables.put_set_state(free_balance_update)?;
            tables
                .conditional
                .insert(app_identity_hash, serde_json::to_string(conditional)?);
            Ok(())
        })
        .await
    }

    async fn update_app_instance(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        update: &SetStateCommitment,
    ) -> Result<()> {
        self.write("update_app_instance", |tables| {
            tables.require_channel(channel.multisig_address())?;
            tables.put_channel(channel)?;
            tables
                .set_state
                .insert(app_identity_hash, serde_json::to_string(update)?);
            Ok(())
        })
        .await
    }

    async fn remove_app_instance(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
        free_balance_update: &SetStateCommitment,
    ) -> Result<()> {
        self.write("remove_app_instance", |tables| {
            tables.require_channel(channel.multisig_address())?;
            tables.put_channel(channel)?;
            tables.put_set_state(free_balance_update)?;
            tables.set_state.remove(&app_identity_hash);
            tables.conditional.remove(&app_identity_hash);
            Ok(())
        })
        .await
    }

    async fn remove_app_proposal(
        &self,
        channel: &StateChannel,
        app_identity_hash: Hash,
    ) -> Result<()> {
        self.write("remove_app_proposal", |tables| {
            tables.require_channel(channel.multisig_address())?;
            tables.put_channel(channel)?;
            tables.set_state.remove(&app_identity_hash);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::CriticalStateChannelAddresses,
        commitment::Commitment,
        config::{EngineConfig, NetworkContext},
        sig::{ChannelSigner, Signer},
    };
    use rand::{rngs::StdRng, SeedableRng};

    fn fixture() -> (StateChannel, SetupCommitment, SetStateCommitment) {
        let mut rng = StdRng::seed_from_u64(11);
        let config = EngineConfig::new(NetworkContext::random(&mut rng));
        let alice = Signer::new(&mut rng);
        let bob = Signer::new(&mut rng);
        let channel = StateChannel::setup_channel(
            config.network.identity_app,
            CriticalStateChannelAddresses {
                proxy_factory: config.network.proxy_factory,
                multisig_mastercopy: config.network.multisig_mastercopy,
            },
            Address([0x11; 20]),
            alice.identifier(),
            bob.identifier(),
            &config.free_balance,
        )
        .unwrap();
        let fb = channel.free_balance();
        let setup = SetupCommitment::new(
            &config.network,
            channel.multisig_address(),
            *channel.multisig_owners(),
            fb.identity_hash(),
        );
        let update = SetStateCommitment::new(
            config.network.challenge_registry,
            fb.identity(),
            fb.hash_of_latest_state(),
            fb.latest_version_number(),
            fb.state_timeout(),
            *channel.multisig_owners(),
        );
        (channel, setup, update)
    }

    #[tokio::test]
    async fn create_and_load_channel() {
        let store = MemoryStore::new();
        let (channel, setup, update) = fixture();
        store
            .create_state_channel(&channel, &setup, &update)
            .await
            .unwrap();

        let multisig = channel.multisig_address();
        assert_eq!(store.get_state_channel(multisig).await.unwrap(), Some(channel.clone()));
        assert_eq!(store.get_setup_commitment(multisig).await.unwrap(), Some(setup));

        let fb_hash = channel.free_balance().identity_hash();
        let loaded = store.get_set_state_commitment(fb_hash).await.unwrap().unwrap();
        assert_eq!(loaded.hash_to_sign(), update.hash_to_sign());

        let [a, b] = *channel.multisig_owners();
        assert!(store.get_state_channel_by_owners([b, a]).await.unwrap().is_some());
        assert!(store
            .get_state_channel_by_app_identity_hash(fb_hash)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let store = MemoryStore::new();
        let (channel, setup, update) = fixture();
        store
            .create_state_channel(&channel, &setup, &update)
            .await
            .unwrap();
        assert!(matches!(
            store.create_state_channel(&channel, &setup, &update).await,
            Err(StoreError::ChannelExists(_))
        ));
    }

    #[tokio::test]
    async fn failed_writes_change_nothing() {
        let store = MemoryStore::new();
        let (channel, setup, update) = fixture();
        store.set_fail_writes(true);
        assert!(store
            .create_state_channel(&channel, &setup, &update)
            .await
            .is_err());
        assert_eq!(store.channel_count().await, 0);

        // Updates of unknown channels are rejected as a whole.
        store.set_fail_writes(false);
        assert!(matches!(
            store
                .update_app_instance(&channel, Hash([1; 32]), &update)
                .await,
            Err(StoreError::NoChannel(_))
        ));
        assert!(store
            .get_set_state_commitment(Hash([1; 32]))
            .await
            .unwrap()
            .is_none());
    }
}
