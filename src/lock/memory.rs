use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{sync::watch, time::Instant};
use tracing::debug;

use super::{AcquireAttempt, LockBackend, LockError, LockToken};

#[derive(Debug)]
struct Lease {
    token: LockToken,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Leases {
    held: HashMap<String, Lease>,
    released: HashMap<String, watch::Sender<u64>>,
}

/// Leases of a single process.
#[derive(Debug, Default)]
pub struct MemoryLockBackend {
    leases: Mutex<Leases>,
}

impl MemoryLockBackend {
    fn leases(&self) -> std::sync::MutexGuard<'_, Leases> {
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Leases {
    /// Forget the release notifier of a key nobody holds or waits for.
    fn prune(&mut self, key: &str) {
        if self.held.contains_key(key) {
            return;
        }
        if let Some(tx) = self.released.get(key) {
            if tx.receiver_count() == 0 {
                self.released.remove(key);
            }
        }
    }
}

#[async_trait]
impl LockBackend for MemoryLockBackend {
    async fn try_acquire(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<AcquireAttempt, LockError> {
        let mut leases = self.leases();
        let now = Instant::now();
        if let Some(lease) = leases.held.get(key) {
            if lease.expires_at > now && lease.token != *token {
                return Ok(AcquireAttempt::Held {
                    expires_in: lease.expires_at - now,
                });
            }
            if lease.token != *token {
                debug!(key, stale = %lease.token, "reclaiming expired lease");
            }
        }
        leases.held.insert(
            key.to_string(),
            Lease {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(AcquireAttempt::Acquired)
    }

    async fn renew(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut leases = self.leases();
        match leases.held.get_mut(key) {
            Some(lease) if lease.token == *token => {
                lease.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError> {
        let mut leases = self.leases();
        let released = match leases.held.get(key) {
            Some(lease) if lease.token == *token => {
                leases.held.remove(key);
                if let Some(tx) = leases.released.get(key) {
                    tx.send_modify(|n| *n = n.wrapping_add(1));
                }
                true
            }
            _ => false,
        };
        leases.prune(key);
        Ok(released)
    }

    fn subscribe(&self, key: &str) -> watch::Receiver<u64> {
        self.leases()
            .released
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }
}
