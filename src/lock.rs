//! Mutual exclusion per key, used to serialize protocol runs per multisig.
//!
//! Holders get a lease that expires after [LockConfig::ttl]. While the work
//! guarded by the lock is driven through [LockService::hold], the lease is
//! renewed every third of the TTL, so only a holder whose task is gone loses
//! it. Waiters wake up when the key is released or the lease runs out and
//! then race for the lock, there is no strict FIFO order.

mod memory;

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use rand::Rng;
use tokio::{
    sync::watch,
    time::{interval_at, sleep_until, Instant, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::config::LockConfig;

pub use memory::MemoryLockBackend;


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("lock queue for {key} is full ({max} waiters)")]
    QueueFull { key: String, max: usize },
    #[error("lock {key} expired after {after:?}")]
    Expired { key: String, after: Duration },
    #[error("lock backend failed: {0}")]
    Backend(String),
}

/// Proof of holding a lock, needed to release it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn random() -> Self {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockToken({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireAttempt {
    Acquired,
    /// Someone else holds the lease for at most `expires_in`.
    Held { expires_in: Duration },
}

/// Lease storage. Processes sharing a backend exclude each other.
#[async_trait]
pub trait LockBackend: Send + Sync + fmt::Debug {
    /// Take the lease if it is free or expired. Never blocks.
    async fn try_acquire(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<AcquireAttempt, LockError>;

    /// Extend the lease of `token` to `ttl` from now. Returns `false` if
    /// `token` no longer holds the lease.
    async fn renew(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError>;

    /// Drop the lease if `token` still holds it. Returns `false` if the lease
    /// expired and was reclaimed in the meantime.
    async fn release(&self, key: &str, token: &LockToken) -> Result<bool, LockError>;

    /// Changes whenever the lease of `key` is released.
    fn subscribe(&self, key: &str) -> watch::Receiver<u64>;
}

#[derive(Debug, Clone)]
pub struct LockService {
    backend: Arc<dyn LockBackend>,
    config: LockConfig,
    waiters: Arc<Mutex<HashMap<String, usize>>>,
}

/// A place in the waiter queue of one key, given up on drop.
struct QueueSlot {
    waiters: Arc<Mutex<HashMap<String, usize>>>,
    key: String,
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = waiters.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                waiters.remove(&self.key);
            }
        }
    }
}

impl LockService {
    pub fn new(backend: Arc<dyn LockBackend>, config: LockConfig) -> Self {
        Self {
            backend,
            config,
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn in_memory(config: LockConfig) -> Self {
        Self::new(Arc::new(MemoryLockBackend::default()), config)
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    fn enter_queue(&self, key: &str) -> Result<QueueSlot, LockError> {
        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        let count = waiters.entry(key.to_string()).or_insert(0);
        if *count >= self.config.max_waiters {
            return Err(LockError::QueueFull {
                key: key.to_string(),
                max: self.config.max_waiters,
            });
        }
        *count += 1;
        Ok(QueueSlot {
            waiters: self.waiters.clone(),
            key: key.to_string(),
        })
    }

    /// Wait until `key` is ours or [LockConfig::acquire_timeout] elapsed.
    pub async fn acquire(&self, key: &str) -> Result<LockToken, LockError> {
        let token = LockToken::random();
        let ttl = self.config.ttl();
        let timeout = self.config.acquire_timeout();
        let deadline = Instant::now() + timeout;

        // Subscribe before the first attempt so a release in between is seen.
        let mut released = self.backend.subscribe(key);
        let mut slot = None;

        loop {
            let expires_in = match self.backend.try_acquire(key, &token, ttl).await? {
                AcquireAttempt::Acquired => {
                    debug!(key, token = %token, "lock acquired");
                    return Ok(token);
                }
                AcquireAttempt::Held { expires_in } => expires_in,
            };

            if slot.is_none() {
                slot = Some(self.enter_queue(key)?);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(key, ?timeout, "giving up on lock");
                // Lets the backend forget the key if nobody else cares.
                drop(released);
                self.backend.release(key, &token).await?;
                return Err(LockError::Expired {
                    key: key.to_string(),
                    after: timeout,
                });
            }

            let wake = (now + expires_in).min(deadline);
            tokio::select! {
                changed = released.changed() => {
                    if changed.is_err() {
                        sleep_until(wake).await;
                    }
                }
                _ = sleep_until(wake) => {}
            }
        }
    }

    /// Releasing a lease that already expired is a no-op.
    pub async fn release(&self, key: &str, token: &LockToken) -> Result<(), LockError> {
        if self.backend.release(key, token).await? {
            debug!(key, token = %token, "lock released");
        } else {
            warn!(key, token = %token, "lease expired before release");
        }
        Ok(())
    }

    /// Drive `fut` to completion while keeping the lease of `token` alive.
    pub async fn hold<F, T>(&self, key: &str, token: &LockToken, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let ttl = self.config.ttl();
        let every = (ttl / 3).max(Duration::from_millis(1));
        let mut renewal = interval_at(Instant::now() + every, every);
        renewal.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(fut);

        loop {
            tokio::select! {
                out = &mut fut => return out,
                _ = renewal.tick() => match self.backend.renew(key, token, ttl).await {
                    Ok(true) => debug!(key, token = %token, "lease renewed"),
                    Ok(false) => warn!(key, token = %token, "lease lost while held"),
                    Err(e) => warn!(key, error = %e, "failed to renew lease"),
                },
            }
        }
    }

    /// Run `fut` while holding `key`, releasing afterwards.
    pub async fn with_lock<F, T>(&self, key: &str, fut: F) -> Result<T, LockError>
    where
        F: Future<Output = T>,
    {
        let token = self.acquire(key).await?;
        let out = self.hold(key, &token, fut).await;
        self.release(key, &token).await?;
        Ok(out)
    }
}
