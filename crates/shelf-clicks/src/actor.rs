//! Per-key click actors.
//!
//! Each product key maps to an [`ActorId`] and every id gets exactly one
//! task with an mpsc mailbox. The task handles one command at a time, so
//! all operations on a key are totally ordered. Replies come back over
//! oneshot channels.
//!
//! Ids only route commands. State is stored under the product key itself,
//! so two keys whose ids collide share a task but never a counter.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shelf_cache::{cache_key, Cache};
use shelf_core::{ClicksConfig, ProductKey};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::event::{ClickEvent, ClickStats};
use crate::{ClickError, ClickResult};

const MAILBOX_CAPACITY: usize = 64;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

type Registry = Arc<Mutex<HashMap<ActorId, mpsc::Sender<Command>>>>;

/// Stable actor address derived from a product key (64-bit FNV-1a).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorId(u64);

impl ActorId {
    pub fn for_key(key: &ProductKey) -> Self {
        let hash = key
            .as_str()
            .bytes()
            .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME));
        Self(hash)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Store key of a product's actor-owned counter.
pub fn actor_count_key(key: &ProductKey) -> String {
    cache_key!("actor", key, "count")
}

/// Store key of a product's actor-owned recent clicks.
pub fn actor_clicks_key(key: &ProductKey) -> String {
    cache_key!("actor", key, "clicks")
}

enum Command {
    Record {
        event: ClickEvent,
        reply: oneshot::Sender<ClickResult<u64>>,
    },
    Stats {
        key: ProductKey,
        reply: oneshot::Sender<ClickResult<ClickStats>>,
    },
    Clear {
        key: ProductKey,
        reply: oneshot::Sender<ClickResult<()>>,
    },
}

struct ClickActor {
    id: ActorId,
    store: Cache,
    recent_limit: usize,
    idle: Duration,
    registry: Registry,
}

impl ClickActor {
    async fn run(self, mut mailbox: mpsc::Receiver<Command>) {
        debug!(actor = %self.id, "click actor started");
        loop {
            match tokio::time::timeout(self.idle, mailbox.recv()).await {
                Ok(Some(command)) => self.handle(command).await,
                Ok(None) => break,
                Err(_) => {
                    // Refuse new sends, then finish whatever is already queued.
                    mailbox.close();
                    while let Some(command) = mailbox.recv().await {
                        self.handle(command).await;
                    }
                    break;
                }
            }
        }

        let mut registry = self.registry.lock();
        if registry.get(&self.id).is_some_and(|tx| tx.is_closed()) {
            registry.remove(&self.id);
        }
        debug!(actor = %self.id, "click actor stopped");
    }

    async fn handle(&self, command: Command) {
        // A dropped reply means the caller gave up; the work still counts.
        match command {
            Command::Record { event, reply } => {
                let _ = reply.send(self.record(event).await);
            }
            Command::Stats { key, reply } => {
                let _ = reply.send(self.stats(&key).await);
            }
            Command::Clear { key, reply } => {
                let _ = reply.send(clear_state(&self.store, &key).await);
            }
        }
    }

    async fn record(&self, event: ClickEvent) -> ClickResult<u64> {
        let count_key = actor_count_key(&event.product_key);
        let clicks_key = actor_clicks_key(&event.product_key);

        let count = self.store.get::<u64>(&count_key).await?.unwrap_or(0) + 1;
        let mut clicks = self.load_clicks(&clicks_key).await?;
        clicks.insert(0, event);
        clicks.truncate(self.recent_limit);

        self.store.set(&count_key, &count, None).await?;
        self.store.set(&clicks_key, &clicks, None).await?;
        Ok(count)
    }

    async fn stats(&self, key: &ProductKey) -> ClickResult<ClickStats> {
        let count = self.store.get::<u64>(&actor_count_key(key)).await?.unwrap_or(0);
        let clicks = self.load_clicks(&actor_clicks_key(key)).await?;
        Ok(ClickStats::new(count, &clicks, false))
    }

    async fn load_clicks(&self, clicks_key: &str) -> ClickResult<Vec<ClickEvent>> {
        Ok(self
            .store
            .get::<Vec<ClickEvent>>(clicks_key)
            .await?
            .unwrap_or_default())
    }
}

async fn clear_state(store: &Cache, key: &ProductKey) -> ClickResult<()> {
    store.delete(&actor_count_key(key)).await?;
    store.delete(&actor_clicks_key(key)).await?;
    Ok(())
}

/// Routes click operations to the actor owning each key.
///
/// Actors are spawned on first use and stop after sitting idle; the next
/// call for the key spawns a fresh one over the same stored state. Every
/// call carries a deadline; a closed mailbox, a missed deadline, or an
/// offline pool all fail with [`ClickError::ActorUnavailable`].
pub struct ActorPool {
    store: Cache,
    mailboxes: Registry,
    timeout: Duration,
    idle: Duration,
    recent_limit: usize,
    offline: AtomicBool,
}

impl ActorPool {
    pub fn new(store: Cache, config: &ClicksConfig) -> Self {
        Self {
            store,
            mailboxes: Arc::new(Mutex::new(HashMap::new())),
            timeout: Duration::from_millis(config.actor_timeout_ms),
            idle: Duration::from_secs(config.actor_idle_secs),
            recent_limit: config.recent_limit,
            offline: AtomicBool::new(false),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }

    /// Fail every call until switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
        warn!(offline, "click actor pool availability changed");
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// Number of live actors.
    pub fn len(&self) -> usize {
        self.mailboxes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count one click, returning the new total.
    pub async fn record(&self, event: ClickEvent) -> ClickResult<u64> {
        let id = ActorId::for_key(&event.product_key);
        self.call(id, |reply| Command::Record { event, reply }).await
    }

    pub async fn stats(&self, key: &ProductKey) -> ClickResult<ClickStats> {
        let key = key.clone();
        self.call(ActorId::for_key(&key), |reply| Command::Stats { key, reply })
            .await
    }

    pub async fn clear(&self, key: &ProductKey) -> ClickResult<()> {
        let key = key.clone();
        self.call(ActorId::for_key(&key), |reply| Command::Clear { key, reply })
            .await
    }

    /// Delete a key's actor state without going through its actor.
    ///
    /// Used when the actor cannot be reached; may race with a queued command.
    pub async fn clear_storage(&self, key: &ProductKey) -> ClickResult<()> {
        clear_state(&self.store, key).await
    }

    async fn call<T, F>(&self, id: ActorId, command: F) -> ClickResult<T>
    where
        F: FnOnce(oneshot::Sender<ClickResult<T>>) -> Command,
    {
        if self.is_offline() {
            return Err(ClickError::unavailable(id, "pool offline"));
        }

        let (reply, response) = oneshot::channel();
        let round_trip = async {
            let mut command = command(reply);
            // One retry covers an actor that went idle after we took its sender.
            for _ in 0..2 {
                match self.mailbox(id).send(command).await {
                    Ok(()) => {
                        return response
                            .await
                            .map_err(|_| ClickError::unavailable(id, "actor dropped reply"))?;
                    }
                    Err(mpsc::error::SendError(returned)) => {
                        self.forget_closed(id);
                        command = returned;
                    }
                }
            }
            Err(ClickError::unavailable(id, "mailbox closed"))
        };

        deadline(self.timeout, round_trip)
            .await
            .unwrap_or_else(|| {
                Err(ClickError::unavailable(
                    id,
                    format!("no reply within {}ms", self.timeout.as_millis()),
                ))
            })
    }

    fn forget_closed(&self, id: ActorId) {
        let mut mailboxes = self.mailboxes.lock();
        if mailboxes.get(&id).is_some_and(|tx| tx.is_closed()) {
            mailboxes.remove(&id);
        }
    }

    fn mailbox(&self, id: ActorId) -> mpsc::Sender<Command> {
        let mut mailboxes = self.mailboxes.lock();
        if let Some(tx) = mailboxes.get(&id).filter(|tx| !tx.is_closed()) {
            return tx.clone();
        }

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = ClickActor {
            id,
            store: self.store.clone(),
            recent_limit: self.recent_limit,
            idle: self.idle,
            registry: self.mailboxes.clone(),
        };
        tokio::spawn(actor.run(rx));
        mailboxes.insert(id, tx.clone());
        tx
    }
}

async fn deadline<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
