//!
//! vybly_admin storage module
//! --------------------------
//! Client-side durable key/value storage for the admin session. Entries are plain
//! strings addressed by key, the same contract a browser's local storage offers.
//!
//! Two backends are provided:
//! - `MemoryStorage`: a shared in-process map with per-context handles. A write made
//!   through one handle is announced to every *other* handle, mirroring how a storage
//!   event reaches other tabs but not the tab that wrote.
//! - `FileStorage`: a JSON map on disk, rewritten atomically (temp file + rename) under
//!   an advisory lock shared by every handle and process, with an optional polling
//!   watcher that announces changes made by other processes.
//!
//! Consumers observe foreign writes through a `ChangeFeed`; the payload is informative
//! only, a change is a trigger to re-read.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Identity of one execution context (tab, process, handle) writing to a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Writes detected on disk whose author is unknown.
    pub const EXTERNAL: ContextId = ContextId(0);

    pub fn next() -> ContextId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ContextId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// `None` when the whole store changed or the key is unknown.
    pub key: Option<String>,
    pub origin: ContextId,
}

/// Receives changes made by contexts other than the subscriber's own.
pub struct ChangeFeed {
    rx: broadcast::Receiver<StorageChange>,
    own: ContextId,
}

impl ChangeFeed {
    pub fn new(rx: broadcast::Receiver<StorageChange>, own: ContextId) -> Self {
        Self { rx, own }
    }

    /// Waits for the next foreign change. Returns `None` once the store is gone.
    /// A lagging subscriber gets a keyless change; it has missed something.
    pub async fn next(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.origin == self.own => continue,
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "storage change feed lagged");
                    return Some(StorageChange { key: None, origin: ContextId::EXTERNAL });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant used by tests and polling loops.
    pub fn try_next(&mut self) -> Option<StorageChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if change.origin == self.own => continue,
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    return Some(StorageChange { key: None, origin: ContextId::EXTERNAL })
                }
                Err(_) => return None,
            }
        }
    }
}

pub(crate) fn change_channel() -> broadcast::Sender<StorageChange> {
    broadcast::channel(CHANGE_CHANNEL_CAPACITY).0
}

/// String key/value storage shared between execution contexts.
pub trait SessionStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove_item(&self, key: &str) -> anyhow::Result<()>;

    /// Remove several keys so that no reader observes only part of the removal.
    /// Backends that cannot do better fall back to one removal per key.
    fn remove_items(&self, keys: &[&str]) -> anyhow::Result<()> {
        for key in keys {
            self.remove_item(key)?;
        }
        Ok(())
    }

    fn subscribe(&self) -> ChangeFeed;
}
