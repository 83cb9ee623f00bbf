use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{change_channel, ChangeFeed, ContextId, SessionStore, StorageChange};

struct Shared {
    map: RwLock<HashMap<String, String>>,
    changes: broadcast::Sender<StorageChange>,
}

/// In-memory store. Clones share the same context; [`MemoryStorage::context`] opens a
/// new one over the same data.
#[derive(Clone)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
    context: ContextId,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        let shared = Shared { map: RwLock::new(HashMap::new()), changes: change_channel() };
        Self { shared: Arc::new(shared), context: ContextId::next() }
    }

    /// Another execution context over the same data, like a second tab.
    pub fn context(&self) -> MemoryStorage {
        Self { shared: self.shared.clone(), context: ContextId::next() }
    }

    pub fn context_id(&self) -> ContextId {
        self.context
    }

    pub fn len(&self) -> usize {
        self.shared.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.map.read().is_empty()
    }

    fn announce(&self, key: Option<&str>) {
        // no receivers is fine
        let _ = self.shared.changes.send(StorageChange { key: key.map(str::to_string), origin: self.context });
    }
}

impl SessionStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.shared.map.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let previous = self.shared.map.write().insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.announce(Some(key));
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        if self.shared.map.write().remove(key).is_some() {
            self.announce(Some(key));
        }
        Ok(())
    }

    fn remove_items(&self, keys: &[&str]) -> anyhow::Result<()> {
        let removed: Vec<&str> = {
            let mut map = self.shared.map.write();
            keys.iter().copied().filter(|k| map.remove(*k).is_some()).collect()
        };
        for key in removed {
            self.announce(Some(key));
        }
        Ok(())
    }

    fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::new(self.shared.changes.subscribe(), self.context)
    }
}
