use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use fs2::FileExt;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{change_channel, ChangeFeed, ContextId, SessionStore, StorageChange};
use crate::tprintln;

type Entries = BTreeMap<String, String>;

struct Inner {
    path: PathBuf,
    /// Sidecar `<file>.lock`; an exclusive advisory lock on it guards every
    /// read-modify-write across handles and processes.
    lock_file: File,
    /// Serialises read-modify-write cycles within this handle and remembers the last
    /// contents it saw or wrote, so the watcher only reports foreign edits.
    last_seen: Mutex<Entries>,
    changes: broadcast::Sender<StorageChange>,
}

/// Held for the duration of one rewrite; unlocks on drop.
struct RewriteLock<'a>(&'a File);

impl<'a> RewriteLock<'a> {
    fn acquire(file: &'a File) -> anyhow::Result<Self> {
        FileExt::lock_exclusive(file).context("locking session file")?;
        Ok(Self(file))
    }
}

impl Drop for RewriteLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.0);
    }
}

fn lock_path(path: &Path) -> anyhow::Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| anyhow!("session path {} has no file name", path.display()))?;
    let mut lock_name = name.to_os_string();
    lock_name.push(".lock");
    Ok(path.with_file_name(lock_name))
}

/// Durable session storage: one pretty-printed JSON object per file.
#[derive(Clone)]
pub struct FileStorage {
    inner: Arc<Inner>,
    context: ContextId,
}

impl FileStorage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            }
        }
        let lock_path = lock_path(&path)?;
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("opening {}", lock_path.display()))?;
        let current = read_entries(&path);
        let inner = Inner { path, lock_file, last_seen: Mutex::new(current), changes: change_channel() };
        Ok(Self { inner: Arc::new(inner), context: ContextId::next() })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Another context over the same file within this process.
    pub fn context(&self) -> FileStorage {
        Self { inner: self.inner.clone(), context: ContextId::next() }
    }

    fn mutate<F>(&self, f: F) -> anyhow::Result<Vec<String>>
    where
        F: FnOnce(&mut Entries) -> Vec<String>,
    {
        let mut seen = self.inner.last_seen.lock();
        let lock = RewriteLock::acquire(&self.inner.lock_file)?;
        let mut entries = load_entries(&self.inner.path)?;
        // someone else rewrote the file since we last looked; the watcher must not miss it
        let foreign = entries != *seen;
        let changed = f(&mut entries);
        if !changed.is_empty() {
            write_entries(&self.inner.path, &entries)?;
        }
        *seen = entries;
        drop(lock);
        drop(seen);
        if foreign {
            debug!(path = %self.inner.path.display(), "session file changed externally before rewrite");
            self.announce(None, ContextId::EXTERNAL);
        }
        Ok(changed)
    }

    fn announce(&self, key: Option<String>, origin: ContextId) {
        let _ = self.inner.changes.send(StorageChange { key, origin });
    }

    /// Re-read the file and announce a change if someone else rewrote it.
    /// Returns whether a foreign change was detected.
    pub fn poll_external(&self) -> bool {
        let mut seen = self.inner.last_seen.lock();
        let current = read_entries(&self.inner.path);
        if current == *seen {
            return false;
        }
        *seen = current;
        drop(seen);
        debug!(path = %self.inner.path.display(), "session file changed externally");
        self.announce(None, ContextId::EXTERNAL);
        true
    }

    /// Spawn a background ticker that polls the file for foreign edits.
    /// The task ends when the returned handle is aborted.
    pub fn watch(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                this.poll_external();
            }
        })
    }
}

/// Contents of the file for a rewrite. A missing file or one that is not a string map
/// is empty; any other I/O failure is an error so the rewrite never clobbers a file
/// it could not read.
fn load_entries(path: &Path) -> anyhow::Result<Entries> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Entries::new());
    }
    match serde_json::from_slice::<Entries>(&bytes) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "session file is not a string map; treating as empty");
            Ok(Entries::new())
        }
    }
}

// Lookups and polling never fail.
fn read_entries(path: &Path) -> Entries {
    load_entries(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "session file unreadable; treating as empty");
        Entries::new()
    })
}

fn write_entries(path: &Path, entries: &Entries) -> anyhow::Result<()> {
    let t0 = std::time::Instant::now();
    let bytes = serde_json::to_vec_pretty(entries)?;
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    // unique per rewrite, in the same directory so the rename stays atomic
    let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(&bytes).with_context(|| format!("writing {}", tmp.path().display()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error).with_context(|| format!("replacing {}", path.display()))?;
    tprintln!("[STORAGE] session file rewrite keys={} took={:?}", entries.len(), t0.elapsed());
    Ok(())
}

impl SessionStore for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        read_entries(&self.inner.path).remove(key)
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let changed = self.mutate(|entries| {
            if entries.get(key).map(String::as_str) == Some(value) {
                return Vec::new();
            }
            entries.insert(key.to_string(), value.to_string());
            vec![key.to_string()]
        })?;
        for key in changed {
            self.announce(Some(key), self.context);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> anyhow::Result<()> {
        self.remove_items(&[key])
    }

    fn remove_items(&self, keys: &[&str]) -> anyhow::Result<()> {
        // one rewrite for all keys: readers see all or none removed
        let changed = self.mutate(|entries| {
            keys.iter().filter(|k| entries.remove(**k).is_some()).map(|k| k.to_string()).collect()
        })?;
        for key in changed {
            self.announce(Some(key), self.context);
        }
        Ok(())
    }

    fn subscribe(&self) -> ChangeFeed {
        ChangeFeed::new(self.inner.changes.subscribe(), self.context)
    }
}
