//! Key-value JSON persistence for studio state.
//!
//! Each key maps to one pretty-printed JSON file under the store directory.
//! Reads fall back to a default when the file is missing or unreadable, so a
//! corrupted store never takes the studio down. `DebouncedSaver` batches
//! rapid updates (editor keystrokes) into one write after a quiet period.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store keys in active use.
pub mod keys {
    /// Editor buffer for the active file.
    pub const EDITOR_CODE: &str = "synapse-editor-code";
    /// Full generated workspace (files, tree, active path).
    pub const CODE_FILES: &str = "synapse-code-files";
    /// Workflow snapshot of the most recent run.
    pub const WORKFLOW: &str = "synapse-workflow";
    /// User settings.
    pub const SETTINGS: &str = "synapse-settings";
}

const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// File-backed key-value store for JSON documents.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Write a value under a key, creating the store directory if needed.
    pub fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir).context("Failed to create store directory")?;
        let json = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize value for key '{key}'"))?;
        std::fs::write(self.path_for(key), json)
            .with_context(|| format!("Failed to write store key '{key}'"))?;
        Ok(())
    }

    /// Read a value, or its default when the key is missing or unreadable.
    pub fn get_json<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.get_json_opt(key).unwrap_or_default()
    }

    /// Read a value if the key holds one that parses.
    pub fn get_json_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(key, %error, "ignoring unparseable store entry");
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error).with_context(|| format!("Failed to remove store key '{key}'")),
        }
    }
}

#[derive(Default)]
struct SaverInner {
    saves: HashMap<String, PendingSave>,
}

struct PendingSave {
    generation: u64,
    value: serde_json::Value,
}

/// Coalesces rapid writes to a key into one save after a quiet period.
///
/// Every `schedule` supersedes the pending value for its key and restarts
/// that key's quiet period. `flush` writes everything pending immediately.
pub struct DebouncedSaver {
    store: Arc<LocalStore>,
    delay: Duration,
    generation: std::sync::atomic::AtomicU64,
    inner: Arc<Mutex<SaverInner>>,
}

impl DebouncedSaver {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            delay: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            generation: std::sync::atomic::AtomicU64::new(0),
            inner: Arc::new(Mutex::new(SaverInner::default())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a value for its key; the write lands after the quiet period
    /// unless superseded first. Requires a Tokio runtime.
    pub fn schedule<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)
            .with_context(|| format!("Failed to serialize value for key '{key}'"))?;
        let generation = self
            .generation
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
            + 1;

        {
            let mut inner = lock_inner(&self.inner);
            inner
                .saves
                .insert(key.to_string(), PendingSave { generation, value });
        }

        let store = self.store.clone();
        let inner = self.inner.clone();
        let delay = self.delay;
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let due = {
                let mut inner = lock_inner(&inner);
                match inner.saves.get(&key) {
                    Some(pending) if pending.generation == generation => {
                        inner.saves.remove(&key).map(|pending| pending.value)
                    }
                    _ => None,
                }
            };
            if let Some(value) = due
                && let Err(error) = store.put_json(&key, &value)
            {
                tracing::warn!(key, %error, "debounced save failed");
            }
        });
        Ok(())
    }

    /// Whether any key has an unwritten pending value.
    pub fn is_saving(&self) -> bool {
        !lock_inner(&self.inner).saves.is_empty()
    }

    /// Write all pending values now.
    pub fn flush(&self) -> Result<()> {
        let due: Vec<(String, serde_json::Value)> = {
            let mut inner = lock_inner(&self.inner);
            inner
                .saves
                .drain()
                .map(|(key, pending)| (key, pending.value))
                .collect()
        };
        for (key, value) in due {
            self.store.put_json(&key, &value)?;
        }
        Ok(())
    }
}

fn lock_inner(inner: &Mutex<SaverInner>) -> std::sync::MutexGuard<'_, SaverInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
