//! Persisted state slots.
//!
//! Identity, token, and config are three independent flat-text blobs. The
//! storage layer does not link them; ordering between them is the
//! orchestrator's job.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::StatePaths;
use crate::error::Result;

/// One of the three persisted slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Identity,
    Token,
    Config,
}

impl Slot {
    /// Every slot, in the order a reset deletes them.
    pub const ALL: [Self; 3] = [Self::Token, Self::Identity, Self::Config];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Token => write!(f, "token"),
            Self::Config => write!(f, "config"),
        }
    }
}

/// Storage for the three slots.
pub trait SlotStore {
    /// Read a slot. `Ok(None)` when the slot is absent.
    fn read(&self, slot: Slot) -> Result<Option<String>>;

    /// Replace a slot's contents.
    fn write(&self, slot: Slot, contents: &str) -> Result<()>;

    /// Delete a slot. Returns `false` if it was already absent.
    fn delete(&self, slot: Slot) -> Result<bool>;

    fn exists(&self, slot: Slot) -> bool;

    /// Where the slot lives. The config slot's location is handed to the
    /// service manager on install.
    fn location(&self, slot: Slot) -> PathBuf;
}

/// File-backed slots under a single directory.
///
/// Assumes one controlling process per host: no file locking is done, and
/// concurrent external edits of the same files are not guarded against.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StatePaths,
}

impl FileStore {
    pub const fn new(paths: StatePaths) -> Self {
        Self { paths }
    }

    pub const fn paths(&self) -> &StatePaths {
        &self.paths
    }
}

impl SlotStore for FileStore {
    fn read(&self, slot: Slot) -> Result<Option<String>> {
        match std::fs::read_to_string(self.location(slot)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, slot: Slot, contents: &str) -> Result<()> {
        let path = self.location(slot);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, contents)?;
        tracing::debug!("wrote {slot} slot: {}", path.display());
        Ok(())
    }

    fn delete(&self, slot: Slot) -> Result<bool> {
        match std::fs::remove_file(self.location(slot)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, slot: Slot) -> bool {
        self.location(slot).is_file()
    }

    fn location(&self, slot: Slot) -> PathBuf {
        self.paths.slot_path(slot)
    }
}

/// In-memory slots. Clones share the same contents.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    paths: StatePaths,
    slots: Arc<Mutex<HashMap<Slot, String>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StatePaths::in_dir("memory"))
    }
}

impl MemoryStore {
    /// `paths` only decides what [`SlotStore::location`] reports.
    pub fn new(paths: StatePaths) -> Self {
        Self {
            paths,
            slots: Arc::default(),
        }
    }

    fn with_slots<T>(&self, f: impl FnOnce(&mut HashMap<Slot, String>) -> T) -> T {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut slots)
    }
}

impl SlotStore for MemoryStore {
    fn read(&self, slot: Slot) -> Result<Option<String>> {
        Ok(self.with_slots(|s| s.get(&slot).cloned()))
    }

    fn write(&self, slot: Slot, contents: &str) -> Result<()> {
        self.with_slots(|s| s.insert(slot, contents.to_string()));
        Ok(())
    }

    fn delete(&self, slot: Slot) -> Result<bool> {
        Ok(self.with_slots(|s| s.remove(&slot).is_some()))
    }

    fn exists(&self, slot: Slot) -> bool {
        self.with_slots(|s| s.contains_key(&slot))
    }

    fn location(&self, slot: Slot) -> PathBuf {
        self.paths.slot_path(slot)
    }
}
