//! Durable state storage for the background router.
//!
//! One snapshot record holds the whole shared state plus the suite version
//! that wrote it. Loading tolerates older shapes: missing fields merge over
//! defaults, unknown fields are ignored.

use crate::result::EscudoResult;
use crate::state::SharedState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A persisted snapshot: the shared state plus the version that wrote it.
///
/// The version stamp is how the router tells a fresh install from an
/// upgrade on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Suite version that recorded the snapshot
    #[serde(default)]
    pub recorded_by: String,
    /// The snapshot itself
    #[serde(flatten)]
    pub state: SharedState,
}

impl PersistedState {
    /// Stamps a state snapshot with the recording version.
    #[must_use]
    pub fn new(recorded_by: impl Into<String>, state: SharedState) -> Self {
        Self {
            recorded_by: recorded_by.into(),
            state,
        }
    }
}

/// Where the router keeps its state between sessions.
pub trait StateStore {
    /// Writes a snapshot, replacing any previous one.
    fn save(&mut self, snapshot: &PersistedState) -> EscudoResult<()>;

    /// Reads the last snapshot, or `None` when nothing was saved yet.
    fn load(&mut self) -> EscudoResult<Option<PersistedState>>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Option<PersistedState>,
}

impl StateStore for MemoryStore {
    fn save(&mut self, snapshot: &PersistedState) -> EscudoResult<()> {
        self.snapshot = Some(snapshot.clone());
        Ok(())
    }

    fn load(&mut self) -> EscudoResult<Option<PersistedState>> {
        Ok(self.snapshot.clone())
    }
}

/// Store backed by a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store at the given path. Nothing is read or written until
    /// first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn save(&mut self, snapshot: &PersistedState) -> EscudoResult<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn load(&mut self) -> EscudoResult<Option<PersistedState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }
}
