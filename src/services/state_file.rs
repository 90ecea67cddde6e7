//! State file - the persisted settings + history document.
//!
//! The document is a single JSON object: the settings fields at the top
//! level, merged with a `clipboardHistory` array.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::{ClipboardEntry, Settings};

/// Key holding the history array inside the state document.
pub const HISTORY_KEY: &str = "clipboardHistory";

/// Failure loading or saving the state document.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state file I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("state file {path} is not valid JSON, moved it to {moved_to}: {source}")]
    Quarantined {
        path: PathBuf,
        moved_to: PathBuf,
        source: serde_json::Error,
    },
}

/// Storage backend for the state document.
#[async_trait]
pub trait StateDriver: Send + Sync {
    /// Read the stored document, `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<Value>, StateError>;

    /// Replace the stored document.
    async fn save(&self, doc: &Value) -> Result<(), StateError>;
}

/// Driver keeping the document in a JSON file.
pub struct FileSystemDriver {
    path: PathBuf,
}

impl FileSystemDriver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path an unreadable document is moved to, e.g.
    /// `state.json.corrupt-1700000000000`.
    fn quarantine_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".corrupt-{}", Utc::now().timestamp_millis()));
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StateError {
        StateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl StateDriver for FileSystemDriver {
    async fn load(&self) -> Result<Option<Value>, StateError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(doc) => Ok(Some(doc)),
                Err(source) => {
                    // Keep the bytes; the next save would replace them
                    let moved_to = self.quarantine_path();
                    tokio::fs::rename(&self.path, &moved_to)
                        .await
                        .map_err(|e| self.io_error(e))?;
                    Err(StateError::Quarantined {
                        path: self.path.clone(),
                        moved_to,
                        source,
                    })
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, doc: &Value) -> Result<(), StateError> {
        let data = serde_json::to_vec_pretty(doc)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // Write to a sibling temp file, then rename over the old document
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        Ok(())
    }
}

/// Build the state document from settings and history.
pub fn encode(settings: &Settings, history: &[ClipboardEntry]) -> Value {
    let mut doc = settings.to_map();
    let entries = history
        .iter()
        .filter_map(|e| serde_json::to_value(e).ok())
        .collect();
    doc.insert(HISTORY_KEY.to_string(), Value::Array(entries));
    Value::Object(doc)
}

/// Split a state document into settings and history.
///
/// History records that fail to decode are skipped.
pub fn decode(doc: &Value) -> (Settings, Vec<ClipboardEntry>) {
    let settings = Settings::from_document(doc);

    let history = match doc.get(HISTORY_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value(item.clone()) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable history record: {}", e);
                    None
                }
            })
            .collect(),
        Some(_) => {
            tracing::warn!("Ignoring malformed {} value", HISTORY_KEY);
            Vec::new()
        }
        None => Vec::new(),
    };

    (settings, history)
}

/// Result of [`load_state`].
#[derive(Debug)]
pub struct LoadedState {
    pub settings: Settings,
    pub history: Vec<ClipboardEntry>,
    /// False when the stored document could not be read and is still in
    /// place; saving would destroy it.
    pub writable: bool,
}

impl LoadedState {
    fn fresh(writable: bool) -> Self {
        Self {
            settings: Settings::default(),
            history: Vec::new(),
            writable,
        }
    }
}

/// Load settings and history, falling back to defaults on any failure.
pub async fn load_state(driver: &dyn StateDriver) -> LoadedState {
    match driver.load().await {
        Ok(Some(doc)) => {
            let (settings, history) = decode(&doc);
            LoadedState {
                settings,
                history,
                writable: true,
            }
        }
        Ok(None) => LoadedState::fresh(true),
        Err(e @ StateError::Quarantined { .. }) => {
            tracing::error!("Starting with empty history: {}", e);
            LoadedState::fresh(true)
        }
        Err(e) => {
            tracing::error!("Failed to load state, changes will not be saved: {}", e);
            LoadedState::fresh(false)
        }
    }
}

/// Fire-and-forget writer: snapshots are saved one after another, in the
/// order they were submitted, by a single background task.
pub struct Persister {
    tx: Option<mpsc::UnboundedSender<Value>>,
    writer: Option<JoinHandle<()>>,
}

impl Persister {
    /// Spawn the writer task. Must be called from within a Tokio runtime.
    pub fn spawn(driver: Arc<dyn StateDriver>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();

        let writer = tokio::spawn(async move {
            while let Some(mut doc) = rx.recv().await {
                // Only the newest pending snapshot matters
                while let Ok(newer) = rx.try_recv() {
                    doc = newer;
                }
                if let Err(e) = driver.save(&doc).await {
                    tracing::error!("Failed to save state: {}", e);
                }
            }
        });

        Self {
            tx: Some(tx),
            writer: Some(writer),
        }
    }

    /// A persister that discards every snapshot.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            writer: None,
        }
    }

    /// Queue a snapshot for saving without waiting for it.
    pub fn submit(&self, doc: Value) {
        if let Some(tx) = &self.tx {
            if tx.send(doc).is_err() {
                tracing::error!("State writer is gone, dropping snapshot");
            }
        }
    }

    /// Close the queue and wait for every pending snapshot to be written.
    pub async fn flush(&mut self) {
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.await {
                tracing::error!("State writer task failed: {}", e);
            }
        }
    }
}
