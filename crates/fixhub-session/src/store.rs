//! Request history
//!
//! Records are append-only. `list_all` returns them newest first.

use chrono::{DateTime, Utc};
use fixhub_core::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One submitted task and what came of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: Uuid,
    pub environment: String,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RequestRecord {
    pub fn new(
        environment: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            environment: environment.into(),
            model: model.into(),
            prompt: prompt.into(),
            response_text: None,
            external_id: None,
            created_at,
        }
    }
}

pub trait RequestStore: Send + Sync {
    fn save(&self, record: &RequestRecord) -> Result<()>;

    /// Every record, newest first
    fn list_all(&self) -> Result<Vec<RequestRecord>>;
}

fn newest_first(mut records: Vec<RequestRecord>) -> Vec<RequestRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

#[derive(Debug, Default)]
pub struct MemoryRequestStore {
    records: Mutex<Vec<RequestRecord>>,
}

impl MemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestStore for MemoryRequestStore {
    fn save(&self, record: &RequestRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<RequestRecord>> {
        Ok(newest_first(self.records.lock().clone()))
    }
}

/// Records kept as a JSON array in a single file
#[derive(Debug)]
pub struct JsonFileRequestStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileRequestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> Result<Vec<RequestRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl RequestStore for JsonFileRequestStore {
    fn save(&self, record: &RequestRecord) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut records = self.read_records()?;
        records.push(record.clone());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&records)?)?;
        tracing::debug!("Saved request {} to {}", record.id, self.path.display());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<RequestRecord>> {
        let _guard = self.write_lock.lock();
        Ok(newest_first(self.read_records()?))
    }
}
