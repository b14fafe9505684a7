use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::metrics::record_store_write;
use crate::models::AttemptRecord;

type Records = BTreeMap<String, AttemptRecord>;

/// Durable user → attempt mapping backed by one JSON file.
///
/// Check-then-insert-then-persist in [`record_attempt`] runs under the write
/// lock, so two flows for the same user can never both commit. Each write
/// replaces the whole file via a temporary file and rename.
///
/// [`record_attempt`]: ResponseStore::record_attempt
pub struct ResponseStore {
    path: PathBuf,
    records: RwLock<Records>,
}

impl ResponseStore {
    /// Opens the store at `path`, loading what is there. A missing file is
    /// an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = read_records(&path).await?;
        tracing::info!(
            "Response store loaded from {} with {} records",
            path.display(),
            records.len()
        );
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn has_attempt(&self, user_id: &str) -> bool {
        self.records.read().await.contains_key(user_id)
    }

    pub async fn lookup(&self, user_id: &str) -> Option<AttemptRecord> {
        self.records.read().await.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Inserts the user's record and persists it before returning. Fails with
    /// [`StoreError::DuplicateAttempt`] when the user already has one; a failed
    /// persist leaves the in-memory mapping unchanged.
    pub async fn record_attempt(
        &self,
        user_id: &str,
        record: AttemptRecord,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(user_id) {
            return Err(StoreError::DuplicateAttempt(user_id.to_string()));
        }

        records.insert(user_id.to_string(), record);
        match write_records(&self.path, &records).await {
            Ok(()) => {
                record_store_write(true);
                tracing::info!("Recorded attempt for user={}", user_id);
                Ok(())
            }
            Err(e) => {
                records.remove(user_id);
                record_store_write(false);
                tracing::error!("Failed to persist attempt for user={}: {}", user_id, e);
                Err(e)
            }
        }
    }

    /// Replaces the in-memory mapping with the file's current contents, picking
    /// up records removed by hand. Returns the new record count.
    pub async fn reload(&self) -> Result<usize, StoreError> {
        let fresh = read_records(&self.path).await?;
        let mut records = self.records.write().await;
        let before = records.len();
        *records = fresh;
        tracing::info!(
            "Response store reloaded: {} -> {} records",
            before,
            records.len()
        );
        Ok(records.len())
    }

    pub async fn snapshot(&self) -> BTreeMap<String, AttemptRecord> {
        self.records.read().await.clone()
    }
}

async fn read_records(path: &Path) -> Result<Records, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Records::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                "Response store {} not found, starting empty",
                path.display()
            );
            Ok(Records::new())
        }
        Err(e) => Err(e.into()),
    }
}

async fn write_records(path: &Path, records: &Records) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(records)?;
    let tmp = temp_path(path);

    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "responses.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
