//! File-backed run log store.
//!
//! Layout:
//!
//! ```text
//! <data_dir>/runs/
//!   .store.lock          advisory lock serializing writers across processes
//!   <run id>.json        JCS-canonical run record
//! ```
//!
//! Records are replaced with tempfile + fsync + rename + directory fsync, so
//! a write is durable once `create`/`update` returns and readers never need
//! the lock: they see either the previous or the next version.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use fd_lock::RwLock as FdLock;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

use contentflow_utils::atomic_write::write_file_atomic;
use contentflow_utils::canonical::emit_jcs;
use contentflow_utils::error::StoreError;
use contentflow_utils::logging::log_record_write;
use contentflow_utils::paths::{ensure_dir_all, runs_dir};
use contentflow_utils::types::{RunId, RunPatch, RunRecord};

use crate::{RunLogStore, paginate};

const LOCK_FILE_NAME: &str = ".store.lock";
const RECORD_EXTENSION: &str = "json";

type IdLocks = Arc<Mutex<HashMap<RunId, Arc<tokio::sync::Mutex<()>>>>>;

/// Durable store writing one JSON document per run.
#[derive(Debug, Clone)]
pub struct FileRunLogStore {
    runs_path: Utf8PathBuf,
    /// In-process serialization of same-id writes; an entry lives only while
    /// some write to that id holds or waits for it.
    id_locks: IdLocks,
}

/// Exclusive right to write one run; dropping it prunes the id's mutex once
/// nobody else is waiting on it.
struct IdLease {
    locks: IdLocks,
    id: RunId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(&self.id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.id);
        }
    }
}

impl FileRunLogStore {
    /// Open (and create if needed) the store under `<data_dir>/runs`.
    ///
    /// # Errors
    /// `Io` if the directory cannot be created.
    pub fn open(data_dir: &Utf8Path) -> Result<Self, StoreError> {
        let runs_path = runs_dir(data_dir);
        ensure_dir_all(&runs_path).map_err(|e| StoreError::io(&runs_path, e))?;
        Ok(Self {
            runs_path,
            id_locks: Arc::default(),
        })
    }

    #[must_use]
    pub fn runs_path(&self) -> &Utf8Path {
        &self.runs_path
    }

    fn record_path(&self, id: &RunId) -> Utf8PathBuf {
        self.runs_path
            .join(format!("{}.{RECORD_EXTENSION}", id.as_str()))
    }

    async fn lease(&self, id: &RunId) -> IdLease {
        let lock = {
            let mut locks = self.id_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        IdLease {
            locks: Arc::clone(&self.id_locks),
            id: id.clone(),
            guard: Some(guard),
        }
    }

    /// Run `f` while holding the cross-process writer lock.
    fn with_store_lock<T>(
        runs_path: &Utf8Path,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock_path = runs_path.join(LOCK_FILE_NAME);
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| StoreError::io(&lock_path, e))?;
        let mut lock = FdLock::new(file);
        let _guard = lock.write().map_err(|e| StoreError::Lock {
            path: lock_path.to_string(),
            reason: e.to_string(),
        })?;
        f()
    }

    fn read_record(path: &Utf8Path, id: &RunId) -> Result<RunRecord, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { id: id.to_string() });
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map_err(|e| StoreError::Serialization(format!("{path}: {e}")))
    }

    fn write_record(path: &Utf8Path, record: &RunRecord) -> Result<(), StoreError> {
        let json = emit_jcs(record).map_err(|e| StoreError::Serialization(format!("{e:#}")))?;
        write_file_atomic(path, json.as_bytes()).map_err(|e| StoreError::io(path, e))?;
        log_record_write(&record.id, record.status, record.current_stage);
        Ok(())
    }

    async fn blocking<T, F>(f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| StoreError::io("<blocking task>", io::Error::other(e.to_string())))?
    }
}

#[async_trait]
impl RunLogStore for FileRunLogStore {
    async fn create(&self, record: RunRecord) -> Result<RunId, StoreError> {
        let _lease = self.lease(&record.id).await;

        let path = self.record_path(&record.id);
        let runs_path = self.runs_path.clone();
        Self::blocking(move || {
            Self::with_store_lock(&runs_path, || {
                if path.exists() {
                    return Err(StoreError::DuplicateId {
                        id: record.id.to_string(),
                    });
                }
                Self::write_record(&path, &record)?;
                Ok(record.id)
            })
        })
        .await
    }

    async fn update(&self, id: &RunId, patch: RunPatch) -> Result<RunRecord, StoreError> {
        let _lease = self.lease(id).await;

        let path = self.record_path(id);
        let runs_path = self.runs_path.clone();
        let id = id.clone();
        Self::blocking(move || {
            Self::with_store_lock(&runs_path, || {
                let mut record = Self::read_record(&path, &id)?;
                patch.apply(&mut record, Utc::now())?;
                Self::write_record(&path, &record)?;
                Ok(record)
            })
        })
        .await
    }

    async fn get(&self, id: &RunId) -> Result<RunRecord, StoreError> {
        let path = self.record_path(id);
        let id = id.clone();
        Self::blocking(move || Self::read_record(&path, &id)).await
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>, StoreError> {
        let runs_path = self.runs_path.clone();
        let records = Self::blocking(move || {
            let entries = match fs::read_dir(&runs_path) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(StoreError::io(&runs_path, e)),
            };

            let mut records = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| StoreError::io(&runs_path, e))?;
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                    continue;
                }
                let parsed = fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|content| {
                        serde_json::from_str::<RunRecord>(&content).map_err(|e| e.to_string())
                    });
                match parsed {
                    Ok(record) => records.push(record),
                    Err(reason) => {
                        tracing::warn!(
                            path = %path.display(),
                            reason = %reason,
                            "Skipping unreadable run record"
                        );
                    }
                }
            }
            Ok(records)
        })
        .await?;

        Ok(paginate(records, limit, offset))
    }
}
