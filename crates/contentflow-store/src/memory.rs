use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use contentflow_utils::error::StoreError;
use contentflow_utils::types::{RunId, RunPatch, RunRecord};

use crate::{RunLogStore, paginate};

/// Non-durable store keeping records in a map.
///
/// Updates hold the write lock for the whole read-validate-write cycle, so
/// they are all-or-nothing with respect to each other.
#[derive(Debug, Default)]
pub struct InMemoryRunLogStore {
    records: RwLock<HashMap<RunId, RunRecord>>,
}

impl InMemoryRunLogStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunLogStore for InMemoryRunLogStore {
    async fn create(&self, record: RunRecord) -> Result<RunId, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::DuplicateId {
                id: record.id.to_string(),
            });
        }
        let id = record.id.clone();
        records.insert(id.clone(), record);
        Ok(id)
    }

    async fn update(&self, id: &RunId, patch: RunPatch) -> Result<RunRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(id).ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })?;
        patch.apply(record, Utc::now())?;
        Ok(record.clone())
    }

    async fn get(&self, id: &RunId) -> Result<RunRecord, StoreError> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>, StoreError> {
        let records: Vec<RunRecord> = self.records.read().await.values().cloned().collect();
        Ok(paginate(records, limit, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentflow_utils::error::RecordError;
    use contentflow_utils::types::{RunStatus, StageId};

    #[tokio::test]
    async fn test_create_get_update() {
        let store = InMemoryRunLogStore::new();
        let id = store.create(RunRecord::new_pending(None)).await.unwrap();

        let updated = store
            .update(&id, RunPatch::new().status(RunStatus::Running))
            .await
            .unwrap();
        assert_eq!(updated.status, RunStatus::Running);
        assert_eq!(store.get(&id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_ids() {
        let store = InMemoryRunLogStore::new();
        let record = RunRecord::new_pending(None);
        store.create(record.clone()).await.unwrap();
        assert!(matches!(
            store.create(record).await,
            Err(StoreError::DuplicateId { .. })
        ));

        let ghost = RunId::parse("ghost").unwrap();
        assert!(store.get(&ghost).await.unwrap_err().is_not_found());
        assert!(
            store
                .update(&ghost, RunPatch::new())
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_rejected_patch_leaves_record_unchanged() {
        let store = InMemoryRunLogStore::new();
        let id = store.create(RunRecord::new_pending(None)).await.unwrap();
        store
            .update(&id, RunPatch::new().status(RunStatus::Running))
            .await
            .unwrap();
        let before = store.get(&id).await.unwrap();

        let err = store
            .update(
                &id,
                RunPatch::new()
                    .current_stage(StageId::Audio)
                    .stage_result(StageId::Audio, "a.mp3"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Record(RecordError::OutOfOrder {
                missing: StageId::Text,
                ..
            })
        ));
        assert_eq!(store.get(&id).await.unwrap(), before);
    }
}
