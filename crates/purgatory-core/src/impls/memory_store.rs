//! InMemoryMetadataStore - 開発・テスト用のメタデータストア
//!
//! # 実装詳細
//! - HashMap<RecordId, DeletionCandidate> が正本
//! - tokio::sync::Mutex で排他制御（await を跨いでロックを持たない）
//! - cursor はクエリ時点のスナップショット

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{ContentHash, DeletionCandidate, RecordId, StoreError};
use crate::ports::{
    CandidateCounts, CandidateCursor, IdGenerator, MetadataStore, SystemClock, UlidGenerator,
};

#[derive(Default)]
struct InMemoryStoreState {
    records: HashMap<RecordId, DeletionCandidate>,
}

impl InMemoryStoreState {
    fn pending_for(&self, hash: &ContentHash) -> Option<&DeletionCandidate> {
        self.records
            .values()
            .find(|c| c.status.is_pending() && &c.content_hash == hash)
    }

    fn counts(&self) -> CandidateCounts {
        let mut counts = CandidateCounts::default();
        for record in self.records.values() {
            if record.status.is_pending() {
                counts.pending += 1;
                counts.oldest_pending = Some(match counts.oldest_pending {
                    Some(oldest) => oldest.min(record.orphaned_at),
                    None => record.orphaned_at,
                });
            } else {
                counts.processed += 1;
            }
        }
        counts
    }
}

pub struct InMemoryMetadataStore {
    state: Arc<Mutex<InMemoryStoreState>>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UlidGenerator::new(SystemClock)))
    }

    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryStoreState::default())),
            ids,
        }
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn register_orphan(
        &self,
        hash: &ContentHash,
        orphaned_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.pending_for(hash) {
            return Ok(existing.id);
        }
        let id = self.ids.generate_record_id();
        state
            .records
            .insert(id, DeletionCandidate::pending(id, hash.clone(), orphaned_at));
        Ok(id)
    }

    async fn restore(&self, hash: &ContentHash) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(id) = state
            .pending_for(hash)
            .filter(|c| c.is_restorable())
            .map(|c| c.id)
        else {
            return Ok(false);
        };
        state.records.remove(&id);
        Ok(true)
    }

    async fn pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Box<dyn CandidateCursor>, StoreError> {
        let state = self.state.lock().await;
        let mut eligible: Vec<DeletionCandidate> = state
            .records
            .values()
            .filter(|c| c.is_eligible(cutoff))
            .cloned()
            .collect();
        eligible.sort_by(|a, b| (a.orphaned_at, a.id).cmp(&(b.orphaned_at, b.id)));
        if let Some(limit) = limit {
            eligible.truncate(limit);
        }
        Ok(Box::new(SnapshotCursor {
            rows: eligible.into(),
        }))
    }

    async fn claim(&self, id: RecordId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.records.get_mut(&id) {
            Some(record) if record.status.is_pending() => {
                record.claimed = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, id: RecordId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.records.get_mut(&id)
            && record.status.is_pending()
        {
            record.claimed = false;
        }
        Ok(())
    }

    async fn mark_processed(
        &self,
        id: RecordId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.mark_processed(processed_at);
        Ok(())
    }

    async fn get(&self, id: RecordId) -> Result<Option<DeletionCandidate>, StoreError> {
        Ok(self.state.lock().await.records.get(&id).cloned())
    }

    async fn counts(&self) -> Result<CandidateCounts, StoreError> {
        Ok(self.state.lock().await.counts())
    }
}

struct SnapshotCursor {
    rows: VecDeque<DeletionCandidate>,
}

#[async_trait]
impl CandidateCursor for SnapshotCursor {
    async fn next(&mut self) -> Result<Option<DeletionCandidate>, StoreError> {
        Ok(self.rows.pop_front())
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
