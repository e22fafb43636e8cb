//! InMemoryObjectStore - 開発用の外部オブジェクトストア
//!
//! 実際のストレージを持たない環境（ローカル開発・テスト）で使います。
//! `put()` で置いたオブジェクトだけが存在し、削除呼び出しは記録されます。
//! 記録は直近 [`DELETE_LOG_CAP`] 件まで（長時間動かす `run` でも増え続けない）。

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{ContentHash, DeleteError};
use crate::ports::{DeleteOptions, DeleteOutcome, ExternalDeleter};

/// 保持する削除呼び出しの最大件数。超えた分は古いものから捨てる
pub const DELETE_LOG_CAP: usize = 1024;

#[derive(Default)]
struct ObjectState {
    objects: HashSet<ContentHash>,
    deletes: VecDeque<ContentHash>,
}

#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<ObjectState>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ObjectState> {
        // the state stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn put(&self, hash: ContentHash) {
        self.lock().objects.insert(hash);
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.lock().objects.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent hashes `delete` was called with, in call order.
    pub fn delete_calls(&self) -> Vec<ContentHash> {
        self.lock().deletes.iter().cloned().collect()
    }
}

#[async_trait]
impl ExternalDeleter for InMemoryObjectStore {
    async fn delete(
        &self,
        hash: &ContentHash,
        options: DeleteOptions,
    ) -> Result<DeleteOutcome, DeleteError> {
        let mut state = self.lock();
        if state.deletes.len() == DELETE_LOG_CAP {
            state.deletes.pop_front();
        }
        state.deletes.push_back(hash.clone());
        if state.objects.remove(hash) {
            Ok(DeleteOutcome::Deleted)
        } else if options.force {
            Ok(DeleteOutcome::AlreadyAbsent)
        } else {
            Err(DeleteError::NotFound(hash.clone()))
        }
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> ContentHash {
        ContentHash::parse("0123456789abcdef0123456789abcdef01234567").unwrap()
    }

    #[tokio::test]
    async fn force_tolerates_missing_objects() {
        let store = InMemoryObjectStore::new();
        store.put(hash());

        let forced = DeleteOptions { force: true, quiet: false };
        assert_eq!(store.delete(&hash(), forced).await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete(&hash(), forced).await.unwrap(), DeleteOutcome::AlreadyAbsent);
        assert!(store.is_empty());

        let strict = DeleteOptions { force: false, quiet: false };
        let err = store.delete(&hash(), strict).await.unwrap_err();
        assert!(matches!(err, DeleteError::NotFound(_)));

        assert_eq!(store.delete_calls().len(), 3);
    }

    #[tokio::test]
    async fn delete_log_keeps_only_the_latest_calls() {
        let store = InMemoryObjectStore::new();
        let forced = DeleteOptions { force: true, quiet: true };
        let hashes: Vec<_> = (0..DELETE_LOG_CAP as u32 + 6)
            .map(|n| ContentHash::parse(&format!("{n:040x}")).unwrap())
            .collect();

        for hash in &hashes {
            store.delete(hash, forced).await.unwrap();
        }

        let calls = store.delete_calls();
        assert_eq!(calls.len(), DELETE_LOG_CAP);
        assert_eq!(calls.first(), Some(&hashes[6]));
        assert_eq!(calls.last(), hashes.last());
    }
}
