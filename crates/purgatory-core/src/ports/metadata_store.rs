//! MetadataStore port - 削除候補の正本（source of truth）
//!
//! MetadataStore は以下を管理します：
//! - 削除候補レコード（content_hash, orphaned_at, status）
//! - スイープ対象の範囲検索（cutoff より前 かつ PENDING）
//! - 処理済みマーク
//!
//! # 実装
//! - InMemoryMetadataStore（開発・テスト用）
//! - SqliteMetadataStore（本番用）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ContentHash, DeletionCandidate, RecordId, StoreError};

/// 状態ごとの件数（status コマンド用）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCounts {
    pub pending: usize,
    pub processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_pending: Option<DateTime<Utc>>,
}

/// A lazily produced, closable sequence of candidates.
///
/// The cursor is finite and belongs to one query; callers must `close` it
/// once they are done, also on early exit.
#[async_trait]
pub trait CandidateCursor: Send {
    async fn next(&mut self) -> Result<Option<DeletionCandidate>, StoreError>;

    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// MetadataStore は削除候補の状態を保持する
///
/// # 設計原則
/// - status の遷移は PENDING → PROCESSED のみ
/// - `pending_before` は orphaned_at 昇順（同時刻は id 昇順）で返す
/// - cutoff は排他的（orphaned_at < cutoff）。ただし時刻は秒精度で保存される
///   ため、比較も秒単位になる（T.7 に orphan されたレコードは T として扱われ、
///   cutoff T.5 で選ばれる）
/// - 外部削除の直前に `claim` し、claim 済みの行は `restore` できない
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Start the countdown for `hash`.
    ///
    /// An existing pending record for the same hash is kept as is (the
    /// earliest orphan time wins) and its id returned.
    async fn register_orphan(
        &self,
        hash: &ContentHash,
        orphaned_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError>;

    /// Withdraw the pending record for `hash`.
    ///
    /// Returns `false` when nothing is pending or the record is claimed by a
    /// sweep that is deleting its payload right now.
    async fn restore(&self, hash: &ContentHash) -> Result<bool, StoreError>;

    /// Pending candidates orphaned strictly before `cutoff`, oldest first,
    /// at most `limit` of them (`None` = unbounded).
    async fn pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Box<dyn CandidateCursor>, StoreError>;

    /// Reserve a record for deletion. Returns `false` if it is no longer
    /// pending (restored or processed since the scan).
    ///
    /// A claim left behind by a crashed run keeps the record eligible, so the
    /// next sweep claims it again.
    async fn claim(&self, id: RecordId) -> Result<bool, StoreError>;

    /// Drop the claim after a failed delete so the record can be restored.
    /// Unknown or processed records are ignored.
    async fn release(&self, id: RecordId) -> Result<(), StoreError>;

    /// Flip a record to PROCESSED. Already processed records are left alone.
    async fn mark_processed(&self, id: RecordId, processed_at: DateTime<Utc>)
    -> Result<(), StoreError>;

    async fn get(&self, id: RecordId) -> Result<Option<DeletionCandidate>, StoreError>;

    async fn counts(&self) -> Result<CandidateCounts, StoreError>;
}
