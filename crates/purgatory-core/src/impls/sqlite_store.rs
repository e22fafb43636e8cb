//! SqliteMetadataStore - 本番用のメタデータストア
//!
//! # 実装詳細
//! - rusqlite は同期 API なので `spawn_blocking` で呼ぶ
//! - 接続は std の `Mutex` の内側（await を跨いでロックを持たない）
//! - 時刻は unix 秒で保存
//! - PENDING の走査は `(orphaned_at, id)` の keyset ページング。`next()` の間に
//!   statement を開いたままにしない
//! - `claimed` 列で「外部削除に着手済み」を表し、restore と sweep の競合を防ぐ

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::domain::{
    CandidateStatus, ContentHash, DeletionCandidate, RecordId, StoreError,
};
use crate::ports::{
    CandidateCounts, CandidateCursor, IdGenerator, MetadataStore, SystemClock, UlidGenerator,
};

const PAGE_SIZE: usize = 200;

const SCHEMA_DDL: &str = "
    CREATE TABLE IF NOT EXISTS deletion_candidates (
        id TEXT PRIMARY KEY,
        content_hash TEXT NOT NULL,
        orphaned_at INTEGER NOT NULL,
        status TEXT NOT NULL,
        claimed INTEGER NOT NULL DEFAULT 0,
        processed_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_candidates_scan
        ON deletion_candidates(status, orphaned_at, id);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_pending_hash
        ON deletion_candidates(content_hash) WHERE status = 'PENDING';
";

const SELECT_COLUMNS: &str = "id, content_hash, orphaned_at, status, claimed, processed_at";

type RawRow = (String, String, i64, String, bool, Option<i64>);

/// SQLite 接続のスレッドセーフなラッパー
#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
    ids: Arc<dyn IdGenerator>,
}

impl SqliteMetadataStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::init(conn)
    }

    pub fn open_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_DDL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        })
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        with_conn(Arc::clone(&self.conn), f).await
    }
}

async fn with_conn<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn
            .lock()
            .map_err(|_| StoreError::Blocking("sqlite connection mutex poisoned".to_string()))?;
        f(&mut guard)
    })
    .await
    .map_err(|e| StoreError::Blocking(e.to_string()))?
}

/// `cutoff` より厳密に前ではない最小の整数秒
fn exclusive_upper_secs(cutoff: DateTime<Utc>) -> i64 {
    if cutoff.timestamp_subsec_nanos() > 0 {
        cutoff.timestamp() + 1
    } else {
        cutoff.timestamp()
    }
}

fn from_secs(secs: i64, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| StoreError::Corrupt {
        reason: format!("{column} out of range: {secs}"),
    })
}

fn to_candidate(raw: RawRow) -> Result<DeletionCandidate, StoreError> {
    let (id, hash, orphaned_at, status, claimed, processed_at) = raw;
    let corrupt = |reason: String| StoreError::Corrupt { reason };
    Ok(DeletionCandidate {
        id: id.parse::<RecordId>().map_err(|e| corrupt(e.to_string()))?,
        content_hash: ContentHash::parse(&hash).map_err(|e| corrupt(e.to_string()))?,
        orphaned_at: from_secs(orphaned_at, "orphaned_at")?,
        status: status.parse::<CandidateStatus>().map_err(corrupt)?,
        claimed,
        processed_at: processed_at
            .map(|secs| from_secs(secs, "processed_at"))
            .transpose()?,
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn register_orphan(
        &self,
        hash: &ContentHash,
        orphaned_at: DateTime<Utc>,
    ) -> Result<RecordId, StoreError> {
        let hash = hash.clone();
        let new_id = self.ids.generate_record_id();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM deletion_candidates
                     WHERE content_hash = ?1 AND status = 'PENDING'",
                    params![hash.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let id = match existing {
                Some(id) => id.parse::<RecordId>().map_err(|e| StoreError::Corrupt {
                    reason: e.to_string(),
                })?,
                None => {
                    tx.execute(
                        "INSERT INTO deletion_candidates (id, content_hash, orphaned_at, status)
                         VALUES (?1, ?2, ?3, 'PENDING')",
                        params![new_id.as_ulid().to_string(), hash.as_str(), orphaned_at.timestamp()],
                    )?;
                    new_id
                }
            };
            tx.commit()?;
            Ok(id)
        })
        .await
    }

    async fn restore(&self, hash: &ContentHash) -> Result<bool, StoreError> {
        let hash = hash.clone();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM deletion_candidates
                 WHERE content_hash = ?1 AND status = 'PENDING' AND claimed = 0",
                params![hash.as_str()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn pending_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Box<dyn CandidateCursor>, StoreError> {
        Ok(Box::new(SqliteCursor {
            conn: Arc::clone(&self.conn),
            upper: exclusive_upper_secs(cutoff),
            remaining: limit,
            last: (i64::MIN, String::new()),
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }

    async fn claim(&self, id: RecordId) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE deletion_candidates SET claimed = 1
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id.as_ulid().to_string()],
            )?;
            Ok(updated > 0)
        })
        .await
    }

    async fn release(&self, id: RecordId) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE deletion_candidates SET claimed = 0
                 WHERE id = ?1 AND status = 'PENDING'",
                params![id.as_ulid().to_string()],
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_processed(
        &self,
        id: RecordId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let key = id.as_ulid().to_string();
            let updated = conn.execute(
                "UPDATE deletion_candidates SET status = 'PROCESSED', claimed = 0, processed_at = ?2
                 WHERE id = ?1 AND status = 'PENDING'",
                params![key, processed_at.timestamp()],
            )?;
            if updated == 0 {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM deletion_candidates WHERE id = ?1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Err(StoreError::NotFound(id.to_string()));
                }
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, id: RecordId) -> Result<Option<DeletionCandidate>, StoreError> {
        self.with_conn(move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {SELECT_COLUMNS} FROM deletion_candidates WHERE id = ?1"),
                    params![id.as_ulid().to_string()],
                    read_row,
                )
                .optional()?;
            raw.map(to_candidate).transpose()
        })
        .await
    }

    async fn counts(&self) -> Result<CandidateCounts, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*), MIN(orphaned_at) FROM deletion_candidates GROUP BY status",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            })?;
            let mut counts = CandidateCounts::default();
            for row in rows {
                let (status, count, oldest) = row?;
                let count = usize::try_from(count).unwrap_or_default();
                match status.parse::<CandidateStatus>() {
                    Ok(CandidateStatus::Pending) => {
                        counts.pending = count;
                        counts.oldest_pending =
                            oldest.map(|secs| from_secs(secs, "orphaned_at")).transpose()?;
                    }
                    Ok(CandidateStatus::Processed) => counts.processed = count,
                    Err(reason) => return Err(StoreError::Corrupt { reason }),
                }
            }
            Ok(counts)
        })
        .await
    }
}

/// PENDING 行の keyset ページング走査
struct SqliteCursor {
    conn: Arc<Mutex<Connection>>,
    upper: i64,
    remaining: Option<usize>,
    last: (i64, String),
    buffer: VecDeque<DeletionCandidate>,
    exhausted: bool,
}

impl SqliteCursor {
    async fn fill(&mut self) -> Result<(), StoreError> {
        let page = self.remaining.map_or(PAGE_SIZE, |r| r.min(PAGE_SIZE));
        if page == 0 {
            self.exhausted = true;
            return Ok(());
        }
        let upper = self.upper;
        let (last_at, last_id) = self.last.clone();
        let rows = with_conn(Arc::clone(&self.conn), move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM deletion_candidates
                 WHERE status = 'PENDING' AND orphaned_at < ?1
                   AND (orphaned_at > ?2 OR (orphaned_at = ?2 AND id > ?3))
                 ORDER BY orphaned_at, id
                 LIMIT ?4"
            ))?;
            let raw = stmt
                .query_map(params![upper, last_at, last_id, page as i64], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw.into_iter().map(to_candidate).collect::<Result<Vec<_>, _>>()
        })
        .await?;

        if rows.len() < page {
            self.exhausted = true;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= rows.len();
        }
        if let Some(tail) = rows.last() {
            self.last = (tail.orphaned_at.timestamp(), tail.id.as_ulid().to_string());
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

#[async_trait]
impl CandidateCursor for SqliteCursor {
    async fn next(&mut self) -> Result<Option<DeletionCandidate>, StoreError> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill().await?;
        }
        Ok(self.buffer.pop_front())
    }

    async fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
