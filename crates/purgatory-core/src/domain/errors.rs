//! Errors - エラー型と分類
//!
//! ポートごとにエラー型を分け、運用上の分類（ErrorKind）を付けます。
//! - DeleteError: 外部ストアの削除失敗（候補ごとに隔離、次回リトライ）
//! - StoreError: メタデータストアの失敗（スイープ全体を中断して上位へ）
//! - SweepError: スイープ実行の失敗

use serde::{Deserialize, Serialize};

use super::ContentHash;

/// ErrorKind は実行エラーの分類
///
/// - Transient: 一時的なエラー（次の tick でリトライすれば通る見込み）
/// - Permanent: 恒久的なエラー（リトライしても変わらない）
/// - Infrastructure: インフラエラー（DB / ファイルシステムの障害）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
    Infrastructure,
}

/// Failure of the external object store to delete one payload.
#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("object not found: {0}")]
    NotFound(ContentHash),

    #[error("failed to delete {hash}: {source}")]
    Io {
        hash: ContentHash,
        #[source]
        source: std::io::Error,
    },

    #[error("deleted {hash} but cleanup failed: {source}")]
    Cleanup {
        hash: ContentHash,
        #[source]
        source: std::io::Error,
    },

    #[error("delete of {hash} rejected: {reason}")]
    Rejected { hash: ContentHash, reason: String },
}

impl DeleteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeleteError::NotFound(_) | DeleteError::Rejected { .. } => ErrorKind::Permanent,
            DeleteError::Io { source, .. } | DeleteError::Cleanup { source, .. } => {
                match source.kind() {
                    std::io::ErrorKind::PermissionDenied => ErrorKind::Permanent,
                    _ => ErrorKind::Transient,
                }
            }
        }
    }
}

/// Failure of the metadata store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("corrupt row: {reason}")]
    Corrupt { reason: String },

    #[error("blocking task failed: {0}")]
    Blocking(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::Permanent,
            _ => ErrorKind::Infrastructure,
        }
    }
}

/// Failure of a whole sweep run.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("metadata store: {0}")]
    Store(#[from] StoreError),
}

impl SweepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SweepError::Store(e) => e.kind(),
        }
    }
}
