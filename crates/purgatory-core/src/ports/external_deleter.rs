//! ExternalDeleter port - 外部オブジェクトストアの削除
//!
//! content hash をキーに外部ストア上のペイロードを削除します。
//!
//! # 実装
//! - InMemoryObjectStore（開発・テスト用）
//! - FilesystemDeleter（`<root>/ab/cd/<hash>` レイアウト）

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{ContentHash, DeleteError};

/// Flags passed with every delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteOptions {
    /// Treat a missing object as already deleted.
    pub force: bool,
    /// Swallow secondary errors (cleanup after the payload is gone).
    pub quiet: bool,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            force: true,
            quiet: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing to delete; only returned when `force` is set.
    AlreadyAbsent,
}

/// ExternalDeleter は content hash 単位で外部オブジェクトを削除する
///
/// # 設計原則
/// - 削除は冪等であること（force 時に「存在しない」は成功扱い）
/// - 実装は起動時に設定から 1 つ選ぶ（呼び出しごとに切り替えない）
#[async_trait]
pub trait ExternalDeleter: Send + Sync {
    async fn delete(
        &self,
        hash: &ContentHash,
        options: DeleteOptions,
    ) -> Result<DeleteOutcome, DeleteError>;

    /// Short name for logs ("filesystem", "memory").
    fn backend(&self) -> &'static str;
}
