//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryMetadataStore**: 開発・テスト用の正本
//! - **SqliteMetadataStore**: 本番用の正本（rusqlite）
//! - **InMemoryObjectStore**: 開発・テスト用の外部ストア
//! - **FilesystemDeleter**: ローカル/マウント済みストレージ上の外部ストア
//!
//! どの実装を使うかは起動時に設定から 1 回だけ決めます。

pub mod fs_deleter;
pub mod memory_deleter;
pub mod memory_store;
pub mod sqlite_store;

use std::sync::Arc;

use crate::config::{DeleterConfig, StoreConfig};
use crate::domain::StoreError;
use crate::ports::{ExternalDeleter, MetadataStore};

pub use self::fs_deleter::FilesystemDeleter;
pub use self::memory_deleter::InMemoryObjectStore;
pub use self::memory_store::InMemoryMetadataStore;
pub use self::sqlite_store::SqliteMetadataStore;

pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn MetadataStore>, StoreError> {
    Ok(match config {
        StoreConfig::Memory => Arc::new(InMemoryMetadataStore::new()),
        StoreConfig::Sqlite { path } => Arc::new(SqliteMetadataStore::open(path)?),
    })
}

pub fn build_deleter(config: &DeleterConfig) -> Arc<dyn ExternalDeleter> {
    match config {
        DeleterConfig::Memory => Arc::new(InMemoryObjectStore::new()),
        DeleterConfig::Filesystem {
            root,
            prune_empty_dirs,
        } => Arc::new(FilesystemDeleter::new(root.clone(), *prune_empty_dirs)),
    }
}
