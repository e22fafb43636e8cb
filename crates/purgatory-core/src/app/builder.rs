//! SweeperBuilder - スイーパーの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 設定ファイルからの組み立て（`from_config`）

use std::sync::Arc;

use crate::app::DeferredDeletionSweeper;
use crate::config::{Config, ConfigError, DEFAULT_BATCH_LIMIT};
use crate::domain::StoreError;
use crate::impls::{build_deleter, open_store};
use crate::ports::{DeleteOptions, ExternalDeleter, IdGenerator, MetadataStore, SystemClock, UlidGenerator};

/// SweeperBuilder はスイーパーを構築
///
/// # 使用例
/// ```ignore
/// let sweeper = SweeperBuilder::new()
///     .store(Arc::new(InMemoryMetadataStore::new()))
///     .deleter(Arc::new(InMemoryObjectStore::new()))
///     .batch_limit(Some(500))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - store / deleter のどちらかが欠けていれば build() で BuildError
/// - 設定の検証エラー / sqlite の open 失敗は from_config() で BuildError
pub struct SweeperBuilder {
    store: Option<Arc<dyn MetadataStore>>,
    deleter: Option<Arc<dyn ExternalDeleter>>,
    ids: Option<Arc<dyn IdGenerator>>,
    batch_limit: Option<usize>,
    delete_options: DeleteOptions,
}

/// BuildError はスイーパー構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("metadata store is not configured")]
    MissingStore,
    #[error("external deleter is not configured")]
    MissingDeleter,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open metadata store: {0}")]
    Store(#[from] StoreError),
}

impl SweeperBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            deleter: None,
            ids: None,
            batch_limit: Some(DEFAULT_BATCH_LIMIT),
            delete_options: DeleteOptions::default(),
        }
    }

    /// 設定ファイルの内容で store / deleter / 上限 / 削除オプションを埋める
    ///
    /// 返した builder はさらに上書きできる（テストで deleter を差し替えるなど）。
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        config.validate()?;
        Ok(Self::new()
            .store(open_store(&config.store)?)
            .deleter(build_deleter(&config.deleter))
            .batch_limit(config.batch_limit())
            .delete_options(config.delete))
    }

    pub fn store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn deleter(mut self, deleter: Arc<dyn ExternalDeleter>) -> Self {
        self.deleter = Some(deleter);
        self
    }

    /// `None` で上限なし
    pub fn batch_limit(mut self, limit: Option<usize>) -> Self {
        self.batch_limit = limit.filter(|&n| n > 0);
        self
    }

    pub fn delete_options(mut self, options: DeleteOptions) -> Self {
        self.delete_options = options;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<DeferredDeletionSweeper, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let deleter = self.deleter.ok_or(BuildError::MissingDeleter)?;
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        Ok(DeferredDeletionSweeper::new(
            store,
            deleter,
            ids,
            self.batch_limit,
            self.delete_options,
        ))
    }
}

impl Default for SweeperBuilder {
    fn default() -> Self {
        Self::new()
    }
}
