//! Config - TOML 設定ファイル
//!
//! すべての項目にデフォルトがあるので、最小構成なら
//! `grace_period_secs` と `[deleter]` セクションだけで動きます。
//!
//! # 検証
//! - `interval_secs` は 1 以上
//! - SQLite のパス / filesystem の root は空にできない
//! - 削除が有効なのに永続ストア（SQLite）とメモリの外部ストアを組み合わせるのは不可
//!   （レコードだけ PROCESSED になり、実体は何も消えないため）

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::GracePeriod;
use crate::ports::DeleteOptions;

pub const DEFAULT_BATCH_LIMIT: usize = 1000;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// orphan になってから外部削除するまでの秒数。未設定 / 0 以下なら削除しない
    #[serde(default)]
    pub grace_period_secs: Option<i64>,

    /// 1 回の実行で扱う候補の上限（0 = 無制限）
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// 定期実行の間隔（秒）
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default)]
    pub delete: DeleteOptions,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub deleter: DeleterConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    Memory,
    Sqlite { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Sqlite {
            path: PathBuf::from("purgatory.db"),
        }
    }
}

/// 外部ストアの実装。起動時に一度だけ選ぶ
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeleterConfig {
    #[default]
    Memory,
    Filesystem {
        root: PathBuf,
        #[serde(default = "default_true")]
        prune_empty_dirs: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` の directive。`RUST_LOG` があればそちらが優先
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grace_period_secs: None,
            batch_limit: default_batch_limit(),
            interval_secs: default_interval_secs(),
            delete: DeleteOptions::default(),
            store: StoreConfig::default(),
            deleter: DeleterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be > 0".to_string()));
        }
        if let StoreConfig::Sqlite { path } = &self.store
            && path.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("store.path must not be empty".to_string()));
        }
        if let DeleterConfig::Filesystem { root, .. } = &self.deleter
            && root.as_os_str().is_empty()
        {
            return Err(ConfigError::Invalid("deleter.root must not be empty".to_string()));
        }
        if self.grace_period().is_some()
            && matches!(self.store, StoreConfig::Sqlite { .. })
            && self.deleter == DeleterConfig::Memory
        {
            return Err(ConfigError::Invalid(
                "a sqlite store needs a real [deleter]; the memory deleter would mark records processed without deleting anything"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn grace_period(&self) -> Option<GracePeriod> {
        GracePeriod::from_config(self.grace_period_secs)
    }

    pub fn batch_limit(&self) -> Option<usize> {
        (self.batch_limit > 0).then_some(self.batch_limit)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
