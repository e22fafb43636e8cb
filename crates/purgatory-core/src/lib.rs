//! purgatory-core
//!
//! Deferred deletion of externally stored objects.
//!
//! ファイルが参照されなくなった時点では外部ストアから消さず、
//! 猶予期間（grace period）を過ぎてからまとめて削除します。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, content_hash, candidate, state, report, errors）
//! - **ports**: 抽象化レイヤー（MetadataStore, ExternalDeleter, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, sweeper, sweep_loop, status）
//! - **impls**: 実装（InMemory / SQLite のメタデータストア、メモリ / ファイルシステムの外部ストア）
//! - **config**: TOML 設定
//! - **observability**: tracing の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
