//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（メタデータ DB、外部オブジェクトストア、時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - メタデータストアが source of truth（正本）
//! - 外部ストアの削除は冪等
//! - スイーパーはポートを引数で受け取る（グローバル状態なし）

pub mod clock;
pub mod external_deleter;
pub mod id_generator;
pub mod metadata_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::external_deleter::{DeleteOptions, DeleteOutcome, ExternalDeleter};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::metadata_store::{CandidateCounts, CandidateCursor, MetadataStore};
