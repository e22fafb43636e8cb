//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **SweeperBuilder**: スイーパーの構築とワイヤリング
//! - **DeferredDeletionSweeper**: 1 回分の deferred deletion
//! - **SweepLoop**: 定期実行と graceful shutdown
//! - **status**: 削除待ちの状況

pub mod builder;
pub mod status;
pub mod sweep_loop;
pub mod sweeper;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SweeperBuilder};
pub use self::status::{StatusView, status};
pub use self::sweep_loop::{SweepLoop, SweepLoopHandle};
pub use self::sweeper::DeferredDeletionSweeper;
