//! SweepReport - 1 回の sweep の結果
//!
//! ループがログに出し、CLI が表示するものなので、ただのデータだけを持つ
//! （ストアや deleter へのハンドルは持たない）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentHash, ErrorKind, RecordId, RunId};

/// SCREAMING_SNAKE_CASE でシリアライズ（DISABLED / COMPLETED）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SweepOutcome {
    /// grace period が未設定 / 0 以下。何も触っていない
    Disabled,
    Completed,
}

/// 外部削除に失敗した候補
///
/// レコードは PENDING のまま残り、次回の sweep で再び対象になる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDeletion {
    pub id: RecordId,
    pub content_hash: ContentHash,
    pub kind: ErrorKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub run_id: RunId,
    pub outcome: SweepOutcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<DateTime<Utc>>,

    /// この run でストアから読んだ候補数
    pub scanned: usize,

    /// 外部から削除し PROCESSED にした数
    pub deleted: usize,

    /// 読んだ後に restore / 処理済みになっていたため飛ばした数
    #[serde(default)]
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedDeletion>,

    /// バッチ上限に達した（まだ候補が残っている可能性あり）
    #[serde(default)]
    pub batch_limit_reached: bool,
}

impl SweepReport {
    pub fn disabled(run_id: RunId) -> Self {
        Self {
            run_id,
            outcome: SweepOutcome::Disabled,
            cutoff: None,
            scanned: 0,
            deleted: 0,
            skipped: 0,
            failed: Vec::new(),
            batch_limit_reached: false,
        }
    }

    pub fn started(run_id: RunId, cutoff: DateTime<Utc>) -> Self {
        Self {
            run_id,
            outcome: SweepOutcome::Completed,
            cutoff: Some(cutoff),
            scanned: 0,
            deleted: 0,
            skipped: 0,
            failed: Vec::new(),
            batch_limit_reached: false,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.outcome == SweepOutcome::Disabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn outcome_serializes_as_upper_case_names() {
        assert_eq!(serde_json::to_string(&SweepOutcome::Disabled).unwrap(), "\"DISABLED\"");
        assert_eq!(serde_json::to_string(&SweepOutcome::Completed).unwrap(), "\"COMPLETED\"");
    }

    #[test]
    fn disabled_report_omits_cutoff_and_failures() {
        let report = SweepReport::disabled(RunId::from_ulid(Ulid::new()));
        let v = serde_json::to_value(&report).unwrap();

        assert_eq!(v["outcome"], "DISABLED");
        assert_eq!(v["deleted"], 0);
        assert!(v.get("cutoff").is_none());
        assert!(v.get("failed").is_none());
    }
}
