//! State - 削除候補レコードの状態
//!
//! # 状態遷移
//! - Pending: 猶予期間のカウントダウン中（スイープ対象になり得る）
//! - Processed: 外部オブジェクト削除済み（以降のスキャンには現れない）
//!
//! Pending → Processed の一方向のみ。Processed から戻ることはない。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    Pending,
    Processed,
}

impl CandidateStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CandidateStatus::Pending => "PENDING",
            CandidateStatus::Processed => "PROCESSED",
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, CandidateStatus::Pending)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(CandidateStatus::Pending),
            "PROCESSED" => Ok(CandidateStatus::Processed),
            other => Err(format!("unknown candidate status {other:?}")),
        }
    }
}
