//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! 追跡レコードとスイープ実行の ID は ULID で表現します。
//! Phantom type パターンで `RecordId` と `RunId` を別の型として扱います。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: 同じ orphaned_at のレコードは登録順に並ぶ
//! - **分散生成可能**: 調整なしで生成できる
//! - **文字列表現が固定長**: SQLite の TEXT 主キーにそのまま使える

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"record-", "run-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Parse error for prefixed identifiers.
#[derive(Debug, thiserror::Error)]
#[error("invalid id {input:?}: {reason}")]
pub struct IdParseError {
    input: String,
    reason: String,
}

/// プレフィックス付き（"record-01H..."）と素の ULID の両方を受け付ける
impl<T: IdMarker> FromStr for Id<T> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|e| IdParseError {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// 追跡レコードのマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Record {}

impl IdMarker for Record {
    fn prefix() -> &'static str {
        "record-"
    }
}

/// スイープ実行のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {}

impl IdMarker for Run {
    fn prefix() -> &'static str {
        "run-"
    }
}

/// Identifier of a deletion tracking record.
pub type RecordId = Id<Record>;

/// Identifier of one sweep invocation (used in logs and reports).
pub type RunId = Id<Run>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_type_prefix() {
        let ulid = Ulid::new();

        let record = RecordId::from_ulid(ulid);
        let run = RunId::from_ulid(ulid);

        assert_eq!(record.as_ulid(), run.as_ulid());
        assert_eq!(record.to_string(), format!("record-{ulid}"));
        assert_eq!(run.to_string(), format!("run-{ulid}"));
    }

    #[test]
    fn parses_prefixed_and_bare_ulids() {
        let ulid = Ulid::new();

        let prefixed: RecordId = format!("record-{ulid}").parse().unwrap();
        let bare: RecordId = ulid.to_string().parse().unwrap();

        assert_eq!(prefixed, bare);
        assert_eq!(prefixed.as_ulid(), ulid);
    }

    #[test]
    fn rejects_garbage() {
        let err = "record-not-a-ulid".parse::<RecordId>().unwrap_err();
        assert!(err.to_string().contains("record-not-a-ulid"));
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let ulid = Ulid::new();
        let id = RecordId::from_ulid(ulid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{ulid}\""));

        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;

        assert_eq!(size_of::<RecordId>(), size_of::<Ulid>());
        assert_eq!(size_of::<RunId>(), 16);
    }
}
