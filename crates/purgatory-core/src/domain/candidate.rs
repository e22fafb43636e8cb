//! DeletionCandidate - 外部削除を待つ追跡レコード
//!
//! # 状態
//! - PENDING: 猶予期間のカウントダウン中。sweep が削除直前に `claimed` を立てる
//! - PROCESSED: 外部オブジェクト削除済み
//!
//! 時刻はストアと同じく秒精度で保持します。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{CandidateStatus, ContentHash, RecordId};

/// DeletionCandidate は 1 つの外部オブジェクトの削除待ちレコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionCandidate {
    pub id: RecordId,
    pub content_hash: ContentHash,
    /// ローカルの参照が最後に外れた時刻
    pub orphaned_at: DateTime<Utc>,
    pub status: CandidateStatus,
    /// sweep が外部削除に着手済み（restore 不可）
    #[serde(default)]
    pub claimed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl DeletionCandidate {
    pub fn pending(id: RecordId, content_hash: ContentHash, orphaned_at: DateTime<Utc>) -> Self {
        Self {
            id,
            content_hash,
            orphaned_at: truncate_to_secs(orphaned_at),
            status: CandidateStatus::Pending,
            claimed: false,
            processed_at: None,
        }
    }

    /// PENDING かつ cutoff より厳密に前なら対象（claim の有無は問わない）
    pub fn is_eligible(&self, cutoff: DateTime<Utc>) -> bool {
        self.status.is_pending() && self.orphaned_at < cutoff
    }

    /// restore できるのは claim されていない PENDING だけ
    pub fn is_restorable(&self) -> bool {
        self.status.is_pending() && !self.claimed
    }

    /// 2 回目以降は最初の processed_at を保持
    pub fn mark_processed(&mut self, at: DateTime<Utc>) {
        if self.status.is_pending() {
            self.status = CandidateStatus::Processed;
            self.claimed = false;
            self.processed_at = Some(truncate_to_secs(at));
        }
    }
}

/// GracePeriod は orphan から外部削除までの猶予
///
/// 0 以下は「機能オフ」を意味するので、その値からは作れません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GracePeriod(i64);

impl GracePeriod {
    pub fn from_secs(secs: i64) -> Option<Self> {
        (secs > 0).then_some(Self(secs))
    }

    pub fn from_config(secs: Option<i64>) -> Option<Self> {
        secs.and_then(Self::from_secs)
    }

    pub fn as_secs(self) -> i64 {
        self.0
    }

    /// `now - grace`（表現できる最小時刻で飽和）
    pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        Duration::try_seconds(self.0)
            .and_then(|d| now.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// 秒未満を切り捨てる（ストアの保存精度に合わせる）
pub fn truncate_to_secs(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn candidate(orphaned_at: DateTime<Utc>) -> DeletionCandidate {
        DeletionCandidate::pending(
            RecordId::from_ulid(Ulid::new()),
            ContentHash::parse("0123456789abcdef0123456789abcdef01234567").unwrap(),
            orphaned_at,
        )
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(i64::MIN)]
    fn non_positive_grace_period_is_disabled(#[case] secs: i64) {
        assert_eq!(GracePeriod::from_secs(secs), None);
    }

    #[test]
    fn unset_grace_period_is_disabled() {
        assert_eq!(GracePeriod::from_config(None), None);
        assert_eq!(GracePeriod::from_config(Some(60)).map(GracePeriod::as_secs), Some(60));
    }

    #[test]
    fn cutoff_subtracts_grace() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let grace = GracePeriod::from_secs(3600).unwrap();
        assert_eq!(grace.cutoff(now), Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn huge_grace_saturates() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let grace = GracePeriod::from_secs(i64::MAX).unwrap();
        assert_eq!(grace.cutoff(now), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn eligibility_is_strictly_before_cutoff() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();

        assert!(candidate(cutoff - Duration::seconds(1)).is_eligible(cutoff));
        assert!(!candidate(cutoff).is_eligible(cutoff));
        assert!(!candidate(cutoff + Duration::seconds(1)).is_eligible(cutoff));
    }

    #[test]
    fn processed_candidates_are_never_eligible() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let mut c = candidate(cutoff - Duration::days(1));

        c.mark_processed(cutoff);
        assert_eq!(c.status, CandidateStatus::Processed);
        assert_eq!(c.processed_at, Some(cutoff));
        assert!(!c.is_eligible(cutoff));
        assert!(!c.is_restorable());

        // second mark keeps the first timestamp
        c.mark_processed(cutoff + Duration::days(1));
        assert_eq!(c.processed_at, Some(cutoff));
    }

    #[test]
    fn orphaned_at_is_truncated_to_seconds() {
        let at = Utc.timestamp_opt(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(candidate(at).orphaned_at.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn claimed_candidate_stays_eligible_but_not_restorable() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap();
        let mut c = candidate(cutoff - Duration::days(1));
        assert!(c.is_restorable());

        c.claimed = true;
        assert!(c.is_eligible(cutoff));
        assert!(!c.is_restorable());

        c.mark_processed(cutoff);
        assert!(!c.claimed);
    }
}
