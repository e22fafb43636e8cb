//! Status - 削除待ちの状況を説明するビュー

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{GracePeriod, StoreError};
use crate::ports::{CandidateCounts, MetadataStore};

/// Status は「いま sweep したら何が起きるか」を説明
///
/// # 使用例
/// ```ignore
/// let view = status(store.as_ref(), config.grace_period(), clock.now()).await?;
/// println!("{}", serde_json::to_string_pretty(&view)?);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<DateTime<Utc>>,
    pub counts: CandidateCounts,
    /// 最古の PENDING が cutoff を過ぎている（= 次の sweep で何か消える）
    pub backlog: bool,
}

pub async fn status(
    store: &dyn MetadataStore,
    grace: Option<GracePeriod>,
    now: DateTime<Utc>,
) -> Result<StatusView, StoreError> {
    let counts = store.counts().await?;
    let cutoff = grace.map(|g| g.cutoff(now));
    let backlog = match (cutoff, counts.oldest_pending) {
        (Some(cutoff), Some(oldest)) => oldest < cutoff,
        _ => false,
    };
    Ok(StatusView {
        enabled: grace.is_some(),
        grace_period_secs: grace.map(GracePeriod::as_secs),
        cutoff,
        counts,
        backlog,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContentHash;
    use crate::impls::InMemoryMetadataStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn hash(n: u32) -> ContentHash {
        ContentHash::parse(&format!("{n:040x}")).unwrap()
    }

    #[tokio::test]
    async fn reports_backlog_past_cutoff() {
        let store = InMemoryMetadataStore::new();
        store.register_orphan(&hash(1), now() - Duration::hours(2)).await.unwrap();
        store.register_orphan(&hash(2), now()).await.unwrap();

        let view = status(&store, GracePeriod::from_secs(3600), now()).await.unwrap();

        assert!(view.enabled);
        assert_eq!(view.cutoff, Some(now() - Duration::hours(1)));
        assert_eq!(view.counts.pending, 2);
        assert_eq!(view.counts.oldest_pending, Some(now() - Duration::hours(2)));
        assert!(view.backlog);
    }

    #[tokio::test]
    async fn disabled_sweeper_has_no_cutoff() {
        let store = InMemoryMetadataStore::new();
        store.register_orphan(&hash(1), now() - Duration::days(9)).await.unwrap();

        let view = status(&store, None, now()).await.unwrap();

        assert!(!view.enabled);
        assert_eq!(view.cutoff, None);
        assert!(!view.backlog);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("cutoff").is_none());
        assert_eq!(json["counts"]["pending"], 1);
    }
}
