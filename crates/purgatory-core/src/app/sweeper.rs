//! DeferredDeletionSweeper - 猶予期間を過ぎた外部オブジェクトの削除
//!
//! # フロー
//! 1. grace period が未設定 / 0 以下なら何もしない（DISABLED）
//! 2. cutoff = now - grace で PENDING の候補を古い順に最大 batch_limit 件取得
//! 3. 候補ごとに claim（restore 済みなら skip）→ 外部ストアから削除
//!    → 成功したら PROCESSED にマーク
//! 4. 削除失敗はその候補だけ失敗として記録し claim を外す（PENDING のまま次回リトライ）
//! 5. メタデータストアの失敗は cursor を閉じてから上位へ返す
//!    （ただし対象レコードが消えていただけの NotFound はその候補の skip）

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    FailedDeletion, GracePeriod, RunId, StoreError, SweepError, SweepReport,
};
use crate::ports::{CandidateCursor, DeleteOptions, ExternalDeleter, IdGenerator, MetadataStore};

pub struct DeferredDeletionSweeper {
    store: Arc<dyn MetadataStore>,
    deleter: Arc<dyn ExternalDeleter>,
    ids: Arc<dyn IdGenerator>,
    batch_limit: Option<usize>,
    delete_options: DeleteOptions,
}

impl DeferredDeletionSweeper {
    pub(crate) fn new(
        store: Arc<dyn MetadataStore>,
        deleter: Arc<dyn ExternalDeleter>,
        ids: Arc<dyn IdGenerator>,
        batch_limit: Option<usize>,
        delete_options: DeleteOptions,
    ) -> Self {
        Self {
            store,
            deleter,
            ids,
            batch_limit,
            delete_options,
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn batch_limit(&self) -> Option<usize> {
        self.batch_limit
    }

    /// Run one sweep. `report.deleted` is the number of external objects
    /// removed in this run.
    #[instrument(name = "sweep", skip(self), fields(backend = self.deleter.backend()))]
    pub async fn run(
        &self,
        grace_period_secs: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, SweepError> {
        let run_id = self.ids.generate_run_id();
        let Some(grace) = GracePeriod::from_config(grace_period_secs) else {
            info!(%run_id, "skipping delayed deletion of external objects: grace period is not set");
            return Ok(SweepReport::disabled(run_id));
        };

        let cutoff = grace.cutoff(now);
        let mut report = SweepReport::started(run_id, cutoff);
        let mut cursor = self.store.pending_before(cutoff, self.batch_limit).await?;

        let swept = self.sweep(run_id, cursor.as_mut(), now, &mut report).await;
        let closed = cursor.close().await;
        swept?;
        closed?;

        report.batch_limit_reached = self.batch_limit.is_some_and(|limit| report.scanned >= limit);

        info!(
            %run_id,
            deleted = report.deleted,
            failed = report.failed.len(),
            skipped = report.skipped,
            scanned = report.scanned,
            "deleted {} files from external server",
            report.deleted
        );
        if !report.failed.is_empty() {
            warn!(%run_id, failed = report.failed.len(), "some candidates stay pending after delete errors");
        }
        Ok(report)
    }

    async fn sweep(
        &self,
        run_id: RunId,
        cursor: &mut dyn CandidateCursor,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), StoreError> {
        while let Some(candidate) = cursor.next().await? {
            report.scanned += 1;
            if !self.store.claim(candidate.id).await? {
                warn!(
                    %run_id,
                    record = %candidate.id,
                    hash = %candidate.content_hash,
                    "candidate restored or processed since the scan, skipping"
                );
                report.skipped += 1;
                continue;
            }

            match self
                .deleter
                .delete(&candidate.content_hash, self.delete_options)
                .await
            {
                Ok(outcome) => {
                    // processed only after the payload is gone
                    match self.store.mark_processed(candidate.id, now).await {
                        Ok(()) => {}
                        Err(StoreError::NotFound(_)) => {
                            warn!(
                                %run_id,
                                record = %candidate.id,
                                hash = %candidate.content_hash,
                                "record vanished after its payload was deleted"
                            );
                            report.skipped += 1;
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                    report.deleted += 1;
                    debug!(
                        %run_id,
                        record = %candidate.id,
                        hash = %candidate.content_hash,
                        ?outcome,
                        "external object deleted"
                    );
                }
                Err(err) => {
                    warn!(
                        %run_id,
                        record = %candidate.id,
                        hash = %candidate.content_hash,
                        kind = ?err.kind(),
                        error = %err,
                        "external delete failed, record stays pending"
                    );
                    self.store.release(candidate.id).await?;
                    report.failed.push(FailedDeletion {
                        id: candidate.id,
                        content_hash: candidate.content_hash,
                        kind: err.kind(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
