//! SweepLoop - 定期的な deferred deletion の実行
//!
//! # フロー
//! 1. interval ごとに clock.now() で 1 回 sweep
//! 2. sweep の失敗はログに残して次の tick で再試行
//! 3. shutdown 要求が来たら実行中の sweep を終えてから止まる

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::app::DeferredDeletionSweeper;
use crate::domain::{SweepError, SweepReport};
use crate::ports::Clock;

pub struct SweepLoop {
    sweeper: Arc<DeferredDeletionSweeper>,
    clock: Arc<dyn Clock>,
    grace_period_secs: Option<i64>,
    interval: Duration,
}

impl SweepLoop {
    pub fn new(
        sweeper: Arc<DeferredDeletionSweeper>,
        clock: Arc<dyn Clock>,
        grace_period_secs: Option<i64>,
        interval: Duration,
    ) -> Self {
        Self {
            sweeper,
            clock,
            grace_period_secs,
            interval,
        }
    }

    /// 1 回だけ sweep（cron から呼ぶ場合など）
    pub async fn run_once(&self) -> Result<SweepReport, SweepError> {
        self.sweeper
            .run(self.grace_period_secs, self.clock.now())
            .await
    }

    /// Spawn the loop on the current runtime. The first sweep starts immediately.
    pub fn spawn(self) -> SweepLoopHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });
        SweepLoopHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        // 長い sweep の後に溜まった tick をまとめて撃たない
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_secs = self.interval.as_secs(),
            enabled = self.grace_period_secs.is_some_and(|g| g > 0),
            "sweep loop started"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // sender が drop されたら止まる
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            match self.run_once().await {
                Ok(report) if report.batch_limit_reached => {
                    info!(run_id = %report.run_id, "batch limit reached, remaining candidates wait for the next tick");
                }
                Ok(_) => {}
                Err(err) => {
                    error!(kind = ?err.kind(), error = %err, "sweep failed, retrying on next tick");
                }
            }
        }

        info!("sweep loop stopped");
    }
}

/// Sweep loop handle.
/// - `shutdown_tx` を drop するとループが止まる
/// - `shutdown_and_join()` で終了を待てる
pub struct SweepLoopHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweepLoopHandle {
    /// Request shutdown. A sweep already running is finished first.
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::SweeperBuilder;
    use crate::domain::{CandidateStatus, ContentHash, RecordId};
    use crate::impls::{InMemoryMetadataStore, InMemoryObjectStore};
    use crate::ports::{FixedClock, MetadataStore};
    use chrono::{DateTime, TimeZone, Utc};

    const GRACE: i64 = 3600;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn hash(n: u32) -> ContentHash {
        ContentHash::parse(&format!("{n:040x}")).unwrap()
    }

    struct Harness {
        store: Arc<InMemoryMetadataStore>,
        objects: InMemoryObjectStore,
        clock: FixedClock,
        sweeper: Arc<DeferredDeletionSweeper>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryMetadataStore::new());
            let objects = InMemoryObjectStore::new();
            let sweeper = SweeperBuilder::new()
                .store(store.clone())
                .deleter(Arc::new(objects.clone()))
                .build()
                .unwrap();
            Self {
                store,
                objects,
                clock: FixedClock::new(start()),
                sweeper: Arc::new(sweeper),
            }
        }

        fn sweep_loop(&self, grace: Option<i64>) -> SweepLoop {
            SweepLoop::new(
                Arc::clone(&self.sweeper),
                Arc::new(self.clock.clone()),
                grace,
                Duration::from_secs(60),
            )
        }

        async fn orphan(&self, n: u32, at: DateTime<Utc>) -> RecordId {
            self.objects.put(hash(n));
            self.store.register_orphan(&hash(n), at).await.unwrap()
        }

        async fn wait_processed(&self, id: RecordId) {
            for _ in 0..100 {
                let record = self.store.get(id).await.unwrap().unwrap();
                if record.status == CandidateStatus::Processed {
                    return;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            panic!("{id} was never processed");
        }
    }

    #[tokio::test]
    async fn run_once_uses_clock_time() {
        let h = Harness::new();
        let id = h.orphan(1, start() - chrono::Duration::hours(2)).await;

        let report = h.sweep_loop(Some(GRACE)).run_once().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.cutoff, Some(start() - chrono::Duration::hours(1)));
        let record = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(record.processed_at, Some(start()));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_every_tick_until_shutdown() {
        let h = Harness::new();
        let first = h.orphan(1, start() - chrono::Duration::hours(2)).await;
        let second = h.orphan(2, start()).await;

        let handle = h.sweep_loop(Some(GRACE)).spawn();
        h.wait_processed(first).await;
        assert!(h.objects.contains(&hash(2)));

        h.clock.advance(chrono::Duration::hours(2));
        h.wait_processed(second).await;
        assert!(h.objects.is_empty());

        handle.shutdown_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_loop_never_deletes() {
        let h = Harness::new();
        let id = h.orphan(1, start() - chrono::Duration::days(30)).await;

        let handle = h.sweep_loop(None).spawn();
        tokio::time::sleep(Duration::from_secs(600)).await;
        handle.shutdown_and_join().await;

        let record = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, CandidateStatus::Pending);
        assert!(h.objects.delete_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_loop() {
        let h = Harness::new();
        let SweepLoopHandle { shutdown_tx, join } = h.sweep_loop(Some(GRACE)).spawn();

        drop(shutdown_tx);

        join.await.unwrap();
    }
}
