//! Background scheduler service.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::task::{ScanTask, TaskState, TaskStateCell};
use crate::detector::ChangeDetection;

/// Default interval between scans (15 minutes).
const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default delay before the first starred-feed scan (1 minute).
const DEFAULT_STARRED_INITIAL_DELAY: Duration = Duration::from_secs(60);

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Period of both scan tasks. Must be non-zero.
    pub scan_interval: Duration,
    /// Delay before the first starred-feed scan.
    pub starred_initial_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            starred_initial_delay: DEFAULT_STARRED_INITIAL_DELAY,
        }
    }
}

/// Join handles of the running scan tasks.
pub struct SchedulerHandles {
    pub followed: JoinHandle<()>,
    pub starred: JoinHandle<()>,
}

impl SchedulerHandles {
    /// Wait for both tasks to exit. Returns how many ended abnormally.
    pub async fn join(self) -> usize {
        join_tasks([
            (ScanTask::FollowedFeeds, self.followed),
            (ScanTask::StarredFeeds, self.starred),
        ])
        .await
    }
}

/// Wait for every task, logging any that panicked or were aborted.
///
/// Returns the number of tasks that ended abnormally.
pub async fn join_tasks<L: fmt::Display>(
    tasks: impl IntoIterator<Item = (L, JoinHandle<()>)>,
) -> usize {
    let mut abnormal = 0;
    for (task, handle) in tasks {
        if let Err(e) = handle.await {
            abnormal += 1;
            error!(task = %task, error = %e, "Background task terminated abnormally");
        }
    }
    abnormal
}

/// Runs the followed-feed and starred-feed scans on fixed intervals.
pub struct BackgroundScheduler {
    detector: Arc<dyn ChangeDetection>,
    config: SchedulerConfig,
    cancellation_token: CancellationToken,
    followed_state: TaskStateCell,
    starred_state: TaskStateCell,
}

impl BackgroundScheduler {
    pub fn new(
        detector: Arc<dyn ChangeDetection>,
        config: SchedulerConfig,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            detector,
            config,
            cancellation_token,
            followed_state: TaskStateCell::new(TaskState::Idle),
            starred_state: TaskStateCell::new(TaskState::Idle),
        }
    }

    /// Spawn both scan tasks.
    pub fn start(self: &Arc<Self>) -> SchedulerHandles {
        let now = Instant::now();
        let interval = self.config.scan_interval.max(Duration::from_millis(1));

        info!(
            interval_secs = interval.as_secs(),
            starred_initial_delay_secs = self.config.starred_initial_delay.as_secs(),
            "Starting background scheduler"
        );

        SchedulerHandles {
            followed: tokio::spawn(self.clone().run_task(
                ScanTask::FollowedFeeds,
                now + interval,
                interval,
            )),
            starred: tokio::spawn(self.clone().run_task(
                ScanTask::StarredFeeds,
                now + self.config.starred_initial_delay,
                interval,
            )),
        }
    }

    /// Request shutdown. In-flight scans run to completion.
    pub fn stop(&self) {
        info!("Stopping background scheduler");
        self.cancellation_token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled()
    }

    pub fn task_state(&self, task: ScanTask) -> TaskState {
        self.state(task).get()
    }

    fn state(&self, task: ScanTask) -> &TaskStateCell {
        match task {
            ScanTask::FollowedFeeds => &self.followed_state,
            ScanTask::StarredFeeds => &self.starred_state,
        }
    }

    async fn run_task(self: Arc<Self>, task: ScanTask, first_tick: Instant, period: Duration) {
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(task = %task, "Scan task started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                _ = ticker.tick() => self.run_scan(task).await,
            }
        }

        self.state(task).set(TaskState::Stopped);
        info!(task = %task, "Scan task stopped");
    }

    async fn run_scan(&self, task: ScanTask) {
        self.state(task).set(TaskState::Running);
        let result = match task {
            ScanTask::FollowedFeeds => self.detector.scan_followed_feeds().await,
            ScanTask::StarredFeeds => self.detector.scan_starred_feeds().await,
        };
        self.state(task).set(TaskState::Idle);

        match result {
            Ok(report) => debug!(
                task = %task,
                created = report.notifications_created,
                failed = report.recipients_failed,
                "Scan completed"
            ),
            Err(e) => error!(task = %task, error = %e, "Scan failed; retrying next interval"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ScanReport;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Gate {
        started: Notify,
        release: Notify,
    }

    /// Counts scans per task; optionally slow, failing or gated.
    #[derive(Default)]
    struct FakeDetection {
        runs: [AtomicU32; 2],
        completed: [AtomicU32; 2],
        in_flight: [AtomicU32; 2],
        max_in_flight: [AtomicU32; 2],
        scan_time: Duration,
        fail: bool,
        gate: Option<Gate>,
    }

    impl FakeDetection {
        fn runs(&self, task: ScanTask) -> u32 {
            self.runs[task as usize].load(Ordering::SeqCst)
        }

        fn completed(&self, task: ScanTask) -> u32 {
            self.completed[task as usize].load(Ordering::SeqCst)
        }

        fn max_in_flight(&self, task: ScanTask) -> u32 {
            self.max_in_flight[task as usize].load(Ordering::SeqCst)
        }

        async fn scan(&self, task: ScanTask) -> Result<ScanReport> {
            let i = task as usize;
            self.runs[i].fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight[i].fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight[i].fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = &self.gate
                && task == ScanTask::StarredFeeds
            {
                gate.started.notify_one();
                gate.release.notified().await;
            }
            if !self.scan_time.is_zero() {
                tokio::time::sleep(self.scan_time).await;
            }

            self.in_flight[i].fetch_sub(1, Ordering::SeqCst);
            self.completed[i].fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::upstream("database unavailable"));
            }
            Ok(ScanReport::default())
        }
    }

    #[async_trait]
    impl ChangeDetection for FakeDetection {
        async fn scan_followed_feeds(&self) -> Result<ScanReport> {
            self.scan(ScanTask::FollowedFeeds).await
        }

        async fn scan_starred_feeds(&self) -> Result<ScanReport> {
            self.scan(ScanTask::StarredFeeds).await
        }
    }

    fn scheduler(
        detector: Arc<FakeDetection>,
        config: SchedulerConfig,
    ) -> Arc<BackgroundScheduler> {
        Arc::new(BackgroundScheduler::new(
            detector,
            config,
            CancellationToken::new(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_ticks_follow_schedule() {
        let detector = Arc::new(FakeDetection::default());
        let scheduler = scheduler(detector.clone(), SchedulerConfig::default());
        let handles = scheduler.start();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(detector.runs(ScanTask::StarredFeeds), 0);
        assert_eq!(detector.runs(ScanTask::FollowedFeeds), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(detector.runs(ScanTask::StarredFeeds), 1);
        assert_eq!(detector.runs(ScanTask::FollowedFeeds), 0);

        // 15m01s: followed has run once; starred runs at 1m, 16m.
        tokio::time::sleep(Duration::from_secs(14 * 60)).await;
        assert_eq!(detector.runs(ScanTask::FollowedFeeds), 1);
        assert_eq!(detector.runs(ScanTask::StarredFeeds), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(detector.runs(ScanTask::StarredFeeds), 2);

        scheduler.stop();
        handles.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_scans_never_overlap() {
        let detector = Arc::new(FakeDetection {
            scan_time: Duration::from_secs(40 * 60),
            ..Default::default()
        });
        let scheduler = scheduler(detector.clone(), SchedulerConfig::default());
        let handles = scheduler.start();

        tokio::time::sleep(Duration::from_secs(3 * 60 * 60)).await;

        for task in [ScanTask::FollowedFeeds, ScanTask::StarredFeeds] {
            assert_eq!(detector.max_in_flight(task), 1);
            assert!(detector.runs(task) >= 2);
            // Skipped ticks are not queued up.
            assert!(detector.runs(task) <= 5);
        }

        scheduler.stop();
        handles.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scan_keeps_task_alive() {
        let detector = Arc::new(FakeDetection {
            fail: true,
            ..Default::default()
        });
        let scheduler = scheduler(detector.clone(), SchedulerConfig::default());
        let handles = scheduler.start();

        tokio::time::sleep(Duration::from_secs(31 * 60 + 30)).await;
        assert_eq!(detector.runs(ScanTask::FollowedFeeds), 2);
        assert_eq!(detector.runs(ScanTask::StarredFeeds), 3);
        assert_eq!(scheduler.task_state(ScanTask::StarredFeeds), TaskState::Idle);

        scheduler.stop();
        handles.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_waits_for_in_flight_scan() {
        let detector = Arc::new(FakeDetection {
            gate: Some(Gate::default()),
            ..Default::default()
        });
        let scheduler = scheduler(
            detector.clone(),
            SchedulerConfig {
                starred_initial_delay: Duration::from_secs(1),
                ..Default::default()
            },
        );
        let handles = scheduler.start();

        let gate = detector.gate.as_ref().unwrap();
        gate.started.notified().await;
        assert_eq!(scheduler.task_state(ScanTask::StarredFeeds), TaskState::Running);

        scheduler.stop();
        assert!(!scheduler.is_running());
        gate.release.notify_one();
        handles.join().await;

        assert_eq!(detector.completed(ScanTask::StarredFeeds), 1);
        assert_eq!(scheduler.task_state(ScanTask::StarredFeeds), TaskState::Stopped);
        assert_eq!(scheduler.task_state(ScanTask::FollowedFeeds), TaskState::Stopped);

        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(detector.runs(ScanTask::StarredFeeds), 1);
        assert_eq!(detector.runs(ScanTask::FollowedFeeds), 0);
    }

    #[tokio::test]
    async fn test_join_tasks_counts_abnormal_exits() {
        let finished = tokio::spawn(async {});
        let panicked = tokio::spawn(async { panic!("worker blew up") });
        let aborted = tokio::spawn(std::future::pending::<()>());
        aborted.abort();

        let abnormal = join_tasks([
            ("finished", finished),
            ("panicked", panicked),
            ("aborted", aborted),
        ])
        .await;
        assert_eq!(abnormal, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let detector = Arc::new(FakeDetection::default());
        let scheduler = scheduler(detector.clone(), SchedulerConfig::default());
        let handles = scheduler.start();

        scheduler.stop();
        handles.join().await;

        assert_eq!(detector.runs(ScanTask::FollowedFeeds), 0);
        assert_eq!(detector.runs(ScanTask::StarredFeeds), 0);
    }
}
