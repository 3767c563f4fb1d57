//! Change detection for followed and starred feeds.
//!
//! Each scan walks the feeds that have at least one interested user, finds
//! posts newer than the feed's watermark for that scan, and dispatches one
//! `NewPost` notification per (user, post).
//!
//! Failure handling:
//! - A persistence error while listing feeds, posts or recipients aborts the scan.
//! - A failed dispatch is logged and counted; the remaining recipients still run.
//!   The feed's watermark is then left in place so the next scan retries, and the
//!   store's uniqueness key absorbs the repeats.
//!
//! The watermark is inclusive and never advances past `scan start - commit_grace`,
//! so posts stamped just before a scan but committed after it are still picked up
//! on the next tick. Posts seen twice are dropped by the uniqueness key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::models::{FeedDbModel, PostDbModel, ScanScope, UserDbModel};
use crate::database::repositories::{
    FeedRepository, NotificationSettingsRepository, PostRepository, WatermarkRepository,
};
use crate::database::time::{ms_before, now_ms};
use crate::notification::{NotificationDispatcher, NotificationRequest};

/// Default lookback for feeds without a watermark.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(60 * 60);

/// Default window for posts whose insert commits after their `created_at`.
pub const DEFAULT_COMMIT_GRACE: Duration = Duration::from_secs(60);

/// Scans run by the background scheduler.
#[async_trait]
pub trait ChangeDetection: Send + Sync {
    /// Notify followers about new posts in the feeds they follow.
    async fn scan_followed_feeds(&self) -> Result<ScanReport>;

    /// Notify starring users about new posts in the feeds they starred.
    async fn scan_starred_feeds(&self) -> Result<ScanReport>;
}

/// Counters from one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub feeds_scanned: usize,
    pub posts_found: usize,
    pub notifications_created: usize,
    pub duplicates_skipped: usize,
    /// Recipients left out by their notification settings.
    pub recipients_skipped: usize,
    pub recipients_failed: usize,
}

/// Detector configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// How far back to look for a feed that has never been scanned.
    pub lookback: Duration,
    /// How far behind the scan start the watermark is held.
    pub commit_grace: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            commit_grace: DEFAULT_COMMIT_GRACE,
        }
    }
}

/// Per-scan watermark limits, fixed when the scan starts.
#[derive(Debug, Clone, Copy)]
struct ScanBounds {
    /// Watermark for feeds that have none yet.
    fallback: i64,
    /// Upper limit for an advanced watermark.
    ceiling: i64,
}

pub struct ChangeDetector {
    feeds: Arc<dyn FeedRepository>,
    posts: Arc<dyn PostRepository>,
    watermarks: Arc<dyn WatermarkRepository>,
    settings: Arc<dyn NotificationSettingsRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    config: DetectorConfig,
}

impl ChangeDetector {
    pub fn new(
        feeds: Arc<dyn FeedRepository>,
        posts: Arc<dyn PostRepository>,
        watermarks: Arc<dyn WatermarkRepository>,
        settings: Arc<dyn NotificationSettingsRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            feeds,
            posts,
            watermarks,
            settings,
            dispatcher,
            config,
        }
    }

    async fn scan(&self, scope: ScanScope) -> Result<ScanReport> {
        let started = Instant::now();
        let feeds = match scope {
            ScanScope::Followed => self.feeds.feeds_with_followers().await?,
            ScanScope::Starred => self.feeds.feeds_with_starrers().await?,
        };
        let scan_started_ms = now_ms();
        let bounds = ScanBounds {
            fallback: ms_before(scan_started_ms, self.config.lookback),
            ceiling: ms_before(scan_started_ms, self.config.commit_grace),
        };

        debug!(scope = %scope, feeds = feeds.len(), "Scanning feeds for new posts");

        let mut report = ScanReport::default();
        for feed in &feeds {
            self.scan_feed(scope, feed, bounds, &mut report).await?;
        }

        info!(
            scope = %scope,
            feeds = report.feeds_scanned,
            posts = report.posts_found,
            created = report.notifications_created,
            duplicates = report.duplicates_skipped,
            failed = report.recipients_failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Feed scan finished"
        );

        Ok(report)
    }

    async fn scan_feed(
        &self,
        scope: ScanScope,
        feed: &FeedDbModel,
        bounds: ScanBounds,
        report: &mut ScanReport,
    ) -> Result<()> {
        report.feeds_scanned += 1;

        let watermark = self
            .watermarks
            .get(&feed.id, scope)
            .await?
            .unwrap_or(bounds.fallback);
        let posts = self.posts.posts_created_since(&feed.id, watermark).await?;
        let Some(newest) = posts.iter().map(|p| p.created_at).max() else {
            return Ok(());
        };
        report.posts_found += posts.len();

        let recipients = self.recipients(scope, &feed.id, report).await?;
        let mut failures = 0usize;
        for post in &posts {
            failures += self.fan_out(feed, post, &recipients, report).await;
        }

        if failures > 0 {
            warn!(
                scope = %scope,
                feed_id = %feed.id,
                failures,
                "Some recipients failed; watermark held for retry"
            );
            return Ok(());
        }

        self.watermarks
            .advance(&feed.id, scope, newest.min(bounds.ceiling))
            .await
    }

    /// Dispatch `post` to every recipient. Returns the number of failures.
    async fn fan_out(
        &self,
        feed: &FeedDbModel,
        post: &PostDbModel,
        recipients: &[UserDbModel],
        report: &mut ScanReport,
    ) -> usize {
        let mut failures = 0;
        for user in recipients {
            match self
                .dispatcher
                .notify(NotificationRequest::new_post(&user.id, post, feed))
                .await
            {
                Ok(dispatched) if dispatched.is_new => report.notifications_created += 1,
                Ok(_) => report.duplicates_skipped += 1,
                Err(e) => {
                    failures += 1;
                    report.recipients_failed += 1;
                    warn!(
                        user_id = %user.id,
                        feed_id = %feed.id,
                        post_id = %post.id,
                        error = %e,
                        "Failed to notify user about new post"
                    );
                }
            }
        }
        failures
    }

    async fn recipients(
        &self,
        scope: ScanScope,
        feed_id: &str,
        report: &mut ScanReport,
    ) -> Result<Vec<UserDbModel>> {
        match scope {
            ScanScope::Followed => self.feeds.users_following_feed(feed_id).await,
            ScanScope::Starred => {
                let users = self.feeds.users_starring_feed(feed_id).await?;
                let mut enabled = Vec::with_capacity(users.len());
                for user in users {
                    if self.settings.get(&user.id).await?.enable_starred_feed_notifications {
                        enabled.push(user);
                    } else {
                        report.recipients_skipped += 1;
                    }
                }
                Ok(enabled)
            }
        }
    }
}

#[async_trait]
impl ChangeDetection for ChangeDetector {
    async fn scan_followed_feeds(&self) -> Result<ScanReport> {
        self.scan(ScanScope::Followed).await
    }

    async fn scan_starred_feeds(&self) -> Result<ScanReport> {
        self.scan(ScanScope::Starred).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NotificationKind, NotificationSettingsDbModel};
    use crate::database::repositories::{
        NotificationRepository, SqlxFeedRepository, SqlxNotificationRepository,
        SqlxNotificationSettingsRepository, SqlxPostRepository, SqlxUserRepository,
        SqlxWatermarkRepository, UserRepository,
    };
    use crate::database::{DbPool, init_pool, run_migrations};
    use crate::notification::DispatcherConfig;
    use parking_lot::Mutex;

    /// Hides one user from the dispatcher so its notify fails with `NotFound`.
    struct FlakyUsers {
        inner: SqlxUserRepository,
        hidden: Mutex<Option<String>>,
    }

    #[async_trait]
    impl UserRepository for FlakyUsers {
        async fn create(&self, user: &UserDbModel) -> Result<()> {
            self.inner.create(user).await
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<UserDbModel>> {
            if self.hidden.lock().as_deref() == Some(id) {
                return Ok(None);
            }
            self.inner.find_by_id(id).await
        }
    }

    struct Fixture {
        pool: DbPool,
        users: Arc<FlakyUsers>,
        feeds: Arc<SqlxFeedRepository>,
        posts: Arc<SqlxPostRepository>,
        watermarks: Arc<SqlxWatermarkRepository>,
        notifications: Arc<SqlxNotificationRepository>,
        detector: ChangeDetector,
    }

    async fn fixture() -> Fixture {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let users = Arc::new(FlakyUsers {
            inner: SqlxUserRepository::new(pool.clone()),
            hidden: Mutex::new(None),
        });
        let feeds = Arc::new(SqlxFeedRepository::new(pool.clone()));
        let posts = Arc::new(SqlxPostRepository::new(pool.clone()));
        let watermarks = Arc::new(SqlxWatermarkRepository::new(pool.clone()));
        let notifications = Arc::new(SqlxNotificationRepository::new(pool.clone()));
        let settings = Arc::new(SqlxNotificationSettingsRepository::new(pool.clone()));

        let dispatcher = Arc::new(NotificationDispatcher::new(
            users.clone(),
            notifications.clone(),
            settings.clone(),
            DispatcherConfig::default(),
        ));
        let detector = ChangeDetector::new(
            feeds.clone(),
            posts.clone(),
            watermarks.clone(),
            settings,
            dispatcher,
            DetectorConfig::default(),
        );

        Fixture {
            pool,
            users,
            feeds,
            posts,
            watermarks,
            notifications,
            detector,
        }
    }

    impl Fixture {
        async fn user(&self, name: &str) -> UserDbModel {
            let user = UserDbModel::new(name, None);
            self.users.create(&user).await.unwrap();
            user
        }

        async fn feed(&self, owner: &UserDbModel, name: &str) -> FeedDbModel {
            let feed = FeedDbModel::new(name, format!("https://{name}.example.com/rss"), &owner.id);
            self.feeds.create_feed(&feed).await.unwrap();
            feed
        }

        async fn post(&self, feed: &FeedDbModel, title: &str, created_at: i64) -> PostDbModel {
            let post = PostDbModel::new(&feed.id, title, format!("https://example.com/{title}"))
                .with_created_at(created_at);
            self.posts.create(&post).await.unwrap();
            post
        }

        async fn count(&self) -> i64 {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
                .fetch_one(&self.pool)
                .await
                .unwrap();
            count
        }
    }

    #[tokio::test]
    async fn test_followed_scan_notifies_each_follower_once() {
        let fx = fixture().await;
        let a = fx.user("alice").await;
        let b = fx.user("bob").await;
        let feed = fx.feed(&a, "news").await;
        fx.feeds.follow(&a.id, &feed.id).await.unwrap();
        fx.feeds.follow(&b.id, &feed.id).await.unwrap();
        let post = fx.post(&feed, "Breaking News", now_ms()).await;

        let report = fx.detector.scan_followed_feeds().await.unwrap();
        assert_eq!(report.feeds_scanned, 1);
        assert_eq!(report.posts_found, 1);
        assert_eq!(report.notifications_created, 2);

        for user in [&a, &b] {
            let stored = fx
                .notifications
                .find_by_reference(&user.id, &post.id, NotificationKind::NewPost.as_str())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.message, "New post: Breaking News");
        }
        let watermark = fx.watermarks.get(&feed.id, ScanScope::Followed).await.unwrap();
        assert!(watermark.is_some_and(|ts| ts < post.created_at));

        // Still inside the commit grace window: seen again, stored once.
        let again = fx.detector.scan_followed_feeds().await.unwrap();
        assert_eq!(again.posts_found, 1);
        assert_eq!(again.notifications_created, 0);
        assert_eq!(again.duplicates_skipped, 2);
        assert_eq!(fx.count().await, 2);
    }

    #[tokio::test]
    async fn test_posts_committed_after_a_scan_are_not_lost() {
        let fx = fixture().await;
        let a = fx.user("alice").await;
        let feed = fx.feed(&a, "batch").await;
        fx.feeds.star(&a.id, &feed.id).await.unwrap();
        let stamped = now_ms();
        fx.post(&feed, "first", stamped).await;

        let first = fx.detector.scan_starred_feeds().await.unwrap();
        assert_eq!(first.notifications_created, 1);

        // Same millisecond as "first", plus one stamped earlier that committed late.
        fx.post(&feed, "second", stamped).await;
        fx.post(&feed, "late", stamped - 5).await;

        let second = fx.detector.scan_starred_feeds().await.unwrap();
        assert_eq!(second.posts_found, 3);
        assert_eq!(second.notifications_created, 2);
        assert_eq!(second.duplicates_skipped, 1);
        assert_eq!(fx.notifications.unread_count(&a.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_watermark_advances_to_newest_post_without_grace() {
        let mut fx = fixture().await;
        fx.detector.config.commit_grace = Duration::ZERO;
        let a = fx.user("alice").await;
        let feed = fx.feed(&a, "news").await;
        fx.feeds.follow(&a.id, &feed.id).await.unwrap();
        let post = fx
            .post(&feed, "old-ish", ms_before(now_ms(), Duration::from_secs(600)))
            .await;

        fx.detector.scan_followed_feeds().await.unwrap();
        assert_eq!(
            fx.watermarks.get(&feed.id, ScanScope::Followed).await.unwrap(),
            Some(post.created_at)
        );
    }

    #[tokio::test]
    async fn test_posts_older_than_lookback_are_ignored() {
        let fx = fixture().await;
        let a = fx.user("alice").await;
        let feed = fx.feed(&a, "archive").await;
        fx.feeds.follow(&a.id, &feed.id).await.unwrap();
        fx.post(&feed, "old", ms_before(now_ms(), Duration::from_secs(2 * 3600)))
            .await;

        let report = fx.detector.scan_followed_feeds().await.unwrap();
        assert_eq!(report.posts_found, 0);
        assert_eq!(fx.count().await, 0);
    }

    #[tokio::test]
    async fn test_starred_scan_respects_settings() {
        let fx = fixture().await;
        let a = fx.user("alice").await;
        let b = fx.user("bob").await;
        let feed = fx.feed(&a, "blog").await;
        fx.feeds.star(&a.id, &feed.id).await.unwrap();
        fx.feeds.star(&b.id, &feed.id).await.unwrap();
        SqlxNotificationSettingsRepository::new(fx.pool.clone())
            .upsert(&NotificationSettingsDbModel {
                enable_starred_feed_notifications: false,
                ..NotificationSettingsDbModel::defaults_for(&a.id)
            })
            .await
            .unwrap();
        fx.post(&feed, "release", now_ms()).await;

        let report = fx.detector.scan_starred_feeds().await.unwrap();
        assert_eq!(report.notifications_created, 1);
        assert_eq!(report.recipients_skipped, 1);
        assert_eq!(fx.notifications.unread_count(&a.id).await.unwrap(), 0);
        assert_eq!(fx.notifications.unread_count(&b.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_recipient_holds_watermark() {
        let fx = fixture().await;
        let a = fx.user("alice").await;
        let b = fx.user("bob").await;
        let feed = fx.feed(&a, "news").await;
        fx.feeds.follow(&a.id, &feed.id).await.unwrap();
        fx.feeds.follow(&b.id, &feed.id).await.unwrap();
        fx.post(&feed, "first", now_ms()).await;

        *fx.users.hidden.lock() = Some(b.id.clone());
        let report = fx.detector.scan_followed_feeds().await.unwrap();
        assert_eq!(report.notifications_created, 1);
        assert_eq!(report.recipients_failed, 1);
        assert_eq!(
            fx.watermarks.get(&feed.id, ScanScope::Followed).await.unwrap(),
            None
        );

        *fx.users.hidden.lock() = None;
        let retry = fx.detector.scan_followed_feeds().await.unwrap();
        assert_eq!(retry.notifications_created, 1);
        assert_eq!(retry.duplicates_skipped, 1);
        assert!(
            fx.watermarks
                .get(&feed.id, ScanScope::Followed)
                .await
                .unwrap()
                .is_some()
        );
        assert_eq!(fx.count().await, 2);
    }

    #[tokio::test]
    async fn test_follow_and_star_yield_one_notification() {
        let fx = fixture().await;
        let a = fx.user("alice").await;
        let feed = fx.feed(&a, "news").await;
        fx.feeds.follow(&a.id, &feed.id).await.unwrap();
        fx.feeds.star(&a.id, &feed.id).await.unwrap();
        fx.post(&feed, "both", now_ms()).await;

        let followed = fx.detector.scan_followed_feeds().await.unwrap();
        let starred = fx.detector.scan_starred_feeds().await.unwrap();

        assert_eq!(followed.notifications_created, 1);
        assert_eq!(starred.notifications_created, 0);
        assert_eq!(starred.duplicates_skipped, 1);
        assert_eq!(fx.count().await, 1);
    }
}
