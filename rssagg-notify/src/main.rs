use std::sync::Arc;

use rssagg_notify::config::AppConfig;
use rssagg_notify::database::{self, repositories::*};
use rssagg_notify::detector::ChangeDetector;
use rssagg_notify::logging;
use rssagg_notify::notification::{
    DispatchQueue, DispatcherConfig, EmailChannel, LogChannel, NotificationDispatcher,
};
use rssagg_notify::scheduler::{BackgroundScheduler, join_tasks};
use rssagg_notify::starring::StarringService;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env_or_default();

    let (logging_config, _log_guard) = logging::init_logging(&config.log_dir)?;

    let pool = database::init_pool(&config.database_url).await?;
    database::run_migrations(&pool).await?;

    let users: Arc<dyn UserRepository> = Arc::new(SqlxUserRepository::new(pool.clone()));
    let feeds: Arc<dyn FeedRepository> = Arc::new(SqlxFeedRepository::new(pool.clone()));
    let posts: Arc<dyn PostRepository> = Arc::new(SqlxPostRepository::new(pool.clone()));
    let notifications: Arc<dyn NotificationRepository> =
        Arc::new(SqlxNotificationRepository::new(pool.clone()));
    let settings: Arc<dyn NotificationSettingsRepository> =
        Arc::new(SqlxNotificationSettingsRepository::new(pool.clone()));
    let watermarks: Arc<dyn WatermarkRepository> =
        Arc::new(SqlxWatermarkRepository::new(pool.clone()));

    let dispatcher = Arc::new(
        NotificationDispatcher::new(
            users.clone(),
            notifications,
            settings.clone(),
            DispatcherConfig::default(),
        )
        .with_channel(Arc::new(LogChannel))
        .with_channel(Arc::new(EmailChannel::new(config.email.clone())?)),
    );

    let cancel = CancellationToken::new();

    let (queue, queue_worker) =
        DispatchQueue::start(dispatcher.clone(), config.queue_capacity, cancel.child_token());
    // Request-path entry point; held for the lifetime of the process.
    let _starring = StarringService::new(users, feeds.clone(), posts.clone(), queue);

    let detector = Arc::new(ChangeDetector::new(
        feeds,
        posts,
        watermarks,
        settings,
        dispatcher,
        config.detector.clone(),
    ));
    let scheduler = Arc::new(BackgroundScheduler::new(
        detector,
        config.scheduler.clone(),
        cancel.child_token(),
    ));
    let scheduler_tasks = scheduler.start();
    let retention = logging_config.start_retention_cleanup(cancel.child_token());

    info!(database = %config.database_url, "rssagg-notify started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    cancel.cancel();
    scheduler_tasks.join().await;
    join_tasks([("dispatch_queue", queue_worker), ("log_retention", retention)]).await;

    pool.close().await;
    info!("rssagg-notify stopped");

    Ok(())
}
