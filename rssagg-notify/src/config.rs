//! Application configuration from environment variables.
//!
//! Every value has a default; a `.env` file is loaded by the binary before
//! [`AppConfig::from_env_or_default`] runs.

use std::time::Duration;

use tracing::warn;

use crate::detector::DetectorConfig;
use crate::notification::{DEFAULT_QUEUE_CAPACITY, EmailConfig};
use crate::scheduler::SchedulerConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite:rssagg.db?mode=rwc";
const DEFAULT_LOG_DIR: &str = "logs";

/// Immutable application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub log_dir: String,
    /// `None` selects the log-only email fallback.
    pub email: Option<EmailConfig>,
    pub scheduler: SchedulerConfig,
    pub detector: DetectorConfig,
    pub queue_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            email: None,
            scheduler: SchedulerConfig::default(),
            detector: DetectorConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env(lookup);
        let mut config = Self::default();

        if let Some(url) = env.non_blank("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(dir) = env.non_blank("LOG_DIR") {
            config.log_dir = dir;
        }

        config.email = email_config(&env);

        if let Some(secs) = env.parsed::<u64>("SCAN_INTERVAL_SECS")
            && secs > 0
        {
            config.scheduler.scan_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parsed::<u64>("STARRED_SCAN_INITIAL_DELAY_SECS") {
            config.scheduler.starred_initial_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parsed::<u64>("SCAN_LOOKBACK_SECS") {
            config.detector.lookback = Duration::from_secs(secs);
        }
        if let Some(secs) = env.parsed::<u64>("SCAN_COMMIT_GRACE_SECS") {
            config.detector.commit_grace = Duration::from_secs(secs);
        }
        if let Some(capacity) = env.parsed::<usize>("DISPATCH_QUEUE_CAPACITY")
            && capacity > 0
        {
            config.queue_capacity = capacity;
        }

        config
    }
}

fn email_config(env: &Env<impl Fn(&str) -> Option<String>>) -> Option<EmailConfig> {
    let host = env.non_blank("EMAIL_HOST")?;
    let mut email = EmailConfig {
        host,
        ..Default::default()
    };

    if let Some(port) = env.parsed::<u16>("EMAIL_PORT") {
        email.port = port;
    }
    email.username = env.non_blank("EMAIL_USERNAME");
    email.password = env.non_blank("EMAIL_PASSWORD");
    if let Some(name) = env.non_blank("EMAIL_FROM_NAME") {
        email.from_name = name;
    }
    if let Some(address) = env.non_blank("EMAIL_FROM_ADDRESS") {
        email.from_email = address;
    }
    if let Some(use_tls) = env.parsed::<bool>("EMAIL_USE_TLS") {
        email.use_tls = use_tls;
    }
    if let Some(secs) = env.parsed::<u64>("EMAIL_TIMEOUT_SECS") {
        email.timeout_secs = secs;
    }

    Some(email)
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn non_blank(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Parsed value; unparsable values are logged and ignored.
    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.non_blank(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "Ignoring invalid configuration value");
                None
            }
        }
    }
}
