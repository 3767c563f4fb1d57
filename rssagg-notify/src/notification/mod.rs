//! Notification system module.
//!
//! Creates user-facing notifications and delivers them through channels.
//!
//! # Features
//!
//! - Single dispatch path with persistence before delivery
//! - Deduplication on (user, reference, kind) enforced by the store
//! - Email over SMTP with a log-only fallback and a bounded send time
//! - Bounded work queue for request-path notifications
//!
//! # Example
//!
//! ```ignore
//! use rssagg_notify::notification::{DispatchQueue, NotificationDispatcher, NotificationRequest};
//!
//! let dispatcher = Arc::new(NotificationDispatcher::new(users, notifications, settings, Default::default())
//!     .with_channel(Arc::new(EmailChannel::new(config.email.clone())?)));
//! let (queue, worker) = DispatchQueue::start(dispatcher.clone(), 256, cancel.child_token());
//! queue.try_enqueue(NotificationRequest::feed_starred(&user.id, &feed))?;
//! ```

pub mod channels;
pub mod dispatcher;
pub mod events;
pub mod queue;
pub mod templates;

pub use channels::{Delivery, EmailChannel, EmailConfig, LogChannel, NotificationChannel};
pub use dispatcher::{Dispatched, DispatcherConfig, NotificationDispatcher};
pub use events::NotificationRequest;
pub use queue::{DEFAULT_QUEUE_CAPACITY, DispatchQueue};
pub use templates::{RenderedEmail, render_email};
