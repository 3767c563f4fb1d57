//! Repository layer for database access.
//!
//! Each concern gets an `#[async_trait]` trait and a `Sqlx*` implementation, so
//! the dispatcher and detector can be tested against in-memory doubles.

pub mod feed;
pub mod notification;
pub mod post;
pub mod settings;
pub mod user;
pub mod watermark;

pub use feed::*;
pub use notification::*;
pub use post::*;
pub use settings::*;
pub use user::*;
pub use watermark::*;
