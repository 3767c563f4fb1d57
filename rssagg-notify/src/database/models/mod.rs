//! Database models.
//!
//! These models map directly to the database schema and handle
//! serialization/deserialization of JSON fields.

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
