//! Configuration and settings management.
//!
//! Settings types for the retrieval core with JSON persistence in the
//! user's config directory.

mod settings;

pub use settings::{ConfigError, ImapSettings, OAuthSettings, RetrievalSettings, Settings};
