//! aliasbox - alias mailbox retrieval core
//!
//! This crate answers one question: "show me the most recent message
//! addressed to this alias that came from a known sender for platform P,
//! within the recency window". An alias may be served by an OAuth webmail
//! account, a dedicated IMAP account, or a domain-wide catch-all IMAP
//! account; resolution, credential lifecycle, transport access, and
//! message matching all live here. HTTP routing, sessions, and rendering
//! belong to the embedding application.

pub mod auth;
pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;
pub mod stores;
