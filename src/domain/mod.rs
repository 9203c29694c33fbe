//! Domain layer types for the alias retrieval core.
//!
//! Contains the entities and value objects shared across resolution,
//! credential management, transport access, and matching.

mod account;
mod credential;
mod patterns;
mod types;

pub use account::{address_domain, ImapParams, MailAccount, TransportKind};
pub use credential::{OAuthCredential, TokenRecord};
pub use patterns::SenderRuleSet;
pub use types::{AccountId, OwnerId};
