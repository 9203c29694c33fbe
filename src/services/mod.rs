//! Business services layer.
//!
//! The core behavior lives here, composed from the domain types, the
//! store collaborators, and the transport/auth seams:
//!
//! ```text
//! Boundary layer (HTTP, sessions, rendering)
//!          |
//!          v
//!    Services layer   <-- you are here
//!          |
//!          v
//! Infrastructure (transports, auth, storage)
//! ```
//!
//! # Services overview
//!
//! - [`RetrievalService`]: the single outward operation, `fetch_latest`
//! - [`ProviderResolver`]: backend precedence for an alias
//! - [`MessageMatcher`]: decode + predicate + ranking
//! - [`AccountService`]: owner-scoped registration and maintenance

mod account_service;
mod matcher;
mod resolver;
mod retrieval;

pub use account_service::{
    AccountError, AccountResult, AccountService, ImapAccountUpdate, RegisterImapAccount,
};
pub use matcher::{MatchCriteria, MessageCandidate, MessageMatcher};
pub use resolver::{BackendDescriptor, ProviderResolver, ResolveError};
pub use retrieval::{FetchOutcome, RenderedMessage, RetrievalError, RetrievalService};
