//! OAuth credential acquisition and lifecycle.
//!
//! Two pieces live here:
//!
//! - [`OAuthProviderClient`] and its HTTP implementation, covering the
//!   provider's token endpoint (code exchange, refresh) and the
//!   authorization URL/state round-trip
//! - [`CredentialLifecycleManager`], the single writer of stored
//!   credentials, which validates/refreshes on the retrieval path and
//!   deactivates on permanent rejection

mod lifecycle;
mod oauth_client;

pub use lifecycle::{CredentialError, CredentialLifecycleManager};
pub use oauth_client::{
    build_authorization_url, AuthState, HttpOAuthClient, OAuthApiError, OAuthProviderClient,
    StateDecodeError,
};
