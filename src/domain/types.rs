//! Core identifier types for domain entities.
//!
//! Newtype wrappers keep owner and account identifiers from being mixed
//! with ordinary integers and strings at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the owner a mailbox account belongs to.
///
/// Ownership is established outside this crate (the boundary layer
/// resolves it from its own session or access-key verification); the
/// core only ever scopes lookups by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OwnerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Unique identifier for a registered mail account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_id_display() {
        assert_eq!(OwnerId(7).to_string(), "7");
    }

    #[test]
    fn account_id_equality() {
        let id1 = AccountId::from("account-1");
        let id2 = AccountId::from("account-1".to_string());
        assert_eq!(id1, id2);
    }

    #[test]
    fn account_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(AccountId::from("account-1"));
        assert!(set.contains(&AccountId::from("account-1")));
    }
}
