//! Per-platform sender pattern table.
//!
//! Notification mail is recognized by substring patterns over the sender
//! address and display text. The table is process-wide static
//! configuration: no owner, no mutation after construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Immutable mapping of platform identifier to ordered sender patterns.
///
/// Lookups for unknown platforms return an empty slice, so matching
/// fails closed. Empty patterns are discarded at construction; an empty
/// string would otherwise match every sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderRuleSet {
    rules: HashMap<String, Vec<String>>,
}

impl SenderRuleSet {
    /// Builds a rule set, lowercasing platforms and patterns and
    /// discarding blank patterns.
    pub fn new<I, P, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<S>)>,
        P: Into<String>,
        S: Into<String>,
    {
        let rules = rules
            .into_iter()
            .map(|(platform, patterns)| {
                let patterns: Vec<String> = patterns
                    .into_iter()
                    .map(|p| p.into().trim().to_lowercase())
                    .filter(|p| !p.is_empty())
                    .collect();
                (platform.into().trim().to_lowercase(), patterns)
            })
            .collect();

        Self { rules }
    }

    /// Patterns for a platform; empty for unknown platforms.
    pub fn patterns(&self, platform: &str) -> &[String] {
        self.rules
            .get(&platform.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Known platform identifiers, in no particular order.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

impl Default for SenderRuleSet {
    fn default() -> Self {
        Self::new([
            (
                "chatgpt",
                vec!["noreply@tm.openai.com", "chatgpt", "openai.com"],
            ),
            (
                "disney",
                vec![
                    "disneyplus@trx.mail2.disneyplus.com",
                    "mail.disneyplus.com",
                    "disneyplus.com",
                    "disney+",
                    "disneyplus",
                ],
            ),
            (
                "prime",
                vec![
                    "account-update@primevideo.com",
                    "no-reply@amazon.com",
                    "amazon.com",
                    "account-update@amazon.com",
                ],
            ),
            (
                "netflix",
                vec![
                    "info@account.netflix.com",
                    "info@mailer.netflix.com",
                    "mailer.netflix.com",
                    "netflix.com",
                    "netflix",
                ],
            ),
            ("crunchyroll", vec!["crunchyroll.com", "crunchyroll"]),
        ])
    }
}
