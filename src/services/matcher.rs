//! Message decoding and matching.
//!
//! Decodes raw RFC 5322 bytes and decides whether a message belongs to
//! the retrieval: recent enough, addressed to the alias (when one is in
//! play), and sent by a known sender for the platform. A malformed
//! message is skipped, never fatal; the rest of the mailbox still gets
//! its chance.

use chrono::{DateTime, Utc};
use mail_parser::{Addr, Message, MessageParser};

use crate::domain::SenderRuleSet;
use crate::providers::RawMessage;

/// Rendered fallback when a message carries no usable body.
const EMPTY_BODY_PLACEHOLDER: &str = "<p>message has no renderable content</p>";

/// Criteria one retrieval matches against. Built per request, never
/// persisted.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    /// Platform identifier, lowercased.
    pub platform: String,
    /// When set, the recipient address must contain this alias
    /// (case-insensitive substring; secondary-address formatting keeps
    /// exact matching from being reliable).
    pub recipient_alias: Option<String>,
    /// Only messages received strictly after this instant qualify.
    pub cutoff: DateTime<Utc>,
}

/// A message that passed the predicate, held only long enough to rank.
#[derive(Debug, Clone)]
pub struct MessageCandidate {
    /// Displayable body, already reduced to HTML.
    pub html: String,
    /// When the message was received, used for ranking.
    pub received_at: DateTime<Utc>,
}

/// Applies [`MatchCriteria`] to decoded messages.
pub struct MessageMatcher {
    rules: SenderRuleSet,
}

impl MessageMatcher {
    /// Creates a matcher over a sender rule set.
    pub fn new(rules: SenderRuleSet) -> Self {
        Self { rules }
    }

    /// Decodes `raw` and applies the criteria.
    ///
    /// Returns `None` when the message fails any check, when the
    /// platform has no known senders (fail closed), or when the bytes
    /// cannot be parsed.
    pub fn matches(&self, raw: &RawMessage, criteria: &MatchCriteria) -> Option<MessageCandidate> {
        let Some(message) = MessageParser::default().parse(raw.bytes()) else {
            tracing::debug!("skipping message that failed to parse");
            return None;
        };

        let received_at = message
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))?;
        if received_at <= criteria.cutoff {
            return None;
        }

        if let Some(alias) = &criteria.recipient_alias {
            if !recipient_contains(&message, alias) {
                return None;
            }
        }

        let patterns = self.rules.patterns(&criteria.platform);
        let from_display = sender_display_text(&message);
        let from_address = sender_address(&message);
        let sender_known = patterns
            .iter()
            .any(|p| from_display.contains(p) || from_address.contains(p));
        if !sender_known {
            return None;
        }

        Some(MessageCandidate {
            html: render_body(&message),
            received_at,
        })
    }

    /// Picks the candidate with the greatest received timestamp.
    ///
    /// Ties are broken by position, which is stable for a given input
    /// set; sub-second collisions are not expected in practice.
    pub fn select_best<I>(candidates: I) -> Option<MessageCandidate>
    where
        I: IntoIterator<Item = MessageCandidate>,
    {
        candidates
            .into_iter()
            .max_by_key(|candidate| candidate.received_at)
    }
}

fn addr_to_lowercase(addr: &Addr) -> String {
    addr.address().unwrap_or("").to_lowercase()
}

/// Any recipient address containing the alias, case-insensitively.
fn recipient_contains(message: &Message, alias: &str) -> bool {
    let alias = alias.to_lowercase();
    message
        .to()
        .and_then(|addr| addr.as_list())
        .map(|list| list.iter().any(|a| addr_to_lowercase(a).contains(&alias)))
        .unwrap_or(false)
}

/// The sender's display text (names), lowercased.
fn sender_display_text(message: &Message) -> String {
    message
        .from()
        .and_then(|addr| addr.as_list())
        .map(|list| {
            list.iter()
                .filter_map(|a| a.name())
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        })
        .unwrap_or_default()
}

/// The first sender address, lowercased.
fn sender_address(message: &Message) -> String {
    message
        .from()
        .and_then(|addr| addr.as_list())
        .and_then(|list| list.first())
        .map(addr_to_lowercase)
        .unwrap_or_default()
}

/// Reduces a message body to displayable HTML.
///
/// Preference order: the HTML part, then the text part escaped into
/// HTML, then the placeholder.
fn render_body(message: &Message) -> String {
    if let Some(html) = message.body_html(0) {
        let html = html.trim();
        if !html.is_empty() {
            return html.to_string();
        }
    }

    if let Some(text) = message.body_text(0) {
        let text = text.trim_end();
        if !text.trim().is_empty() {
            return text_as_html(text);
        }
    }

    EMPTY_BODY_PLACEHOLDER.to_string()
}

fn text_as_html(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<p>{}</p>", escaped.replace('\n', "<br>\n"))
}
