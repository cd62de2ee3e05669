// Content classifier - decides whether a message is restricted
// promotional/media content.
//
// This is a pure function over a pattern set: no state, no I/O, total.
// Any single rule matching marks the message restricted.

use super::moderation_models::InboundMessage;
use serde::{Deserialize, Serialize};

/// Versioned set of text patterns that mark a message as promotional.
///
/// Kept as data rather than inline literals so deployments can extend the
/// list without a code change (load a JSON file via `PATTERNS_FILE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSet {
    pub version: u32,
    pub patterns: Vec<String>,
}

impl PatternSet {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        // Link schemes, mention marker, common TLDs and shorteners.
        Self {
            version: 1,
            patterns: [
                "http", "t.me/", "@", "www.", ".com", ".uz", ".ru", "bit.ly", "t.co",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
        }
    }
}

/// Classify one message. Returns `true` if it is restricted content:
/// a pattern match in body+caption, a forwarded message, or any non-text
/// attachment. An empty message is never restricted.
pub fn is_restricted(msg: &InboundMessage, patterns: &PatternSet) -> bool {
    if msg.forwarded {
        return true;
    }
    if !msg.attachments.is_empty() {
        return true;
    }

    let mut text = String::new();
    if let Some(body) = &msg.text {
        text.push_str(body);
    }
    if let Some(caption) = &msg.caption {
        text.push_str(caption);
    }
    if text.is_empty() {
        return false;
    }

    let text = text.to_lowercase();
    patterns
        .patterns
        .iter()
        .any(|p| text.contains(&p.to_lowercase()))
}
