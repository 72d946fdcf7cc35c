//! Mention marker extraction.
//!
//! The editor embeds mentions as elements carrying `data-mention-id="<id>"`.
//! Connections derived from them only ever grow; see [`union_mentions`].

use once_cell::sync::Lazy;
use regex::Regex;

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-mention-id="([^"]+)""#).expect("valid mention regex"));

/// Returns referenced note ids in first-seen order, without duplicates.
pub fn extract_mention_ids(html: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for captures in MENTION_RE.captures_iter(html) {
        let id = captures[1].trim();
        if id.is_empty() || ids.iter().any(|seen| seen == id) {
            continue;
        }
        ids.push(id.to_string());
    }
    ids
}

/// Adds every mention found in `html` to `connections`.
///
/// Existing connections are never removed, even when their mention is gone.
/// Returns the ids that were newly added.
pub fn union_mentions(connections: &mut Vec<String>, html: &str) -> Vec<String> {
    let mut added = Vec::new();
    for id in extract_mention_ids(html) {
        if !connections.contains(&id) {
            connections.push(id.clone());
            added.push(id);
        }
    }
    added
}
