//! Input normalization for room ids, chat bodies and display names.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Accepted room id shape after trimming and uppercasing.
static ROOM_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9_-]{3,20}$").expect("room id pattern is valid"));

/// Maximum display name length, in characters.
pub const MAX_NAME_LENGTH: usize = 50;

/// Fallback display name.
pub const ANONYMOUS: &str = "Anonymous";

/// A normalized, validated room key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    /// Trim, uppercase and validate a raw room id. Returns `None` if the
    /// result is not 3-20 characters of `A-Z`, `0-9`, `_` or `-`.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.trim().to_uppercase();
        if ROOM_ID_PATTERN.is_match(&cleaned) {
            Some(Self(cleaned))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim, strip ASCII control characters and cap at `max_len` characters.
/// An empty result means the message must be dropped.
pub fn sanitize_body(raw: &str, max_len: usize) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(*c, '\u{0000}'..='\u{001F}' | '\u{007F}'))
        .take(max_len)
        .collect()
}

/// Trim, strip HTML-breaking characters and cap at 50 characters.
/// Falls back to "Anonymous" when nothing is left.
pub fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '`'))
        .take(MAX_NAME_LENGTH)
        .collect();

    if name.is_empty() {
        ANONYMOUS.to_string()
    } else {
        name
    }
}
