//! Button payloads
//!
//! Telegram limits callback data to 64 bytes, so a reference carries only
//! the kind, the owning user and the posting id: `cl:<user_id>:<item_id>`.

use std::fmt;

const COVER_LETTER_TAG: &str = "cl";
const MAX_WIRE_BYTES: usize = 64;

/// What a button asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Write a cover letter for a cached posting
    CoverLetter,
}

impl ActionKind {
    fn tag(self) -> &'static str {
        match self {
            ActionKind::CoverLetter => COVER_LETTER_TAG,
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            COVER_LETTER_TAG => Some(ActionKind::CoverLetter),
            _ => None,
        }
    }
}

/// Validated reference to a posting in one user's cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef {
    pub kind: ActionKind,
    pub user_id: String,
    pub item_id: String,
}

impl ActionRef {
    pub fn cover_letter(user_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            kind: ActionKind::CoverLetter,
            user_id: user_id.into(),
            item_id: item_id.into(),
        }
    }

    /// Wire form for callback data
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.kind.tag(), self.user_id, self.item_id)
    }

    /// Parse callback data. Anything that is not exactly
    /// `<tag>:<user_id>:<item_id>` with well-formed parts is rejected.
    pub fn parse(data: &str) -> Option<Self> {
        if data.is_empty() || data.len() > MAX_WIRE_BYTES {
            return None;
        }

        let mut parts = data.split(':');
        let kind = ActionKind::from_tag(parts.next()?)?;
        let user_id = parts.next()?;
        let item_id = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        let user_ok = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        let item_ok = !item_id.is_empty() && item_id.chars().all(|c| c.is_ascii_hexdigit());
        if !user_ok || !item_ok {
            return None;
        }

        Some(Self {
            kind,
            user_id: user_id.to_string(),
            item_id: item_id.to_string(),
        })
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
