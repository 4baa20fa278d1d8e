use serde::{Deserialize, Serialize};

/// Number of media fields a post always carries
pub const SLOT_COUNT: usize = 3;

/// Fixed-arity media payload for a post
///
/// Unused slots are empty strings, so a post with no media still sends
/// three (empty) references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSlots([String; SLOT_COUNT]);

impl MediaSlots {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fill slots in order from `urls`; anything past the third is ignored
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut slots = Self::default();
        for (slot, url) in slots.0.iter_mut().zip(urls) {
            *slot = url.into();
        }
        slots
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Non-empty references in slot order
    pub fn filled(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.filled().next().is_none()
    }

    pub fn into_array(self) -> [String; SLOT_COUNT] {
        self.0
    }
}
