use bytes::Bytes;
use messenger_frame::{codec::MAX_STRING_LEN, EncodeError, MessageReader};

use crate::control::WILDCARD;

/// Callback invoked with the message type and a fresh reader over its payload.
pub type Handler = Box<dyn FnMut(&str, MessageReader) + Send>;

/// A subscription pattern.
///
/// A trailing `*` turns the pattern into a prefix match; the marker itself
/// is not part of the prefix. No other wildcard position is recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
}

impl Pattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix(WILDCARD) {
            Some(prefix) => Pattern::Prefix(prefix.to_string()),
            None => Pattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, msg_type: &str) -> bool {
        match self {
            Pattern::Exact(name) => msg_type == name,
            Pattern::Prefix(prefix) => msg_type.starts_with(prefix.as_str()),
        }
    }
}

struct Entry {
    pattern: Pattern,
    handler: Handler,
}

/// Ordered collection of handlers.
///
/// Handlers are never removed. Every handler whose pattern matches runs,
/// in the order it was added.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: Vec<Entry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a pattern string such as `"Foo"` or `"Foo*"`.
    pub fn add<F>(&mut self, pattern: &str, handler: F)
    where
        F: FnMut(&str, MessageReader) + Send + 'static,
    {
        self.entries.push(Entry {
            pattern: Pattern::parse(pattern),
            handler: Box::new(handler),
        });
    }

    /// Run every matching handler, each with its own reader positioned at
    /// the start of the payload. Returns how many handlers ran.
    pub fn dispatch(&mut self, msg_type: &str, payload: &Bytes) -> usize {
        let mut invoked = 0;
        for entry in &mut self.entries {
            if entry.pattern.matches(msg_type) {
                (entry.handler)(msg_type, MessageReader::new(payload.clone()));
                invoked += 1;
            }
        }
        if invoked == 0 {
            tracing::trace!(msg_type, "no handler for message");
        }
        invoked
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| &entry.pattern))
            .finish()
    }
}

/// Patterns announced to the broker, in first-subscription order.
///
/// Stored with the wildcard marker intact, as they travel in `_Listen`.
#[derive(Debug, Default)]
pub(crate) struct Subscriptions {
    patterns: Vec<String>,
}

impl Subscriptions {
    /// Record a pattern. Returns false if it was already present.
    pub(crate) fn insert(&mut self, pattern: &str) -> Result<bool, EncodeError> {
        if pattern.len() > MAX_STRING_LEN {
            return Err(EncodeError::StringTooLong {
                len: pattern.len(),
                max: MAX_STRING_LEN,
            });
        }
        if self.patterns.iter().any(|known| known == pattern) {
            return Ok(false);
        }
        self.patterns.push(pattern.to_string());
        Ok(true)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.patterns.len()
    }
}
