//! Topic filters and the local dispatch table.
//!
//! Filters follow the MQTT rules: `/` separates levels, `+` matches exactly
//! one level and `#` matches any remaining levels (including none) and must be
//! the last level. Topics starting with `$` are never matched by a leading
//! wildcard.

use super::MAX_TOPIC_LEN;
use crate::network::error::SubscribeError;
use heapless::{String, Vec};

/// Token returned by a subscription, used to remove it again.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct SubscriptionId(u16);

/// Checks that `filter` is a well-formed topic filter.
pub fn validate_filter(filter: &str) -> Result<(), SubscribeError> {
    if filter.is_empty() || filter.len() > MAX_TOPIC_LEN {
        return Err(SubscribeError::InvalidFilter);
    }
    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        let is_last = levels.peek().is_none();
        match level {
            "#" if !is_last => return Err(SubscribeError::InvalidFilter),
            "#" | "+" => {}
            other if other.contains(['#', '+']) => return Err(SubscribeError::InvalidFilter),
            _ => {}
        }
    }
    Ok(())
}

/// Whether `filter` contains a wildcard level.
pub fn is_wildcard(filter: &str) -> bool {
    filter.split('/').any(|level| level == "#" || level == "+")
}

/// Whether `topic` is matched by `filter`.
pub fn matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[derive(Debug)]
struct Entry<H> {
    id: SubscriptionId,
    filter: String<MAX_TOPIC_LEN>,
    wildcard: bool,
    handler: H,
}

/// Filters and their handlers, in registration order.
///
/// Each filter appears at most once; registering a filter again replaces its
/// handler and keeps the original id.
#[derive(Debug)]
pub struct SubscriptionTable<H, const N: usize> {
    entries: Vec<Entry<H>, N>,
    next_id: u16,
}

impl<H, const N: usize> SubscriptionTable<H, N> {
    /// Creates an empty table.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Records `handler` for `filter`.
    pub fn insert(&mut self, filter: &str, handler: H) -> Result<SubscriptionId, SubscribeError> {
        validate_filter(filter)?;
        if let Some(entry) = self.entries.iter_mut().find(|e| e.filter == filter) {
            entry.handler = handler;
            return Ok(entry.id);
        }
        let id = SubscriptionId(self.next_id);
        let entry = Entry {
            id,
            filter: String::try_from(filter).map_err(|_| SubscribeError::InvalidFilter)?,
            wildcard: is_wildcard(filter),
            handler,
        };
        self.entries
            .push(entry)
            .map_err(|_| SubscribeError::TableFull)?;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(id)
    }

    /// Removes a subscription and returns its filter.
    pub fn remove(&mut self, id: SubscriptionId) -> Result<String<MAX_TOPIC_LEN>, SubscribeError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(SubscribeError::UnknownSubscription)?;
        // `remove` keeps registration order, which wildcard precedence relies on
        Ok(self.entries.remove(index).filter)
    }

    /// Whether the subscription is still registered.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// The filter registered under `id`.
    pub fn filter(&self, id: SubscriptionId) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.filter.as_str())
    }

    /// All registered filters, in registration order.
    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.filter.as_str())
    }

    /// Number of subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The subscription that should receive a message on `topic`.
    ///
    /// An exact filter wins over any wildcard; among wildcards the earliest
    /// registration wins.
    pub fn best_match(&self, topic: &str) -> Option<SubscriptionId> {
        self.entries
            .iter()
            .find(|e| !e.wildcard && e.filter == topic)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|e| e.wildcard && matches(&e.filter, topic))
            })
            .map(|e| e.id)
    }

    /// Mutable access to the handler registered under `id`.
    pub fn handler_mut(&mut self, id: SubscriptionId) -> Option<&mut H> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| &mut e.handler)
    }
}

impl<H, const N: usize> Default for SubscriptionTable<H, N> {
    fn default() -> Self {
        Self::new()
    }
}
