//! Pending By-Path Values
//!
//! A by-path value whose parameter does not exist yet waits here until a
//! parameter with a matching path is added. Policy:
//! - a newer value for the same encoded path replaces the older one
//! - at most `limit` entries are kept; when full the oldest is evicted
//! - the control side may drop everything with `clear_pending_values`

use std::collections::VecDeque;

use dynparam_rtmem::RtString;

use crate::value::Value;

pub(crate) struct PendingValue {
    pub(crate) path: RtString,
    pub(crate) value: Value,
}

pub(crate) struct PendingValues {
    entries: VecDeque<PendingValue>,
    limit: usize,
}

impl PendingValues {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    /// Park a value; returns the entry evicted to make room, if any
    ///
    /// # Real-time Safety
    ///
    /// The deque never grows past the capacity reserved at construction.
    pub(crate) fn park(&mut self, path: RtString, value: Value) -> Option<PendingValue> {
        if let Some(existing) = self.entries.iter_mut().find(|entry| entry.path == path) {
            existing.value = value;
            return None;
        }
        let evicted = if self.entries.len() >= self.limit {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(PendingValue { path, value });
        evicted
    }

    /// Remove every entry whose path satisfies `matches`; returns the newest value
    pub(crate) fn take_matching<F>(&mut self, mut matches: F) -> Option<Value>
    where
        F: FnMut(&str) -> bool,
    {
        let mut found = None;
        let mut index = 0;
        while index < self.entries.len() {
            if matches(self.entries[index].path.as_str()) {
                found = self.entries.remove(index).map(|entry| entry.value);
            } else {
                index += 1;
            }
        }
        found
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}
