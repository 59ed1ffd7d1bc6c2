//! Node Hints
//!
//! Hints are `(name, optional value)` string pairs attached to a group,
//! parameter or command when it is created. The engine never interprets
//! them. They are copied into instance-owned storage on creation so the
//! caller's strings can go away immediately.

use dynparam_rtmem::{Capability, RtArray, RtMemResult, RtMemory, RtString};

/// Borrowed hint as supplied by the producer
pub type HintPair<'a> = (&'a str, Option<&'a str>);

/// One owned hint
#[derive(Debug, PartialEq)]
pub struct Hint {
    name: RtString,
    value: Option<RtString>,
}

impl Hint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    fn copy_in(
        memory: &RtMemory,
        capability: Capability,
        name: &str,
        value: Option<&str>,
    ) -> RtMemResult<Self> {
        let name = RtString::from_str_with(memory, capability, name)?;
        let value = match value {
            Some(text) => Some(RtString::from_str_with(memory, capability, text)?),
            None => None,
        };
        Ok(Self { name, value })
    }
}

/// Immutable set of hints owned by one node
#[derive(Debug, Default, PartialEq)]
pub struct HintSet {
    // None for an empty set, so hint-less nodes cost no block
    items: Option<RtArray<Hint>>,
}

impl HintSet {
    pub fn empty() -> Self {
        Self { items: None }
    }

    /// Deep-copy borrowed pairs into storage from `memory`
    pub fn copy_from(
        memory: &RtMemory,
        capability: Capability,
        pairs: &[HintPair<'_>],
    ) -> RtMemResult<Self> {
        if pairs.is_empty() {
            return Ok(Self::empty());
        }
        let items = RtArray::try_new_with(memory, capability, pairs.len(), |index| {
            let (name, value) = pairs[index];
            Hint::copy_in(memory, capability, name, value)
        })?;
        Ok(Self { items: Some(items) })
    }

    /// Deep copy with independent storage
    pub fn try_clone_in(&self, memory: &RtMemory, capability: Capability) -> RtMemResult<Self> {
        match &self.items {
            None => Ok(Self::empty()),
            Some(items) => {
                let copy = RtArray::try_new_with(memory, capability, items.len(), |index| {
                    let hint = &items[index];
                    Hint::copy_in(memory, capability, hint.name(), hint.value())
                })?;
                Ok(Self { items: Some(copy) })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.as_ref().map_or(0, |items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hint> {
        self.items.iter().flat_map(|items| items.iter())
    }

    /// Value of the first hint called `name`; `Some(None)` for a valueless hint
    pub fn get(&self, name: &str) -> Option<Option<&str>> {
        self.iter()
            .find(|hint| hint.name() == name)
            .map(|hint| hint.value())
    }

    /// Plain owned copy for consumers outside the real-time world
    pub fn to_vec(&self) -> Vec<(String, Option<String>)> {
        self.iter()
            .map(|hint| (hint.name().to_string(), hint.value().map(str::to_string)))
            .collect()
    }
}
