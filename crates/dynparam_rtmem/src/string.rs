//! Pool-Backed Strings

use std::fmt;
use std::ops::Deref;
use std::ptr;

use crate::error::RtMemResult;
use crate::generic::{RtBlock, RtMemory};
use crate::pool::Capability;

/// Immutable UTF-8 string stored in an [`RtMemory`] block
///
/// Copying a `&str` in is the only way to build one, so every `RtString`
/// owns storage independent of where its text came from.
pub struct RtString {
    block: RtBlock,
    len: usize,
}

impl RtString {
    /// Copy `text` into a block without blocking
    ///
    /// # Real-time Safety
    ///
    /// One size-class pop plus a `memcpy`.
    pub fn try_from_str(memory: &RtMemory, text: &str) -> RtMemResult<Self> {
        Ok(Self::from_block(memory.try_allocate(text.len())?, text))
    }

    /// Copy `text` into a block, growing the size class if needed
    pub fn ensure_from_str(memory: &RtMemory, text: &str) -> RtMemResult<Self> {
        Ok(Self::from_block(memory.ensure_allocate(text.len())?, text))
    }

    pub fn from_str_with(
        memory: &RtMemory,
        capability: Capability,
        text: &str,
    ) -> RtMemResult<Self> {
        Ok(Self::from_block(
            memory.allocate(capability, text.len())?,
            text,
        ))
    }

    /// Deep copy into fresh storage
    pub fn try_clone_in(&self, memory: &RtMemory, capability: Capability) -> RtMemResult<Self> {
        Self::from_str_with(memory, capability, self.as_str())
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: the first `len` bytes were copied from a valid &str
        unsafe {
            let bytes = std::slice::from_raw_parts(self.block.as_ptr(), self.len);
            std::str::from_utf8_unchecked(bytes)
        }
    }

    fn from_block(mut block: RtBlock, text: &str) -> Self {
        debug_assert!(block.capacity() >= text.len());
        // SAFETY: the block has room for text.len() bytes and does not overlap `text`
        unsafe { ptr::copy_nonoverlapping(text.as_ptr(), block.as_mut_ptr(), text.len()) };
        Self {
            block,
            len: text.len(),
        }
    }
}

impl Deref for RtString {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for RtString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for RtString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for RtString {}

impl PartialEq<str> for RtString {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for RtString {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for RtString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for RtString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
