//! Allocator Error Types

use thiserror::Error;

/// Errors that can occur while handing out or replenishing chunks
///
/// Variants carry only plain integers so that building an error on the
/// real-time path never touches the heap.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtMemError {
    #[error("Pool of {chunk_size}-byte chunks is exhausted")]
    PoolExhausted { chunk_size: usize },

    #[error("Requested {requested} bytes exceeds the largest size class ({max} bytes)")]
    TooLarge { requested: usize, max: usize },

    #[error("System allocator refused a {chunk_size}-byte chunk")]
    SystemAllocation { chunk_size: usize },

    #[error("Invalid chunk layout: size {size}, align {align}")]
    InvalidLayout { size: usize, align: usize },

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Result type alias for allocator operations
pub type RtMemResult<T> = Result<T, RtMemError>;
