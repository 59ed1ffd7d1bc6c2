//! Engine Error Types

use thiserror::Error;

/// Errors that can occur in the synchronization engine
///
/// Variants reachable from the producer thread carry only `&'static str`
/// and integers so that reporting them never allocates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Out of real-time memory for {what}")]
    OutOfMemory { what: &'static str },

    #[error("Node table for {what} is full")]
    ArenaFull { what: &'static str },

    #[error("Message queue full - the other side has not drained it yet")]
    QueueFull,

    #[error("Unknown group (stale or foreign handle)")]
    UnknownGroup,

    #[error("Unknown parameter (stale or foreign handle)")]
    UnknownParameter,

    #[error("Unknown command (stale or foreign handle)")]
    UnknownCommand,

    #[error("Name is {len} bytes, limit is {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("Duplicate {kind} name in group")]
    DuplicateName { kind: &'static str },

    #[error("Group nesting deeper than {max} levels")]
    TreeTooDeep { max: usize },

    #[error("Node is already disappearing")]
    AlreadyDisappearing,

    #[error("Value type does not match the parameter type")]
    TypeMismatch,

    #[error("Value out of range")]
    ValueOutOfRange,

    #[error("Invalid parameter range: {0}")]
    InvalidRange(&'static str),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(&'static str),

    #[error("Instance has been detached")]
    Detached,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Allocator error: {0}")]
    Memory(#[from] dynparam_rtmem::RtMemError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
