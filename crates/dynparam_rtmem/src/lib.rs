//! Dynparam RtMem - Real-time Safe Allocation
//!
//! This crate provides the memory layer shared by the producer (real-time)
//! and control threads:
//! - Fixed-size chunk pools with low/high watermark maintenance
//! - Typed pools handing out RAII boxes
//! - A power-of-two size-class router for variable-size blocks
//! - Strings and arrays carved out of router blocks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Control / Setup Thread                      │
//! │   Pool::new ── ensure_* ── sleepy() ──▶ system allocator    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ preallocated chunks
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │   try_* ──pop──▶ chunk ──drop──▶ push back to unused list   │
//! │              (No system allocator in this path)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every allocation entry point exists twice: `try_*` for
//! [`Capability::Atomic`] call sites and `ensure_*` for
//! [`Capability::Sleepy`] ones.

mod array;
mod config;
mod error;
mod generic;
mod pool;
mod string;
mod typed;

pub use array::RtArray;
pub use config::{MemoryConfig, PoolConfig};
pub use error::{RtMemError, RtMemResult};
pub use generic::{RtBlock, RtMemory, BLOCK_HEADER};
pub use pool::{Capability, Maintenance, MaintenanceSummary, Pool, PoolStats, CHUNK_ALIGN};
pub use string::RtString;
pub use typed::{PoolBox, TypedPool};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        let config = MemoryConfig::default();
        assert!(config.validate().is_ok());
        let memory = RtMemory::new(&config).unwrap();
        let text = RtString::try_from_str(&memory, "exported").unwrap();
        assert_eq!(text, "exported");
    }
}
