//! Dynparam Core - Parameter Tree Synchronization
//!
//! This crate mirrors a real-time unit's parameter tree to a control surface:
//! - A handoff lock the real-time side never waits on
//! - A parameter tree with incremental pending-state bookkeeping
//! - Appear/disappear diff walks driving a pluggable control view
//! - Pooled change-message queues in both directions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Control Thread                         │
//! │  set_value ──▶ ToProducer queue      ControlView ◀── show   │
//! │  control_run ◀── ToControl queue     (appear/disappear)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ HandoffLock (control may wait)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audio Thread                           │
//! │  producer_run ──try_lock──▶ drain queue ──▶ Tree ──▶ Owner  │
//! │            (Fail fast, pool memory only in this path)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod arena;
mod config;
mod diagnostics;
mod error;
mod handoff;
mod hints;
mod instance;
mod memory;
mod message;
mod node;
mod owner;
mod path;
mod pending;
mod registry;
mod sync;
mod tree;
mod value;
mod view;

pub use config::{EngineConfig, PoolLimits};
pub use diagnostics::Diagnostics;
pub use error::{EngineError, EngineResult};
pub use handoff::{ControlGuard, HandoffLock, ProducerGuard};
pub use hints::{Hint, HintPair, HintSet};
pub use instance::{ControlReport, Instance, ProducerSession};
pub use memory::PoolUsage;
pub use node::{CommandId, GroupId, ParameterId};
pub use owner::ValueOwner;
pub use path::{decode_path, encode_path, PATH_ESCAPE, PATH_SEPARATOR};
pub use registry::{InstanceId, Registry};
pub use sync::WalkStats;
pub use tree::MAX_GROUP_DEPTH;
pub use value::{ParamValue, ParameterKind, ParameterSpec, Value};
pub use view::{ControlView, ViewContext};

// Re-export allocator types that appear in this crate's API
pub use dynparam_rtmem::{Capability, MaintenanceSummary, MemoryConfig};
