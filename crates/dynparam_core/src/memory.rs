//! Per-Instance Pools

use dynparam_rtmem::{MaintenanceSummary, RtMemory, TypedPool};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::message::{ToControl, ToProducer};
use crate::node::{CommandNode, GroupNode, ParameterNode};

/// Chunks currently handed out, per pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolUsage {
    pub groups: usize,
    pub parameters: usize,
    pub commands: usize,
    /// Both message directions together
    pub messages: usize,
    /// Size-class blocks (names, hints, paths, enumeration values)
    pub blocks: usize,
}

/// Every pool one instance allocates from
///
/// Lives outside the handoff lock: pools carry their own locking, and
/// maintenance must be able to run while the producer holds the tree.
pub(crate) struct EngineMemory {
    pub(crate) blocks: RtMemory,
    pub(crate) groups: TypedPool<GroupNode>,
    pub(crate) parameters: TypedPool<ParameterNode>,
    pub(crate) commands: TypedPool<CommandNode>,
    pub(crate) to_producer: TypedPool<ToProducer>,
    pub(crate) to_control: TypedPool<ToControl>,
}

impl EngineMemory {
    /// Build and preallocate every pool; blocks
    pub(crate) fn new(config: &EngineConfig) -> EngineResult<Self> {
        let memory = Self {
            blocks: RtMemory::new(&config.memory)?,
            groups: TypedPool::new(
                "groups",
                config.groups.min_preallocated,
                config.groups.max_preallocated,
            )?,
            parameters: TypedPool::new(
                "parameters",
                config.parameters.min_preallocated,
                config.parameters.max_preallocated,
            )?,
            commands: TypedPool::new(
                "commands",
                config.commands.min_preallocated,
                config.commands.max_preallocated,
            )?,
            to_producer: TypedPool::new(
                "messages-to-producer",
                config.messages.min_preallocated,
                config.messages.max_preallocated,
            )?,
            to_control: TypedPool::new(
                "messages-to-control",
                config.messages.min_preallocated,
                config.messages.max_preallocated,
            )?,
        };
        Ok(memory)
    }

    /// Sleepy top-up of every pool; call from the control thread only
    pub(crate) fn maintain(&self) -> MaintenanceSummary {
        let mut summary = self.blocks.sleepy();
        summary.record(self.groups.sleepy());
        summary.record(self.parameters.sleepy());
        summary.record(self.commands.sleepy());
        summary.record(self.to_producer.sleepy());
        summary.record(self.to_control.sleepy());
        if summary.changed() {
            debug!(
                "Pool maintenance: {} chunks added, {} released",
                summary.grew, summary.shrank
            );
        }
        summary
    }

    pub(crate) fn usage(&self) -> PoolUsage {
        PoolUsage {
            groups: self.groups.stats().used,
            parameters: self.parameters.stats().used,
            commands: self.commands.stats().used,
            messages: self.to_producer.stats().used + self.to_control.stats().used,
            blocks: self.blocks.used_blocks(),
        }
    }
}
