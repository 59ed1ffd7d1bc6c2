//! Engine Configuration

use dynparam_rtmem::MemoryConfig;
use serde::{Deserialize, Serialize};

/// Watermarks for one node or message pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolLimits {
    /// Chunks preallocated up front and kept available by maintenance
    pub min_preallocated: usize,

    /// Unused chunks above this are returned to the system by maintenance.
    /// Also the initial size of the node table.
    pub max_preallocated: usize,
}

impl PoolLimits {
    pub const fn new(min_preallocated: usize, max_preallocated: usize) -> Self {
        Self {
            min_preallocated,
            max_preallocated,
        }
    }

    fn validate(&self, name: &str) -> Result<(), String> {
        if self.max_preallocated == 0 {
            return Err(format!("{} pool needs a non-zero high watermark", name));
        }
        if self.min_preallocated > self.max_preallocated {
            return Err(format!(
                "{} pool low watermark {} exceeds high watermark {}",
                name, self.min_preallocated, self.max_preallocated
            ));
        }
        Ok(())
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Size classes for names, hints, paths and enumeration values
    pub memory: MemoryConfig,

    /// Group node pool
    pub groups: PoolLimits,

    /// Parameter node pool
    pub parameters: PoolLimits,

    /// Command node pool
    pub commands: PoolLimits,

    /// Pool for messages in each direction
    pub messages: PoolLimits,

    /// Slots in each change-message queue
    pub queue_capacity: usize,

    /// Unmatched by-path values kept before the oldest is evicted
    pub pending_value_limit: usize,

    /// Longest accepted node name in bytes
    pub max_name_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            groups: PoolLimits::new(16, 64),
            parameters: PoolLimits::new(64, 256),
            commands: PoolLimits::new(4, 32),
            messages: PoolLimits::new(32, 128),
            queue_capacity: 128,
            pending_value_limit: 64,
            max_name_len: 255,
        }
    }
}

impl EngineConfig {
    /// Small tables for units with a handful of parameters
    pub fn compact() -> Self {
        Self {
            memory: MemoryConfig {
                base_chunk_size: 1024,
                max_size: 2048,
                min_preallocated: 4,
                max_preallocated: 32,
            },
            groups: PoolLimits::new(4, 16),
            parameters: PoolLimits::new(8, 32),
            commands: PoolLimits::new(1, 8),
            messages: PoolLimits::new(8, 32),
            queue_capacity: 32,
            pending_value_limit: 16,
            max_name_len: 255,
        }
    }

    /// Large tables for units exposing hundreds of parameters
    pub fn large() -> Self {
        Self {
            memory: MemoryConfig::large(),
            groups: PoolLimits::new(100, 1000),
            parameters: PoolLimits::new(100, 1000),
            commands: PoolLimits::new(16, 128),
            messages: PoolLimits::new(100, 1000),
            queue_capacity: 1024,
            pending_value_limit: 256,
            max_name_len: 1024,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.memory.validate()?;
        self.groups.validate("Group")?;
        self.parameters.validate("Parameter")?;
        self.commands.validate("Command")?;
        self.messages.validate("Message")?;
        if self.queue_capacity == 0 {
            return Err("Queue capacity must be non-zero".to_string());
        }
        if self.pending_value_limit == 0 {
            return Err("Pending value limit must be non-zero".to_string());
        }
        if self.max_name_len == 0 || self.max_name_len > self.memory.max_size {
            return Err(format!(
                "Max name length {} must be within 1..={}",
                self.max_name_len, self.memory.max_size
            ));
        }
        Ok(())
    }
}
