//! Pool and Size-Class Configuration

use serde::{Deserialize, Serialize};

/// Configuration for a single fixed-size pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Name used in diagnostics
    pub name: String,

    /// Size of every chunk handed out by the pool, in bytes
    pub chunk_size: usize,

    /// Low watermark: maintenance tops the unused list up to this many chunks
    pub min_preallocated: usize,

    /// High watermark: maintenance trims the unused list down to this many chunks
    pub max_preallocated: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            chunk_size: 64,
            min_preallocated: 16,
            max_preallocated: 128,
        }
    }
}

impl PoolConfig {
    /// Create a config for a named pool with the default watermarks
    pub fn new(name: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            name: name.into(),
            chunk_size,
            ..Self::default()
        }
    }

    /// Builder-style watermark override
    pub fn with_watermarks(mut self, min_preallocated: usize, max_preallocated: usize) -> Self {
        self.min_preallocated = min_preallocated;
        self.max_preallocated = max_preallocated;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err(format!("Pool '{}' has zero chunk size", self.name));
        }
        if self.min_preallocated > self.max_preallocated {
            return Err(format!(
                "Pool '{}' low watermark {} exceeds high watermark {}",
                self.name, self.min_preallocated, self.max_preallocated
            ));
        }
        Ok(())
    }
}

/// Configuration for the size-class router
///
/// Size classes start at `base_chunk_size` and double until a class can hold
/// `max_size` bytes plus the per-block header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Smallest size class in bytes (must be a power of two)
    pub base_chunk_size: usize,

    /// Largest request the router accepts, in bytes
    pub max_size: usize,

    /// Low watermark applied to every size class
    pub min_preallocated: usize,

    /// High watermark applied to every size class
    pub max_preallocated: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_chunk_size: 1024,
            max_size: 8 * 1024,
            min_preallocated: 8,
            max_preallocated: 64,
        }
    }
}

impl MemoryConfig {
    /// Generous tables for hosts with many parameters
    pub fn large() -> Self {
        Self {
            base_chunk_size: 1024,
            max_size: 64 * 1024,
            min_preallocated: 100,
            max_preallocated: 1000,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.base_chunk_size.is_power_of_two() {
            return Err(format!(
                "Base chunk size must be a power of two, got {}",
                self.base_chunk_size
            ));
        }
        if self.max_size == 0 {
            return Err("Max size must be non-zero".to_string());
        }
        if self.min_preallocated > self.max_preallocated {
            return Err(format!(
                "Low watermark {} exceeds high watermark {}",
                self.min_preallocated, self.max_preallocated
            ));
        }
        Ok(())
    }
}
