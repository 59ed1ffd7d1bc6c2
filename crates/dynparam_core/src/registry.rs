//! Instance Registry
//!
//! Hands out opaque ids for attached instances so embedding layers never
//! pass raw instance pointers around.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::instance::Instance;
use crate::owner::ValueOwner;

/// Opaque handle returned by [`Registry::attach`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance-{}", self.0)
    }
}

/// Attached instances, keyed by id
pub struct Registry {
    instances: Mutex<HashMap<InstanceId, Arc<Instance>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Attach a new instance for `owner`; blocks
    pub fn attach<O>(&self, owner: &mut O, config: EngineConfig) -> EngineResult<InstanceId>
    where
        O: ValueOwner + ?Sized,
    {
        let instance = Instance::attach(owner, config)?;
        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!("Registered {} for '{}'", id, instance.name());
        self.instances.lock().insert(id, Arc::new(instance));
        Ok(id)
    }

    /// Shared handle for the producer and control threads
    pub fn get(&self, id: InstanceId) -> Option<Arc<Instance>> {
        self.instances.lock().get(&id).cloned()
    }

    /// Shut the instance down and forget it; false for an unknown id
    ///
    /// Clones of the handle stay valid but the instance refuses all work.
    pub fn detach(&self, id: InstanceId) -> bool {
        let Some(instance) = self.instances.lock().remove(&id) else {
            return false;
        };
        instance.shutdown();
        debug!("Unregistered {}", id);
        true
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.instances.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
