//! Producer-Side Diagnostics
//!
//! The real-time thread never logs. What it observes is counted here and
//! reported by the control thread.

use tracing::warn;

/// Counters accumulated since the last `control_run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Parameters of a kind the engine does not mirror
    pub ignored_parameters: u64,
    /// By-path values pushed out of a full pending list
    pub evicted_pending_values: u64,
    /// Messages naming a parameter or command that no longer exists
    pub stale_messages: u64,
    /// Values that failed the type or range check when applied
    pub rejected_values: u64,
    /// Producer-to-control notifications lost to a full queue or pool
    pub dropped_notifications: u64,
    /// Real-time tree edits refused for lack of preallocated memory
    pub deferred_allocations: u64,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    /// Emit one warning per non-zero counter
    pub fn log(&self, instance: &str) {
        if self.ignored_parameters > 0 {
            warn!(
                "[{}] Ignored {} parameter(s) of unsupported kind",
                instance, self.ignored_parameters
            );
        }
        if self.evicted_pending_values > 0 {
            warn!(
                "[{}] Evicted {} unmatched by-path value(s)",
                instance, self.evicted_pending_values
            );
        }
        if self.stale_messages > 0 {
            warn!(
                "[{}] Dropped {} message(s) for removed nodes",
                instance, self.stale_messages
            );
        }
        if self.rejected_values > 0 {
            warn!(
                "[{}] Rejected {} value(s) failing type or range checks",
                instance, self.rejected_values
            );
        }
        if self.dropped_notifications > 0 {
            warn!(
                "[{}] Lost {} value notification(s) to the control side",
                instance, self.dropped_notifications
            );
        }
        if self.deferred_allocations > 0 {
            warn!(
                "[{}] {} real-time tree edit(s) failed for lack of memory",
                instance, self.deferred_allocations
            );
        }
    }
}
