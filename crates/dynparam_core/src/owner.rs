//! Value Owner Trait

use crate::error::EngineResult;
use crate::instance::ProducerSession;
use crate::node::{CommandId, ParameterId};
use crate::value::Value;

/// The producer-side component that owns live parameter values
///
/// An owner builds its part of the tree through a [`ProducerSession`] and
/// learns about control-side value changes through `parameter_changed`.
///
/// # Real-time Safety Contract
///
/// `parameter_changed` and `command_executed` are called from
/// `Instance::producer_run` on the real-time thread. Implementations must not
/// allocate, lock, or perform I/O in them.
pub trait ValueOwner {
    /// Name of the root group
    fn root_name(&self) -> &str;

    /// Hints attached to the root group
    fn root_hints(&self) -> Vec<(String, Option<String>)> {
        Vec::new()
    }

    /// Build the initial tree; runs once during attach, may block
    fn populate(&mut self, session: &mut ProducerSession<'_>) -> EngineResult<()> {
        let _ = session;
        Ok(())
    }

    /// A value change requested by the control side has been stored
    ///
    /// `tag` is whatever the owner set with `ProducerSession::set_parameter_tag`.
    fn parameter_changed(&mut self, parameter: ParameterId, tag: u64, value: Value);

    /// The control side asked for a command to run
    fn command_executed(&mut self, command: CommandId) {
        let _ = command;
    }
}
