//! Control View Trait
//!
//! The control side mirrors the tree through a [`ControlView`]: a UI, an
//! automation lane, anything that builds its own shadow objects. Every
//! appear callback returns an opaque [`ViewContext`] that the engine hands
//! back as the parent of the node's children and on the node's disappearance.

use crate::hints::HintSet;
use crate::node::{CommandId, GroupId, ParameterId};
use crate::value::{ParamValue, Value};

/// Opaque token chosen by the view for one of its shadow objects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewContext(pub u64);

/// Receiver of appear/disappear notifications
///
/// All methods run on the control thread while the engine holds the handoff
/// lock, so they may allocate and format freely but must not call back into
/// the same instance.
///
/// Ordering guarantees:
/// - a group appears before any of its children
/// - a group's children disappear before the group
/// - siblings are visited groups first, then parameters, then commands, each
///   in insertion order
pub trait ControlView: Send {
    /// A group became visible. `parent` is `None` only for the root group.
    fn group_appeared(
        &mut self,
        group: GroupId,
        parent: Option<ViewContext>,
        name: &str,
        hints: &HintSet,
    ) -> ViewContext;

    fn group_disappeared(&mut self, group: GroupId, context: ViewContext);

    /// A parameter became visible with its current value and range
    fn parameter_appeared(
        &mut self,
        parameter: ParameterId,
        group: ViewContext,
        name: &str,
        hints: &HintSet,
        value: &ParamValue,
    ) -> ViewContext;

    fn parameter_disappeared(&mut self, parameter: ParameterId, context: ViewContext);

    /// The producer changed a visible parameter's value
    fn parameter_value_changed(
        &mut self,
        parameter: ParameterId,
        context: ViewContext,
        value: Value,
    );

    fn command_appeared(
        &mut self,
        command: CommandId,
        group: ViewContext,
        name: &str,
        hints: &HintSet,
    ) -> ViewContext {
        let _ = (command, group, name, hints);
        ViewContext::default()
    }

    fn command_disappeared(&mut self, command: CommandId, context: ViewContext) {
        let _ = (command, context);
    }
}
