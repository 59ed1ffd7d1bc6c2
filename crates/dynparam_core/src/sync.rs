//! Diff Walks
//!
//! `show` brings a view up to date with the tree, `hide` tears the view's
//! picture down so a later `show` rebuilds it from scratch. Both run on the
//! control thread under the handoff lock.
//!
//! ```text
//!   show(group):
//!     for child group, parameter, command (in that order, insertion order):
//!       stop early once group.pending_descendants == 0
//!       Appear    -> announce, mark shown, descend
//!       Nothing   -> descend if the child has pending descendants
//!       Disappear -> descend, announce, free
//! ```

use crate::arena::Key;
use crate::node::{CommandId, GroupId, ParameterId, Pending};
use crate::path::encode_path;
use crate::tree::Tree;
use crate::view::ControlView;

/// Callbacks fired by one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub appeared: usize,
    pub disappeared: usize,
}

impl WalkStats {
    pub fn is_empty(&self) -> bool {
        self.appeared == 0 && self.disappeared == 0
    }
}

/// Announce every pending appearance and disappearance
pub(crate) fn show(tree: &mut Tree, view: &mut dyn ControlView) -> WalkStats {
    let mut stats = WalkStats::default();
    let root = tree.root();
    let Some(node) = tree.group(root) else {
        return stats;
    };
    if node.pending == Pending::Appear {
        let context = view.group_appeared(GroupId(root), None, &node.name, &node.hints);
        tree.mark_group_shown(root, context);
        stats.appeared += 1;
    }
    show_group(tree, view, root, &mut stats);
    stats
}

fn has_pending(tree: &Tree, group: Key) -> bool {
    tree.group(group)
        .map_or(false, |node| node.pending_descendants > 0)
}

fn show_group(tree: &mut Tree, view: &mut dyn ControlView, group: Key, stats: &mut WalkStats) {
    let Some(node) = tree.group(group) else {
        return;
    };
    let Some(context) = node.context else {
        return;
    };
    let (mut groups, mut parameters, mut commands) =
        (node.groups.head, node.parameters.head, node.commands.head);

    while let Some(key) = groups {
        if !has_pending(tree, group) {
            return;
        }
        let Some(child) = tree.group(key) else {
            break;
        };
        groups = child.links.next;
        match child.pending {
            Pending::Appear => {
                let shown = view.group_appeared(GroupId(key), Some(context), &child.name, &child.hints);
                tree.mark_group_shown(key, shown);
                stats.appeared += 1;
                show_group(tree, view, key, stats);
            }
            Pending::Nothing => {
                if child.pending_descendants > 0 {
                    show_group(tree, view, key, stats);
                }
            }
            Pending::Disappear => {
                let shown = child.context.unwrap_or_default();
                show_group(tree, view, key, stats);
                view.group_disappeared(GroupId(key), shown);
                tree.free_group(key);
                stats.disappeared += 1;
            }
        }
    }

    while let Some(key) = parameters {
        if !has_pending(tree, group) {
            return;
        }
        let Some(child) = tree.parameter(key) else {
            break;
        };
        parameters = child.links.next;
        match child.pending {
            Pending::Appear => {
                let shown = view.parameter_appeared(
                    ParameterId(key),
                    context,
                    &child.name,
                    &child.hints,
                    &child.value,
                );
                tree.mark_parameter_shown(key, shown);
                stats.appeared += 1;
            }
            Pending::Disappear => {
                view.parameter_disappeared(ParameterId(key), child.context.unwrap_or_default());
                tree.free_parameter(key);
                stats.disappeared += 1;
            }
            Pending::Nothing => {}
        }
    }

    while let Some(key) = commands {
        if !has_pending(tree, group) {
            return;
        }
        let Some(child) = tree.command(key) else {
            break;
        };
        commands = child.links.next;
        match child.pending {
            Pending::Appear => {
                let shown = view.command_appeared(CommandId(key), context, &child.name, &child.hints);
                tree.mark_command_shown(key, shown);
                stats.appeared += 1;
            }
            Pending::Disappear => {
                view.command_disappeared(CommandId(key), child.context.unwrap_or_default());
                tree.free_command(key);
                stats.disappeared += 1;
            }
            Pending::Nothing => {}
        }
    }
}

/// Withdraw everything the view knows about
///
/// Visible nodes go back to `Appear` with their values intact; nodes already
/// waiting to disappear are announced and freed.
pub(crate) fn hide(tree: &mut Tree, view: &mut dyn ControlView) -> WalkStats {
    let mut stats = WalkStats::default();
    let root = tree.root();
    let Some(context) = tree.group(root).and_then(|node| node.context) else {
        return stats;
    };
    hide_children(tree, view, root, &mut stats);
    view.group_disappeared(GroupId(root), context);
    tree.mark_group_hidden(root);
    stats.disappeared += 1;
    stats
}

fn hide_children(tree: &mut Tree, view: &mut dyn ControlView, group: Key, stats: &mut WalkStats) {
    let Some(node) = tree.group(group) else {
        return;
    };
    let (mut groups, mut parameters, mut commands) =
        (node.groups.head, node.parameters.head, node.commands.head);

    while let Some(key) = groups {
        let Some(child) = tree.group(key) else {
            break;
        };
        groups = child.links.next;
        let (pending, context) = (child.pending, child.context.unwrap_or_default());
        if pending == Pending::Appear {
            continue;
        }
        hide_children(tree, view, key, stats);
        view.group_disappeared(GroupId(key), context);
        if pending == Pending::Disappear {
            tree.free_group(key);
        } else {
            tree.mark_group_hidden(key);
        }
        stats.disappeared += 1;
    }

    while let Some(key) = parameters {
        let Some(child) = tree.parameter(key) else {
            break;
        };
        parameters = child.links.next;
        let (pending, context) = (child.pending, child.context.unwrap_or_default());
        match pending {
            Pending::Appear => continue,
            Pending::Nothing => {
                view.parameter_disappeared(ParameterId(key), context);
                tree.mark_parameter_hidden(key);
            }
            Pending::Disappear => {
                view.parameter_disappeared(ParameterId(key), context);
                tree.free_parameter(key);
            }
        }
        stats.disappeared += 1;
    }

    while let Some(key) = commands {
        let Some(child) = tree.command(key) else {
            break;
        };
        commands = child.links.next;
        let (pending, context) = (child.pending, child.context.unwrap_or_default());
        match pending {
            Pending::Appear => continue,
            Pending::Nothing => {
                view.command_disappeared(CommandId(key), context);
                tree.mark_command_hidden(key);
            }
            Pending::Disappear => {
                view.command_disappeared(CommandId(key), context);
                tree.free_command(key);
            }
        }
        stats.disappeared += 1;
    }
}

/// Visit every live parameter as `(encoded path, formatted value)`
///
/// Groups come before parameters at every level, both in insertion order.
pub(crate) fn enumerate(tree: &Tree, visit: &mut dyn FnMut(&str, &str)) -> usize {
    let mut names = Vec::new();
    enumerate_group(tree, tree.root(), &mut names, visit)
}

fn enumerate_group<'t>(
    tree: &'t Tree,
    group: Key,
    names: &mut Vec<&'t str>,
    visit: &mut dyn FnMut(&str, &str),
) -> usize {
    let Some(node) = tree.group(group) else {
        return 0;
    };
    if node.pending == Pending::Disappear {
        return 0;
    }
    names.push(node.name.as_str());
    let mut visited = 0;

    let mut cursor = node.groups.head;
    while let Some(key) = cursor {
        visited += enumerate_group(tree, key, names, visit);
        cursor = tree.group(key).and_then(|child| child.links.next);
    }

    cursor = node.parameters.head;
    while let Some(key) = cursor {
        let Some(parameter) = tree.parameter(key) else {
            break;
        };
        if parameter.pending != Pending::Disappear {
            let path = encode_path(names.iter().copied().chain([parameter.name.as_str()]));
            visit(&path, &parameter.value.format_current());
            visited += 1;
        }
        cursor = parameter.links.next;
    }

    names.pop();
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynparam_rtmem::{Capability, MemoryConfig};

    use crate::config::{EngineConfig, PoolLimits};
    use crate::hints::HintSet;
    use crate::memory::EngineMemory;
    use crate::value::{ParamValue, ParameterSpec, Value};
    use crate::view::ViewContext;

    /// Records callbacks as short strings
    #[derive(Default)]
    struct Log {
        events: Vec<String>,
        next: u64,
    }

    impl Log {
        fn context(&mut self) -> ViewContext {
            self.next += 1;
            ViewContext(self.next)
        }
    }

    impl ControlView for Log {
        fn group_appeared(
            &mut self,
            _group: GroupId,
            _parent: Option<ViewContext>,
            name: &str,
            _hints: &HintSet,
        ) -> ViewContext {
            self.events.push(format!("+g {}", name));
            self.context()
        }

        fn group_disappeared(&mut self, _group: GroupId, context: ViewContext) {
            self.events.push(format!("-g {}", context.0));
        }

        fn parameter_appeared(
            &mut self,
            _parameter: ParameterId,
            _group: ViewContext,
            name: &str,
            _hints: &HintSet,
            value: &ParamValue,
        ) -> ViewContext {
            self.events.push(format!("+p {}={}", name, value.format_current()));
            self.context()
        }

        fn parameter_disappeared(&mut self, _parameter: ParameterId, context: ViewContext) {
            self.events.push(format!("-p {}", context.0));
        }

        fn parameter_value_changed(&mut self, _parameter: ParameterId, _context: ViewContext, _value: Value) {}
    }

    fn setup() -> (EngineMemory, Tree) {
        let config = EngineConfig {
            memory: MemoryConfig {
                base_chunk_size: 64,
                max_size: 256,
                min_preallocated: 32,
                max_preallocated: 64,
            },
            groups: PoolLimits::new(8, 16),
            parameters: PoolLimits::new(8, 16),
            commands: PoolLimits::new(2, 4),
            messages: PoolLimits::new(2, 4),
            queue_capacity: 4,
            pending_value_limit: 4,
            max_name_len: 64,
        };
        let memory = EngineMemory::new(&config).unwrap();
        let tree = Tree::new(&memory, &config, "synth", &[]).unwrap();
        (memory, tree)
    }

    fn float(value: f32) -> ParameterSpec<'static> {
        ParameterSpec::Float {
            value,
            min: 0.0,
            max: 1.0,
        }
    }

    #[test]
    fn test_groups_before_parameters() {
        let (memory, mut tree) = setup();
        let root = tree.root();
        tree.add_parameter(&memory, Capability::Atomic, root, "volume", &[], &float(0.8))
            .unwrap();
        let filter = tree
            .add_group(&memory, Capability::Atomic, root, "filter", &[])
            .unwrap();
        tree.add_parameter(&memory, Capability::Atomic, filter, "cutoff", &[], &float(0.5))
            .unwrap();

        let mut log = Log::default();
        let stats = show(&mut tree, &mut log);
        assert_eq!(
            log.events,
            vec!["+g synth", "+g filter", "+p cutoff=0.5", "+p volume=0.8"]
        );
        assert_eq!(stats.appeared, 4);
        tree.check_invariants().unwrap();

        // nothing pending: a second walk is silent
        log.events.clear();
        assert!(show(&mut tree, &mut log).is_empty());
        assert!(log.events.is_empty());
    }

    #[test]
    fn test_disappear_frees_after_announcement() {
        let (memory, mut tree) = setup();
        let root = tree.root();
        let cutoff = tree
            .add_parameter(&memory, Capability::Atomic, root, "cutoff", &[], &float(0.5))
            .unwrap()
            .unwrap();
        let mut log = Log::default();
        show(&mut tree, &mut log);

        tree.remove_parameter(cutoff).unwrap();
        assert_eq!(memory.usage().parameters, 1);
        log.events.clear();
        let stats = show(&mut tree, &mut log);
        assert_eq!(stats.disappeared, 1);
        assert_eq!(log.events, vec!["-p 2"]);
        assert_eq!(memory.usage().parameters, 0);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_group_children_disappear_first() {
        let (memory, mut tree) = setup();
        let root = tree.root();
        let env = tree
            .add_group(&memory, Capability::Atomic, root, "env", &[])
            .unwrap();
        tree.add_parameter(&memory, Capability::Atomic, env, "attack", &[], &float(0.1))
            .unwrap();
        let mut log = Log::default();
        show(&mut tree, &mut log);

        tree.remove_group(env).unwrap();
        log.events.clear();
        show(&mut tree, &mut log);
        assert_eq!(log.events, vec!["-p 3", "-g 2"]);
        assert_eq!(tree.node_counts(), (1, 0, 0));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_hide_then_show_repeats_announcements() {
        let (memory, mut tree) = setup();
        let root = tree.root();
        let lfo = tree
            .add_group(&memory, Capability::Atomic, root, "lfo", &[])
            .unwrap();
        tree.add_parameter(&memory, Capability::Atomic, lfo, "rate", &[], &float(0.25))
            .unwrap();
        let gone = tree
            .add_parameter(&memory, Capability::Atomic, root, "gone", &[], &float(0.0))
            .unwrap()
            .unwrap();

        let mut first = Log::default();
        show(&mut tree, &mut first);
        tree.remove_parameter(gone).unwrap();

        let mut hidden = Log::default();
        let stats = hide(&mut tree, &mut hidden);
        assert_eq!(stats.disappeared, 4);
        assert_eq!(hidden.events, vec!["-p 3", "-g 2", "-p 4", "-g 1"]);
        assert!(tree.parameter(gone).is_none());
        tree.check_invariants().unwrap();

        let mut second = Log::default();
        show(&mut tree, &mut second);
        assert_eq!(second.events, vec!["+g synth", "+g lfo", "+p rate=0.25"]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_hide_without_view_is_noop() {
        let (_memory, mut tree) = setup();
        let mut log = Log::default();
        assert!(hide(&mut tree, &mut log).is_empty());
        assert!(log.events.is_empty());
    }

    #[test]
    fn test_enumerate_paths() {
        let (memory, mut tree) = setup();
        let root = tree.root();
        tree.add_parameter(&memory, Capability::Atomic, root, "on", &[], &ParameterSpec::Boolean { value: true })
            .unwrap();
        let osc = tree
            .add_group(&memory, Capability::Atomic, root, "osc/1", &[])
            .unwrap();
        tree.add_parameter(
            &memory,
            Capability::Atomic,
            osc,
            "shape",
            &[],
            &ParameterSpec::Enumeration {
                selected: 1,
                values: &["sine", "square"],
            },
        )
        .unwrap();

        let mut seen = Vec::new();
        let count = enumerate(&tree, &mut |path, value| {
            seen.push(format!("{} {}", path, value))
        });
        assert_eq!(count, 2);
        assert_eq!(seen, vec!["synth/osc\\/1/shape square", "synth/on true"]);
    }
}
