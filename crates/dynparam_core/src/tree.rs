//! Parameter Tree
//!
//! Groups, parameters and commands live in generational arenas; parent,
//! child and sibling links are keys. Every node carries a [`Pending`] state,
//! and every group counts the descendants whose state is not `Nothing`.
//! Each transition walks the parent chain and adjusts those counts, so the
//! diff walk can skip any subtree whose count is zero.
//!
//! Lifecycle of a node:
//!
//! ```text
//!   add ──► Appear ──(shown)──► Nothing ──(removed)──► Disappear ──(shown)──► freed
//!             │                    │
//!             │(removed)           │(view hidden)
//!             ▼                    ▼
//!           freed               Appear
//! ```

use std::collections::HashSet;

use dynparam_rtmem::{Capability, RtString, TypedPool};

use crate::arena::{Arena, Key};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::hints::{HintPair, HintSet};
use crate::memory::EngineMemory;
use crate::node::{
    ChildList, CommandNode, GroupNode, Linked, Links, ParameterNode, Pending,
};
use crate::path::{encode_path, Components};
use crate::value::{ParamValue, ParameterSpec};
use crate::view::ViewContext;

/// Deepest group nesting accepted; the root is level 0
pub const MAX_GROUP_DEPTH: usize = 32;

/// Shared shape of parameters and commands
trait Leaf: Linked {
    fn group(&self) -> Key;
    fn pending(&self) -> Pending;
    fn pending_mut(&mut self) -> &mut Pending;
    fn context_mut(&mut self) -> &mut Option<ViewContext>;
    /// The list in `group` this kind of leaf is threaded on
    fn siblings(group: &mut GroupNode) -> &mut ChildList;
}

impl Leaf for ParameterNode {
    fn group(&self) -> Key {
        self.group
    }

    fn pending(&self) -> Pending {
        self.pending
    }

    fn pending_mut(&mut self) -> &mut Pending {
        &mut self.pending
    }

    fn context_mut(&mut self) -> &mut Option<ViewContext> {
        &mut self.context
    }

    fn siblings(group: &mut GroupNode) -> &mut ChildList {
        &mut group.parameters
    }
}

impl Leaf for CommandNode {
    fn group(&self) -> Key {
        self.group
    }

    fn pending(&self) -> Pending {
        self.pending
    }

    fn pending_mut(&mut self) -> &mut Pending {
        &mut self.pending
    }

    fn context_mut(&mut self) -> &mut Option<ViewContext> {
        &mut self.context
    }

    fn siblings(group: &mut GroupNode) -> &mut ChildList {
        &mut group.commands
    }
}

/// Add `delta` to the pending count of `start` and every group above it
fn adjust_ancestors(groups: &mut Arena<GroupNode>, start: Option<Key>, delta: i32) {
    if delta == 0 {
        return;
    }
    let mut cursor = start;
    while let Some(key) = cursor {
        let Some(group) = groups.get_mut(key) else {
            break;
        };
        group.pending_descendants = group.pending_descendants.saturating_add_signed(delta);
        cursor = group.parent;
    }
}

fn link_leaf<T: Leaf>(
    groups: &mut Arena<GroupNode>,
    leaves: &mut Arena<T>,
    pool: &TypedPool<T>,
    capability: Capability,
    node: T,
) -> EngineResult<Key> {
    let group = node.group();
    let key = leaves.insert(pool, capability, node)?;
    if let Some(parent) = groups.get_mut(group) {
        T::siblings(parent).push_back(leaves, key);
    }
    adjust_ancestors(groups, Some(group), Pending::Appear.weight());
    Ok(key)
}

fn free_leaf<T: Leaf>(groups: &mut Arena<GroupNode>, leaves: &mut Arena<T>, key: Key) -> bool {
    let Some((group, weight)) = leaves
        .get(key)
        .map(|leaf| (leaf.group(), leaf.pending().weight()))
    else {
        return false;
    };
    if let Some(parent) = groups.get_mut(group) {
        T::siblings(parent).unlink(leaves, key);
    }
    drop(leaves.remove(key));
    adjust_ancestors(groups, Some(group), -weight);
    true
}

fn set_leaf_pending<T: Leaf>(
    groups: &mut Arena<GroupNode>,
    leaves: &mut Arena<T>,
    key: Key,
    pending: Pending,
) {
    let Some(leaf) = leaves.get_mut(key) else {
        return;
    };
    let delta = pending.weight() - leaf.pending().weight();
    *leaf.pending_mut() = pending;
    let group = leaf.group();
    adjust_ancestors(groups, Some(group), delta);
}

/// Removal rule shared by parameters and commands
fn retire_leaf<T: Leaf>(
    groups: &mut Arena<GroupNode>,
    leaves: &mut Arena<T>,
    key: Key,
) -> EngineResult<()> {
    match leaves.get(key).map(|leaf| leaf.pending()) {
        // never announced: nobody can hold its context
        Some(Pending::Appear) => {
            free_leaf(groups, leaves, key);
            Ok(())
        }
        Some(Pending::Nothing) => {
            set_leaf_pending(groups, leaves, key, Pending::Disappear);
            Ok(())
        }
        Some(Pending::Disappear) => Err(EngineError::AlreadyDisappearing),
        None => Err(EngineError::ProtocolViolation("leaf vanished during removal")),
    }
}

fn mark_leaf<T: Leaf>(
    groups: &mut Arena<GroupNode>,
    leaves: &mut Arena<T>,
    key: Key,
    pending: Pending,
    context: Option<ViewContext>,
) {
    set_leaf_pending(groups, leaves, key, pending);
    if let Some(leaf) = leaves.get_mut(key) {
        *leaf.context_mut() = context;
    }
}

/// The producer-owned tree plus its pending bookkeeping
pub(crate) struct Tree {
    groups: Arena<GroupNode>,
    parameters: Arena<ParameterNode>,
    commands: Arena<CommandNode>,
    root: Key,
    max_name_len: usize,
}

impl Tree {
    /// Build an empty tree holding only the root group; blocks
    pub(crate) fn new(
        memory: &EngineMemory,
        config: &EngineConfig,
        root_name: &str,
        root_hints: &[HintPair<'_>],
    ) -> EngineResult<Self> {
        let mut tree = Self {
            groups: Arena::with_capacity("groups", config.groups.max_preallocated),
            parameters: Arena::with_capacity("parameters", config.parameters.max_preallocated),
            commands: Arena::with_capacity("commands", config.commands.max_preallocated),
            root: Key::DANGLING,
            max_name_len: config.max_name_len,
        };
        tree.check_name(root_name)?;
        let (name, hints) = tree.copy_label(memory, Capability::Sleepy, root_name, root_hints)?;
        tree.root = tree.groups.insert(
            &memory.groups,
            Capability::Sleepy,
            GroupNode {
                name,
                parent: None,
                depth: 0,
                links: Links::default(),
                groups: ChildList::default(),
                parameters: ChildList::default(),
                commands: ChildList::default(),
                hints,
                pending: Pending::Appear,
                pending_descendants: 0,
                context: None,
            },
        )?;
        Ok(tree)
    }

    pub(crate) fn root(&self) -> Key {
        self.root
    }

    pub(crate) fn group(&self, key: Key) -> Option<&GroupNode> {
        self.groups.get(key)
    }

    pub(crate) fn parameter(&self, key: Key) -> Option<&ParameterNode> {
        self.parameters.get(key)
    }

    pub(crate) fn parameter_mut(&mut self, key: Key) -> Option<&mut ParameterNode> {
        self.parameters.get_mut(key)
    }

    pub(crate) fn command(&self, key: Key) -> Option<&CommandNode> {
        self.commands.get(key)
    }

    /// Live nodes of each kind, root included
    pub(crate) fn node_counts(&self) -> (usize, usize, usize) {
        (self.groups.len(), self.parameters.len(), self.commands.len())
    }

    /// Grow the node tables so the producer can add `min_preallocated`
    /// more nodes of each kind; control thread, blocks
    pub(crate) fn reserve_headroom(&mut self, config: &EngineConfig) -> bool {
        let groups = self.groups.reserve_headroom(config.groups.min_preallocated);
        let parameters = self
            .parameters
            .reserve_headroom(config.parameters.min_preallocated);
        let commands = self.commands.reserve_headroom(config.commands.min_preallocated);
        groups || parameters || commands
    }

    // ---- producer-side mutation ----

    pub(crate) fn add_group(
        &mut self,
        memory: &EngineMemory,
        capability: Capability,
        parent: Key,
        name: &str,
        hints: &[HintPair<'_>],
    ) -> EngineResult<Key> {
        let depth = self.live_parent(parent)?.depth + 1;
        if depth >= MAX_GROUP_DEPTH {
            return Err(EngineError::TreeTooDeep {
                max: MAX_GROUP_DEPTH,
            });
        }
        self.check_name(name)?;
        if self.find_group_by(parent, |existing| existing == name).is_some() {
            return Err(EngineError::DuplicateName { kind: "group" });
        }

        let (name, hints) = self.copy_label(memory, capability, name, hints)?;
        let key = self.groups.insert(
            &memory.groups,
            capability,
            GroupNode {
                name,
                parent: Some(parent),
                depth,
                links: Links::default(),
                groups: ChildList::default(),
                parameters: ChildList::default(),
                commands: ChildList::default(),
                hints,
                pending: Pending::Appear,
                pending_descendants: 0,
                context: None,
            },
        )?;
        // Rust pattern: the list lives inside the same arena it links, so
        // copy it out, relink, and write it back
        if let Some(mut list) = self.groups.get(parent).map(|group| group.groups) {
            list.push_back(&mut self.groups, key);
            if let Some(group) = self.groups.get_mut(parent) {
                group.groups = list;
            }
        }
        adjust_ancestors(&mut self.groups, Some(parent), Pending::Appear.weight());
        Ok(key)
    }

    /// Add a parameter; `Ok(None)` when the kind is not mirrored
    pub(crate) fn add_parameter(
        &mut self,
        memory: &EngineMemory,
        capability: Capability,
        group: Key,
        name: &str,
        hints: &[HintPair<'_>],
        spec: &ParameterSpec<'_>,
    ) -> EngineResult<Option<Key>> {
        self.live_parent(group)?;
        self.check_name(name)?;
        if self.find_parameter_by(group, |existing| existing == name).is_some() {
            return Err(EngineError::DuplicateName { kind: "parameter" });
        }
        let Some(value) = ParamValue::from_spec(&memory.blocks, capability, spec)? else {
            return Ok(None);
        };

        let (name, hints) = self.copy_label(memory, capability, name, hints)?;
        let node = ParameterNode {
            name,
            group,
            links: Links::default(),
            hints,
            value,
            tag: 0,
            pending: Pending::Appear,
            context: None,
        };
        link_leaf(
            &mut self.groups,
            &mut self.parameters,
            &memory.parameters,
            capability,
            node,
        )
        .map(Some)
    }

    pub(crate) fn add_command(
        &mut self,
        memory: &EngineMemory,
        capability: Capability,
        group: Key,
        name: &str,
        hints: &[HintPair<'_>],
    ) -> EngineResult<Key> {
        self.live_parent(group)?;
        self.check_name(name)?;
        if self.find_command_by(group, |existing| existing == name).is_some() {
            return Err(EngineError::DuplicateName { kind: "command" });
        }

        let (name, hints) = self.copy_label(memory, capability, name, hints)?;
        let node = CommandNode {
            name,
            group,
            links: Links::default(),
            hints,
            pending: Pending::Appear,
            context: None,
        };
        link_leaf(
            &mut self.groups,
            &mut self.commands,
            &memory.commands,
            capability,
            node,
        )
    }

    pub(crate) fn remove_parameter(&mut self, key: Key) -> EngineResult<()> {
        if !self.parameters.contains(key) {
            return Err(EngineError::UnknownParameter);
        }
        retire_leaf(&mut self.groups, &mut self.parameters, key)
    }

    pub(crate) fn remove_command(&mut self, key: Key) -> EngineResult<()> {
        if !self.commands.contains(key) {
            return Err(EngineError::UnknownCommand);
        }
        retire_leaf(&mut self.groups, &mut self.commands, key)
    }

    /// Remove a group and its whole subtree
    ///
    /// Unannounced nodes are freed on the spot; announced ones are marked
    /// `Disappear` and freed by the next diff walk.
    pub(crate) fn remove_group(&mut self, key: Key) -> EngineResult<()> {
        if key == self.root {
            return Err(EngineError::ProtocolViolation("root group cannot be removed"));
        }
        match self.groups.get(key).map(|group| group.pending) {
            None => Err(EngineError::UnknownGroup),
            Some(Pending::Disappear) => Err(EngineError::AlreadyDisappearing),
            Some(_) => {
                self.retire_group(key);
                Ok(())
            }
        }
    }

    fn retire_group(&mut self, key: Key) {
        let Some(group) = self.groups.get(key) else {
            return;
        };
        if group.pending == Pending::Appear {
            // an unannounced group only has unannounced descendants
            self.free_group(key);
            return;
        }

        let (mut groups, mut parameters, mut commands) = (
            group.groups.head,
            group.parameters.head,
            group.commands.head,
        );
        while let Some(child) = groups {
            let Some(node) = self.groups.get(child) else {
                break;
            };
            groups = node.links.next;
            if node.pending != Pending::Disappear {
                self.retire_group(child);
            }
        }
        while let Some(child) = parameters {
            let Some(node) = self.parameters.get(child) else {
                break;
            };
            parameters = node.links.next;
            if node.pending != Pending::Disappear {
                let _ = retire_leaf(&mut self.groups, &mut self.parameters, child);
            }
        }
        while let Some(child) = commands {
            let Some(node) = self.commands.get(child) else {
                break;
            };
            commands = node.links.next;
            if node.pending != Pending::Disappear {
                let _ = retire_leaf(&mut self.groups, &mut self.commands, child);
            }
        }
        self.set_group_pending(key, Pending::Disappear);
    }

    // ---- transitions driven by the diff walk ----

    pub(crate) fn mark_group_shown(&mut self, key: Key, context: ViewContext) {
        self.set_group_pending(key, Pending::Nothing);
        if let Some(group) = self.groups.get_mut(key) {
            group.context = Some(context);
        }
    }

    /// Forget the view's shadow; the group will be announced again
    pub(crate) fn mark_group_hidden(&mut self, key: Key) {
        self.set_group_pending(key, Pending::Appear);
        if let Some(group) = self.groups.get_mut(key) {
            group.context = None;
        }
    }

    pub(crate) fn mark_parameter_shown(&mut self, key: Key, context: ViewContext) {
        mark_leaf(
            &mut self.groups,
            &mut self.parameters,
            key,
            Pending::Nothing,
            Some(context),
        );
    }

    pub(crate) fn mark_parameter_hidden(&mut self, key: Key) {
        mark_leaf(&mut self.groups, &mut self.parameters, key, Pending::Appear, None);
    }

    pub(crate) fn mark_command_shown(&mut self, key: Key, context: ViewContext) {
        mark_leaf(
            &mut self.groups,
            &mut self.commands,
            key,
            Pending::Nothing,
            Some(context),
        );
    }

    pub(crate) fn mark_command_hidden(&mut self, key: Key) {
        mark_leaf(&mut self.groups, &mut self.commands, key, Pending::Appear, None);
    }

    pub(crate) fn free_parameter(&mut self, key: Key) -> bool {
        free_leaf(&mut self.groups, &mut self.parameters, key)
    }

    pub(crate) fn free_command(&mut self, key: Key) -> bool {
        free_leaf(&mut self.groups, &mut self.commands, key)
    }

    /// Free a group, everything still below it, and unlink it from its parent
    pub(crate) fn free_group(&mut self, key: Key) {
        let Some(group) = self.groups.get(key) else {
            return;
        };
        let (mut groups, mut parameters, mut commands) = (
            group.groups.head,
            group.parameters.head,
            group.commands.head,
        );
        while let Some(child) = groups {
            groups = self.groups.get(child).and_then(|node| node.links.next);
            self.free_group(child);
        }
        while let Some(child) = parameters {
            parameters = self.parameters.get(child).and_then(|node| node.links.next);
            self.free_parameter(child);
        }
        while let Some(child) = commands {
            commands = self.commands.get(child).and_then(|node| node.links.next);
            self.free_command(child);
        }

        let Some((parent, weight)) = self
            .groups
            .get(key)
            .map(|group| (group.parent, group.pending.weight()))
        else {
            return;
        };
        if let Some(parent) = parent {
            if let Some(mut list) = self.groups.get(parent).map(|group| group.groups) {
                list.unlink(&mut self.groups, key);
                if let Some(group) = self.groups.get_mut(parent) {
                    group.groups = list;
                }
            }
        }
        drop(self.groups.remove(key));
        adjust_ancestors(&mut self.groups, parent, -weight);
    }

    /// Free every node, root included
    pub(crate) fn clear(&mut self) {
        self.commands.clear();
        self.parameters.clear();
        self.groups.clear();
        self.root = Key::DANGLING;
    }

    // ---- lookup ----

    /// First live child group of `parent` whose name satisfies `matches`
    pub(crate) fn find_group_by<F>(&self, parent: Key, mut matches: F) -> Option<Key>
    where
        F: FnMut(&str) -> bool,
    {
        let mut cursor = self.groups.get(parent)?.groups.head;
        while let Some(key) = cursor {
            let node = self.groups.get(key)?;
            if node.pending != Pending::Disappear && matches(node.name.as_str()) {
                return Some(key);
            }
            cursor = node.links.next;
        }
        None
    }

    pub(crate) fn find_parameter_by<F>(&self, group: Key, mut matches: F) -> Option<Key>
    where
        F: FnMut(&str) -> bool,
    {
        let mut cursor = self.groups.get(group)?.parameters.head;
        while let Some(key) = cursor {
            let node = self.parameters.get(key)?;
            if node.pending != Pending::Disappear && matches(node.name.as_str()) {
                return Some(key);
            }
            cursor = node.links.next;
        }
        None
    }

    pub(crate) fn find_command_by<F>(&self, group: Key, mut matches: F) -> Option<Key>
    where
        F: FnMut(&str) -> bool,
    {
        let mut cursor = self.groups.get(group)?.commands.head;
        while let Some(key) = cursor {
            let node = self.commands.get(key)?;
            if node.pending != Pending::Disappear && matches(node.name.as_str()) {
                return Some(key);
            }
            cursor = node.links.next;
        }
        None
    }

    /// Live parameter named by an encoded path, root name first
    ///
    /// # Real-time Safety
    ///
    /// Compares escaped components in place; never allocates.
    pub(crate) fn resolve_path(&self, path: &str) -> Option<Key> {
        let mut components = Components::new(path).peekable();
        let root = self.groups.get(self.root)?;
        if !components.next()?.matches(&root.name) {
            return None;
        }
        let mut group = self.root;
        while let Some(component) = components.next() {
            if components.peek().is_none() {
                return self.find_parameter_by(group, |name| component.matches(name));
            }
            group = self.find_group_by(group, |name| component.matches(name))?;
        }
        None
    }

    /// Whether `path` names parameter `key` through its full ancestor chain
    ///
    /// # Real-time Safety
    ///
    /// The ancestor chain is gathered into a fixed array on the stack.
    pub(crate) fn parameter_matches_path(&self, key: Key, path: &str) -> bool {
        let Some(parameter) = self.parameters.get(key) else {
            return false;
        };
        let mut chain = [Key::DANGLING; MAX_GROUP_DEPTH];
        let mut len = 0;
        let mut cursor = Some(parameter.group);
        while let Some(group) = cursor {
            if len == MAX_GROUP_DEPTH {
                return false;
            }
            let Some(node) = self.groups.get(group) else {
                return false;
            };
            chain[len] = group;
            len += 1;
            cursor = node.parent;
        }

        let mut components = Components::new(path);
        for group in chain[..len].iter().rev() {
            let Some(node) = self.groups.get(*group) else {
                return false;
            };
            match components.next() {
                Some(component) if component.matches(&node.name) => {}
                _ => return false,
            }
        }
        matches!(components.next(), Some(component) if component.matches(&parameter.name))
            && components.next().is_none()
    }

    /// Encoded path of a parameter; control thread only
    pub(crate) fn parameter_path(&self, key: Key) -> Option<String> {
        let parameter = self.parameters.get(key)?;
        let mut names = vec![parameter.name.as_str()];
        let mut cursor = Some(parameter.group);
        while let Some(group) = cursor {
            let node = self.groups.get(group)?;
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        Some(encode_path(names.into_iter().rev()))
    }

    // ---- consistency ----

    /// Walk the whole tree and verify its bookkeeping; control thread only
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        let root = self
            .groups
            .get(self.root)
            .ok_or_else(|| "root group missing".to_string())?;
        if root.parent.is_some() {
            return Err("root group has a parent".to_string());
        }
        let mut reached = (0, 0, 0);
        self.check_group(self.root, &mut reached)?;
        if reached != self.node_counts() {
            return Err(format!(
                "reachable nodes {:?} differ from live nodes {:?}",
                reached,
                self.node_counts()
            ));
        }
        Ok(())
    }

    /// Returns the number of pending descendants found below `key`
    fn check_group(&self, key: Key, reached: &mut (usize, usize, usize)) -> Result<u32, String> {
        let group = self
            .groups
            .get(key)
            .ok_or_else(|| "dangling group link".to_string())?;
        reached.0 += 1;
        check_context(&group.name, group.pending, group.context)?;

        let mut pending = 0u32;
        let mut names = HashSet::new();
        let mut count = 0;
        let mut cursor = group.groups.head;
        while let Some(child_key) = cursor {
            let child = self
                .groups
                .get(child_key)
                .ok_or_else(|| format!("dangling child group in '{}'", group.name))?;
            if child.parent != Some(key) || child.depth != group.depth + 1 {
                return Err(format!("group '{}' has a wrong parent link", child.name));
            }
            check_child(group, &child.name, child.pending, &mut names)?;
            pending += child.pending.weight() as u32 + self.check_group(child_key, reached)?;
            count += 1;
            cursor = child.links.next;
        }
        check_len(&group.name, "groups", count, group.groups.len)?;

        names.clear();
        count = 0;
        cursor = group.parameters.head;
        while let Some(child_key) = cursor {
            let child = self
                .parameters
                .get(child_key)
                .ok_or_else(|| format!("dangling parameter in '{}'", group.name))?;
            if child.group != key {
                return Err(format!("parameter '{}' has a wrong group link", child.name));
            }
            check_child(group, &child.name, child.pending, &mut names)?;
            check_context(&child.name, child.pending, child.context)?;
            pending += child.pending.weight() as u32;
            reached.1 += 1;
            count += 1;
            cursor = child.links.next;
        }
        check_len(&group.name, "parameters", count, group.parameters.len)?;

        names.clear();
        count = 0;
        cursor = group.commands.head;
        while let Some(child_key) = cursor {
            let child = self
                .commands
                .get(child_key)
                .ok_or_else(|| format!("dangling command in '{}'", group.name))?;
            if child.group != key {
                return Err(format!("command '{}' has a wrong group link", child.name));
            }
            check_child(group, &child.name, child.pending, &mut names)?;
            check_context(&child.name, child.pending, child.context)?;
            pending += child.pending.weight() as u32;
            reached.2 += 1;
            count += 1;
            cursor = child.links.next;
        }
        check_len(&group.name, "commands", count, group.commands.len)?;

        if pending != group.pending_descendants {
            return Err(format!(
                "group '{}' counts {} pending descendants, found {}",
                group.name, group.pending_descendants, pending
            ));
        }
        Ok(pending)
    }

    // ---- helpers ----

    fn live_parent(&self, key: Key) -> EngineResult<&GroupNode> {
        let group = self.groups.get(key).ok_or(EngineError::UnknownGroup)?;
        if group.pending == Pending::Disappear {
            return Err(EngineError::ProtocolViolation("group is disappearing"));
        }
        Ok(group)
    }

    fn check_name(&self, name: &str) -> EngineResult<()> {
        if name.len() > self.max_name_len {
            return Err(EngineError::NameTooLong {
                len: name.len(),
                max: self.max_name_len,
            });
        }
        Ok(())
    }

    fn copy_label(
        &self,
        memory: &EngineMemory,
        capability: Capability,
        name: &str,
        hints: &[HintPair<'_>],
    ) -> EngineResult<(RtString, HintSet)> {
        let name = RtString::from_str_with(&memory.blocks, capability, name)
            .map_err(|_| EngineError::OutOfMemory { what: "names" })?;
        let hints = HintSet::copy_from(&memory.blocks, capability, hints)
            .map_err(|_| EngineError::OutOfMemory { what: "hints" })?;
        Ok((name, hints))
    }

    fn set_group_pending(&mut self, key: Key, pending: Pending) {
        let Some(group) = self.groups.get_mut(key) else {
            return;
        };
        let delta = pending.weight() - group.pending.weight();
        group.pending = pending;
        let parent = group.parent;
        adjust_ancestors(&mut self.groups, parent, delta);
    }
}

fn check_context(name: &str, pending: Pending, context: Option<ViewContext>) -> Result<(), String> {
    let known = context.is_some();
    if known == (pending == Pending::Appear) {
        return Err(format!(
            "node '{}' is {:?} but the view context is {}",
            name,
            pending,
            if known { "set" } else { "missing" }
        ));
    }
    Ok(())
}

fn check_child<'a>(
    group: &GroupNode,
    name: &'a str,
    pending: Pending,
    names: &mut HashSet<&'a str>,
) -> Result<(), String> {
    if pending == Pending::Nothing && group.pending != Pending::Nothing {
        return Err(format!(
            "'{}' is visible but its group '{}' is {:?}",
            name, group.name, group.pending
        ));
    }
    if pending != Pending::Disappear && !names.insert(name) {
        return Err(format!("duplicate name '{}' in '{}'", name, group.name));
    }
    Ok(())
}

fn check_len(name: &str, what: &str, counted: usize, recorded: usize) -> Result<(), String> {
    if counted != recorded {
        return Err(format!(
            "group '{}' records {} {}, list holds {}",
            name, recorded, what, counted
        ));
    }
    Ok(())
}
