//! Engine Instance
//!
//! One instance mirrors one value owner's parameter tree. The tree, both
//! queues and the pending-value list sit behind a single [`HandoffLock`]:
//!
//! - the producer thread enters with `producer_run` / `try_producer` and
//!   gives up immediately when the control thread is inside
//! - the control thread enters with `control_run`, the `set_*` requests and
//!   the view attach/detach calls, and waits if the producer is inside
//!
//! Pools live next to the lock, not inside it, so the control thread can top
//! them up while the producer works.

use std::collections::VecDeque;

use dynparam_rtmem::{Capability, MaintenanceSummary, PoolBox, RtString};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::arena::Key;
use crate::config::EngineConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{EngineError, EngineResult};
use crate::handoff::HandoffLock;
use crate::hints::HintPair;
use crate::memory::{EngineMemory, PoolUsage};
use crate::message::{MessageQueue, ToControl, ToProducer};
use crate::node::{CommandId, GroupId, ParameterId, Pending};
use crate::owner::ValueOwner;
use crate::path::encode_path;
use crate::pending::PendingValues;
use crate::sync::{self, WalkStats};
use crate::tree::Tree;
use crate::value::{ParameterSpec, Value};
use crate::view::ControlView;

/// Everything guarded by the handoff lock
pub(crate) struct EngineState {
    tree: Tree,
    to_producer: MessageQueue<ToProducer>,
    to_control: MessageQueue<ToControl>,
    pending: PendingValues,
    /// Parameters that adopted a pending value; the owner hears about them
    /// on the next `producer_run`
    resolved: VecDeque<Key>,
    diagnostics: Diagnostics,
    view_attached: bool,
    detached: bool,
}

/// Outcome of one `control_run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlReport {
    /// Appear/disappear callbacks fired
    pub walk: WalkStats,
    /// Producer value changes forwarded to the view
    pub value_changes: usize,
    /// Producer-side counters collected since the previous run
    pub diagnostics: Diagnostics,
    /// Pool maintenance done after the lock was released
    pub maintenance: MaintenanceSummary,
}

/// A live parameter tree shared by one producer and one control thread
pub struct Instance {
    // declared first so nodes go back to their pools before `memory` drops
    state: HandoffLock<EngineState>,
    view: Mutex<Option<Box<dyn ControlView>>>,
    memory: EngineMemory,
    root: GroupId,
    name: String,
    config: EngineConfig,
}

impl Instance {
    /// Build the instance and let `owner` populate the initial tree
    ///
    /// Blocks: every pool is preallocated here. Any failure unwinds what was
    /// already built.
    pub fn attach<O>(owner: &mut O, config: EngineConfig) -> EngineResult<Self>
    where
        O: ValueOwner + ?Sized,
    {
        config.validate().map_err(EngineError::ConfigError)?;
        let memory = EngineMemory::new(&config)?;

        let name = owner.root_name().to_string();
        let root_hints = owner.root_hints();
        let pairs: Vec<HintPair<'_>> = root_hints
            .iter()
            .map(|(hint, value)| (hint.as_str(), value.as_deref()))
            .collect();
        let tree = Tree::new(&memory, &config, &name, &pairs)?;
        let root = GroupId(tree.root());

        let state = EngineState {
            tree,
            to_producer: MessageQueue::new(config.queue_capacity),
            to_control: MessageQueue::new(config.queue_capacity),
            pending: PendingValues::new(config.pending_value_limit),
            resolved: VecDeque::with_capacity(config.pending_value_limit),
            diagnostics: Diagnostics::default(),
            view_attached: false,
            detached: false,
        };
        let instance = Self {
            state: HandoffLock::new(state),
            view: Mutex::new(None),
            memory,
            root,
            name,
            config,
        };

        instance.with_producer_blocking(|session| owner.populate(session))??;

        let usage = instance.pool_usage();
        info!(
            "Attached '{}' ({} groups, {} parameters, {} commands)",
            instance.name, usage.groups, usage.parameters, usage.commands
        );
        Ok(instance)
    }

    pub fn root(&self) -> GroupId {
        self.root
    }

    /// Name of the root group
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- producer thread ----

    /// Real-time entry point: drain control requests into the tree
    ///
    /// Returns the number of messages drained; 0 when the control thread
    /// holds the lock, in which case nothing was touched and the call can
    /// simply be repeated next cycle.
    ///
    /// # Real-time Safety
    ///
    /// One CAS to enter. Never blocks, never calls the system allocator.
    pub fn producer_run<O>(&self, owner: &mut O) -> usize
    where
        O: ValueOwner + ?Sized,
    {
        self.try_producer(|session| session.apply_changes(owner))
            .unwrap_or(0)
    }

    /// Edit the tree from the real-time thread; `None` if the lock is busy
    ///
    /// # Real-time Safety
    ///
    /// The session only uses fail-fast allocation.
    pub fn try_producer<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut ProducerSession<'_>) -> R,
    {
        let mut guard = self.state.try_lock_producer()?;
        if guard.detached {
            return None;
        }
        let mut session = ProducerSession {
            state: &mut *guard,
            memory: &self.memory,
            capability: Capability::Atomic,
        };
        Some(f(&mut session))
    }

    /// Edit the tree from a thread that may block; pools grow on demand
    pub fn with_producer_blocking<R, F>(&self, f: F) -> EngineResult<R>
    where
        F: FnOnce(&mut ProducerSession<'_>) -> R,
    {
        let mut guard = self.state.lock_control();
        if guard.detached {
            return Err(EngineError::Detached);
        }
        let mut session = ProducerSession {
            state: &mut *guard,
            memory: &self.memory,
            capability: Capability::Sleepy,
        };
        Ok(f(&mut session))
    }

    // ---- control thread ----

    /// Control entry point: forward producer changes and sync the view
    pub fn control_run(&self) -> ControlReport {
        let mut report = ControlReport::default();
        {
            let mut view = self.view.lock();
            let mut guard = self.state.lock_control();
            if guard.detached {
                return report;
            }
            let state = &mut *guard;

            while let Some(message) = state.to_control.pop() {
                let ToControl::ValueChanged { parameter, value } = PoolBox::into_inner(message);
                let Some(view) = view.as_mut() else {
                    continue;
                };
                let Some(node) = state.tree.parameter(parameter.0) else {
                    continue;
                };
                if let (Pending::Nothing, Some(context)) = (node.pending, node.context) {
                    view.parameter_value_changed(parameter, context, value);
                    report.value_changes += 1;
                }
            }

            if let Some(view) = view.as_mut() {
                report.walk = sync::show(&mut state.tree, &mut **view);
            }
            report.diagnostics = std::mem::take(&mut state.diagnostics);
        }

        if !report.walk.is_empty() {
            debug!(
                "[{}] View sync: {} appeared, {} disappeared",
                self.name, report.walk.appeared, report.walk.disappeared
            );
        }
        if !report.diagnostics.is_clean() {
            report.diagnostics.log(&self.name);
        }
        report.maintenance = self.maintain();
        report
    }

    /// Start mirroring the tree into `view`; announces the whole tree
    pub fn control_attach_view(&self, view: Box<dyn ControlView>) -> EngineResult<ControlReport> {
        {
            let mut slot = self.view.lock();
            if slot.is_some() {
                return Err(EngineError::ProtocolViolation("a view is already attached"));
            }
            let mut guard = self.state.lock_control();
            if guard.detached {
                return Err(EngineError::Detached);
            }
            guard.view_attached = true;
            *slot = Some(view);
        }
        info!("[{}] Control view attached", self.name);
        Ok(self.control_run())
    }

    /// Stop mirroring; every visible node is withdrawn from the view
    ///
    /// Returns the view so the caller decides when to drop it.
    pub fn control_detach_view(&self) -> Option<Box<dyn ControlView>> {
        let mut slot = self.view.lock();
        let mut view = slot.take()?;
        let (stats, dropped) = {
            let mut guard = self.state.lock_control();
            let state = &mut *guard;
            state.view_attached = false;
            let stats = sync::hide(&mut state.tree, &mut *view);
            (stats, state.to_control.clear())
        };
        info!(
            "[{}] Control view detached ({} nodes withdrawn, {} notifications dropped)",
            self.name, stats.disappeared, dropped
        );
        Some(view)
    }

    pub fn is_view_attached(&self) -> bool {
        self.view.lock().is_some()
    }

    /// Ask the producer to store a value in a known parameter
    ///
    /// The value is checked against the parameter's type and range now and
    /// lands in the tree on the next successful `producer_run`.
    pub fn set_value(&self, parameter: ParameterId, value: Value) -> EngineResult<()> {
        // allocate before locking so the producer is never held up by growth
        let mut message = self
            .memory
            .to_producer
            .ensure_alloc(ToProducer::SetParameter { parameter, value })
            .map_err(|_| EngineError::OutOfMemory { what: "messages" })?;

        let mut guard = self.state.lock_control();
        if guard.detached {
            return Err(EngineError::Detached);
        }
        let node = guard
            .tree
            .parameter(parameter.0)
            .filter(|node| node.pending != Pending::Disappear)
            .ok_or(EngineError::UnknownParameter)?;
        let value = node.value.check(value)?;
        *message = ToProducer::SetParameter { parameter, value };
        guard.to_producer.push(message)
    }

    /// Ask the producer to store a value by name path, root name first
    ///
    /// If no such parameter exists yet the value waits until one is added.
    pub fn set_value_by_path(&self, path: &[&str], value: Value) -> EngineResult<()> {
        self.set_value_by_encoded_path(&encode_path(path.iter().copied()), value)
    }

    /// Like [`Instance::set_value_by_path`] with an already encoded path
    pub fn set_value_by_encoded_path(&self, path: &str, value: Value) -> EngineResult<()> {
        let path = RtString::ensure_from_str(&self.memory.blocks, path)?;
        let message = self
            .memory
            .to_producer
            .ensure_alloc(ToProducer::SetByPath { path, value })
            .map_err(|_| EngineError::OutOfMemory { what: "messages" })?;

        let mut guard = self.state.lock_control();
        if guard.detached {
            return Err(EngineError::Detached);
        }
        guard.to_producer.push(message)
    }

    /// Ask the producer's value owner to run a command
    pub fn execute_command(&self, command: CommandId) -> EngineResult<()> {
        let message = self
            .memory
            .to_producer
            .ensure_alloc(ToProducer::ExecuteCommand { command })
            .map_err(|_| EngineError::OutOfMemory { what: "messages" })?;

        let mut guard = self.state.lock_control();
        if guard.detached {
            return Err(EngineError::Detached);
        }
        guard
            .tree
            .command(command.0)
            .filter(|node| node.pending != Pending::Disappear)
            .ok_or(EngineError::UnknownCommand)?;
        guard.to_producer.push(message)
    }

    /// Visit every live parameter as `(encoded path, formatted value)`
    pub fn enumerate_current<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(&str, &str),
    {
        let guard = self.state.lock_control();
        if guard.detached {
            return 0;
        }
        sync::enumerate(&guard.tree, &mut visit)
    }

    /// Current value of a parameter as the tree holds it
    pub fn value(&self, parameter: ParameterId) -> Option<Value> {
        let guard = self.state.lock_control();
        guard
            .tree
            .parameter(parameter.0)
            .map(|node| node.value.current())
    }

    /// Live parameter named by an encoded path
    pub fn find_parameter(&self, path: &str) -> Option<ParameterId> {
        let guard = self.state.lock_control();
        guard.tree.resolve_path(path).map(ParameterId)
    }

    /// Encoded path of a live parameter
    pub fn parameter_path(&self, parameter: ParameterId) -> Option<String> {
        let guard = self.state.lock_control();
        guard.tree.parameter_path(parameter.0)
    }

    /// By-path values still waiting for their parameter
    pub fn pending_value_count(&self) -> usize {
        self.state.lock_control().pending.len()
    }

    /// Drop every waiting by-path value; returns how many were dropped
    pub fn clear_pending_values(&self) -> usize {
        let dropped = self.state.lock_control().pending.clear();
        if dropped > 0 {
            info!("[{}] Cleared {} pending value(s)", self.name, dropped);
        }
        dropped
    }

    /// Sleepy top-up of every pool and node table; control thread only
    ///
    /// Pools are refilled without the handoff lock. The node tables are only
    /// grown when the lock is free; a busy producer just defers that part to
    /// the next call.
    pub fn maintain(&self) -> MaintenanceSummary {
        let summary = self.memory.maintain();
        if let Some(mut guard) = self.state.try_lock_control() {
            if !guard.detached && guard.tree.reserve_headroom(&self.config) {
                let (groups, parameters, commands) = guard.tree.node_counts();
                debug!(
                    "[{}] Node tables grown ({} groups, {} parameters, {} commands live)",
                    self.name, groups, parameters, commands
                );
            }
        }
        summary
    }

    pub fn pool_usage(&self) -> PoolUsage {
        self.memory.usage()
    }

    /// Verify the tree's bookkeeping; for tests and debugging
    pub fn check_invariants(&self) -> Result<(), String> {
        let guard = self.state.lock_control();
        if guard.detached {
            return Ok(());
        }
        guard.tree.check_invariants()
    }

    /// Withdraw the view, free every node and refuse further work
    pub fn shutdown(&self) {
        let mut slot = self.view.lock();
        let mut guard = self.state.lock_control();
        if guard.detached {
            return;
        }
        let state = &mut *guard;
        if let Some(view) = slot.as_mut() {
            sync::hide(&mut state.tree, &mut **view);
        }
        *slot = None;
        state.view_attached = false;
        let messages = state.to_producer.clear() + state.to_control.clear();
        let pending = state.pending.clear();
        state.resolved.clear();
        state.tree.clear();
        state.detached = true;
        drop(guard);
        drop(slot);
        info!(
            "[{}] Detached ({} queued messages, {} pending values discarded)",
            self.name, messages, pending
        );
    }
}

/// Producer-side access to the tree
///
/// Obtained from [`Instance::try_producer`] (real-time, fail-fast
/// allocation) or [`Instance::with_producer_blocking`] and
/// [`ValueOwner::populate`] (may block).
pub struct ProducerSession<'a> {
    state: &'a mut EngineState,
    memory: &'a EngineMemory,
    capability: Capability,
}

impl ProducerSession<'_> {
    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn root(&self) -> GroupId {
        GroupId(self.state.tree.root())
    }

    pub fn add_group(
        &mut self,
        parent: GroupId,
        name: &str,
        hints: &[HintPair<'_>],
    ) -> EngineResult<GroupId> {
        let result = self
            .state
            .tree
            .add_group(self.memory, self.capability, parent.0, name, hints);
        self.track(result).map(GroupId)
    }

    /// Add a parameter; `Ok(None)` when its kind is not mirrored
    ///
    /// A by-path value that was waiting for this parameter is stored right
    /// away and reported to the owner on the next `producer_run`.
    pub fn add_parameter(
        &mut self,
        group: GroupId,
        name: &str,
        hints: &[HintPair<'_>],
        spec: ParameterSpec<'_>,
    ) -> EngineResult<Option<ParameterId>> {
        let result = self.state.tree.add_parameter(
            self.memory,
            self.capability,
            group.0,
            name,
            hints,
            &spec,
        );
        match self.track(result)? {
            Some(key) => {
                self.adopt_pending_value(key);
                Ok(Some(ParameterId(key)))
            }
            None => {
                self.state.diagnostics.ignored_parameters += 1;
                Ok(None)
            }
        }
    }

    pub fn add_boolean(
        &mut self,
        group: GroupId,
        name: &str,
        value: bool,
    ) -> EngineResult<ParameterId> {
        self.add_mirrored(group, name, ParameterSpec::Boolean { value })
    }

    pub fn add_float(
        &mut self,
        group: GroupId,
        name: &str,
        value: f32,
        min: f32,
        max: f32,
    ) -> EngineResult<ParameterId> {
        self.add_mirrored(group, name, ParameterSpec::Float { value, min, max })
    }

    pub fn add_integer(
        &mut self,
        group: GroupId,
        name: &str,
        value: i32,
        min: i32,
        max: i32,
    ) -> EngineResult<ParameterId> {
        self.add_mirrored(group, name, ParameterSpec::Integer { value, min, max })
    }

    pub fn add_enumeration(
        &mut self,
        group: GroupId,
        name: &str,
        selected: u32,
        values: &[&str],
    ) -> EngineResult<ParameterId> {
        self.add_mirrored(group, name, ParameterSpec::Enumeration { selected, values })
    }

    pub fn add_command(
        &mut self,
        group: GroupId,
        name: &str,
        hints: &[HintPair<'_>],
    ) -> EngineResult<CommandId> {
        let result = self
            .state
            .tree
            .add_command(self.memory, self.capability, group.0, name, hints);
        self.track(result).map(CommandId)
    }

    /// Remove a group with its subtree
    pub fn remove_group(&mut self, group: GroupId) -> EngineResult<()> {
        self.state.tree.remove_group(group.0)
    }

    pub fn remove_parameter(&mut self, parameter: ParameterId) -> EngineResult<()> {
        self.state.tree.remove_parameter(parameter.0)
    }

    pub fn remove_command(&mut self, command: CommandId) -> EngineResult<()> {
        self.state.tree.remove_command(command.0)
    }

    /// Attach the owner's own reference, handed back in `parameter_changed`
    pub fn set_parameter_tag(&mut self, parameter: ParameterId, tag: u64) -> EngineResult<()> {
        let node = self
            .state
            .tree
            .parameter_mut(parameter.0)
            .ok_or(EngineError::UnknownParameter)?;
        node.tag = tag;
        Ok(())
    }

    /// Store a value decided by the producer and tell the control side
    ///
    /// Returns the value actually stored after range clamping. A lost
    /// notification is counted, not reported as an error: the tree is
    /// already up to date.
    pub fn set_value(&mut self, parameter: ParameterId, value: Value) -> EngineResult<Value> {
        let node = self
            .state
            .tree
            .parameter_mut(parameter.0)
            .filter(|node| node.pending != Pending::Disappear)
            .ok_or(EngineError::UnknownParameter)?;
        let stored = node.value.set(value)?;
        self.notify_control(parameter.0, stored);
        Ok(stored)
    }

    pub fn value(&self, parameter: ParameterId) -> Option<Value> {
        self.state
            .tree
            .parameter(parameter.0)
            .map(|node| node.value.current())
    }

    pub fn pending_value_count(&self) -> usize {
        self.state.pending.len()
    }

    /// Drain the control-to-producer queue into the tree and `owner`
    pub(crate) fn apply_changes<O>(&mut self, owner: &mut O) -> usize
    where
        O: ValueOwner + ?Sized,
    {
        while let Some(key) = self.state.resolved.pop_front() {
            if let Some(node) = self.state.tree.parameter(key) {
                owner.parameter_changed(ParameterId(key), node.tag, node.value.current());
            }
        }

        let mut drained = 0;
        while let Some(message) = self.state.to_producer.pop() {
            drained += 1;
            match PoolBox::into_inner(message) {
                ToProducer::SetParameter { parameter, value } => {
                    self.apply_value(owner, parameter.0, value, false);
                }
                ToProducer::SetByPath { path, value } => {
                    match self.state.tree.resolve_path(&path) {
                        Some(key) => self.apply_value(owner, key, value, true),
                        None => {
                            if self.state.pending.park(path, value).is_some() {
                                self.state.diagnostics.evicted_pending_values += 1;
                            }
                        }
                    }
                }
                ToProducer::ExecuteCommand { command } => {
                    let live = self
                        .state
                        .tree
                        .command(command.0)
                        .map_or(false, |node| node.pending != Pending::Disappear);
                    if live {
                        owner.command_executed(command);
                    } else {
                        self.state.diagnostics.stale_messages += 1;
                    }
                }
            }
        }
        drained
    }

    fn apply_value<O>(&mut self, owner: &mut O, key: Key, value: Value, echo: bool)
    where
        O: ValueOwner + ?Sized,
    {
        let Some(node) = self
            .state
            .tree
            .parameter_mut(key)
            .filter(|node| node.pending != Pending::Disappear)
        else {
            self.state.diagnostics.stale_messages += 1;
            return;
        };
        match node.value.set(value) {
            Ok(stored) => {
                let tag = node.tag;
                owner.parameter_changed(ParameterId(key), tag, stored);
                if echo {
                    self.notify_control(key, stored);
                }
            }
            Err(_) => self.state.diagnostics.rejected_values += 1,
        }
    }

    fn notify_control(&mut self, key: Key, value: Value) {
        if !self.state.view_attached {
            return;
        }
        let message = ToControl::ValueChanged {
            parameter: ParameterId(key),
            value,
        };
        if self
            .state
            .to_control
            .post(&self.memory.to_control, self.capability, message)
            .is_err()
        {
            self.state.diagnostics.dropped_notifications += 1;
        }
    }

    fn adopt_pending_value(&mut self, key: Key) {
        if self.state.pending.is_empty() {
            return;
        }
        let tree = &self.state.tree;
        let Some(value) = self
            .state
            .pending
            .take_matching(|path| tree.parameter_matches_path(key, path))
        else {
            return;
        };
        let stored = self
            .state
            .tree
            .parameter_mut(key)
            .map(|node| node.value.set(value));
        match stored {
            Some(Ok(_)) => {
                if self.state.resolved.len() < self.state.resolved.capacity() {
                    self.state.resolved.push_back(key);
                } else {
                    self.state.diagnostics.dropped_notifications += 1;
                }
            }
            _ => self.state.diagnostics.rejected_values += 1,
        }
    }

    fn add_mirrored(
        &mut self,
        group: GroupId,
        name: &str,
        spec: ParameterSpec<'_>,
    ) -> EngineResult<ParameterId> {
        self.add_parameter(group, name, &[], spec)?
            .ok_or(EngineError::ProtocolViolation("parameter kind is not mirrored"))
    }

    fn track<T>(&mut self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(EngineError::OutOfMemory { .. } | EngineError::ArenaFull { .. }) = result {
            self.state.diagnostics.deferred_allocations += 1;
        }
        result
    }
}
