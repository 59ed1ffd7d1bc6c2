//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;

use dynparam_core::{
    CommandId, ControlView, EngineConfig, EngineResult, GroupId, HintSet, MemoryConfig,
    ParamValue, ParameterId, PoolLimits, ProducerSession, Value, ValueOwner, ViewContext,
};
use parking_lot::Mutex;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Small pools so tests exercise exhaustion quickly
pub fn test_config() -> EngineConfig {
    EngineConfig {
        memory: MemoryConfig {
            base_chunk_size: 64,
            max_size: 512,
            min_preallocated: 32,
            max_preallocated: 128,
        },
        groups: PoolLimits::new(16, 64),
        parameters: PoolLimits::new(32, 128),
        commands: PoolLimits::new(4, 16),
        messages: PoolLimits::new(32, 128),
        queue_capacity: 64,
        pending_value_limit: 16,
        max_name_len: 128,
    }
}

/// One callback as seen by the view
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    GroupAppeared {
        name: String,
        parent: Option<ViewContext>,
        context: ViewContext,
        hints: Vec<(String, Option<String>)>,
    },
    GroupDisappeared {
        context: ViewContext,
    },
    ParameterAppeared {
        name: String,
        group: ViewContext,
        context: ViewContext,
        value: Value,
        hints: Vec<(String, Option<String>)>,
    },
    ParameterDisappeared {
        context: ViewContext,
    },
    ValueChanged {
        context: ViewContext,
        value: Value,
    },
    CommandAppeared {
        name: String,
        context: ViewContext,
    },
    CommandDisappeared {
        context: ViewContext,
    },
}

/// View that appends every callback to a shared log
pub struct RecordingView {
    events: Arc<Mutex<Vec<ViewEvent>>>,
    /// Names behind each context handed out, for readable assertions
    names: Arc<Mutex<Vec<String>>>,
    /// Address of the first hint name of every announced node
    pub hint_addresses: Arc<Mutex<Vec<usize>>>,
}

impl RecordingView {
    pub fn new() -> (Self, Arc<Mutex<Vec<ViewEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let view = Self {
            events: Arc::clone(&events),
            names: Arc::new(Mutex::new(Vec::new())),
            hint_addresses: Arc::new(Mutex::new(Vec::new())),
        };
        (view, events)
    }

    fn context_for(&self, name: &str) -> ViewContext {
        let mut names = self.names.lock();
        names.push(name.to_string());
        ViewContext(names.len() as u64)
    }

    fn note_hints(&self, hints: &HintSet) {
        if let Some(hint) = hints.iter().next() {
            self.hint_addresses.lock().push(hint.name().as_ptr() as usize);
        }
    }
}

impl ControlView for RecordingView {
    fn group_appeared(
        &mut self,
        _group: GroupId,
        parent: Option<ViewContext>,
        name: &str,
        hints: &HintSet,
    ) -> ViewContext {
        let context = self.context_for(name);
        self.note_hints(hints);
        self.events.lock().push(ViewEvent::GroupAppeared {
            name: name.to_string(),
            parent,
            context,
            hints: hints.to_vec(),
        });
        context
    }

    fn group_disappeared(&mut self, _group: GroupId, context: ViewContext) {
        self.events.lock().push(ViewEvent::GroupDisappeared { context });
    }

    fn parameter_appeared(
        &mut self,
        _parameter: ParameterId,
        group: ViewContext,
        name: &str,
        hints: &HintSet,
        value: &ParamValue,
    ) -> ViewContext {
        let context = self.context_for(name);
        self.note_hints(hints);
        self.events.lock().push(ViewEvent::ParameterAppeared {
            name: name.to_string(),
            group,
            context,
            value: value.current(),
            hints: hints.to_vec(),
        });
        context
    }

    fn parameter_disappeared(&mut self, _parameter: ParameterId, context: ViewContext) {
        self.events
            .lock()
            .push(ViewEvent::ParameterDisappeared { context });
    }

    fn parameter_value_changed(&mut self, _parameter: ParameterId, context: ViewContext, value: Value) {
        self.events
            .lock()
            .push(ViewEvent::ValueChanged { context, value });
    }

    fn command_appeared(
        &mut self,
        _command: CommandId,
        _group: ViewContext,
        name: &str,
        _hints: &HintSet,
    ) -> ViewContext {
        let context = self.context_for(name);
        self.events.lock().push(ViewEvent::CommandAppeared {
            name: name.to_string(),
            context,
        });
        context
    }

    fn command_disappeared(&mut self, _command: CommandId, context: ViewContext) {
        self.events
            .lock()
            .push(ViewEvent::CommandDisappeared { context });
    }
}

/// Appear/disappear events reduced to `+name` / `-` markers
pub fn outline(events: &[ViewEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            ViewEvent::GroupAppeared { name, .. } => format!("+group {}", name),
            ViewEvent::ParameterAppeared { name, value, .. } => {
                format!("+param {} {:?}", name, value)
            }
            ViewEvent::CommandAppeared { name, .. } => format!("+command {}", name),
            ViewEvent::GroupDisappeared { .. } => "-group".to_string(),
            ViewEvent::ParameterDisappeared { .. } => "-param".to_string(),
            ViewEvent::CommandDisappeared { .. } => "-command".to_string(),
            ViewEvent::ValueChanged { value, .. } => format!("~value {:?}", value),
        })
        .collect()
}

/// Value owner for a small synth: one root group, optional initial parameter
pub struct SynthOwner {
    pub with_cutoff: bool,
    pub cutoff: Option<ParameterId>,
    pub changes: Vec<(ParameterId, u64, Value)>,
    pub commands: Vec<CommandId>,
}

impl SynthOwner {
    pub fn new(with_cutoff: bool) -> Self {
        Self {
            with_cutoff,
            cutoff: None,
            changes: Vec::new(),
            commands: Vec::new(),
        }
    }
}

impl ValueOwner for SynthOwner {
    fn root_name(&self) -> &str {
        "synth"
    }

    fn populate(&mut self, session: &mut ProducerSession<'_>) -> EngineResult<()> {
        if self.with_cutoff {
            let root = session.root();
            self.cutoff = Some(session.add_float(root, "cutoff", 0.5, 0.0, 1.0)?);
        }
        Ok(())
    }

    fn parameter_changed(&mut self, parameter: ParameterId, tag: u64, value: Value) {
        self.changes.push((parameter, tag, value));
    }

    fn command_executed(&mut self, command: CommandId) {
        self.commands.push(command);
    }
}
