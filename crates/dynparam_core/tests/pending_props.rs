//! Property tests: random edit sequences keep the pending bookkeeping sound

mod common;

use common::{test_config, RecordingView, SynthOwner};
use dynparam_core::{GroupId, Instance, ParameterId, Value};
use proptest::prelude::*;

const NAMES: [&str; 3] = ["a", "b", "c"];

#[derive(Debug, Clone)]
enum Op {
    AddGroup { parent: usize, name: usize },
    AddParameter { group: usize, name: usize },
    RemoveGroup(usize),
    RemoveParameter(usize),
    SetByPath { name: usize },
    ProducerRun,
    ControlRun,
    Detach,
    Attach,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..16usize, 0..NAMES.len()).prop_map(|(parent, name)| Op::AddGroup { parent, name }),
        4 => (0..16usize, 0..NAMES.len()).prop_map(|(group, name)| Op::AddParameter { group, name }),
        2 => (0..16usize).prop_map(Op::RemoveGroup),
        2 => (0..16usize).prop_map(Op::RemoveParameter),
        1 => (0..NAMES.len()).prop_map(|name| Op::SetByPath { name }),
        1 => Just(Op::ProducerRun),
        3 => Just(Op::ControlRun),
        1 => Just(Op::Detach),
        1 => Just(Op::Attach),
    ]
}

struct Harness {
    owner: SynthOwner,
    instance: Instance,
    groups: Vec<GroupId>,
    parameters: Vec<ParameterId>,
}

impl Harness {
    fn new() -> Self {
        let mut owner = SynthOwner::new(false);
        let instance = Instance::attach(&mut owner, test_config()).unwrap();
        let root = instance.root();
        Self {
            owner,
            instance,
            groups: vec![root],
            parameters: Vec::new(),
        }
    }

    fn apply(&mut self, op: &Op) {
        let instance = &self.instance;
        match *op {
            Op::AddGroup { parent, name } => {
                let parent = self.groups[parent % self.groups.len()];
                if let Some(Ok(group)) =
                    instance.try_producer(|session| session.add_group(parent, NAMES[name], &[]))
                {
                    self.groups.push(group);
                }
            }
            Op::AddParameter { group, name } => {
                let group = self.groups[group % self.groups.len()];
                if let Some(Ok(parameter)) = instance
                    .try_producer(|session| session.add_float(group, NAMES[name], 0.5, 0.0, 1.0))
                {
                    self.parameters.push(parameter);
                }
            }
            Op::RemoveGroup(index) => {
                let group = self.groups[index % self.groups.len()];
                // stale handles and the root are refused; both are fine here
                let _ = instance.try_producer(|session| session.remove_group(group));
            }
            Op::RemoveParameter(index) => {
                if !self.parameters.is_empty() {
                    let parameter = self.parameters[index % self.parameters.len()];
                    let _ = instance.try_producer(|session| session.remove_parameter(parameter));
                }
            }
            Op::SetByPath { name } => {
                let _ = instance.set_value_by_path(&["synth", NAMES[name]], Value::Float(0.25));
            }
            Op::ProducerRun => {
                instance.producer_run(&mut self.owner);
            }
            Op::ControlRun => {
                instance.control_run();
            }
            Op::Detach => {
                instance.control_detach_view();
            }
            Op::Attach => {
                let (view, _) = RecordingView::new();
                let _ = instance.control_attach_view(Box::new(view));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_random_edits_keep_tree_consistent(ops in prop::collection::vec(op(), 1..80)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op);
            let checked = harness.instance.check_invariants();
            prop_assert!(checked.is_ok(), "after {:?}: {:?}", op, checked);
        }
    }

    #[test]
    fn test_settled_tree_has_nothing_left_to_show(ops in prop::collection::vec(op(), 1..80)) {
        let mut harness = Harness::new();
        for op in &ops {
            harness.apply(op);
        }
        if !harness.instance.is_view_attached() {
            let (view, _) = RecordingView::new();
            harness.instance.control_attach_view(Box::new(view)).unwrap();
        }
        harness.instance.control_run();
        let report = harness.instance.control_run();
        prop_assert!(report.walk.is_empty());

        // withdrawing the view releases everything that was waiting
        harness.instance.control_detach_view();
        harness.instance.check_invariants().unwrap();
        let (view, events) = RecordingView::new();
        let report = harness.instance.control_attach_view(Box::new(view)).unwrap();
        prop_assert_eq!(report.walk.appeared, events.lock().len());
        prop_assert_eq!(report.walk.disappeared, 0);
    }
}
