//! Producer/control interleavings on real threads

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::{init_tracing, test_config, RecordingView, SynthOwner};
use crossbeam_channel::{bounded, Receiver, Sender};
use dynparam_core::{
    ControlView, GroupId, HintSet, Instance, ParamValue, ParameterId, Value, ViewContext,
};

/// Generous bound for a burst of failed producer attempts
const PRODUCER_BURST_LIMIT: Duration = Duration::from_millis(250);

/// View that parks inside its first callback until released
struct BlockingView {
    entered: Sender<()>,
    release: Receiver<()>,
}

impl ControlView for BlockingView {
    fn group_appeared(
        &mut self,
        _group: GroupId,
        _parent: Option<ViewContext>,
        _name: &str,
        _hints: &HintSet,
    ) -> ViewContext {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        ViewContext(1)
    }

    fn group_disappeared(&mut self, _group: GroupId, _context: ViewContext) {}

    fn parameter_appeared(
        &mut self,
        _parameter: ParameterId,
        _group: ViewContext,
        _name: &str,
        _hints: &HintSet,
        _value: &ParamValue,
    ) -> ViewContext {
        ViewContext(2)
    }

    fn parameter_disappeared(&mut self, _parameter: ParameterId, _context: ViewContext) {}

    fn parameter_value_changed(&mut self, _parameter: ParameterId, _context: ViewContext, _value: Value) {}
}

#[test]
fn test_scenario_d_producer_skips_during_control_run() {
    init_tracing();
    let mut owner = SynthOwner::new(true);
    let instance = Arc::new(Instance::attach(&mut owner, test_config()).unwrap());
    let cutoff = owner.cutoff.unwrap();
    instance.set_value(cutoff, Value::Float(0.25)).unwrap();

    let (entered_tx, entered_rx) = bounded(1);
    let (release_tx, release_rx) = bounded(1);
    let control = {
        let instance = Arc::clone(&instance);
        thread::spawn(move || {
            let view = BlockingView {
                entered: entered_tx,
                release: release_rx,
            };
            instance.control_attach_view(Box::new(view)).unwrap()
        })
    };

    entered_rx.recv().unwrap();
    let start = Instant::now();
    for _ in 0..1000 {
        assert_eq!(instance.producer_run(&mut owner), 0);
    }
    assert!(start.elapsed() < PRODUCER_BURST_LIMIT);
    assert!(owner.changes.is_empty());

    release_tx.send(()).unwrap();
    let report = control.join().unwrap();
    assert_eq!(report.walk.appeared, 2);

    assert_eq!(instance.producer_run(&mut owner), 1);
    assert_eq!(instance.value(cutoff), Some(Value::Float(0.25)));
    instance.check_invariants().unwrap();
}

#[test]
fn test_producer_never_waits_for_blocking_session() {
    let mut owner = SynthOwner::new(true);
    let instance = Arc::new(Instance::attach(&mut owner, test_config()).unwrap());

    let (held_tx, held_rx) = bounded::<()>(1);
    let (release_tx, release_rx) = bounded::<()>(1);
    let holder = {
        let instance = Arc::clone(&instance);
        thread::spawn(move || {
            instance
                .with_producer_blocking(|_session| {
                    held_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
                .unwrap();
        })
    };

    held_rx.recv().unwrap();
    let start = Instant::now();
    for _ in 0..1000 {
        assert_eq!(instance.producer_run(&mut owner), 0);
        assert!(instance.try_producer(|session| session.root()).is_none());
    }
    assert!(start.elapsed() < PRODUCER_BURST_LIMIT);

    release_tx.send(()).unwrap();
    holder.join().unwrap();
    assert!(instance.try_producer(|session| session.root()).is_some());
}

#[test]
fn test_interleaved_stress_keeps_tree_consistent() {
    init_tracing();
    const ITERATIONS: usize = 2000;

    let mut owner = SynthOwner::new(true);
    let instance = Arc::new(Instance::attach(&mut owner, test_config()).unwrap());
    let cutoff = owner.cutoff.unwrap();
    let (view, _events) = RecordingView::new();
    instance.control_attach_view(Box::new(view)).unwrap();

    let (done_tx, done_rx) = bounded::<()>(1);

    let producer = {
        let instance = Arc::clone(&instance);
        thread::spawn(move || {
            let mut drained = 0;
            let mut extra: Option<ParameterId> = None;
            for step in 0..ITERATIONS {
                drained += instance.producer_run(&mut owner);
                instance.try_producer(|session| match extra.take() {
                    Some(parameter) => {
                        let _ = session.remove_parameter(parameter);
                    }
                    None => {
                        let root = session.root();
                        extra = session.add_float(root, "lfo", step as f32, 0.0, 1e6).ok();
                    }
                });
                if step % 7 == 0 {
                    let _ = instance.try_producer(|session| {
                        session.set_value(cutoff, Value::Float((step % 100) as f32 / 100.0))
                    });
                }
                thread::yield_now();
            }
            done_tx.send(()).unwrap();
            (drained, owner)
        })
    };

    let mut sent = 0;
    let mut step = 0usize;
    while done_rx.try_recv().is_err() {
        if instance
            .set_value(cutoff, Value::Float((step % 10) as f32 / 10.0))
            .is_ok()
        {
            sent += 1;
        }
        instance.control_run();
        if step % 50 == 0 {
            instance.check_invariants().unwrap();
        }
        step += 1;
        thread::yield_now();
    }

    let (mut drained, mut owner) = producer.join().unwrap();
    drained += instance.producer_run(&mut owner);
    instance.control_run();

    assert_eq!(drained, sent);
    assert_eq!(
        owner
            .changes
            .iter()
            .filter(|(parameter, _, _)| *parameter == cutoff)
            .count(),
        sent
    );
    instance.check_invariants().unwrap();
}
