use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rvmon::monitor::NoExport;
use rvmon::wrapper::{Route, Source};
use rvmon::{Aux, Identity, MapConfig, Monitor, MonitorType, SyncSet, Value, ValueKind};

#[derive(Debug, Default, Clone)]
struct Counters {
    a_relay: i64,
    b_relay: i64,
    pings: i64,
}

fn relay_type() -> Arc<MonitorType<Counters>> {
    MonitorType::<Counters>::builder("Relay")
        .identity([ValueKind::Int])
        .imported("ping", 0)
        .internal("relay", 0)
        .exported("out", 1)
        .scenario("a", |sc| {
            sc.states(["idle"])
                .on("idle", "ping", |t| t.assign(|s, _| s.pings += 1).emit("relay"))
                .on("idle", "relay", |t| t.assign(|s, _| s.a_relay += 1))
        })
        .scenario("b", |sc| {
            sc.states(["idle"]).on("idle", "relay", |t| {
                t.assign(|s, _| s.b_relay += 1)
                    .raise("out", |s, _| vec![Value::Int(s.pings)])
            })
        })
        .build()
        .unwrap()
}

#[test]
fn test_scenario_fires_once_per_macro_step() {
    let ty = relay_type();
    let ping = ty.event_id("ping").unwrap();
    let mut monitor = Monitor::new(ty, Identity::new(vec![Value::Int(1)]));

    for round in 1..=3 {
        monitor
            .execute(ping, &[], &Aux::none(), &mut NoExport)
            .unwrap();
        assert_eq!(monitor.vars().pings, round);
        // Scenario `a` already fired on `ping`, so it skips the relay.
        assert_eq!(monitor.vars().a_relay, 0);
        assert_eq!(monitor.vars().b_relay, round);
        assert_eq!(monitor.pending(), 0);
    }
}

#[derive(Debug, Default)]
struct Hop {
    seen: i64,
}

fn hop(name: &str) -> Arc<MonitorType<Hop>> {
    MonitorType::<Hop>::builder(name)
        .identity([ValueKind::Int])
        .imported("input", 1)
        .exported("output", 1)
        .scenario("main", |sc| {
            sc.states(["run"]).on("run", "input", |t| {
                t.assign(|s, ctx| s.seen = ctx.int(0).unwrap_or_default())
                    .raise("output", |s, _| vec![Value::Int(s.seen + 1)])
            })
        })
        .build()
        .unwrap()
}

fn pipeline() -> SyncSet {
    let same_id = || Route::to("B", "input").identity([Source::Identity(0)]);
    SyncSet::builder("pipeline")
        .monitor(hop("A"))
        .monitor(hop("B"))
        .monitor(hop("C"))
        .import(
            "start",
            Route::to("A", "input")
                .identity([Source::Param(0)])
                .params([Source::Param(1)]),
        )
        .connect("A", "output", "a_to_b", same_id())
        .connect(
            "B",
            "output",
            "b_to_c",
            Route::to("C", "input").identity([Source::Identity(0)]),
        )
        .export("A", "output", "tap_a")
        .export("C", "output", "done")
        .build()
        .unwrap()
}

#[test]
fn test_cascade_settles_before_import_returns() {
    let mut set = pipeline();
    let log = Rc::new(RefCell::new(Vec::new()));
    for output in ["tap_a", "done"] {
        let sink = Rc::clone(&log);
        set.set_callback(output, move |identity, params, aux| {
            sink.borrow_mut()
                .push((output, identity.to_string(), params.to_vec(), aux.clone()));
            Ok(())
        })
        .unwrap();
    }

    let aux = Aux::new(b"trace-7");
    set.import("start", None, &[Value::Int(9), Value::Int(0)], &aux)
        .unwrap();

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].0, "tap_a");
    assert_eq!(log[0].2, vec![Value::Int(1)]);
    assert_eq!(log[1].0, "done");
    assert_eq!(log[1].1, "(9)");
    assert_eq!(log[1].2, vec![Value::Int(3)]);
    assert_eq!(log[1].3.as_bytes(), Some(&b"trace-7"[..]));
    for name in ["A", "B", "C"] {
        assert_eq!(set.instance_count(name), Some(1), "{name}");
    }
}

#[test]
fn test_separate_identities_do_not_interfere() {
    let mut set = pipeline();
    let done = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&done);
    set.set_callback("done", move |identity, params, _| {
        sink.borrow_mut().push((identity.to_string(), params.to_vec()));
        Ok(())
    })
    .unwrap();

    set.import("start", None, &[Value::Int(1), Value::Int(10)], &Aux::none())
        .unwrap();
    set.import("start", None, &[Value::Int(2), Value::Int(20)], &Aux::none())
        .unwrap();
    assert_eq!(
        done.borrow().as_slice(),
        &[
            ("(1)".to_string(), vec![Value::Int(13)]),
            ("(2)".to_string(), vec![Value::Int(23)]),
        ]
    );
    assert_eq!(set.instance_count("C"), Some(2));
}

#[test]
fn test_failures_do_not_stop_the_cascade() {
    let mut set = pipeline();
    set.set_callback("tap_a", |_, _, _| Err(rvmon::RvError::internal("tap down")))
        .unwrap();
    let reached = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&reached);
    set.set_callback("done", move |_, _, _| {
        *sink.borrow_mut() += 1;
        Ok(())
    })
    .unwrap();

    let err = set
        .import("start", None, &[Value::Int(1), Value::Int(1)], &Aux::none())
        .unwrap_err();
    assert_eq!(err.failure_count(), 1);
    assert_eq!(*reached.borrow(), 1);
}

#[test]
fn test_local_wrapper_uses_configured_maps() {
    let config = MapConfig {
        min_capacity: 4,
        ..MapConfig::default()
    };
    let mut wrapper = rvmon::LocalWrapper::new(relay_type(), config);
    let ping = wrapper.monitor_type().event_id("ping").unwrap();
    for n in 0..100 {
        wrapper
            .process(ping, &[Value::Int(n)], &[], &Aux::none(), &mut NoExport)
            .unwrap();
    }
    assert_eq!(wrapper.len(), 100);
    wrapper.store().check_invariants().unwrap();
}
