use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::bounded;

use rvmon::monitors::auction::{self, ALARMS};
use rvmon::{Aux, MonitorType, Route, Source, SyncSet, SyncSetWorker, System, Value, ValueKind, WorkerConfig};

#[derive(Debug, Default)]
struct Tally {
    alarms: i64,
}

fn tally_type() -> Arc<MonitorType<Tally>> {
    MonitorType::<Tally>::builder("Tally")
        .imported("alarm", 0)
        .exported("too_many", 1)
        .scenario("main", |sc| {
            sc.states(["counting", "tripped"]).on("counting", "alarm", |t| {
                t.when(|s, _| s.alarms + 1 >= 2)
                    .assign(|s, _| s.alarms += 1)
                    .raise("too_many", |s, _| vec![Value::Int(s.alarms)])
                    .to("tripped")
                    .otherwise()
                    .assign(|s, _| s.alarms += 1)
            })
        })
        .build()
        .unwrap()
}

fn tally_set() -> SyncSet {
    SyncSet::builder("tally")
        .monitor(tally_type())
        .import("alarm", Route::to("Tally", "alarm"))
        .export("Tally", "too_many", "too_many")
        .build()
        .unwrap()
}

#[test]
fn test_auction_alarms_feed_a_second_set() {
    let mut system = System::new();
    let auctions = system.add_set(auction::sync_set().unwrap()).unwrap();
    let tally = system.add_set(tally_set()).unwrap();
    for alarm in ALARMS {
        system.connect(auctions, alarm, tally, "alarm").unwrap();
    }
    let tripped = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&tripped);
    system
        .sink(tally, "too_many", move |_, params, _| {
            sink.borrow_mut().push(params.to_vec());
            Ok(())
        })
        .unwrap();

    let none = Aux::none();
    system.import("auction", "bid", &["early".into(), 1.into()], &none).unwrap();
    assert!(tripped.borrow().is_empty());
    system.import("auction", "create_auction", &["X".into(), 5.into(), 2.into()], &none).unwrap();
    system.import("auction", "sold", &["X".into()], &none).unwrap();
    assert_eq!(tripped.borrow().as_slice(), &[vec![Value::Int(2)]]);

    // Tripped is terminal for the tally; more alarms change nothing.
    system.import("auction", "bid", &["late".into(), 1.into()], &none).unwrap();
    assert_eq!(tripped.borrow().len(), 1);
}

#[test]
fn test_worker_runs_the_auction_set() {
    let worker = SyncSetWorker::spawn(WorkerConfig::default(), auction::sync_set).unwrap();
    let (tx, rx) = bounded(8);
    worker
        .with_set(move |set| {
            set.set_callback("alarm_sold_early", move |identity, _, _| {
                let _ = tx.send(identity.to_string());
                Ok(())
            })
        })
        .unwrap()
        .unwrap();

    worker
        .import(
            "create_auction",
            None,
            vec![Value::from("W"), Value::Int(10), Value::Int(3)],
            Aux::none(),
        )
        .unwrap();
    worker
        .try_import("sold", None, vec![Value::from("W")], Aux::none())
        .unwrap();

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "(\"W\")");
    let count = worker
        .with_set(|set| set.instance_count(auction::NAME))
        .unwrap();
    assert_eq!(count, Some(1));
    worker.shutdown();
}

#[derive(Debug, Default)]
struct Audit {
    alarms: i64,
}

fn audit_set() -> SyncSet {
    let ty = MonitorType::<Audit>::builder("Audit")
        .identity([ValueKind::String])
        .imported("alarm", 0)
        .exported("flagged", 1)
        .scenario("main", |sc| {
            sc.states(["open"]).on("open", "alarm", |t| {
                t.assign(|s, _| s.alarms += 1)
                    .raise("flagged", |s, _| vec![Value::Int(s.alarms)])
            })
        })
        .build()
        .unwrap();
    SyncSet::builder("audit")
        .monitor(ty)
        .import("alarm", Route::to("Audit", "alarm").identity([Source::Identity(0)]))
        .export("Audit", "flagged", "flagged")
        .build()
        .unwrap()
}

#[test]
fn test_alarms_keep_the_auction_identity_across_sets() {
    let mut system = System::new();
    let auctions = system.add_set(auction::sync_set().unwrap()).unwrap();
    let audit = system.add_set(audit_set()).unwrap();
    for alarm in ALARMS {
        system.connect(auctions, alarm, audit, "alarm").unwrap();
    }
    let flagged = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&flagged);
    system
        .sink(audit, "flagged", move |identity, params, _| {
            sink.borrow_mut().push((identity.to_string(), params.to_vec()));
            Ok(())
        })
        .unwrap();

    let none = Aux::none();
    system.import("auction", "bid", &["e1".into(), 1.into()], &none).unwrap();
    system.import("auction", "sold", &["e2".into()], &none).unwrap();
    system.import("auction", "create_auction", &["ok".into(), 5.into(), 2.into()], &none).unwrap();

    assert_eq!(
        flagged.borrow().as_slice(),
        &[
            ("(\"e1\")".to_string(), vec![Value::Int(1)]),
            ("(\"e2\")".to_string(), vec![Value::Int(1)]),
        ]
    );
    assert_eq!(system.set(audit).unwrap().instance_count("Audit"), Some(2));
}
