use std::cell::RefCell;
use std::rc::Rc;

use rvmon::monitors::auction::{self, AuctionState, ALARMS, NAME};
use rvmon::{Aux, Monitor, SyncSet, Value};

type Alarms = Rc<RefCell<Vec<(String, String)>>>;

fn auction_set() -> (SyncSet, Alarms) {
    let mut set = auction::sync_set().unwrap();
    let alarms: Alarms = Rc::new(RefCell::new(Vec::new()));
    for alarm in ALARMS {
        let sink = Rc::clone(&alarms);
        set.set_callback(alarm, move |identity, _, _| {
            sink.borrow_mut().push((alarm.to_string(), identity.to_string()));
            Ok(())
        })
        .unwrap();
    }
    (set, alarms)
}

fn send(set: &mut SyncSet, channel: &str, params: &[Value]) {
    set.import(channel, None, params, &Aux::none()).unwrap();
}

fn snapshot(set: &SyncSet, id: &str) -> Option<(String, AuctionState)> {
    set.with_monitor(NAME, &[Value::from(id)], |m: &Monitor<AuctionState>| {
        (m.state("main").unwrap_or_default().to_string(), m.vars().clone())
    })
}

#[test]
fn test_auction_lifecycle_raises_after_end_alarm_once() {
    let (mut set, alarms) = auction_set();

    send(&mut set, "create_auction", &["A1".into(), 100.into(), 3.into()]);
    let (state, vars) = snapshot(&set, "A1").unwrap();
    assert_eq!(state, "bidding");
    assert_eq!(vars.reserve_price, 100);
    assert_eq!(vars.duration, 3);

    send(&mut set, "bid", &["A1".into(), 150.into()]);
    let (state, vars) = snapshot(&set, "A1").unwrap();
    assert_eq!(state, "above_reserve");
    assert_eq!(vars.current_price, 150);

    send(&mut set, "end_of_day", &[]);
    send(&mut set, "end_of_day", &[]);
    let (state, vars) = snapshot(&set, "A1").unwrap();
    assert_eq!(state, "above_reserve");
    assert_eq!(vars.days_passed, 2);

    send(&mut set, "end_of_day", &[]);
    assert_eq!(snapshot(&set, "A1").unwrap().0, "done");

    send(&mut set, "sold", &["A1".into()]);
    assert_eq!(snapshot(&set, "A1").unwrap().0, "sold");
    assert!(alarms.borrow().is_empty());

    send(&mut set, "bid", &["A1".into(), 10.into()]);
    assert_eq!(
        alarms.borrow().as_slice(),
        &[("alarm_action_after_end".to_string(), "(\"A1\")".to_string())]
    );

    // The auction is parked in error; further bids are ignored.
    send(&mut set, "bid", &["A1".into(), 10.into()]);
    assert_eq!(alarms.borrow().len(), 1);
}

#[test]
fn test_end_of_day_reaches_every_auction() {
    let (mut set, alarms) = auction_set();
    send(&mut set, "create_auction", &["A".into(), 10.into(), 1.into()]);
    send(&mut set, "create_auction", &["B".into(), 10.into(), 2.into()]);
    send(&mut set, "end_of_day", &[]);

    assert_eq!(snapshot(&set, "A").unwrap().0, "done");
    let (state, vars) = snapshot(&set, "B").unwrap();
    assert_eq!(state, "bidding");
    assert_eq!(vars.days_passed, 1);
    assert!(alarms.borrow().is_empty());
}

#[test]
fn test_misuse_raises_the_matching_alarm() {
    let (mut set, alarms) = auction_set();

    // A bid before creation instantiates the auction in `init`.
    send(&mut set, "bid", &["early".into(), 5.into()]);
    send(&mut set, "create_auction", &["dup".into(), 10.into(), 2.into()]);
    send(&mut set, "create_auction", &["dup".into(), 10.into(), 2.into()]);
    send(&mut set, "create_auction", &["rush".into(), 10.into(), 2.into()]);
    send(&mut set, "sold", &["rush".into()]);
    send(&mut set, "create_auction", &["cheap".into(), 100.into(), 1.into()]);
    send(&mut set, "bid", &["cheap".into(), 50.into()]);
    send(&mut set, "end_of_day", &[]);
    send(&mut set, "sold", &["cheap".into()]);
    send(&mut set, "create_auction", &["lowball".into(), 100.into(), 5.into()]);
    send(&mut set, "bid", &["lowball".into(), 60.into()]);
    send(&mut set, "sold", &["lowball".into()]);

    let mut seen = alarms.borrow().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("alarm_action_before_start".to_string(), "(\"early\")".to_string()),
            ("alarm_low_bid".to_string(), "(\"cheap\")".to_string()),
            ("alarm_low_bid".to_string(), "(\"lowball\")".to_string()),
            ("alarm_recreation".to_string(), "(\"dup\")".to_string()),
            ("alarm_sold_early".to_string(), "(\"rush\")".to_string()),
        ]
    );
    for id in ["early", "dup", "rush", "cheap", "lowball"] {
        assert_eq!(snapshot(&set, id).unwrap().0, "error", "{id}");
    }
}

#[test]
fn test_instances_are_independent() {
    let (mut set, _alarms) = auction_set();
    for (id, bid) in [("x", 120), ("y", 80)] {
        send(&mut set, "create_auction", &[id.into(), 100.into(), 5.into()]);
        send(&mut set, "bid", &[id.into(), bid.into()]);
    }
    send(&mut set, "bid", &["x".into(), 90.into()]);
    send(&mut set, "sold", &["y".into()]);

    let (state, vars) = snapshot(&set, "x").unwrap();
    assert_eq!(state, "above_reserve");
    assert_eq!(vars.current_price, 120);
    let (state, vars) = snapshot(&set, "y").unwrap();
    assert_eq!(state, "error");
    assert_eq!(vars.current_price, 80);
    assert_eq!(set.instance_count(NAME), Some(2));
}

#[test]
fn test_sale_above_reserve_closes_the_auction() {
    let (mut set, alarms) = auction_set();
    send(&mut set, "create_auction", &["fair".into(), 100.into(), 5.into()]);
    send(&mut set, "bid", &["fair".into(), 120.into()]);
    send(&mut set, "sold", &["fair".into()]);
    assert_eq!(snapshot(&set, "fair").unwrap().0, "done");

    send(&mut set, "end_of_day", &[]);
    assert_eq!(snapshot(&set, "fair").unwrap().0, "done");
    assert!(alarms.borrow().is_empty());

    send(&mut set, "bid", &["fair".into(), 130.into()]);
    assert_eq!(
        alarms.borrow().as_slice(),
        &[("alarm_action_after_end".to_string(), "(\"fair\")".to_string())]
    );
}
