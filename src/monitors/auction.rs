//! Online auction monitor.
//!
//! One instance per auction id. Events carry the id as their first
//! parameter:
//!
//! | event            | parameters                    |
//! |------------------|-------------------------------|
//! | `create_auction` | id, reserve price, duration   |
//! | `bid`            | id, amount                    |
//! | `sold`           | id                            |
//! | `end_of_day`     | none; reaches every auction   |
//!
//! The first bid opens the auction above reserve; later bids only count
//! when they raise the price. Selling is checked against the reserve price.
//! Misuse raises one of the parameterless `alarm_*` events and parks the
//! auction in `error`. `alarm_not_sold` is declared for subscribers but no
//! transition raises it.

use std::sync::Arc;

use crate::error::RvResult;
use crate::monitor::{MonitorType, ScenarioBuilder};
use crate::value::ValueKind;
use crate::wrapper::{Route, Source, SyncSet};

/// Monitor type name.
pub const NAME: &str = "Auction";

/// Exported alarms, in declaration order.
pub const ALARMS: [&str; 6] = [
    "alarm_recreation",
    "alarm_low_bid",
    "alarm_sold_early",
    "alarm_not_sold",
    "alarm_action_after_end",
    "alarm_action_before_start",
];

/// Per-auction state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuctionState {
    /// Lowest acceptable sale price.
    pub reserve_price: i64,
    /// Highest bid so far.
    pub current_price: i64,
    /// Days the auction stays open.
    pub duration: i64,
    /// Days elapsed since creation.
    pub days_passed: i64,
}

/// Builds the auction monitor type.
///
/// # Errors
///
/// Never fails for the bundled definition; the builder's result is passed
/// through.
pub fn monitor_type() -> RvResult<Arc<MonitorType<AuctionState>>> {
    let mut builder = MonitorType::<AuctionState>::builder(NAME)
        .identity([ValueKind::String])
        .imported("create_auction", 3)
        .imported("bid", 2)
        .imported("sold", 1)
        .imported("end_of_day", 0);
    for alarm in ALARMS {
        builder = builder.exported(alarm, 0);
    }
    builder.scenario("main", main_scenario).build()
}

fn amount(ctx: &crate::monitor::Context<'_>) -> i64 {
    ctx.int(1).unwrap_or_default()
}

fn main_scenario(sc: ScenarioBuilder<AuctionState>) -> ScenarioBuilder<AuctionState> {
    sc.states(["init", "bidding", "above_reserve", "done", "sold", "error"])
        .on("init", "create_auction", |t| {
            t.assign(|s, ctx| {
                s.reserve_price = ctx.int(1).unwrap_or_default();
                s.duration = ctx.int(2).unwrap_or_default();
            })
            .to("bidding")
        })
        .on_each(["bidding", "above_reserve", "done", "sold"], "create_auction", |t| {
            t.emit("alarm_recreation").to("error")
        })
        .on("init", "bid", |t| t.emit("alarm_action_before_start").to("error"))
        .on("init", "sold", |t| t.emit("alarm_action_before_start").to("error"))
        .on("bidding", "bid", |t| {
            t.assign(|s, ctx| s.current_price = amount(ctx)).to("above_reserve")
        })
        .on("above_reserve", "bid", |t| {
            t.when(|s, ctx| amount(ctx) > s.current_price)
                .assign(|s, ctx| s.current_price = amount(ctx))
        })
        .on_each(["bidding", "above_reserve"], "end_of_day", |t| {
            t.when(|s, _| s.days_passed < s.duration - 1)
                .assign(|s, _| s.days_passed += 1)
                .otherwise()
                .to("done")
        })
        .on("done", "end_of_day", |t| t)
        .on("bidding", "sold", |t| t.emit("alarm_sold_early").to("error"))
        .on("above_reserve", "sold", |t| {
            t.when(|s, _| s.current_price < s.reserve_price)
                .emit("alarm_low_bid")
                .to("error")
                .otherwise()
                .to("done")
        })
        // A sale after the auction closed is final; anything later is misuse.
        .on("done", "sold", |t| {
            t.when(|s, _| s.current_price >= s.reserve_price)
                .to("sold")
                .otherwise()
                .emit("alarm_low_bid")
                .to("error")
        })
        .on_each(["done", "sold"], "bid", |t| t.emit("alarm_action_after_end").to("error"))
        .on("sold", "sold", |t| t.emit("alarm_action_after_end").to("error"))
}

/// A synchronous set holding only the auction monitor.
///
/// Input channels are named after the imported events and outputs after the
/// alarms. `end_of_day` is multicast to every live auction.
///
/// # Errors
///
/// Passes through definition or wiring errors.
pub fn sync_set() -> RvResult<SyncSet> {
    let by_id = || Source::Param(0);
    let mut builder = SyncSet::builder("auction")
        .monitor(monitor_type()?)
        .import("create_auction", Route::to(NAME, "create_auction").identity([by_id()]))
        .import("bid", Route::to(NAME, "bid").identity([by_id()]))
        .import("sold", Route::to(NAME, "sold").identity([by_id()]))
        .import("end_of_day", Route::to(NAME, "end_of_day").identity([Source::Wildcard]));
    for alarm in ALARMS {
        builder = builder.export(NAME, alarm, alarm);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::event::Aux;
    use crate::identity::Identity;
    use crate::monitor::{ExportCallbacks, Monitor};
    use crate::value::Value;
    use crate::wrapper::LocalWrapper;

    fn id(name: &str) -> Identity {
        Identity::new(vec![Value::from(name)])
    }

    fn state(wrapper: &LocalWrapper<AuctionState>, name: &str) -> Option<String> {
        wrapper
            .monitor(&id(name))
            .and_then(|m: &Monitor<AuctionState>| m.state("main").map(str::to_string))
    }

    #[test]
    fn test_definition_builds() {
        let ty = monitor_type().unwrap();
        assert_eq!(ty.arity(), 1);
        assert_eq!(ty.events().len(), 4 + ALARMS.len());
        assert!(!ty.has_final_states());
    }

    #[test]
    fn test_first_bid_opens_and_only_higher_bids_count() {
        let ty = monitor_type().unwrap();
        let create = ty.event_id("create_auction").unwrap();
        let bid = ty.event_id("bid").unwrap();
        let mut wrapper = LocalWrapper::new(ty, MapConfig::default());
        let mut out = ExportCallbacks::new();

        wrapper
            .process(
                create,
                &id("A"),
                &[Value::from("A"), Value::Int(100), Value::Int(2)],
                &Aux::none(),
                &mut out,
            )
            .unwrap();
        assert_eq!(state(&wrapper, "A").as_deref(), Some("bidding"));

        for amount in [40, 70, 50] {
            wrapper
                .process(bid, &id("A"), &[Value::from("A"), Value::Int(amount)], &Aux::none(), &mut out)
                .unwrap();
        }
        assert_eq!(state(&wrapper, "A").as_deref(), Some("above_reserve"));
        assert_eq!(wrapper.monitor(&id("A")).unwrap().vars().current_price, 70);
    }

    #[test]
    fn test_sale_checks_reserve_price() {
        let ty = monitor_type().unwrap();
        let create = ty.event_id("create_auction").unwrap();
        let bid = ty.event_id("bid").unwrap();
        let sold = ty.event_id("sold").unwrap();
        let mut wrapper = LocalWrapper::new(Arc::clone(&ty), MapConfig::default());
        let low_bids = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = std::rc::Rc::clone(&low_bids);
        let mut out = ExportCallbacks::new();
        out.register(&ty, "alarm_low_bid", move |_, _, _| {
            counter.set(counter.get() + 1);
            Ok(())
        })
        .unwrap();

        for (name, price) in [("fair", 120), ("cheap", 60)] {
            wrapper
                .process(
                    create,
                    &id(name),
                    &[Value::from(name), Value::Int(100), Value::Int(5)],
                    &Aux::none(),
                    &mut out,
                )
                .unwrap();
            wrapper
                .process(bid, &id(name), &[Value::from(name), Value::Int(price)], &Aux::none(), &mut out)
                .unwrap();
            wrapper
                .process(sold, &id(name), &[Value::from(name)], &Aux::none(), &mut out)
                .unwrap();
        }
        assert_eq!(state(&wrapper, "fair").as_deref(), Some("done"));
        assert_eq!(state(&wrapper, "cheap").as_deref(), Some("error"));
        assert_eq!(low_bids.get(), 1);
    }

    #[test]
    fn test_sync_set_wiring() {
        let set = sync_set().unwrap();
        for channel in ["create_auction", "bid", "sold", "end_of_day"] {
            assert!(set.channel(channel).is_some(), "{channel}");
        }
        for alarm in ALARMS {
            assert!(set.output(alarm).is_some(), "{alarm}");
        }
    }
}
