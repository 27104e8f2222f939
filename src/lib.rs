//! # rvmon - Runtime for event-driven monitors
//!
//! rvmon executes monitors: finite-state observers that consume typed events,
//! each tagged with an identity tuple, and keep one instance per identity.
//!
//! ## Core Concepts
//!
//! - **Monitor type**: declared events, scenarios with guarded transitions and a state record
//! - **Instance map**: Robin Hood maps over identity projections, for wildcard (multicast) lookups
//! - **Macro-step**: events raised while handling an event settle before the call returns
//! - **Synchronous set**: monitors wired together, with intra and inter queues
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rvmon::monitors::auction;
//! use rvmon::{Aux, Value};
//!
//! let mut set = auction::sync_set()?;
//! set.set_callback("alarm_action_after_end", |identity, _, _| {
//!     println!("late action on {identity}");
//!     Ok(())
//! })?;
//! set.import("create_auction", None, &["A1".into(), 100.into(), 3.into()], &Aux::none())?;
//! set.import("bid", None, &["A1".into(), 150.into()], &Aux::none())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod queue;
pub mod value;

// Instances and execution
pub mod map;
pub mod monitor;
pub mod wrapper;

// Bundled definitions
pub mod monitors;

pub use config::{MapConfig, RuntimeConfig, WorkerConfig};
pub use error::{ExecutionError, RvError, RvResult, ValidationError};
pub use event::{Aux, EventDirection, EventId};
pub use identity::{Identity, KeyMask};
pub use queue::{EventQueue, GlobalEvent, GlobalEventQueue, QueuedEvent};
pub use value::{pointer_to_string, string_to_pointer, values_match, ThreadHandle, Value, ValueKind};

pub use map::{InstanceId, InstanceStore, MonitorMap};
pub use monitor::{Disposition, Exporter, Monitor, MonitorType, ScenarioBuilder, Transition};
pub use wrapper::{LocalWrapper, Route, Source, SyncSet, SyncSetWorker, System};
