//! Monitor types and the scenario engine.
//!
//! A monitor type is data: declared events, scenarios with transition tables
//! of guarded branches, and a default state record `S`. Instances run that
//! data one macro-step per imported event.

/// Monitor type definitions and their builder.
pub mod definition;
/// Exporter trait and callback slots.
pub mod export;
/// Instances and the engine.
pub mod instance;

pub use definition::{
    Context, EventDef, MonitorType, MonitorTypeBuilder, Scenario, ScenarioBuilder, StateId, Transition, Unmatched,
    MAX_SCENARIOS,
};
pub use export::{ExportCallback, ExportCallbacks, ExportedEvent, Exporter, NoExport};
pub use instance::{Disposition, Monitor};
