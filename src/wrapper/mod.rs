//! Wrappers around monitor instances.
//!
//! A local wrapper owns every instance of one monitor type. A synchronous
//! set wires several local wrappers together, a system wires sets together,
//! and a worker runs one set on its own thread.

/// Synchronous sets and their routing.
pub mod global;
/// Instances of one monitor type.
pub mod local;
/// Set-to-set routing.
pub mod system;
/// Threaded set execution.
pub mod worker;

pub use global::{ChannelId, InterCallback, OutputId, Route, Source, SyncSet, SyncSetBuilder};
pub use local::{LocalHandle, LocalWrapper};
pub use system::{SetId, System};
pub use worker::SyncSetWorker;
