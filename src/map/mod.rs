//! Monitor instance maps.
//!
//! Instances of one monitor type are indexed by several Robin Hood hash maps,
//! one per identity projection that routing needs. A lookup with a partially
//! wildcarded identity uses the map keyed on exactly the concrete positions,
//! which is what makes multicast delivery cheap.

mod arena;
mod hash;
/// Instance slab and the maps over it.
pub mod store;
/// One Robin Hood map.
pub mod table;

pub use store::{InstanceId, InstanceStore, Keyed};
pub use table::MonitorMap;
