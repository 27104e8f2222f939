//! Ready-made monitor definitions.

/// Online auction monitor.
pub mod auction;
