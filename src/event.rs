//! Event identifiers and passthrough data.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Index of an event declared by a monitor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u16);

impl EventId {
    pub(crate) const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Position in the declaring type's event table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an event comes from and where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDirection {
    /// Delivered from outside the monitor.
    Imported,
    /// Raised and consumed within one instance.
    Internal,
    /// Raised by the monitor and handed to its exporter.
    Exported,
}

impl EventDirection {
    /// Events a monitor may raise from a transition.
    #[must_use]
    pub const fn is_raisable(self) -> bool {
        !matches!(self, Self::Imported)
    }
}

/// Opaque bytes attached to an imported event.
///
/// Every event raised while handling an imported event carries the same
/// `Aux`. Cloning shares the underlying buffer.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Aux(Option<Arc<[u8]>>);

impl Aux {
    /// No auxiliary data.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// Copies `bytes` into a shared buffer.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(Some(Arc::from(bytes)))
    }

    /// The attached bytes, if any.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref()
    }

    /// Returns true if no bytes are attached.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for Aux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(bytes) => write!(f, "Aux({} bytes)", bytes.len()),
            None => write!(f, "Aux(none)"),
        }
    }
}

impl From<&[u8]> for Aux {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for Aux {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Some(Arc::from(bytes)))
    }
}

impl From<&str> for Aux {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}
