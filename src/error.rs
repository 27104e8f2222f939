//! Error types for rvmon.
//!
//! All errors are strongly typed using thiserror. Allocation failure is not
//! modelled: in Rust it aborts the process. What remains are validation errors
//! (a caller or a monitor definition handed us something malformed) and
//! execution errors (a callback refused an event, a worker went away).
//!
//! Event delivery never short-circuits. Failures from sibling instances and
//! channels are collected with [`Failures`] and surface as one [`RvError`].

use thiserror::Error;

use crate::event::EventDirection;
use crate::value::ValueKind;

/// Validation errors raised while building definitions or checking inputs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// An identity tuple has the wrong length.
    #[error("Identity for '{monitor}' has {actual} values, expected {expected}")]
    IdentityArity {
        /// Monitor type name.
        monitor: String,
        /// Declared identity arity.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// An event was given the wrong number of parameters.
    #[error("Event '{event}' takes {expected} parameters, got {actual}")]
    ParamArity {
        /// Event name.
        event: String,
        /// Declared arity.
        expected: usize,
        /// Number supplied.
        actual: usize,
    },

    /// A `Null` appeared where every position must be concrete.
    #[error("Identity {identity} contains a wildcard where a concrete identity is required")]
    WildcardIdentity {
        /// Rendered identity.
        identity: String,
    },

    /// A float identity position holds NaN.
    #[error("Identity position {position} of '{monitor}' is NaN, which matches no instance")]
    NanIdentity {
        /// Monitor type name.
        monitor: String,
        /// Offending position.
        position: usize,
    },

    /// An identity value has the wrong kind for its position.
    #[error("Identity position {position} of '{monitor}' expects {expected:?}, got {actual:?}")]
    IdentityKind {
        /// Monitor type name.
        monitor: String,
        /// Offending position.
        position: usize,
        /// Declared kind.
        expected: ValueKind,
        /// Kind supplied.
        actual: ValueKind,
    },

    /// A name did not resolve.
    #[error("Unknown {what} '{name}'")]
    Unknown {
        /// What kind of name, e.g. "event" or "channel".
        what: &'static str,
        /// The name looked up.
        name: String,
    },

    /// A name was declared twice.
    #[error("Duplicate {what} '{name}'")]
    Duplicate {
        /// What kind of name.
        what: &'static str,
        /// The repeated name.
        name: String,
    },

    /// An event was used against its direction, e.g. importing an exported event.
    #[error("Event '{event}' is {direction:?} and cannot be {action}")]
    WrongDirection {
        /// Event name.
        event: String,
        /// Declared direction.
        direction: EventDirection,
        /// What was attempted.
        action: &'static str,
    },

    /// A definition exceeds a fixed limit.
    #[error("'{monitor}' declares {count} {what}, at most {max} are supported")]
    LimitExceeded {
        /// Monitor type name.
        monitor: String,
        /// What is limited.
        what: &'static str,
        /// Number declared.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// A scenario has no states.
    #[error("Scenario '{scenario}' declares no states")]
    EmptyScenario {
        /// Scenario name.
        scenario: String,
    },

    /// A transition refers to something its monitor type lacks.
    #[error("Transition {scenario}:{state} on '{event}': {reason}")]
    InvalidTransition {
        /// Scenario name.
        scenario: String,
        /// Source state.
        state: String,
        /// Triggering event.
        event: String,
        /// What is wrong.
        reason: String,
    },

    /// A synchronous set route cannot be satisfied.
    #[error("Route on channel '{channel}': {reason}")]
    InvalidRoute {
        /// Channel the route belongs to.
        channel: String,
        /// What is wrong.
        reason: String,
    },
}

/// Execution errors raised while delivering events.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// An export callback returned an error.
    #[error("Export callback for '{channel}' failed: {message}")]
    CallbackFailed {
        /// Output channel or exported event the callback served.
        channel: String,
        /// The callback's error, rendered.
        message: String,
    },

    /// A transition raised an event it may not raise.
    #[error("'{monitor}' raised '{event}': {reason}")]
    InvalidRaise {
        /// Monitor type name.
        monitor: String,
        /// Raised event.
        event: String,
        /// What is wrong.
        reason: String,
    },

    /// A route reads source identities but the event carried none.
    #[error("Channel '{channel}' routes source identities but none were supplied")]
    MissingIdentities {
        /// Channel name.
        channel: String,
    },

    /// A route reads past the end of the identities or parameters supplied.
    #[error("Channel '{channel}' reads {what} {index}, only {len} available")]
    SourceOutOfRange {
        /// Channel name.
        channel: String,
        /// "identity" or "param".
        what: &'static str,
        /// Position read.
        index: usize,
        /// Values available.
        len: usize,
    },

    /// A worker's bounded queue is at capacity.
    #[error("Worker queue '{name}' is full (capacity {capacity})")]
    QueueFull {
        /// Worker thread name.
        name: String,
        /// Queue capacity.
        capacity: usize,
    },

    /// A worker thread has stopped.
    #[error("Worker '{name}' is disconnected")]
    Disconnected {
        /// Worker thread name.
        name: String,
    },

    /// A queued event targets an instance that was removed.
    #[error("Monitor instance of '{monitor}' no longer exists")]
    StaleInstance {
        /// Monitor type name.
        monitor: String,
    },
}

/// Top-level error type for rvmon.
#[derive(Debug, Error)]
pub enum RvError {
    /// Malformed input or definition.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Delivery failed.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Several deliveries of one call failed.
    #[error("{} deliveries failed; first: {}", .failures.len(), first_message(.failures))]
    Aggregate {
        /// Individual failures, flattened.
        failures: Vec<RvError>,
    },

    /// Broken internal invariant.
    #[error("Internal error: {message}")]
    Internal {
        /// Description.
        message: String,
    },
}

fn first_message(failures: &[RvError]) -> String {
    failures
        .first()
        .map_or_else(|| "none".to_string(), ToString::to_string)
}

impl RvError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an unknown-name validation error.
    #[must_use]
    pub fn unknown(what: &'static str, name: impl Into<String>) -> Self {
        Self::Validation(ValidationError::Unknown {
            what,
            name: name.into(),
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this error aggregates several failures.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Self::Aggregate { .. })
    }

    /// Number of individual failures carried by this error.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        match self {
            Self::Aggregate { failures } => failures.len(),
            _ => 1,
        }
    }
}

/// Result type alias for rvmon operations.
pub type RvResult<T> = Result<T, RvError>;

/// Collects failures across a fan-out without stopping it.
#[derive(Debug, Default)]
pub struct Failures {
    errors: Vec<RvError>,
}

impl Failures {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the error of `result`, if any, and hands back the success value.
    pub fn record<T>(&mut self, result: RvResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.push(err);
                None
            }
        }
    }

    /// Records one error. Nested aggregates are flattened.
    pub fn push(&mut self, err: RvError) {
        match err {
            RvError::Aggregate { failures } => self.errors.extend(failures),
            other => self.errors.push(other),
        }
    }

    /// Returns true if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failures recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Collapses the collected failures into a single result.
    pub fn into_result(mut self) -> RvResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(RvError::Aggregate {
                failures: self.errors,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_identity_arity() {
        let err = ValidationError::IdentityArity {
            monitor: "Auction".to_string(),
            expected: 1,
            actual: 3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("Auction"));
        assert!(msg.contains("expected 1"));
    }

    #[test]
    fn test_execution_error_callback() {
        let err = ExecutionError::CallbackFailed {
            channel: "alarm_low_bid".to_string(),
            message: "sink closed".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("alarm_low_bid"));
        assert!(msg.contains("sink closed"));
    }

    #[test]
    fn test_rv_error_from_validation() {
        let err: RvError = ValidationError::EmptyScenario {
            scenario: "main".to_string(),
        }
        .into();
        assert!(err.is_validation());
        assert!(!err.is_execution());
        assert_eq!(err.failure_count(), 1);
    }

    #[test]
    fn test_rv_error_internal() {
        let err = RvError::internal("unexpected state");
        assert!(matches!(err, RvError::Internal { .. }));
        assert!(format!("{err}").contains("unexpected state"));
    }

    #[test]
    fn test_failures_empty_is_ok() {
        assert!(Failures::new().into_result().is_ok());
    }

    #[test]
    fn test_failures_single_is_unwrapped() {
        let mut failures = Failures::new();
        let value: Option<u8> = failures.record(Err(RvError::unknown("event", "bid")));
        assert!(value.is_none());
        let err = failures.into_result().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_failures_aggregate_and_flatten() {
        let mut inner = Failures::new();
        inner.push(RvError::internal("a"));
        inner.push(RvError::internal("b"));
        let nested = inner.into_result().unwrap_err();

        let mut outer = Failures::new();
        assert_eq!(outer.record(Ok::<_, RvError>(7)), Some(7));
        outer.push(nested);
        outer.push(RvError::internal("c"));
        assert_eq!(outer.len(), 3);

        let err = outer.into_result().unwrap_err();
        assert!(err.is_aggregate());
        assert_eq!(err.failure_count(), 3);
        assert!(format!("{err}").starts_with("3 deliveries failed"));
    }
}
