//! Delivery of exported events out of a monitor instance.

use std::collections::HashMap;

use crate::error::{RvError, RvResult, ValidationError};
use crate::event::{Aux, EventDirection, EventId};
use crate::identity::Identity;
use crate::monitor::definition::{EventDef, MonitorType};
use crate::value::Value;

/// An exported event leaving an instance.
#[derive(Debug, Clone, Copy)]
pub struct ExportedEvent<'a> {
    /// Monitor type name.
    pub monitor: &'a str,
    /// Event id within the monitor type.
    pub event: EventId,
    /// Event name.
    pub name: &'a str,
    /// Identity of the raising instance.
    pub identity: &'a Identity,
    /// Raised parameters.
    pub params: &'a [Value],
    /// Aux of the imported event being handled.
    pub aux: &'a Aux,
}

/// Receives exported events.
pub trait Exporter {
    /// Handles one exported event.
    ///
    /// # Errors
    ///
    /// An error is recorded against the raising instance; delivery to other
    /// instances continues.
    fn export(&mut self, event: ExportedEvent<'_>) -> RvResult<()>;
}

/// Discards every exported event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExport;

impl Exporter for NoExport {
    fn export(&mut self, _event: ExportedEvent<'_>) -> RvResult<()> {
        Ok(())
    }
}

/// Callback invoked with `(identity, params, aux)` of an exported event.
pub type ExportCallback = Box<dyn FnMut(&Identity, &[Value], &Aux) -> RvResult<()>>;

/// One optional callback per exported event of a monitor type.
#[derive(Default)]
pub struct ExportCallbacks {
    slots: HashMap<EventId, ExportCallback>,
}

impl ExportCallbacks {
    /// No callbacks installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the callback for `event`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `event` is not an exported event of `ty`.
    pub fn register<S>(
        &mut self,
        ty: &MonitorType<S>,
        event: &str,
        callback: impl FnMut(&Identity, &[Value], &Aux) -> RvResult<()> + 'static,
    ) -> RvResult<()> {
        let id = ty.event_id(event)?;
        let direction = ty
            .event(id)
            .map(EventDef::direction)
            .ok_or_else(|| RvError::unknown("event", event))?;
        if direction != EventDirection::Exported {
            return Err(ValidationError::WrongDirection {
                event: event.to_string(),
                direction,
                action: "exported",
            }
            .into());
        }
        self.slots.insert(id, Box::new(callback));
        Ok(())
    }

    /// Removes the callback for `event`. Returns true if one was installed.
    pub fn unregister(&mut self, event: EventId) -> bool {
        self.slots.remove(&event).is_some()
    }

    /// Returns true if `event` has a callback.
    #[must_use]
    pub fn is_registered(&self, event: EventId) -> bool {
        self.slots.contains_key(&event)
    }
}

impl Exporter for ExportCallbacks {
    fn export(&mut self, event: ExportedEvent<'_>) -> RvResult<()> {
        match self.slots.get_mut(&event.event) {
            Some(callback) => callback(event.identity, event.params, event.aux),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::value::ValueKind;

    #[derive(Debug, Default)]
    struct Vars;

    fn ty() -> std::sync::Arc<MonitorType<Vars>> {
        MonitorType::builder("M")
            .identity([ValueKind::Int])
            .imported("input", 0)
            .exported("alarm", 1)
            .build()
            .unwrap()
    }

    #[test]
    fn test_unregistered_slot_is_noop() {
        let ty = ty();
        let identity = Identity::new(vec![Value::Int(1)]);
        let mut callbacks = ExportCallbacks::new();
        let event = ExportedEvent {
            monitor: ty.name(),
            event: ty.event_id("alarm").unwrap(),
            name: "alarm",
            identity: &identity,
            params: &[Value::Int(2)],
            aux: &Aux::none(),
        };
        assert!(callbacks.export(event).is_ok());
        assert!(NoExport.export(event).is_ok());
    }

    #[test]
    fn test_register_and_unregister() {
        let ty = ty();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut callbacks = ExportCallbacks::new();
        callbacks
            .register(&ty, "alarm", move |identity, params, _aux| {
                sink.borrow_mut().push((identity.clone(), params.to_vec()));
                Ok(())
            })
            .unwrap();

        let alarm = ty.event_id("alarm").unwrap();
        assert!(callbacks.is_registered(alarm));
        let identity = Identity::new(vec![Value::Int(1)]);
        let event = ExportedEvent {
            monitor: ty.name(),
            event: alarm,
            name: "alarm",
            identity: &identity,
            params: &[Value::Int(2)],
            aux: &Aux::none(),
        };
        callbacks.export(event).unwrap();
        assert_eq!(seen.borrow().len(), 1);

        assert!(callbacks.unregister(alarm));
        callbacks.export(event).unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_register_rejects_non_exported() {
        let ty = ty();
        let mut callbacks = ExportCallbacks::new();
        let err = callbacks.register(&ty, "input", |_, _, _| Ok(())).unwrap_err();
        assert!(err.is_validation());
        assert!(callbacks.register(&ty, "missing", |_, _, _| Ok(())).is_err());
    }
}
