//! Local wrapper: every instance of one monitor type.
//!
//! Routes an imported event to the instances matching an identity pattern,
//! creating the instance on the fly when a fully specified identity has none
//! yet. Singleton types (empty identity) hold their one instance from the
//! start.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::MapConfig;
use crate::error::{ExecutionError, Failures, RvResult, ValidationError};
use crate::event::{Aux, EventDirection, EventId};
use crate::identity::{Identity, KeyMask};
use crate::map::{InstanceId, InstanceStore};
use crate::monitor::{Disposition, EventDef, Exporter, Monitor, MonitorType};
use crate::value::Value;

/// All instances of one monitor type.
pub struct LocalWrapper<S> {
    ty: Arc<MonitorType<S>>,
    store: InstanceStore<Monitor<S>>,
}

impl<S> LocalWrapper<S> {
    /// Creates a wrapper with the maps declared by the type.
    #[must_use]
    pub fn new(ty: Arc<MonitorType<S>>, config: MapConfig) -> Self {
        Self::with_keys(ty, &[], config)
    }

    /// Creates a wrapper with extra map keys on top of the declared ones.
    #[must_use]
    pub fn with_keys(ty: Arc<MonitorType<S>>, extra: &[KeyMask], config: MapConfig) -> Self {
        let keys: Vec<KeyMask> = ty.keys().iter().chain(extra).copied().collect();
        let mut store = InstanceStore::new(ty.arity(), &keys, config);
        if ty.is_singleton() {
            store.insert(Monitor::new(Arc::clone(&ty), Identity::empty()));
        }
        Self { ty, store }
    }

    /// Type of every instance.
    #[must_use]
    pub fn monitor_type(&self) -> &Arc<MonitorType<S>> {
        &self.ty
    }

    /// Number of live instances.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no instance is live.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The instance maps, for inspection.
    #[must_use]
    pub const fn store(&self) -> &InstanceStore<Monitor<S>> {
        &self.store
    }

    /// Creates an instance at `identity` with `state`, unless one exists.
    ///
    /// # Errors
    ///
    /// Returns a validation error for wildcards, wrong arity or wrong kinds.
    pub fn create(&mut self, identity: Identity, state: S) -> RvResult<()> {
        self.ty.check_identity(&identity, false)?;
        if self.store.find(&identity).is_some() {
            trace!(monitor = self.ty.name(), %identity, "instance already exists");
            return Ok(());
        }
        debug!(monitor = self.ty.name(), %identity, "instance created");
        self.store
            .insert(Monitor::init_with_state(Arc::clone(&self.ty), identity, state));
        Ok(())
    }

    /// Creates an instance with the type's default state, unless one exists.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create).
    pub fn create_default(&mut self, identity: Identity) -> RvResult<()> {
        let state = self.ty.default_state();
        self.create(identity, state)
    }

    /// Instances matching `pattern`.
    ///
    /// A fully specified pattern with no match creates the instance, so the
    /// result is never empty in that case.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the pattern does not fit the identity.
    pub fn get_monitors(&mut self, pattern: &[Value]) -> RvResult<Vec<InstanceId>> {
        self.ty.check_identity(pattern, true)?;
        let found = self.store.lookup(pattern);
        if !found.is_empty() || pattern.iter().any(Value::is_wildcard) {
            return Ok(found);
        }
        let identity = Identity::from(pattern);
        debug!(monitor = self.ty.name(), %identity, "dynamic instantiation");
        let id = self
            .store
            .insert(Monitor::new(Arc::clone(&self.ty), identity));
        Ok(vec![id])
    }

    /// Delivers an imported event to every instance matching `pattern`.
    ///
    /// Every target is tried; failures are collected and returned together.
    /// Instances that end in final states are recycled.
    ///
    /// # Errors
    ///
    /// Returns validation errors for a bad event or pattern, otherwise the
    /// failures of individual instances.
    pub fn process(
        &mut self,
        event: EventId,
        pattern: &[Value],
        params: &[Value],
        aux: &Aux,
        exporter: &mut dyn Exporter,
    ) -> RvResult<()> {
        let def = self.ty.check_params(event, params)?;
        if def.direction() != EventDirection::Imported {
            return Err(ValidationError::WrongDirection {
                event: def.name().to_string(),
                direction: def.direction(),
                action: "imported",
            }
            .into());
        }

        let targets = self.get_monitors(pattern)?;
        trace!(
            monitor = self.ty.name(),
            event = event.index(),
            targets = targets.len(),
            "dispatch"
        );

        let mut failures = Failures::new();
        for id in targets {
            let Some(monitor) = self.store.get_mut(id) else {
                failures.push(
                    ExecutionError::StaleInstance {
                        monitor: self.ty.name().to_string(),
                    }
                    .into(),
                );
                continue;
            };
            let finished = match monitor.execute(event, params, aux, exporter) {
                Ok(disposition) => disposition == Disposition::Recycle,
                Err(err) => {
                    failures.push(err);
                    monitor.is_final()
                }
            };
            if finished {
                self.recycle(id);
            }
        }
        failures.into_result()
    }

    /// Removes an instance from every map and returns it.
    pub fn recycle(&mut self, id: InstanceId) -> Option<Monitor<S>> {
        let monitor = self.store.remove(id)?;
        debug!(monitor = self.ty.name(), identity = %monitor.identity(), "instance recycled");
        Some(monitor)
    }

    /// Returns true if an instance lives at exactly `identity`.
    #[must_use]
    pub fn contains(&self, identity: &[Value]) -> bool {
        self.store.find(identity).is_some()
    }

    /// Instance at exactly `identity`.
    #[must_use]
    pub fn monitor(&self, identity: &[Value]) -> Option<&Monitor<S>> {
        self.store.find(identity).and_then(|id| self.store.get(id))
    }

    /// Mutable access to the instance at exactly `identity`.
    pub fn monitor_mut(&mut self, identity: &[Value]) -> Option<&mut Monitor<S>> {
        let id = self.store.find(identity)?;
        self.store.get_mut(id)
    }

    /// Snapshot of every live identity.
    #[must_use]
    pub fn identities(&self) -> Vec<Identity> {
        self.store
            .iter()
            .map(|(_, monitor)| monitor.identity().clone())
            .collect()
    }

    /// Drops every instance and returns how many there were.
    pub fn clear(&mut self) -> usize {
        let dropped = self.store.drain().len();
        debug!(monitor = self.ty.name(), dropped, "wrapper cleared");
        dropped
    }
}

/// Type-erased view of a [`LocalWrapper`] used by a synchronous set.
pub trait LocalHandle {
    /// Monitor type name.
    fn name(&self) -> &str;

    /// Identity arity.
    fn arity(&self) -> usize;

    /// Declared event by name.
    fn event(&self, name: &str) -> Option<(EventId, &EventDef)>;

    /// See [`LocalWrapper::process`].
    ///
    /// # Errors
    ///
    /// As [`LocalWrapper::process`].
    fn process(
        &mut self,
        event: EventId,
        pattern: &[Value],
        params: &[Value],
        aux: &Aux,
        exporter: &mut dyn Exporter,
    ) -> RvResult<()>;

    /// See [`LocalWrapper::create_default`].
    ///
    /// # Errors
    ///
    /// As [`LocalWrapper::create_default`].
    fn create_default(&mut self, identity: Identity) -> RvResult<()>;

    /// Live instance count.
    fn len(&self) -> usize;

    /// Returns true if no instance is live.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every instance.
    fn clear(&mut self) -> usize;

    /// Downcasting support.
    fn as_any(&self) -> &dyn Any;

    /// Downcasting support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: 'static> LocalHandle for LocalWrapper<S> {
    fn name(&self) -> &str {
        self.ty.name()
    }

    fn arity(&self) -> usize {
        self.ty.arity()
    }

    fn event(&self, name: &str) -> Option<(EventId, &EventDef)> {
        let id = self.ty.event_id(name).ok()?;
        self.ty.event(id).map(|def| (id, def))
    }

    fn process(
        &mut self,
        event: EventId,
        pattern: &[Value],
        params: &[Value],
        aux: &Aux,
        exporter: &mut dyn Exporter,
    ) -> RvResult<()> {
        Self::process(self, event, pattern, params, aux, exporter)
    }

    fn create_default(&mut self, identity: Identity) -> RvResult<()> {
        Self::create_default(self, identity)
    }

    fn len(&self) -> usize {
        Self::len(self)
    }

    fn clear(&mut self) -> usize {
        Self::clear(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
