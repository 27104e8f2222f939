//! Synchronous sets.
//!
//! A [`SyncSet`] groups monitor types that exchange events synchronously.
//! Input channels route environment events into local wrappers. Exported
//! events are copied onto the intra queue when another monitor of the set
//! consumes them, and onto the inter queue when they leave the set. Every
//! import settles the intra queue completely before any inter event is
//! handed to its callback.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::RuntimeConfig;
use crate::error::{ExecutionError, Failures, RvError, RvResult, ValidationError};
use crate::event::{Aux, EventDirection, EventId};
use crate::identity::{Identity, KeyMask};
use crate::monitor::{EventDef, ExportedEvent, Exporter, Monitor, MonitorType};
use crate::queue::GlobalEventQueue;
use crate::value::Value;
use crate::wrapper::local::{LocalHandle, LocalWrapper};

/// Where one value of a routed event comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// Position of the raising monitor's identity.
    Identity(usize),
    /// Parameter of the source event.
    Param(usize),
    /// Wildcard; only meaningful in identity patterns.
    Wildcard,
    /// A fixed value.
    Const(Value),
}

impl Source {
    /// A constant `Null` is a wildcard too.
    const fn is_concrete(&self) -> bool {
        !matches!(self, Self::Wildcard | Self::Const(Value::Null))
    }
}

/// Delivery of a channel to one imported event of one monitor type.
///
/// Without explicit sources the identity pattern is all wildcards and the
/// parameters are the source parameters in order.
#[derive(Debug, Clone)]
pub struct Route {
    monitor: String,
    event: String,
    identity: Option<Vec<Source>>,
    params: Option<Vec<Source>>,
}

impl Route {
    /// Delivery to imported event `event` of monitor type `monitor`.
    #[must_use]
    pub fn to(monitor: &str, event: &str) -> Self {
        Self {
            monitor: monitor.to_string(),
            event: event.to_string(),
            identity: None,
            params: None,
        }
    }

    /// Sources of the target identity pattern, one per identity position.
    ///
    /// [`Source::Identity`] reads the identity of the raising monitor. On an
    /// input channel that is the identity handed to
    /// [`SyncSet::import`], present when another set produced the event.
    #[must_use]
    pub fn identity(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.identity = Some(sources.into_iter().collect());
        self
    }

    /// Sources of the target event parameters.
    #[must_use]
    pub fn params(mut self, sources: impl IntoIterator<Item = Source>) -> Self {
        self.params = Some(sources.into_iter().collect());
        self
    }
}

/// Resolved input channel of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(usize);

/// Resolved output channel of a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(usize);

/// Callback receiving the events of one output channel.
pub type InterCallback = Box<dyn FnMut(&Identity, &[Value], &Aux) -> RvResult<()>>;

#[derive(Debug)]
struct ResolvedRoute {
    monitor: usize,
    event: EventId,
    identity: Vec<Source>,
    params: Vec<Source>,
}

#[derive(Debug)]
struct Connection {
    name: String,
    /// Monitor and event feeding an intra connection; `None` for input.
    source: Option<(usize, EventId)>,
    routes: Vec<ResolvedRoute>,
}

#[derive(Debug, Clone, Copy)]
enum Destination {
    Intra(usize),
    Inter(usize),
}

#[derive(Debug, Default)]
struct Wiring {
    connections: Vec<Connection>,
    connection_index: HashMap<String, usize>,
    outputs: Vec<String>,
    output_index: HashMap<String, usize>,
    exports: HashMap<(usize, EventId), Vec<Destination>>,
}

#[derive(Debug, Default)]
struct Queues {
    intra: GlobalEventQueue<usize>,
    inter: GlobalEventQueue<usize>,
}

/// Exporter handed to monitors while the set routes an event.
struct Raiser<'a> {
    wiring: &'a Wiring,
    queues: &'a mut Queues,
    monitor: usize,
}

impl Exporter for Raiser<'_> {
    fn export(&mut self, event: ExportedEvent<'_>) -> RvResult<()> {
        let Some(destinations) = self.wiring.exports.get(&(self.monitor, event.event)) else {
            trace!(monitor = event.monitor, event = event.name, "exported event has no destination");
            return Ok(());
        };
        for destination in destinations {
            let (queue, channel) = match *destination {
                Destination::Intra(channel) => (&mut self.queues.intra, channel),
                Destination::Inter(channel) => (&mut self.queues.inter, channel),
            };
            queue.push(
                channel,
                Some(event.identity.clone()),
                event.params.to_vec(),
                event.aux.clone(),
            );
        }
        Ok(())
    }
}

/// Monitor types exchanging events synchronously.
pub struct SyncSet {
    name: String,
    monitors: Vec<Box<dyn LocalHandle>>,
    monitor_index: HashMap<String, usize>,
    wiring: Wiring,
    queues: Queues,
    callbacks: Vec<Option<InterCallback>>,
}

impl SyncSet {
    /// Starts a set definition.
    #[must_use]
    pub fn builder(name: &str) -> SyncSetBuilder {
        SyncSetBuilder::new(name)
    }

    /// Name of the set.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input channel by name.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<ChannelId> {
        let index = *self.wiring.connection_index.get(name)?;
        self.wiring.connections[index]
            .source
            .is_none()
            .then_some(ChannelId(index))
    }

    /// Output channel by name.
    #[must_use]
    pub fn output(&self, name: &str) -> Option<OutputId> {
        self.wiring.output_index.get(name).copied().map(OutputId)
    }

    /// Name of a resolved output channel.
    #[must_use]
    pub fn output_name(&self, output: OutputId) -> Option<&str> {
        self.wiring.outputs.get(output.0).map(String::as_str)
    }

    /// Names of the output channels.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.wiring.outputs.iter().map(String::as_str)
    }

    /// Routes an event into the set and settles every queue.
    ///
    /// `identities` is `None` for events from the environment and carries
    /// the raising monitor's identity for events produced by another set.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown channels. Otherwise returns
    /// every failure collected while routing and draining, after the queues
    /// are empty.
    pub fn import(&mut self, channel: &str, identities: Option<&[Value]>, params: &[Value], aux: &Aux) -> RvResult<()> {
        let id = self
            .channel(channel)
            .ok_or_else(|| RvError::unknown("channel", format!("{}.{channel}", self.name)))?;
        self.import_id(id, identities, params, aux)
    }

    /// [`import`](Self::import) with a resolved channel.
    ///
    /// # Errors
    ///
    /// As [`import`](Self::import).
    pub fn import_id(&mut self, channel: ChannelId, identities: Option<&[Value]>, params: &[Value], aux: &Aux) -> RvResult<()> {
        let mut failures = Failures::new();
        failures.record(route(
            &self.wiring,
            &mut self.monitors,
            &mut self.queues,
            channel.0,
            identities,
            params,
            aux,
        ));
        failures.record(self.handle_queues());
        failures.into_result()
    }

    /// Drains the intra queue, then the inter queue.
    ///
    /// # Errors
    ///
    /// Returns the collected failures once both queues are empty.
    pub fn handle_queues(&mut self) -> RvResult<()> {
        let mut failures = Failures::new();
        failures.record(self.handle_intra());
        failures.record(self.handle_inter());
        failures.into_result()
    }

    fn handle_intra(&mut self) -> RvResult<()> {
        let mut failures = Failures::new();
        while let Some(event) = self.queues.intra.pop() {
            failures.record(route(
                &self.wiring,
                &mut self.monitors,
                &mut self.queues,
                event.channel,
                event.identities.as_deref(),
                &event.params,
                &event.aux,
            ));
        }
        failures.into_result()
    }

    fn handle_inter(&mut self) -> RvResult<()> {
        let mut failures = Failures::new();
        while let Some(event) = self.queues.inter.pop() {
            let Some(Some(callback)) = self.callbacks.get_mut(event.channel) else {
                trace!(set = %self.name, output = event.channel, "no callback, event dropped");
                continue;
            };
            let identity = event.identities.unwrap_or_default();
            if let Err(err) = callback(&identity, &event.params, &event.aux) {
                let channel = self.wiring.outputs.get(event.channel).cloned().unwrap_or_default();
                failures.push(callback_failed(channel, &err));
            }
        }
        failures.into_result()
    }

    /// Installs the callback of an output channel.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown outputs.
    pub fn set_callback(
        &mut self,
        output: &str,
        callback: impl FnMut(&Identity, &[Value], &Aux) -> RvResult<()> + 'static,
    ) -> RvResult<()> {
        let id = self.require_output(output)?;
        self.callbacks[id.0] = Some(Box::new(callback));
        Ok(())
    }

    /// Removes the callback of an output channel; its events are dropped.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown outputs.
    pub fn clear_callback(&mut self, output: &str) -> RvResult<()> {
        let id = self.require_output(output)?;
        self.callbacks[id.0] = None;
        Ok(())
    }

    fn require_output(&self, output: &str) -> RvResult<OutputId> {
        self.output(output)
            .ok_or_else(|| RvError::unknown("output", format!("{}.{output}", self.name)))
    }

    /// Wrapper of monitor type `monitor` with state type `S`.
    #[must_use]
    pub fn local<S: 'static>(&self, monitor: &str) -> Option<&LocalWrapper<S>> {
        let index = *self.monitor_index.get(monitor)?;
        self.monitors[index].as_any().downcast_ref()
    }

    /// Mutable [`local`](Self::local).
    #[must_use]
    pub fn local_mut<S: 'static>(&mut self, monitor: &str) -> Option<&mut LocalWrapper<S>> {
        let index = *self.monitor_index.get(monitor)?;
        self.monitors[index].as_any_mut().downcast_mut()
    }

    /// Creates an instance with an explicit initial state.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown monitors, a state type that is
    /// not the monitor's, or an invalid identity.
    pub fn create<S: 'static>(&mut self, monitor: &str, identity: Identity, state: S) -> RvResult<()> {
        let set = self.name.clone();
        self.local_mut::<S>(monitor)
            .ok_or_else(|| RvError::unknown("monitor", format!("{set}.{monitor}")))?
            .create(identity, state)
    }

    /// Runs `f` on the instance at exactly `identity`, if any.
    pub fn with_monitor<S: 'static, R>(
        &self,
        monitor: &str,
        identity: &[Value],
        f: impl FnOnce(&Monitor<S>) -> R,
    ) -> Option<R> {
        self.local::<S>(monitor)?.monitor(identity).map(f)
    }

    /// Live instances of a monitor type.
    #[must_use]
    pub fn instance_count(&self, monitor: &str) -> Option<usize> {
        let index = *self.monitor_index.get(monitor)?;
        Some(self.monitors[index].len())
    }

    /// Drops every instance and pending event.
    pub fn clear(&mut self) {
        for monitor in &mut self.monitors {
            monitor.clear();
        }
        self.queues.intra.clear();
        self.queues.inter.clear();
    }
}

impl fmt::Debug for SyncSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let monitors: Vec<&str> = self.monitors.iter().map(|m| m.name()).collect();
        f.debug_struct("SyncSet")
            .field("name", &self.name)
            .field("monitors", &monitors)
            .field("wiring", &self.wiring)
            .finish_non_exhaustive()
    }
}

fn route(
    wiring: &Wiring,
    monitors: &mut [Box<dyn LocalHandle>],
    queues: &mut Queues,
    channel: usize,
    identities: Option<&[Value]>,
    params: &[Value],
    aux: &Aux,
) -> RvResult<()> {
    let connection = wiring
        .connections
        .get(channel)
        .ok_or_else(|| RvError::internal(format!("channel index {channel} out of range")))?;
    trace!(channel = %connection.name, routes = connection.routes.len(), "route");

    let mut failures = Failures::new();
    for route in &connection.routes {
        let projected = project(&connection.name, &route.identity, identities, params).and_then(|pattern| {
            let values = project(&connection.name, &route.params, identities, params)?;
            Ok((pattern, values))
        });
        let Some((pattern, values)) = failures.record(projected) else {
            continue;
        };
        let Some(local) = monitors.get_mut(route.monitor) else {
            failures.push(RvError::internal(format!("monitor index {} out of range", route.monitor)));
            continue;
        };
        let mut raiser = Raiser {
            wiring,
            queues: &mut *queues,
            monitor: route.monitor,
        };
        failures.record(local.process(route.event, &pattern, &values, aux, &mut raiser));
    }
    failures.into_result()
}

/// Wraps the failure of an output callback with the channel it served.
pub(crate) fn callback_failed(channel: String, err: &RvError) -> RvError {
    ExecutionError::CallbackFailed {
        channel,
        message: err.to_string(),
    }
    .into()
}

fn project(channel: &str, sources: &[Source], identities: Option<&[Value]>, params: &[Value]) -> RvResult<Vec<Value>> {
    sources
        .iter()
        .map(|source| match source {
            Source::Identity(index) => {
                let identities = identities.ok_or_else(|| {
                    RvError::from(ExecutionError::MissingIdentities {
                        channel: channel.to_string(),
                    })
                })?;
                pick(channel, "identity", identities, *index)
            }
            Source::Param(index) => pick(channel, "parameter", params, *index),
            Source::Wildcard => Ok(Value::Null),
            Source::Const(value) => Ok(value.clone()),
        })
        .collect()
}

fn pick(channel: &str, what: &'static str, values: &[Value], index: usize) -> RvResult<Value> {
    values.get(index).cloned().ok_or_else(|| {
        ExecutionError::SourceOutOfRange {
            channel: channel.to_string(),
            what,
            index,
            len: values.len(),
        }
        .into()
    })
}

type WrapperFactory = Box<dyn FnOnce(&[KeyMask], RuntimeConfig) -> Box<dyn LocalHandle>>;

struct PendingMonitor {
    name: String,
    arity: usize,
    events: Vec<EventDef>,
    factory: WrapperFactory,
}

impl PendingMonitor {
    fn event(&self, name: &str) -> Option<(EventId, &EventDef)> {
        let index = self.events.iter().position(|e| e.name() == name)?;
        let id = EventId::new(u16::try_from(index).ok()?);
        Some((id, &self.events[index]))
    }
}

struct PendingConnection {
    name: String,
    source: Option<(String, String)>,
    route: Route,
}

/// Builder of a [`SyncSet`].
pub struct SyncSetBuilder {
    name: String,
    config: RuntimeConfig,
    monitors: Vec<PendingMonitor>,
    connections: Vec<PendingConnection>,
    outputs: Vec<(String, String, String)>,
}

impl SyncSetBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            config: RuntimeConfig::default(),
            monitors: Vec::new(),
            connections: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Map tuning for every wrapper of the set.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a monitor type to the set.
    #[must_use]
    pub fn monitor<S: 'static>(mut self, ty: Arc<MonitorType<S>>) -> Self {
        let name = ty.name().to_string();
        let arity = ty.arity();
        let events = ty.events().to_vec();
        let factory: WrapperFactory = Box::new(move |keys: &[KeyMask], config: RuntimeConfig| -> Box<dyn LocalHandle> {
            Box::new(LocalWrapper::with_keys(ty, keys, config.map))
        });
        self.monitors.push(PendingMonitor {
            name,
            arity,
            events,
            factory,
        });
        self
    }

    /// Routes input channel `channel` to `route`. Repeat to fan out.
    #[must_use]
    pub fn import(mut self, channel: &str, route: Route) -> Self {
        self.connections.push(PendingConnection {
            name: channel.to_string(),
            source: None,
            route,
        });
        self
    }

    /// Feeds exported event `event` of `monitor` through intra channel
    /// `channel` to `route`. Repeat to fan out.
    #[must_use]
    pub fn connect(mut self, monitor: &str, event: &str, channel: &str, route: Route) -> Self {
        self.connections.push(PendingConnection {
            name: channel.to_string(),
            source: Some((monitor.to_string(), event.to_string())),
            route,
        });
        self
    }

    /// Sends exported event `event` of `monitor` out of the set on `output`.
    #[must_use]
    pub fn export(mut self, monitor: &str, event: &str, output: &str) -> Self {
        self.outputs
            .push((monitor.to_string(), event.to_string(), output.to_string()));
        self
    }

    fn invalid_route(channel: &str, reason: impl Into<String>) -> RvError {
        ValidationError::InvalidRoute {
            channel: channel.to_string(),
            reason: reason.into(),
        }
        .into()
    }

    fn exported_event(&self, monitor: &str, event: &str) -> RvResult<(usize, EventId, usize)> {
        let (index, pending) = self
            .monitors
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == monitor)
            .ok_or_else(|| RvError::unknown("monitor", monitor))?;
        let (id, def) = pending
            .event(event)
            .ok_or_else(|| RvError::unknown("event", format!("{monitor}.{event}")))?;
        if def.direction() != EventDirection::Exported {
            return Err(ValidationError::WrongDirection {
                event: format!("{monitor}.{event}"),
                direction: def.direction(),
                action: "exported",
            }
            .into());
        }
        Ok((index, id, def.arity()))
    }

    /// Resolves every name, validates routes and builds the wrappers.
    ///
    /// # Errors
    ///
    /// Returns a validation error for duplicate or unknown names, routes of
    /// the wrong shape and sources that cannot exist. Identity sources on
    /// input channels are checked when an event arrives, since their arity
    /// depends on the producing set.
    pub fn build(self) -> RvResult<SyncSet> {
        let mut monitor_index = HashMap::new();
        for (i, pending) in self.monitors.iter().enumerate() {
            if monitor_index.insert(pending.name.clone(), i).is_some() {
                return Err(ValidationError::Duplicate {
                    what: "monitor",
                    name: pending.name.clone(),
                }
                .into());
            }
        }

        let mut wiring = Wiring::default();
        let mut keys: Vec<Vec<KeyMask>> = vec![Vec::new(); self.monitors.len()];

        for pending in &self.connections {
            let source = match &pending.source {
                Some((monitor, event)) => {
                    let (index, id, arity) = self.exported_event(monitor, event)?;
                    Some((index, id, self.monitors[index].arity, arity))
                }
                None => None,
            };
            let source_key = source.map(|(monitor, event, _, _)| (monitor, event));

            let connection = match wiring.connection_index.get(&pending.name) {
                Some(&existing) => {
                    if wiring.connections[existing].source != source_key {
                        return Err(ValidationError::Duplicate {
                            what: "channel",
                            name: pending.name.clone(),
                        }
                        .into());
                    }
                    existing
                }
                None => {
                    let index = wiring.connections.len();
                    wiring.connections.push(Connection {
                        name: pending.name.clone(),
                        source: source_key,
                        routes: Vec::new(),
                    });
                    wiring.connection_index.insert(pending.name.clone(), index);
                    if let Some(key) = source_key {
                        wiring
                            .exports
                            .entry(key)
                            .or_default()
                            .push(Destination::Intra(index));
                    }
                    index
                }
            };

            let route = &pending.route;
            let target = *monitor_index
                .get(&route.monitor)
                .ok_or_else(|| RvError::unknown("monitor", route.monitor.clone()))?;
            let target_monitor = &self.monitors[target];
            let (event, def) = target_monitor
                .event(&route.event)
                .ok_or_else(|| RvError::unknown("event", format!("{}.{}", route.monitor, route.event)))?;
            if def.direction() != EventDirection::Imported {
                return Err(Self::invalid_route(
                    &pending.name,
                    format!("{}.{} is not an imported event", route.monitor, route.event),
                ));
            }

            let identity = route
                .identity
                .clone()
                .unwrap_or_else(|| vec![Source::Wildcard; target_monitor.arity]);
            let params = route
                .params
                .clone()
                .unwrap_or_else(|| (0..def.arity()).map(Source::Param).collect());
            if identity.len() != target_monitor.arity {
                return Err(Self::invalid_route(
                    &pending.name,
                    format!("{} identity sources for arity {}", identity.len(), target_monitor.arity),
                ));
            }
            if params.len() != def.arity() {
                return Err(Self::invalid_route(
                    &pending.name,
                    format!("{} parameter sources for arity {}", params.len(), def.arity()),
                ));
            }
            for src in identity.iter().chain(&params) {
                match (src, source) {
                    (Source::Identity(i), Some((_, _, arity, _))) if *i >= arity => {
                        return Err(Self::invalid_route(&pending.name, format!("identity position {i} out of range")));
                    }
                    (Source::Param(i), Some((_, _, _, arity))) if *i >= arity => {
                        return Err(Self::invalid_route(&pending.name, format!("parameter {i} out of range")));
                    }
                    _ => {}
                }
            }

            keys[target].push(KeyMask::from_positions(
                identity
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.is_concrete())
                    .map(|(i, _)| i),
            ));
            wiring.connections[connection].routes.push(ResolvedRoute {
                monitor: target,
                event,
                identity,
                params,
            });
        }

        for (monitor, event, output) in &self.outputs {
            let (index, id, _) = self.exported_event(monitor, event)?;
            let output_index = match wiring.output_index.get(output) {
                Some(&existing) => existing,
                None => {
                    let next = wiring.outputs.len();
                    wiring.outputs.push(output.clone());
                    wiring.output_index.insert(output.clone(), next);
                    next
                }
            };
            wiring
                .exports
                .entry((index, id))
                .or_default()
                .push(Destination::Inter(output_index));
        }

        let config = self.config;
        let monitors: Vec<Box<dyn LocalHandle>> = self
            .monitors
            .into_iter()
            .zip(&keys)
            .map(|(pending, keys)| (pending.factory)(keys.as_slice(), config.clone()))
            .collect();
        let callbacks = (0..wiring.outputs.len()).map(|_| None).collect();

        debug!(
            set = %self.name,
            monitors = monitors.len(),
            channels = wiring.connections.len(),
            outputs = wiring.outputs.len(),
            "sync set built"
        );
        Ok(SyncSet {
            name: self.name,
            monitors,
            monitor_index,
            wiring,
            queues: Queues::default(),
            callbacks,
        })
    }
}
