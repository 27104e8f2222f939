//! System router.
//!
//! Connects the output channels of synchronous sets to input channels of
//! other sets, or to sinks outside the system. Events crossing sets go
//! through one FIFO so a set never runs re-entrantly from inside another
//! set's import.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::error::{Failures, RvError, RvResult, ValidationError};
use crate::event::Aux;
use crate::identity::Identity;
use crate::queue::GlobalEventQueue;
use crate::value::Value;
use crate::wrapper::global::{callback_failed, ChannelId, InterCallback, OutputId, SyncSet};

/// A set registered in a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Port {
    set: usize,
    output: OutputId,
}

/// Where a queued system event is headed.
#[derive(Debug, Clone, Copy)]
enum Hop {
    /// Produced on an output; fans out over its links.
    Output(Port),
    /// Environment input for one set.
    Input { set: usize, channel: ChannelId },
}

#[derive(Debug, Clone, Copy)]
enum Link {
    Set { set: usize, channel: ChannelId },
    Sink(usize),
}

/// Synchronous sets wired output-to-input.
#[derive(Default)]
pub struct System {
    sets: Vec<SyncSet>,
    names: HashMap<String, usize>,
    queue: Rc<RefCell<GlobalEventQueue<Hop>>>,
    links: HashMap<Port, Vec<Link>>,
    sinks: Vec<InterCallback>,
}

impl System {
    /// An empty system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a set under its own name.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a set with the same name exists.
    pub fn add_set(&mut self, set: SyncSet) -> RvResult<SetId> {
        if self.names.contains_key(set.name()) {
            return Err(ValidationError::Duplicate {
                what: "set",
                name: set.name().to_string(),
            }
            .into());
        }
        let id = self.sets.len();
        self.names.insert(set.name().to_string(), id);
        debug!(set = set.name(), "set added to system");
        self.sets.push(set);
        Ok(SetId(id))
    }

    /// Id of the set registered under `name`.
    #[must_use]
    pub fn set_id(&self, name: &str) -> Option<SetId> {
        self.names.get(name).copied().map(SetId)
    }

    /// The set behind `id`.
    #[must_use]
    pub fn set(&self, id: SetId) -> Option<&SyncSet> {
        self.sets.get(id.0)
    }

    /// Mutable [`set`](Self::set).
    #[must_use]
    pub fn set_mut(&mut self, id: SetId) -> Option<&mut SyncSet> {
        self.sets.get_mut(id.0)
    }

    /// Feeds output `output` of `from` into input channel `channel` of `to`.
    ///
    /// The receiving set gets the producing monitor's identity along with
    /// the parameters, so its routes can read it with
    /// [`Source::Identity`](crate::wrapper::Source::Identity).
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown sets, outputs or channels.
    pub fn connect(&mut self, from: SetId, output: &str, to: SetId, channel: &str) -> RvResult<()> {
        let target = self.require(to)?;
        let channel = target
            .channel(channel)
            .ok_or_else(|| RvError::unknown("channel", format!("{}.{channel}", target.name())))?;
        self.link(from, output, Link::Set { set: to.0, channel })
    }

    /// Hands output `output` of `from` to `callback`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown sets or outputs.
    pub fn sink(
        &mut self,
        from: SetId,
        output: &str,
        callback: impl FnMut(&Identity, &[Value], &Aux) -> RvResult<()> + 'static,
    ) -> RvResult<()> {
        let index = self.sinks.len();
        self.link(from, output, Link::Sink(index))?;
        self.sinks.push(Box::new(callback));
        Ok(())
    }

    fn require(&self, id: SetId) -> RvResult<&SyncSet> {
        self.sets
            .get(id.0)
            .ok_or_else(|| RvError::unknown("set", format!("#{}", id.0)))
    }

    fn link(&mut self, from: SetId, output: &str, link: Link) -> RvResult<()> {
        let source = self
            .sets
            .get_mut(from.0)
            .ok_or_else(|| RvError::unknown("set", format!("#{}", from.0)))?;
        let output_id = source
            .output(output)
            .ok_or_else(|| RvError::unknown("output", format!("{}.{output}", source.name())))?;
        let port = Port {
            set: from.0,
            output: output_id,
        };
        if !self.links.contains_key(&port) {
            let queue = Rc::clone(&self.queue);
            source.set_callback(output, move |identity, params, aux| {
                queue
                    .borrow_mut()
                    .push(Hop::Output(port), Some(identity.clone()), params.to_vec(), aux.clone());
                Ok(())
            })?;
        }
        trace!(set = source.name(), output, ?link, "link added");
        self.links.entry(port).or_default().push(link);
        Ok(())
    }

    /// Queues environment input for channel `channel` of `set` without
    /// running anything; [`handle_queue`](Self::handle_queue) delivers it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown sets or channels.
    pub fn enqueue(&mut self, set: SetId, channel: &str, params: Vec<Value>, aux: Aux) -> RvResult<()> {
        let target = self.require(set)?;
        let channel = target
            .channel(channel)
            .ok_or_else(|| RvError::unknown("channel", format!("{}.{channel}", target.name())))?;
        self.queue
            .borrow_mut()
            .push(Hop::Input { set: set.0, channel }, None, params, aux);
        Ok(())
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Imports into one set, then routes everything it produced.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown sets, otherwise every failure
    /// collected across the system once all queues are empty.
    pub fn import(&mut self, set: &str, channel: &str, params: &[Value], aux: &Aux) -> RvResult<()> {
        let index = *self
            .names
            .get(set)
            .ok_or_else(|| RvError::unknown("set", set))?;
        let mut failures = Failures::new();
        failures.record(self.sets[index].import(channel, None, params, aux));
        failures.record(self.handle_queue());
        failures.into_result()
    }

    /// Delivers queued input and inter-set events until none remain.
    ///
    /// # Errors
    ///
    /// Returns every delivery failure, after the queue is empty.
    pub fn handle_queue(&mut self) -> RvResult<()> {
        let mut failures = Failures::new();
        loop {
            let next = self.queue.borrow_mut().pop();
            let Some(event) = next else {
                break;
            };
            let port = match event.channel {
                Hop::Output(port) => port,
                Hop::Input { set, channel } => {
                    let result = match self.sets.get_mut(set) {
                        Some(target) => target.import_id(channel, None, &event.params, &event.aux),
                        None => Err(RvError::internal(format!("set index {set} out of range"))),
                    };
                    if let Err(err) = result {
                        warn!(error = %err, set, "queued input failed");
                        failures.push(err);
                    }
                    continue;
                }
            };
            let Some(links) = self.links.get(&port) else {
                continue;
            };
            let identity = event.identities.unwrap_or_default();
            for link in links {
                let result = match *link {
                    Link::Set { set, channel } => {
                        self.sets[set].import_id(channel, Some(identity.values()), &event.params, &event.aux)
                    }
                    Link::Sink(index) => match self.sinks.get_mut(index) {
                        Some(sink) => sink(&identity, &event.params, &event.aux).map_err(|err| {
                            let output = self.sets[port.set].output_name(port.output).unwrap_or_default();
                            callback_failed(output.to_string(), &err)
                        }),
                        None => Err(RvError::internal(format!("sink index {index} out of range"))),
                    },
                };
                if let Err(err) = result {
                    warn!(error = %err, ?link, "inter-set delivery failed");
                    failures.push(err);
                }
            }
        }
        failures.into_result()
    }

    /// Clears every set and drops pending inter-set events.
    pub fn clear(&mut self) {
        for set in &mut self.sets {
            set.clear();
        }
        self.queue.borrow_mut().clear();
    }
}
