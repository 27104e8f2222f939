//! Monitor instances and the scenario engine.
//!
//! Handling an imported event is one macro-step: every scenario takes at most
//! one transition for the imported event, then the instance queue is drained,
//! each raised event being offered to the scenarios that have not yet fired in
//! this macro-step. Exported events additionally go to the exporter. The
//! scenario flags are cleared once the queue is empty.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{ExecutionError, Failures, RvError, RvResult, ValidationError};
use crate::event::{Aux, EventDirection, EventId};
use crate::identity::Identity;
use crate::map::Keyed;
use crate::monitor::definition::{Context, MonitorType, StateId, Step, Unmatched};
use crate::monitor::export::{ExportedEvent, Exporter};
use crate::queue::EventQueue;
use crate::value::Value;

/// What the owner should do with an instance after a macro-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the instance.
    Keep,
    /// Every scenario reached a final state; the instance can be dropped.
    Recycle,
}

/// One monitor instance: identity, scenario states, state variables and the
/// queue of raised events.
pub struct Monitor<S> {
    ty: Arc<MonitorType<S>>,
    identity: Identity,
    states: Vec<StateId>,
    fired: u64,
    vars: S,
    queue: EventQueue,
}

impl<S> Monitor<S> {
    /// Creates an instance with the type's default state.
    #[must_use]
    pub fn new(ty: Arc<MonitorType<S>>, identity: Identity) -> Self {
        let vars = ty.default_state();
        Self::init_with_state(ty, identity, vars)
    }

    /// Creates an instance with every scenario in its initial state.
    #[must_use]
    pub fn init_with_state(ty: Arc<MonitorType<S>>, identity: Identity, vars: S) -> Self {
        let states = vec![StateId::INITIAL; ty.scenarios().len()];
        Self {
            ty,
            identity,
            states,
            fired: 0,
            vars,
            queue: EventQueue::new(),
        }
    }

    /// Type this instance was created from.
    #[must_use]
    pub fn monitor_type(&self) -> &Arc<MonitorType<S>> {
        &self.ty
    }

    /// Identity the instance is stored under.
    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The state record.
    #[must_use]
    pub const fn vars(&self) -> &S {
        &self.vars
    }

    /// Mutable access to the state record.
    pub fn vars_mut(&mut self) -> &mut S {
        &mut self.vars
    }

    /// Current state of a scenario, by scenario name.
    #[must_use]
    pub fn state(&self, scenario: &str) -> Option<&str> {
        let index = self.ty.scenario_index(scenario)?;
        let state = *self.states.get(index)?;
        Some(self.ty.scenarios()[index].state_name(state))
    }

    /// Returns true if every scenario sits in a final state.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.ty.has_final_states()
            && self
                .ty
                .scenarios()
                .iter()
                .zip(&self.states)
                .all(|(scenario, state)| scenario.is_final(*state))
    }

    /// Number of raised events not yet handled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Handles an imported event as one macro-step.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `event` is not an imported event of this
    /// type or has the wrong arity. Otherwise returns every failure collected
    /// while draining the queue; the instance may then be partially updated.
    pub fn execute(
        &mut self,
        event: EventId,
        params: &[Value],
        aux: &Aux,
        exporter: &mut dyn Exporter,
    ) -> RvResult<Disposition> {
        let def = self.ty.check_params(event, params)?;
        if def.direction() != EventDirection::Imported {
            return Err(ValidationError::WrongDirection {
                event: def.name().to_string(),
                direction: def.direction(),
                action: "imported",
            }
            .into());
        }

        let mut failures = Failures::new();
        failures.record(self.run_scenarios(event, params, aux));
        failures.record(self.handle_queue(exporter));
        failures.into_result()?;

        if self.is_final() {
            Ok(Disposition::Recycle)
        } else {
            Ok(Disposition::Keep)
        }
    }

    /// Queues a raised event for the current macro-step.
    ///
    /// # Errors
    ///
    /// Returns an execution error for imported events or a wrong arity.
    pub fn queue(&mut self, event: EventId, params: Vec<Value>, aux: Aux) -> RvResult<()> {
        check_raise(&self.ty, event, &params)?;
        self.queue.push(event, params, aux);
        Ok(())
    }

    /// Runs the transition of every scenario that has not fired yet.
    fn run_scenarios(&mut self, event: EventId, params: &[Value], aux: &Aux) -> RvResult<()> {
        let ty = Arc::clone(&self.ty);
        let mut failures = Failures::new();

        for (index, scenario) in ty.scenarios().iter().enumerate() {
            let bit = 1_u64 << index;
            if self.fired & bit != 0 {
                continue;
            }
            let state = self.states[index];
            let Some(branches) = scenario.branches(state, event) else {
                continue;
            };

            let ctx = Context::new(&self.identity, params);
            let Some(branch) = branches
                .iter()
                .find(|b| b.guard.as_ref().map_or(true, |guard| guard(&self.vars, &ctx)))
            else {
                let event_name = ty.event(event).map_or("?", |d| d.name());
                trace!(
                    monitor = ty.name(),
                    scenario = scenario.name(),
                    state = scenario.state_name(state),
                    event = event_name,
                    "no guard held, event dropped"
                );
                if let Some(hook) = ty.on_unmatched() {
                    hook(&Unmatched {
                        monitor: ty.name(),
                        scenario: scenario.name(),
                        state: scenario.state_name(state),
                        event: event_name,
                        identity: &self.identity,
                        params,
                    });
                }
                continue;
            };

            for step in &branch.steps {
                match step {
                    Step::Assign(action) => action(&mut self.vars, &ctx),
                    Step::Raise { event: raised, params: emit } => {
                        let values = emit(&self.vars, &ctx);
                        if failures.record(check_raise(&ty, *raised, &values)).is_some() {
                            self.queue.push(*raised, values, aux.clone());
                        }
                    }
                }
            }

            trace!(
                monitor = ty.name(),
                scenario = scenario.name(),
                from = scenario.state_name(state),
                to = scenario.state_name(branch.target),
                "transition"
            );
            self.states[index] = branch.target;
            self.fired |= bit;
        }

        failures.into_result()
    }

    /// Drains the queue, then clears the scenario flags.
    fn handle_queue(&mut self, exporter: &mut dyn Exporter) -> RvResult<()> {
        let ty = Arc::clone(&self.ty);
        let mut failures = Failures::new();
        while let Some(entry) = self.queue.pop() {
            let Some(def) = ty.event(entry.event) else {
                failures.push(RvError::internal("queued event is not declared"));
                continue;
            };
            trace!(monitor = ty.name(), event = def.name(), "queue pop");
            match def.direction() {
                EventDirection::Internal => {
                    failures.record(self.run_scenarios(entry.event, &entry.params, &entry.aux));
                }
                EventDirection::Exported => {
                    failures.record(self.run_scenarios(entry.event, &entry.params, &entry.aux));
                    failures.record(self.export(entry.event, &entry.params, &entry.aux, exporter));
                }
                EventDirection::Imported => {
                    failures.push(RvError::internal("imported event found in instance queue"));
                }
            }
        }
        self.fired = 0;
        failures.into_result()
    }

    /// Hands an exported event to `exporter`.
    fn export(&self, event: EventId, params: &[Value], aux: &Aux, exporter: &mut dyn Exporter) -> RvResult<()> {
        let name = self.ty.event(event).map_or("?", |d| d.name());
        exporter.export(ExportedEvent {
            monitor: self.ty.name(),
            event,
            name,
            identity: &self.identity,
            params,
            aux,
        })
    }
}

/// Rejects raises of imported events and raises with the wrong arity.
fn check_raise<S>(ty: &MonitorType<S>, event: EventId, params: &[Value]) -> RvResult<()> {
    let def = ty
        .event(event)
        .ok_or_else(|| RvError::internal("raised event is not declared"))?;
    let reason = if !def.direction().is_raisable() {
        "imported events cannot be raised".to_string()
    } else if def.arity() != params.len() {
        format!("expected {} parameters, got {}", def.arity(), params.len())
    } else {
        return Ok(());
    };
    Err(ExecutionError::InvalidRaise {
        monitor: ty.name().to_string(),
        event: def.name().to_string(),
        reason,
    }
    .into())
}

impl<S> Keyed for Monitor<S> {
    fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl<S: fmt::Debug> fmt::Debug for Monitor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: Vec<&str> = self
            .ty
            .scenarios()
            .iter()
            .zip(&self.states)
            .map(|(scenario, state)| scenario.state_name(*state))
            .collect();
        f.debug_struct("Monitor")
            .field("type", &self.ty.name())
            .field("identity", &self.identity)
            .field("states", &states)
            .field("vars", &self.vars)
            .finish_non_exhaustive()
    }
}
