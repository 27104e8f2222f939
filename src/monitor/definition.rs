//! Monitor type definitions.
//!
//! A [`MonitorType`] is the static description shared by every instance of a
//! monitor: identity shape, declared events, scenarios with their transition
//! tables, the map keys routing needs and the default state record. It is
//! assembled with [`MonitorTypeBuilder`], which resolves every state and
//! event name once so execution only deals in indices.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RvError, RvResult, ValidationError};
use crate::event::{EventDirection, EventId};
use crate::identity::{Identity, KeyMask};
use crate::value::{Value, ValueKind};

/// Transition guard over state variables and the triggering event.
pub type Guard<S> = Arc<dyn Fn(&S, &Context<'_>) -> bool + Send + Sync>;
/// State variable update.
pub type Action<S> = Arc<dyn Fn(&mut S, &Context<'_>) + Send + Sync>;
/// Computes the parameters of a raised event.
pub type Emit<S> = Arc<dyn Fn(&S, &Context<'_>) -> Vec<Value> + Send + Sync>;
/// Observer of events dropped because no guard held.
pub type UnmatchedHook = Arc<dyn Fn(&Unmatched<'_>) + Send + Sync>;

type StateFactory<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Maximum scenarios per monitor type; one flag bit each.
pub const MAX_SCENARIOS: usize = 64;

static NULL: Value = Value::Null;

/// What a guard or action sees of the event being handled.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    identity: &'a Identity,
    params: &'a [Value],
}

impl<'a> Context<'a> {
    pub(crate) const fn new(identity: &'a Identity, params: &'a [Value]) -> Self {
        Self { identity, params }
    }

    /// Identity of the instance handling the event.
    #[must_use]
    pub const fn identity(&self) -> &'a Identity {
        self.identity
    }

    /// Event parameters.
    #[must_use]
    pub const fn params(&self) -> &'a [Value] {
        self.params
    }

    /// Parameter at `index`, or `Null` when out of range.
    #[must_use]
    pub fn param(&self, index: usize) -> &'a Value {
        self.params.get(index).unwrap_or(&NULL)
    }

    /// Integer parameter at `index`; `None` if absent or of another kind.
    #[must_use]
    pub fn int(&self, index: usize) -> Option<i64> {
        self.param(index).as_int()
    }

    /// Float parameter at `index`.
    #[must_use]
    pub fn float(&self, index: usize) -> Option<f64> {
        self.param(index).as_float()
    }

    /// String parameter at `index`.
    #[must_use]
    pub fn str(&self, index: usize) -> Option<&'a str> {
        self.param(index).as_str()
    }
}

/// An event handled by a scenario while no branch guard held.
#[derive(Debug)]
pub struct Unmatched<'a> {
    /// Monitor type name.
    pub monitor: &'a str,
    /// Scenario whose guards all failed.
    pub scenario: &'a str,
    /// State the scenario stayed in.
    pub state: &'a str,
    /// Event being handled.
    pub event: &'a str,
    /// Instance identity.
    pub identity: &'a Identity,
    /// Event parameters.
    pub params: &'a [Value],
}

/// Index of a state within its scenario. State 0 is initial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u16);

impl StateId {
    /// The initial state of every scenario.
    pub const INITIAL: Self = Self(0);

    /// Position in the scenario's state list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

pub(crate) enum Step<S> {
    Assign(Action<S>),
    Raise { event: EventId, params: Emit<S> },
}

pub(crate) struct Branch<S> {
    pub(crate) guard: Option<Guard<S>>,
    pub(crate) steps: Vec<Step<S>>,
    pub(crate) target: StateId,
}

/// A declared event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDef {
    name: String,
    direction: EventDirection,
    arity: usize,
}

impl EventDef {
    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Imported, internal or exported.
    #[must_use]
    pub const fn direction(&self) -> EventDirection {
        self.direction
    }

    /// Number of parameters.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }
}

/// A resolved scenario: its states and transition table.
pub struct Scenario<S> {
    name: String,
    states: Vec<String>,
    finals: Vec<bool>,
    transitions: HashMap<(StateId, EventId), Vec<Branch<S>>>,
}

impl<S> Scenario<S> {
    /// Scenario name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// State names; index 0 is initial.
    #[must_use]
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// Name of `state`, or `"?"` if it is out of range.
    #[must_use]
    pub fn state_name(&self, state: StateId) -> &str {
        self.states.get(state.index()).map_or("?", String::as_str)
    }

    /// Resolves a state by name.
    #[must_use]
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(StateId)
    }

    /// Returns true if `state` is declared final.
    #[must_use]
    pub fn is_final(&self, state: StateId) -> bool {
        self.finals.get(state.index()).copied().unwrap_or(false)
    }

    /// Returns true if `event` has a transition out of `state`.
    #[must_use]
    pub fn handles(&self, state: StateId, event: EventId) -> bool {
        self.transitions.contains_key(&(state, event))
    }

    pub(crate) fn branches(&self, state: StateId, event: EventId) -> Option<&[Branch<S>]> {
        self.transitions.get(&(state, event)).map(Vec::as_slice)
    }
}

impl<S> fmt::Debug for Scenario<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

/// Static description of a monitor type.
pub struct MonitorType<S> {
    name: String,
    identity: Vec<ValueKind>,
    events: Vec<EventDef>,
    event_index: HashMap<String, EventId>,
    scenarios: Vec<Scenario<S>>,
    keys: Vec<KeyMask>,
    has_finals: bool,
    default_state: StateFactory<S>,
    on_unmatched: Option<UnmatchedHook>,
}

impl<S> MonitorType<S> {
    /// Starts a definition.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> MonitorTypeBuilder<S> {
        MonitorTypeBuilder::new(name)
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity length.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.identity.len()
    }

    /// Kind of each identity position.
    #[must_use]
    pub fn identity_kinds(&self) -> &[ValueKind] {
        &self.identity
    }

    /// A type with an empty identity has exactly one instance.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.identity.is_empty()
    }

    /// Declared events; an [`EventId`] indexes this slice.
    #[must_use]
    pub fn events(&self) -> &[EventDef] {
        &self.events
    }

    /// Declaration of `id`.
    #[must_use]
    pub fn event(&self, id: EventId) -> Option<&EventDef> {
        self.events.get(id.index())
    }

    /// Resolves an event by name.
    ///
    /// # Errors
    ///
    /// Returns a validation error for undeclared names.
    pub fn event_id(&self, name: &str) -> RvResult<EventId> {
        self.event_index
            .get(name)
            .copied()
            .ok_or_else(|| RvError::unknown("event", format!("{}.{name}", self.name)))
    }

    /// Scenarios in declaration order.
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario<S>] {
        &self.scenarios
    }

    /// Position of the scenario called `name`.
    #[must_use]
    pub fn scenario_index(&self, name: &str) -> Option<usize> {
        self.scenarios.iter().position(|s| s.name == name)
    }

    /// Partial identity projections the instance maps are keyed on.
    #[must_use]
    pub fn keys(&self) -> &[KeyMask] {
        &self.keys
    }

    /// Returns true if any scenario declares a final state.
    #[must_use]
    pub const fn has_final_states(&self) -> bool {
        self.has_finals
    }

    /// A fresh state record for a new instance.
    #[must_use]
    pub fn default_state(&self) -> S {
        (self.default_state)()
    }

    pub(crate) fn on_unmatched(&self) -> Option<&UnmatchedHook> {
        self.on_unmatched.as_ref()
    }

    /// Checks arity and kinds of an identity.
    ///
    /// `Null` is accepted in any position only when `allow_wildcards` is set.
    /// A NaN float is always rejected: it could never be found again.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first mismatch.
    pub fn check_identity(&self, identity: &[Value], allow_wildcards: bool) -> RvResult<()> {
        if identity.len() != self.identity.len() {
            return Err(ValidationError::IdentityArity {
                monitor: self.name.clone(),
                expected: self.identity.len(),
                actual: identity.len(),
            }
            .into());
        }
        for (position, (value, kind)) in identity.iter().zip(&self.identity).enumerate() {
            if value.is_wildcard() {
                if allow_wildcards {
                    continue;
                }
                return Err(ValidationError::WildcardIdentity {
                    identity: Identity::from(identity).to_string(),
                }
                .into());
            }
            if value.is_nan() {
                return Err(ValidationError::NanIdentity {
                    monitor: self.name.clone(),
                    position,
                }
                .into());
            }
            if value.kind() != *kind {
                return Err(ValidationError::IdentityKind {
                    monitor: self.name.clone(),
                    position,
                    expected: *kind,
                    actual: value.kind(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Checks the parameter count of an event.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown events or a wrong count.
    pub fn check_params(&self, event: EventId, params: &[Value]) -> RvResult<&EventDef> {
        let def = self
            .event(event)
            .ok_or_else(|| RvError::unknown("event", format!("{}#{}", self.name, event.index())))?;
        if params.len() != def.arity {
            return Err(ValidationError::ParamArity {
                event: def.name.clone(),
                expected: def.arity,
                actual: params.len(),
            }
            .into());
        }
        Ok(def)
    }
}

impl<S> fmt::Debug for MonitorType<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorType")
            .field("name", &self.name)
            .field("identity", &self.identity)
            .field("events", &self.events)
            .field("scenarios", &self.scenarios)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

enum StepSpec<S> {
    Assign(Action<S>),
    Raise(String, Emit<S>),
}

struct BranchSpec<S> {
    guard: Option<Guard<S>>,
    steps: Vec<StepSpec<S>>,
    target: Option<String>,
}

impl<S> BranchSpec<S> {
    const fn empty() -> Self {
        Self {
            guard: None,
            steps: Vec::new(),
            target: None,
        }
    }

    fn is_pristine(&self) -> bool {
        self.guard.is_none() && self.steps.is_empty() && self.target.is_none()
    }
}

/// One `(state, event)` entry of a transition table, as a chain of
/// `when` / `otherwise` branches. Written through [`ScenarioBuilder::on`],
/// which fixes the state type before any closure is seen.
///
/// ```
/// use rvmon::monitor::MonitorType;
///
/// #[derive(Default)]
/// struct Counter { hits: i64 }
///
/// let ty = MonitorType::<Counter>::builder("Counter")
///     .imported("ping", 0)
///     .exported("overflow", 1)
///     .scenario("main", |sc| {
///         sc.states(["idle", "full"]).on("idle", "ping", |t| {
///             t.when(|s, _| s.hits < 3)
///                 .assign(|s, _| s.hits += 1)
///                 .otherwise()
///                 .raise("overflow", |s, _| vec![s.hits.into()])
///                 .to("full")
///         })
///     })
///     .build();
/// assert!(ty.is_ok());
/// ```
pub struct Transition<S> {
    from: Vec<String>,
    event: String,
    branches: Vec<BranchSpec<S>>,
}

impl<S> Transition<S> {
    fn new(from: Vec<String>, event: &str) -> Self {
        Self {
            from,
            event: event.to_string(),
            branches: vec![BranchSpec::empty()],
        }
    }

    fn current(&mut self) -> &mut BranchSpec<S> {
        if self.branches.is_empty() {
            self.branches.push(BranchSpec::empty());
        }
        let last = self.branches.len() - 1;
        &mut self.branches[last]
    }

    /// Guards a new branch, or the first one if nothing was added to it yet.
    #[must_use]
    pub fn when(mut self, guard: impl Fn(&S, &Context<'_>) -> bool + Send + Sync + 'static) -> Self {
        if !self.current().is_pristine() {
            self.branches.push(BranchSpec::empty());
        }
        self.current().guard = Some(Arc::new(guard));
        self
    }

    /// Starts the unguarded branch taken when no earlier guard held.
    #[must_use]
    pub fn otherwise(mut self) -> Self {
        self.branches.push(BranchSpec::empty());
        self
    }

    /// Appends a state update to the current branch.
    #[must_use]
    pub fn assign(mut self, action: impl Fn(&mut S, &Context<'_>) + Send + Sync + 'static) -> Self {
        self.current().steps.push(StepSpec::Assign(Arc::new(action)));
        self
    }

    /// Appends a raise of `event` with computed parameters.
    #[must_use]
    pub fn raise(
        mut self,
        event: &str,
        params: impl Fn(&S, &Context<'_>) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        self.current()
            .steps
            .push(StepSpec::Raise(event.to_string(), Arc::new(params)));
        self
    }

    /// Appends a raise of a parameterless event.
    #[must_use]
    pub fn emit(self, event: &str) -> Self {
        self.raise(event, |_, _| Vec::new())
    }

    /// Sets the target state of the current branch.
    #[must_use]
    pub fn to(mut self, state: &str) -> Self {
        self.current().target = Some(state.to_string());
        self
    }
}

/// Builder of one scenario.
pub struct ScenarioBuilder<S> {
    name: String,
    states: Vec<String>,
    finals: Vec<String>,
    transitions: Vec<Transition<S>>,
}

impl<S> ScenarioBuilder<S> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
            finals: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Declares the states; the first is initial.
    #[must_use]
    pub fn states<'a>(mut self, states: impl IntoIterator<Item = &'a str>) -> Self {
        self.states.extend(states.into_iter().map(str::to_string));
        self
    }

    /// Marks states as final.
    #[must_use]
    pub fn finals<'a>(mut self, states: impl IntoIterator<Item = &'a str>) -> Self {
        self.finals.extend(states.into_iter().map(str::to_string));
        self
    }

    /// Adds the transition out of `from` on `event`.
    #[must_use]
    pub fn on(self, from: &str, event: &str, build: impl FnOnce(Transition<S>) -> Transition<S>) -> Self {
        self.on_each([from], event, build)
    }

    /// Adds the same transition out of each of several states. A branch
    /// without an explicit target stays in whichever state it left.
    #[must_use]
    pub fn on_each<'a>(
        mut self,
        from: impl IntoIterator<Item = &'a str>,
        event: &str,
        build: impl FnOnce(Transition<S>) -> Transition<S>,
    ) -> Self {
        let from = from.into_iter().map(str::to_string).collect();
        self.transitions.push(build(Transition::new(from, event)));
        self
    }
}

/// Builder of a [`MonitorType`].
pub struct MonitorTypeBuilder<S> {
    name: String,
    identity: Vec<ValueKind>,
    events: Vec<EventDef>,
    scenarios: Vec<ScenarioBuilder<S>>,
    keys: Vec<Vec<usize>>,
    default_state: Option<StateFactory<S>>,
    on_unmatched: Option<UnmatchedHook>,
}

impl<S> MonitorTypeBuilder<S> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: Vec::new(),
            events: Vec::new(),
            scenarios: Vec::new(),
            keys: Vec::new(),
            default_state: None,
            on_unmatched: None,
        }
    }

    /// Declares the identity kinds. Leave empty for a singleton type.
    #[must_use]
    pub fn identity(mut self, kinds: impl IntoIterator<Item = ValueKind>) -> Self {
        self.identity = kinds.into_iter().collect();
        self
    }

    fn declare(mut self, name: &str, direction: EventDirection, arity: usize) -> Self {
        self.events.push(EventDef {
            name: name.to_string(),
            direction,
            arity,
        });
        self
    }

    /// Declares an event delivered from outside.
    #[must_use]
    pub fn imported(self, name: &str, arity: usize) -> Self {
        self.declare(name, EventDirection::Imported, arity)
    }

    /// Declares an event raised and handled inside one instance.
    #[must_use]
    pub fn internal(self, name: &str, arity: usize) -> Self {
        self.declare(name, EventDirection::Internal, arity)
    }

    /// Declares an event raised for the outside.
    #[must_use]
    pub fn exported(self, name: &str, arity: usize) -> Self {
        self.declare(name, EventDirection::Exported, arity)
    }

    /// Adds a map keyed on `positions` of the identity, for patterns that
    /// leave the other positions wildcarded. An empty list keys the map that
    /// holds every instance in one bucket.
    #[must_use]
    pub fn multicast_key(mut self, positions: impl IntoIterator<Item = usize>) -> Self {
        self.keys.push(positions.into_iter().collect());
        self
    }

    /// Overrides `S::default()` as the state of new instances.
    #[must_use]
    pub fn default_state(mut self, factory: impl Fn() -> S + Send + Sync + 'static) -> Self {
        self.default_state = Some(Arc::new(factory));
        self
    }

    /// Observes events dropped because every guard of a transition failed.
    #[must_use]
    pub fn on_unmatched(mut self, hook: impl Fn(&Unmatched<'_>) + Send + Sync + 'static) -> Self {
        self.on_unmatched = Some(Arc::new(hook));
        self
    }

    /// Adds a scenario. States are declared first, the first being initial.
    #[must_use]
    pub fn scenario(
        mut self,
        name: impl Into<String>,
        build: impl FnOnce(ScenarioBuilder<S>) -> ScenarioBuilder<S>,
    ) -> Self {
        self.scenarios.push(build(ScenarioBuilder::new(name)));
        self
    }

    fn limit(&self, what: &'static str, count: usize, max: usize) -> RvResult<()> {
        if count > max {
            return Err(ValidationError::LimitExceeded {
                monitor: self.name.clone(),
                what,
                count,
                max,
            }
            .into());
        }
        Ok(())
    }
}

impl<S: Default + 'static> MonitorTypeBuilder<S> {
    /// Resolves names and validates the definition.
    ///
    /// # Errors
    ///
    /// Returns a validation error for duplicate or unknown names, limits
    /// exceeded, raises of imported events or branches that can never run.
    pub fn build(self) -> RvResult<Arc<MonitorType<S>>> {
        self.limit("identity positions", self.identity.len(), KeyMask::MAX_ARITY)?;
        self.limit("events", self.events.len(), usize::from(u16::MAX))?;
        self.limit("scenarios", self.scenarios.len(), MAX_SCENARIOS)?;

        let mut event_index = HashMap::new();
        for (i, def) in self.events.iter().enumerate() {
            let id = EventId::new(u16::try_from(i).map_err(|_| RvError::internal("event index overflow"))?);
            if event_index.insert(def.name.clone(), id).is_some() {
                return Err(ValidationError::Duplicate {
                    what: "event",
                    name: def.name.clone(),
                }
                .into());
            }
        }

        let arity = self.identity.len();
        let mut keys = Vec::with_capacity(self.keys.len());
        for positions in &self.keys {
            if let Some(&bad) = positions.iter().find(|&&p| p >= arity) {
                return Err(ValidationError::IdentityArity {
                    monitor: self.name.clone(),
                    expected: arity,
                    actual: bad + 1,
                }
                .into());
            }
            keys.push(KeyMask::from_positions(positions.iter().copied()));
        }

        let mut scenarios: Vec<Scenario<S>> = Vec::with_capacity(self.scenarios.len());
        for spec in &self.scenarios {
            if scenarios.iter().any(|s| s.name == spec.name) {
                return Err(ValidationError::Duplicate {
                    what: "scenario",
                    name: spec.name.clone(),
                }
                .into());
            }
            scenarios.push(resolve_scenario(spec, &self.events, &event_index)?);
        }
        let has_finals = scenarios.iter().any(|s| s.finals.iter().any(|f| *f));

        Ok(Arc::new(MonitorType {
            name: self.name,
            identity: self.identity,
            events: self.events,
            event_index,
            scenarios,
            keys,
            has_finals,
            default_state: self
                .default_state
                .unwrap_or_else(|| -> StateFactory<S> { Arc::new(S::default) }),
            on_unmatched: self.on_unmatched,
        }))
    }
}

fn resolve_scenario<S>(
    spec: &ScenarioBuilder<S>,
    events: &[EventDef],
    event_index: &HashMap<String, EventId>,
) -> RvResult<Scenario<S>> {
    if spec.states.is_empty() {
        return Err(ValidationError::EmptyScenario {
            scenario: spec.name.clone(),
        }
        .into());
    }
    if spec.states.len() > usize::from(u16::MAX) {
        return Err(ValidationError::LimitExceeded {
            monitor: spec.name.clone(),
            what: "states",
            count: spec.states.len(),
            max: usize::from(u16::MAX),
        }
        .into());
    }

    let mut state_index: HashMap<&str, StateId> = HashMap::new();
    for (i, name) in spec.states.iter().enumerate() {
        let id = StateId(u16::try_from(i).map_err(|_| RvError::internal("state index overflow"))?);
        if state_index.insert(name.as_str(), id).is_some() {
            return Err(ValidationError::Duplicate {
                what: "state",
                name: format!("{}.{name}", spec.name),
            }
            .into());
        }
    }
    let state = |name: &str| -> RvResult<StateId> {
        state_index
            .get(name)
            .copied()
            .ok_or_else(|| RvError::unknown("state", format!("{}.{name}", spec.name)))
    };

    let mut finals = vec![false; spec.states.len()];
    for name in &spec.finals {
        finals[state(name)?.index()] = true;
    }

    let mut transitions = HashMap::new();
    for transition in &spec.transitions {
        let event = *event_index
            .get(&transition.event)
            .ok_or_else(|| RvError::unknown("event", transition.event.clone()))?;
        let invalid = |from: &str, reason: &str| -> RvError {
            ValidationError::InvalidTransition {
                scenario: spec.name.clone(),
                state: from.to_string(),
                event: transition.event.clone(),
                reason: reason.to_string(),
            }
            .into()
        };

        for from_name in &transition.from {
            let from = state(from_name)?;
            let mut branches = Vec::with_capacity(transition.branches.len());
            for (i, branch) in transition.branches.iter().enumerate() {
                if branch.guard.is_none() && i + 1 < transition.branches.len() {
                    return Err(invalid(from_name, "unguarded branch is followed by unreachable branches"));
                }
                let mut steps = Vec::with_capacity(branch.steps.len());
                for step in &branch.steps {
                    steps.push(match step {
                        StepSpec::Assign(action) => Step::Assign(Arc::clone(action)),
                        StepSpec::Raise(name, params) => {
                            let raised = *event_index
                                .get(name)
                                .ok_or_else(|| RvError::unknown("event", name.clone()))?;
                            let direction = events[raised.index()].direction;
                            if !direction.is_raisable() {
                                return Err(ValidationError::WrongDirection {
                                    event: name.clone(),
                                    direction,
                                    action: "raised",
                                }
                                .into());
                            }
                            Step::Raise {
                                event: raised,
                                params: Arc::clone(params),
                            }
                        }
                    });
                }
                let target = match &branch.target {
                    Some(name) => state(name)?,
                    None => from,
                };
                branches.push(Branch {
                    guard: branch.guard.clone(),
                    steps,
                    target,
                });
            }
            if transitions.insert((from, event), branches).is_some() {
                return Err(invalid(from_name, "declared twice"));
            }
        }
    }

    Ok(Scenario {
        name: spec.name.clone(),
        states: spec.states.clone(),
        finals,
        transitions,
    })
}
