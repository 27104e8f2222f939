//! Instance slab plus every monitor map of one monitor type.
//!
//! Maps are populated in order: the wildcard-everything map (if any), the
//! partial-key maps, and last the map keyed on the full identity. Each
//! membership links back to the one inserted just before it, so removing an
//! instance from the full-identity map walks the chain through all of them.

use super::arena::{Arena, Handle};
use super::table::{IdentitySource, Link, MonitorMap};
use crate::config::MapConfig;
use crate::identity::{Identity, KeyMask};
use crate::value::{values_match, Value};

/// Handle of a live monitor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(pub(crate) Handle);

/// Anything stored by identity.
pub trait Keyed {
    /// Identity the value is stored under.
    fn identity(&self) -> &Identity;
}

struct Identities<'a, T>(&'a Arena<T>);

impl<T: Keyed> IdentitySource for Identities<'_, T> {
    fn identity_of(&self, instance: InstanceId) -> Option<&[Value]> {
        self.0.get(instance.0).map(|value| value.identity().values())
    }
}

/// Owns instances and keeps every map of their type in step.
#[derive(Debug)]
pub struct InstanceStore<T> {
    arity: usize,
    instances: Arena<T>,
    maps: Vec<MonitorMap>,
}

impl<T: Keyed> InstanceStore<T> {
    /// Creates a store for identities of `arity` values.
    ///
    /// `keys` lists the partial projections lookups will use; an empty mask
    /// yields the wildcard-everything map. Duplicates and masks covering the
    /// whole identity are folded into the full-identity map, which is always
    /// present.
    #[must_use]
    pub fn new(arity: usize, keys: &[KeyMask], config: MapConfig) -> Self {
        let all = KeyMask::all(arity);
        let mut partial: Vec<KeyMask> = keys
            .iter()
            .map(|key| key.intersect(all))
            .filter(|key| *key != all)
            .collect();
        partial.sort_by_key(|key| (key.count(), *key));
        partial.dedup();

        let mut maps: Vec<MonitorMap> = partial
            .into_iter()
            .map(|key| MonitorMap::new(key, config))
            .collect();
        maps.push(MonitorMap::new(all, config));
        Self {
            arity,
            instances: Arena::new(),
            maps,
        }
    }

    /// Length of every stored identity.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }

    /// Number of live instances.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if no instance is stored.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.instances.len() == 0
    }

    /// The maps in population order; the last one is keyed on the full
    /// identity.
    #[must_use]
    pub fn maps(&self) -> &[MonitorMap] {
        &self.maps
    }

    /// Stores `value` and registers it in every map.
    ///
    /// Does not check for an existing instance at the same identity; callers
    /// use [`find`](Self::find) first.
    pub fn insert(&mut self, value: T) -> InstanceId {
        let id = InstanceId(self.instances.insert(value));
        let source = Identities(&self.instances);
        let Some(identity) = self.instances.get(id.0).map(|v| v.identity().values()) else {
            return id;
        };
        let mut prev: Option<Link> = None;
        for (index, map) in self.maps.iter_mut().enumerate() {
            let member = map.insert(id, identity, prev, &source);
            prev = Some(Link { map: index, member });
        }
        id
    }

    /// Instance stored at exactly `identity`.
    #[must_use]
    pub fn find(&self, identity: &[Value]) -> Option<InstanceId> {
        let all = self.maps.last()?;
        all.lookup(identity, &Identities(&self.instances))
            .into_iter()
            .next()
    }

    /// Instances matching `pattern`, where `Null` positions are wildcards.
    ///
    /// Uses the most specific map whose key positions are all concrete in the
    /// pattern, filtering its bucket when that map is coarser than the
    /// pattern. Falls back to a scan when no map fits.
    #[must_use]
    pub fn lookup(&self, pattern: &[Value]) -> Vec<InstanceId> {
        let source = Identities(&self.instances);
        let concrete = KeyMask::concrete_positions(pattern);
        let best = self
            .maps
            .iter()
            .filter(|map| map.key().is_subset_of(concrete))
            .max_by_key(|map| map.key().count());

        match best {
            Some(map) if map.key() == concrete => map.lookup(pattern, &source),
            Some(map) => map
                .lookup(pattern, &source)
                .into_iter()
                .filter(|id| {
                    self.instances
                        .get(id.0)
                        .is_some_and(|v| values_match(pattern, v.identity()))
                })
                .collect(),
            None => self
                .instances
                .iter()
                .filter(|(_, v)| values_match(pattern, v.identity()))
                .map(|(handle, _)| InstanceId(handle))
                .collect(),
        }
    }

    /// The instance behind `id`, if it is still live.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&T> {
        self.instances.get(id.0)
    }

    /// Mutable access to a live instance.
    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut T> {
        self.instances.get_mut(id.0)
    }

    /// Returns true if `id` is still live.
    #[must_use]
    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.get(id.0).is_some()
    }

    /// Removes an instance from every map and hands it back.
    pub fn remove(&mut self, id: InstanceId) -> Option<T> {
        let source = Identities(&self.instances);
        let identity = self.instances.get(id.0)?.identity().values();
        let (all, rest) = self.maps.split_last_mut()?;
        let mut next = all
            .remove_instance(id, identity, &source)
            .and_then(|unlinked| unlinked.next);
        while let Some(link) = next {
            next = rest
                .get_mut(link.map)
                .and_then(|map| map.remove_member(link.member, identity, &source))
                .and_then(|unlinked| unlinked.next);
        }
        self.instances.remove(id.0)
    }

    /// Live instances in slab order.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &T)> {
        self.instances
            .iter()
            .map(|(handle, value)| (InstanceId(handle), value))
    }

    /// Empties every map and returns each instance exactly once.
    pub fn drain(&mut self) -> Vec<T> {
        for map in &mut self.maps {
            map.clear();
        }
        self.instances.take_all()
    }

    /// Verifies every map's layout and that each holds every instance once.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        for map in &self.maps {
            map.check_invariants()
                .map_err(|e| format!("map {}: {e}", map.key()))?;
            if map.member_count() != self.len() {
                return Err(format!(
                    "map {} holds {} members for {} instances",
                    map.key(),
                    map.member_count(),
                    self.len()
                ));
            }
        }
        Ok(())
    }
}
