//! Robin Hood hash table of monitor instances keyed on an identity projection.
//!
//! Each occupied bucket holds the key hash, its distance from the ideal slot
//! (`dib`, 1-based; 0 marks an empty bucket) and the head of a doubly-linked
//! list of members whose projected identities are equal. Members live in a
//! slab and each one links to the same instance's membership in the map that
//! was populated before this one, so a removal can walk every map.

use tracing::debug;

use super::arena::{Arena, Handle};
use super::hash::{key_hash, key_matches};
use super::store::InstanceId;
use crate::config::MapConfig;
use crate::identity::KeyMask;
use crate::value::Value;

/// Resolves an instance to its identity while a map is being searched.
pub(crate) trait IdentitySource {
    fn identity_of(&self, instance: InstanceId) -> Option<&[Value]>;
}

/// Handle of one membership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct MemberId(Handle);

/// Membership of an instance in another map of the same store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) map: usize,
    pub(crate) member: MemberId,
}

#[derive(Debug)]
struct Member {
    instance: InstanceId,
    prev: Option<MemberId>,
    next: Option<MemberId>,
    next_link: Option<Link>,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    hash: u64,
    dib: u32,
    head: Option<MemberId>,
}

impl Bucket {
    const EMPTY: Self = Self {
        hash: 0,
        dib: 0,
        head: None,
    };

    const fn is_empty(&self) -> bool {
        self.dib == 0
    }
}

/// What [`MonitorMap`] hands back when a membership is unlinked.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Unlinked {
    pub(crate) instance: InstanceId,
    pub(crate) next: Option<Link>,
}

/// One hash index over the instances of a monitor type.
#[derive(Debug)]
pub struct MonitorMap {
    key: KeyMask,
    config: MapConfig,
    table: Vec<Bucket>,
    members: Arena<Member>,
    buckets: usize,
    grow_at: usize,
    shrink_at: usize,
}

impl MonitorMap {
    pub(crate) fn new(key: KeyMask, config: MapConfig) -> Self {
        let config = config.validated();
        let capacity = config.min_capacity;
        Self {
            key,
            table: vec![Bucket::EMPTY; capacity],
            members: Arena::new(),
            buckets: 0,
            grow_at: config.grow_threshold(capacity),
            shrink_at: config.shrink_threshold(capacity),
            config,
        }
    }

    /// Identity positions this map hashes on.
    #[must_use]
    pub const fn key(&self) -> KeyMask {
        self.key
    }

    /// Number of table slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.len()
    }

    /// Number of distinct keys present.
    #[must_use]
    pub const fn bucket_count(&self) -> usize {
        self.buckets
    }

    /// Number of instances registered in this map.
    #[must_use]
    pub const fn member_count(&self) -> usize {
        self.members.len()
    }

    fn mask(&self) -> usize {
        self.table.len() - 1
    }

    #[allow(clippy::cast_possible_truncation)]
    fn ideal_slot(&self, hash: u64) -> usize {
        (hash & self.mask() as u64) as usize
    }

    fn head_matches<S: IdentitySource + ?Sized>(&self, bucket: &Bucket, pattern: &[Value], source: &S) -> bool {
        bucket
            .head
            .and_then(|head| self.members.get(head.0))
            .and_then(|member| source.identity_of(member.instance))
            .is_some_and(|identity| key_matches(self.key, pattern, identity))
    }

    /// Registers `instance` under its identity and returns the membership.
    pub(crate) fn insert<S: IdentitySource + ?Sized>(
        &mut self,
        instance: InstanceId,
        identity: &[Value],
        next_link: Option<Link>,
        source: &S,
    ) -> MemberId {
        if self.buckets >= self.grow_at {
            self.resize(self.capacity() * 2);
        }

        let hash = key_hash(self.key, identity);
        let member = MemberId(self.members.insert(Member {
            instance,
            prev: None,
            next: None,
            next_link,
        }));

        let mask = self.mask();
        let mut entry = Bucket {
            hash,
            dib: 1,
            head: Some(member),
        };
        let mut carrying_new = true;
        let mut i = self.ideal_slot(hash);
        loop {
            let slot = self.table[i];
            if slot.is_empty() {
                self.table[i] = entry;
                self.buckets += 1;
                return member;
            }
            if carrying_new && slot.hash == hash && self.head_matches(&slot, identity, source) {
                if let Some(old_head) = slot.head.and_then(|h| self.members.get_mut(h.0)) {
                    old_head.prev = Some(member);
                }
                if let Some(new_head) = self.members.get_mut(member.0) {
                    new_head.next = slot.head;
                }
                self.table[i].head = Some(member);
                return member;
            }
            if slot.dib < entry.dib {
                self.table[i] = entry;
                entry = slot;
                carrying_new = false;
            }
            i = (i + 1) & mask;
            entry.dib += 1;
        }
    }

    fn find_bucket<S: IdentitySource + ?Sized>(&self, pattern: &[Value], source: &S) -> Option<usize> {
        let hash = key_hash(self.key, pattern);
        let mask = self.mask();
        let mut i = self.ideal_slot(hash);
        let mut dib = 1;
        loop {
            let slot = &self.table[i];
            if slot.is_empty() || slot.dib < dib {
                return None;
            }
            if slot.hash == hash && self.head_matches(slot, pattern, source) {
                return Some(i);
            }
            i = (i + 1) & mask;
            dib += 1;
        }
    }

    /// Instances whose projected identity matches `pattern`, newest first.
    pub(crate) fn lookup<S: IdentitySource + ?Sized>(&self, pattern: &[Value], source: &S) -> Vec<InstanceId> {
        let mut found = Vec::new();
        let Some(i) = self.find_bucket(pattern, source) else {
            return found;
        };
        let mut cursor = self.table[i].head;
        while let Some(id) = cursor {
            let Some(member) = self.members.get(id.0) else {
                break;
            };
            found.push(member.instance);
            cursor = member.next;
        }
        found
    }

    /// Unlinks the membership of `instance`, located through its identity.
    pub(crate) fn remove_instance<S: IdentitySource + ?Sized>(
        &mut self,
        instance: InstanceId,
        identity: &[Value],
        source: &S,
    ) -> Option<Unlinked> {
        let bucket = self.find_bucket(identity, source)?;
        let mut cursor = self.table[bucket].head;
        while let Some(id) = cursor {
            let member = self.members.get(id.0)?;
            if member.instance == instance {
                return self.unlink(bucket, id);
            }
            cursor = member.next;
        }
        None
    }

    /// Unlinks a known membership. `identity` must be the member's identity.
    pub(crate) fn remove_member<S: IdentitySource + ?Sized>(
        &mut self,
        member: MemberId,
        identity: &[Value],
        source: &S,
    ) -> Option<Unlinked> {
        let bucket = self.find_bucket(identity, source)?;
        self.unlink(bucket, member)
    }

    fn unlink(&mut self, bucket: usize, id: MemberId) -> Option<Unlinked> {
        let removed = self.members.remove(id.0)?;
        match removed.prev.and_then(|p| self.members.get_mut(p.0)) {
            Some(prev) => prev.next = removed.next,
            None => self.table[bucket].head = removed.next,
        }
        if let Some(next) = removed.next.and_then(|n| self.members.get_mut(n.0)) {
            next.prev = removed.prev;
        }
        if self.table[bucket].head.is_none() {
            self.remove_bucket(bucket);
        }
        Some(Unlinked {
            instance: removed.instance,
            next: removed.next_link,
        })
    }

    /// Backward-shift deletion.
    fn remove_bucket(&mut self, mut i: usize) {
        let mask = self.mask();
        loop {
            let next = (i + 1) & mask;
            let candidate = self.table[next];
            if candidate.dib <= 1 {
                self.table[i] = Bucket::EMPTY;
                break;
            }
            self.table[i] = Bucket {
                dib: candidate.dib - 1,
                ..candidate
            };
            i = next;
        }
        self.buckets -= 1;

        if self.capacity() > self.config.min_capacity && self.buckets <= self.shrink_at {
            self.resize(self.capacity() / 2);
        }
    }

    fn resize(&mut self, capacity: usize) {
        let old = std::mem::replace(&mut self.table, vec![Bucket::EMPTY; capacity]);
        let mask = self.mask();
        for bucket in old.into_iter().filter(|b| !b.is_empty()) {
            let mut entry = Bucket { dib: 1, ..bucket };
            let mut i = self.ideal_slot(entry.hash);
            loop {
                let slot = self.table[i];
                if slot.is_empty() {
                    self.table[i] = entry;
                    break;
                }
                if slot.dib < entry.dib {
                    self.table[i] = entry;
                    entry = slot;
                }
                i = (i + 1) & mask;
                entry.dib += 1;
            }
        }
        self.grow_at = self.config.grow_threshold(capacity);
        self.shrink_at = self.config.shrink_threshold(capacity);
        debug!(key = %self.key, capacity, buckets = self.buckets, "monitor map resized");
    }

    /// Drops every bucket and membership.
    pub(crate) fn clear(&mut self) {
        self.table = vec![Bucket::EMPTY; self.config.min_capacity];
        self.members.take_all();
        self.buckets = 0;
        self.grow_at = self.config.grow_threshold(self.config.min_capacity);
        self.shrink_at = self.config.shrink_threshold(self.config.min_capacity);
    }

    /// Checks the Robin Hood layout and list linkage.
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        let mut occupied = 0;
        let mut listed = 0;
        for (i, bucket) in self.table.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            occupied += 1;
            let ideal = self.ideal_slot(bucket.hash);
            let distance = (i + self.capacity() - ideal) & self.mask();
            if bucket.dib as usize != distance + 1 {
                return Err(format!("slot {i}: dib {} but distance {}", bucket.dib, distance + 1));
            }
            let mut prev = None;
            let mut cursor = bucket.head;
            while let Some(id) = cursor {
                let member = self
                    .members
                    .get(id.0)
                    .ok_or_else(|| format!("slot {i}: dangling member"))?;
                if member.prev != prev {
                    return Err(format!("slot {i}: broken back link"));
                }
                listed += 1;
                prev = Some(id);
                cursor = member.next;
            }
            if prev.is_none() {
                return Err(format!("slot {i}: occupied bucket with empty list"));
            }
        }
        if occupied != self.buckets {
            return Err(format!("{occupied} occupied slots, counter says {}", self.buckets));
        }
        if listed != self.members.len() {
            return Err(format!("{listed} listed members, slab holds {}", self.members.len()));
        }
        if self.buckets >= self.capacity() {
            return Err("table has no free slot".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::map::arena::Arena;

    #[derive(Default)]
    struct Fixture {
        instances: Arena<Vec<Value>>,
        index: HashMap<InstanceId, Vec<Value>>,
    }

    impl Fixture {
        fn add(&mut self, identity: Vec<Value>) -> InstanceId {
            let id = InstanceId(self.instances.insert(identity.clone()));
            self.index.insert(id, identity);
            id
        }
    }

    impl IdentitySource for Fixture {
        fn identity_of(&self, instance: InstanceId) -> Option<&[Value]> {
            self.index.get(&instance).map(Vec::as_slice)
        }
    }

    fn ids(a: i64, b: i64) -> Vec<Value> {
        vec![Value::Int(a), Value::Int(b)]
    }

    #[test]
    fn test_insert_and_lookup_exact() {
        let mut fixture = Fixture::default();
        let mut map = MonitorMap::new(KeyMask::all(2), MapConfig::default());
        let a = fixture.add(ids(1, 2));
        let b = fixture.add(ids(3, 4));
        map.insert(a, &ids(1, 2), None, &fixture);
        map.insert(b, &ids(3, 4), None, &fixture);

        assert_eq!(map.lookup(&ids(1, 2), &fixture), vec![a]);
        assert_eq!(map.lookup(&ids(3, 4), &fixture), vec![b]);
        assert!(map.lookup(&ids(5, 6), &fixture).is_empty());
        assert_eq!(map.bucket_count(), 2);
        map.check_invariants().unwrap();
    }

    #[test]
    fn test_partial_key_collects_collisions_newest_first() {
        let mut fixture = Fixture::default();
        let mut map = MonitorMap::new(KeyMask::from_positions([0]), MapConfig::default());
        let a = fixture.add(ids(1, 1));
        let b = fixture.add(ids(1, 2));
        let c = fixture.add(ids(2, 1));
        for (id, identity) in [(a, ids(1, 1)), (b, ids(1, 2)), (c, ids(2, 1))] {
            map.insert(id, &identity, None, &fixture);
        }

        let pattern = vec![Value::Int(1), Value::Null];
        assert_eq!(map.lookup(&pattern, &fixture), vec![b, a]);
        assert_eq!(map.bucket_count(), 2);
        assert_eq!(map.member_count(), 3);
        map.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_middle_of_list_and_last_member() {
        let mut fixture = Fixture::default();
        let mut map = MonitorMap::new(KeyMask::NONE, MapConfig::default());
        let members: Vec<InstanceId> = (0..3).map(|i| fixture.add(ids(i, i))).collect();
        for (i, id) in members.iter().enumerate() {
            let n = i64::try_from(i).unwrap();
            map.insert(*id, &ids(n, n), None, &fixture);
        }
        assert_eq!(map.bucket_count(), 1);

        assert!(map.remove_instance(members[1], &ids(1, 1), &fixture).is_some());
        assert_eq!(map.lookup(&ids(0, 0), &fixture), vec![members[2], members[0]]);
        map.check_invariants().unwrap();

        map.remove_instance(members[2], &ids(2, 2), &fixture);
        map.remove_instance(members[0], &ids(0, 0), &fixture);
        assert_eq!(map.bucket_count(), 0);
        assert_eq!(map.member_count(), 0);
        map.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_unknown_instance_is_none() {
        let mut fixture = Fixture::default();
        let mut map = MonitorMap::new(KeyMask::all(2), MapConfig::default());
        let a = fixture.add(ids(1, 1));
        map.insert(a, &ids(1, 1), None, &fixture);
        let ghost = fixture.add(ids(9, 9));
        assert!(map.remove_instance(ghost, &ids(9, 9), &fixture).is_none());
        assert!(map.remove_instance(ghost, &ids(1, 1), &fixture).is_none());
        assert_eq!(map.member_count(), 1);
    }

    #[test]
    fn test_grow_and_shrink_keep_invariants() {
        let mut fixture = Fixture::default();
        let mut map = MonitorMap::new(KeyMask::all(2), MapConfig::default());
        let mut live = Vec::new();
        for i in 0..200 {
            let id = fixture.add(ids(i, -i));
            map.insert(id, &ids(i, -i), None, &fixture);
            live.push((id, i));
        }
        assert!(map.capacity() >= 256);
        map.check_invariants().unwrap();
        for &(id, i) in &live {
            assert_eq!(map.lookup(&ids(i, -i), &fixture), vec![id]);
        }

        for &(id, i) in live.iter().take(195) {
            assert!(map.remove_instance(id, &ids(i, -i), &fixture).is_some());
            map.check_invariants().unwrap();
        }
        assert_eq!(map.bucket_count(), 5);
        assert!(map.capacity() < 256);
        assert!(map.capacity() >= 16);
        for &(id, i) in live.iter().skip(195) {
            assert_eq!(map.lookup(&ids(i, -i), &fixture), vec![id]);
        }
    }

    #[test]
    fn test_links_are_returned_on_unlink() {
        let mut fixture = Fixture::default();
        let mut first = MonitorMap::new(KeyMask::NONE, MapConfig::default());
        let mut second = MonitorMap::new(KeyMask::all(2), MapConfig::default());
        let a = fixture.add(ids(1, 1));
        let m = first.insert(a, &ids(1, 1), None, &fixture);
        second.insert(a, &ids(1, 1), Some(Link { map: 0, member: m }), &fixture);

        let unlinked = second.remove_instance(a, &ids(1, 1), &fixture).unwrap();
        assert_eq!(unlinked.instance, a);
        let link = unlinked.next.unwrap();
        assert_eq!(link.map, 0);
        let tail = first.remove_member(link.member, &ids(1, 1), &fixture).unwrap();
        assert!(tail.next.is_none());
        assert_eq!(first.member_count(), 0);
    }

    #[test]
    fn test_clear_resets() {
        let mut fixture = Fixture::default();
        let mut map = MonitorMap::new(KeyMask::all(2), MapConfig::default());
        for i in 0..40 {
            let id = fixture.add(ids(i, i));
            map.insert(id, &ids(i, i), None, &fixture);
        }
        map.clear();
        assert_eq!(map.capacity(), 16);
        assert_eq!(map.member_count(), 0);
        assert!(map.lookup(&ids(1, 1), &fixture).is_empty());
        map.check_invariants().unwrap();
    }
}
