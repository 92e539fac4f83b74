use std::ops::RangeInclusive;

use bimap::BiMap;
use glint_types::HolderId;

use crate::util::typedefs::FastHashMap;

/// A texture as sampled through a particular sampler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct UnitKey {
    pub texture: HolderId,
    pub sampler: Option<HolderId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Assignment {
    pub unit: u32,
    /// Whether the pair was not on this unit before this call.
    pub newly_assigned: bool,
    /// The pair that had to give up the unit, if any.
    pub evicted: Option<UnitKey>,
}

/// Hands out image units from a contiguous range to texture/sampler pairs.
///
/// A pair keeps its unit until the range runs out, at which point the unit
/// used least recently is taken over. Every assignment or reuse takes a new
/// sequence number, so there are no ties between occupied units: among pairs
/// touched during the same draw the one touched first is evicted first.
#[derive(Debug)]
pub(crate) struct ImageUnitAllocator {
    range: RangeInclusive<u32>,
    assignments: BiMap<UnitKey, u32>,
    last_use: FastHashMap<u32, u64>,
    sequence: u64,
}

impl ImageUnitAllocator {
    pub fn new(range: RangeInclusive<u32>) -> Self {
        Self {
            range,
            assignments: BiMap::new(),
            last_use: FastHashMap::default(),
            sequence: 0,
        }
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.range.clone()
    }

    /// Moves the allocator to a new range. Pairs assigned to units outside
    /// of it lose their assignment and are returned.
    pub fn set_range(&mut self, range: RangeInclusive<u32>) -> Vec<UnitKey> {
        let outside: Vec<(UnitKey, u32)> = self
            .assignments
            .iter()
            .filter(|(_, unit)| !range.contains(unit))
            .map(|(key, unit)| (*key, *unit))
            .collect();
        for (_, unit) in &outside {
            self.assignments.remove_by_right(unit);
            self.last_use.remove(unit);
        }
        self.range = range;
        outside.into_iter().map(|(key, _)| key).collect()
    }

    pub fn unit_of(&self, key: UnitKey) -> Option<u32> {
        self.assignments.get_by_left(&key).copied()
    }

    /// Returns the unit `key` is assigned to, assigning one first if needed.
    /// `None` only when the range is empty.
    pub fn assign(&mut self, key: UnitKey) -> Option<Assignment> {
        self.sequence += 1;
        if let Some(&unit) = self.assignments.get_by_left(&key) {
            self.last_use.insert(unit, self.sequence);
            return Some(Assignment {
                unit,
                newly_assigned: false,
                evicted: None,
            });
        }

        let free = self.range.clone().find(|unit| !self.assignments.contains_right(unit));
        let (unit, evicted) = match free {
            Some(unit) => (unit, None),
            None => {
                let unit = self
                    .range
                    .clone()
                    .min_by_key(|unit| self.last_use.get(unit).copied().unwrap_or(0))?;
                let evicted = self.assignments.remove_by_right(&unit).map(|(key, _)| key);
                (unit, evicted)
            }
        };

        self.assignments.insert(key, unit);
        self.last_use.insert(unit, self.sequence);
        Some(Assignment {
            unit,
            newly_assigned: true,
            evicted,
        })
    }

    /// Drops every assignment involving `texture`.
    pub fn forget_texture(&mut self, texture: HolderId) {
        self.forget_where(|key| key.texture == texture);
    }

    /// Drops every assignment involving `sampler`.
    pub fn forget_sampler(&mut self, sampler: HolderId) {
        self.forget_where(|key| key.sampler == Some(sampler));
    }

    fn forget_where(&mut self, predicate: impl Fn(&UnitKey) -> bool) {
        let units: Vec<u32> = self
            .assignments
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(_, unit)| *unit)
            .collect();
        for unit in units {
            self.assignments.remove_by_right(&unit);
            self.last_use.remove(&unit);
        }
    }

    pub fn clear(&mut self) {
        self.assignments.clear();
        self.last_use.clear();
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> UnitKey {
        UnitKey {
            texture: HolderId::next(),
            sampler: Some(HolderId::next()),
        }
    }

    #[test]
    fn pairs_keep_their_unit() {
        let mut units = ImageUnitAllocator::new(2..=4);
        let a = key();
        let first = units.assign(a).unwrap();
        assert_eq!(first.unit, 2);
        assert!(first.newly_assigned);

        let again = units.assign(a).unwrap();
        assert_eq!(again.unit, 2);
        assert!(!again.newly_assigned);
        assert_eq!(again.evicted, None);
    }

    #[test]
    fn least_recently_used_pair_is_evicted() {
        let mut units = ImageUnitAllocator::new(0..=1);
        let (a, b, c) = (key(), key(), key());
        units.assign(a).unwrap();
        units.assign(b).unwrap();
        // Touching `a` makes `b` the oldest.
        units.assign(a).unwrap();

        let assignment = units.assign(c).unwrap();
        assert_eq!(assignment.unit, 1);
        assert_eq!(assignment.evicted, Some(b));
        assert_eq!(units.unit_of(b), None);
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn one_eviction_per_pair_beyond_range() {
        let mut units = ImageUnitAllocator::new(0..=3);
        let keys: Vec<_> = (0..5).map(|_| key()).collect();
        let evictions = keys
            .iter()
            .filter_map(|key| units.assign(*key).unwrap().evicted)
            .count();
        assert_eq!(evictions, 1);
        assert_eq!(units.unit_of(keys[0]), None);
        assert_eq!(units.unit_of(keys[4]), Some(0));
    }

    #[test]
    fn shrinking_the_range_drops_outside_assignments() {
        let mut units = ImageUnitAllocator::new(0..=3);
        let keys: Vec<_> = (0..4).map(|_| key()).collect();
        for key in &keys {
            units.assign(*key).unwrap();
        }

        let dropped = units.set_range(1..=2);
        assert_eq!(dropped.len(), 2);
        assert!(dropped.contains(&keys[0]));
        assert!(dropped.contains(&keys[3]));
        assert_eq!(units.unit_of(keys[1]), Some(1));
        assert_eq!(units.unit_of(keys[2]), Some(2));
    }

    #[test]
    fn empty_range_assigns_nothing() {
        #[allow(clippy::reversed_empty_ranges)]
        let mut units = ImageUnitAllocator::new(1..=0);
        assert_eq!(units.assign(key()), None);
    }

    #[test]
    fn forgetting_a_texture_frees_its_units() {
        let mut units = ImageUnitAllocator::new(0..=3);
        let a = key();
        let b = UnitKey {
            texture: a.texture,
            sampler: None,
        };
        units.assign(a).unwrap();
        units.assign(b).unwrap();
        units.assign(key()).unwrap();

        units.forget_texture(a.texture);
        assert_eq!(units.len(), 1);
        assert_eq!(units.assign(key()).unwrap().unit, 0);
    }
}
