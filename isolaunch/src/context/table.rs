//! Open-addressed per-thread context table.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Initial number of slots in a freshly allocated table.
pub const INITIAL_CAPACITY: usize = 16;

/// A value stored in a context table. Shared by reference between a table
/// and any snapshot taken of it.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Process-unique identity of a context key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId {
    id: u64,
    hash: u32,
}

impl KeyId {
    pub(crate) const fn new(id: u64, hash: u32) -> Self {
        Self { id, hash }
    }

    /// Returns the numeric id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the probe hash.
    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }
}

/// A live key/value pair.
#[derive(Clone)]
pub struct Entry {
    /// The owning key.
    pub key: KeyId,
    /// The stored value.
    pub value: ContextValue,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("key", &self.key).finish_non_exhaustive()
    }
}

/// One position in the backing array.
#[derive(Debug, Clone, Default)]
pub enum Slot {
    /// Never used since the last rehash.
    #[default]
    Empty,
    /// Tombstone left by a removal; probing continues past it.
    Vacated,
    /// Holds a live entry.
    Occupied(Entry),
}

impl Slot {
    /// Returns true if the slot holds a live entry.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        matches!(self, Self::Occupied(_))
    }
}

/// A thread's private key/value table.
///
/// `len()` always equals the number of occupied slots.
#[derive(Debug, Clone)]
pub struct ThreadContextTable {
    slots: Vec<Slot>,
    size: usize,
    tombstones: usize,
}

impl Default for ThreadContextTable {
    fn default() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }
}

impl ThreadContextTable {
    /// Creates an empty table with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with at least `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            slots: vec![Slot::Empty; capacity],
            size: 0,
            tombstones: 0,
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true if no entries are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of slots in the backing array.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The backing array.
    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Iterates over live entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(entry) => Some(entry),
            _ => None,
        })
    }

    /// Returns true if the live count matches the backing array.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.size == count_occupied(&self.slots)
            && self.tombstones == self.slots.iter().filter(|s| matches!(s, Slot::Vacated)).count()
    }

    /// Looks up the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: KeyId) -> Option<&ContextValue> {
        self.find(key).and_then(|index| match &self.slots[index] {
            Slot::Occupied(entry) => Some(&entry.value),
            _ => None,
        })
    }

    /// Returns true if `key` has a live entry.
    #[must_use]
    pub fn contains(&self, key: KeyId) -> bool {
        self.find(key).is_some()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: KeyId, value: ContextValue) -> Option<ContextValue> {
        if let Some(index) = self.find(key) {
            if let Slot::Occupied(entry) = &mut self.slots[index] {
                return Some(std::mem::replace(&mut entry.value, value));
            }
        }

        if (self.size + self.tombstones + 1) * 3 > self.capacity() * 2 {
            self.rehash();
        }

        let mask = self.capacity() - 1;
        let mut index = key.hash() as usize & mask;
        loop {
            match self.slots[index] {
                Slot::Empty => break,
                Slot::Vacated => {
                    self.tombstones -= 1;
                    break;
                }
                Slot::Occupied(_) => index = (index + 1) & mask,
            }
        }
        self.slots[index] = Slot::Occupied(Entry { key, value });
        self.size += 1;
        None
    }

    /// Removes the entry for `key`, leaving a tombstone.
    pub fn remove(&mut self, key: KeyId) -> Option<ContextValue> {
        let index = self.find(key)?;
        match std::mem::replace(&mut self.slots[index], Slot::Vacated) {
            Slot::Occupied(entry) => {
                self.size -= 1;
                self.tombstones += 1;
                Some(entry.value)
            }
            other => {
                self.slots[index] = other;
                None
            }
        }
    }

    /// Removes every entry, keeping the capacity.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = Slot::Empty);
        self.size = 0;
        self.tombstones = 0;
    }

    /// Replaces the backing array wholesale and recounts live entries.
    pub(crate) fn replace_slots(&mut self, slots: Vec<Slot>) {
        debug_assert!(slots.len().is_power_of_two());
        self.size = count_occupied(&slots);
        self.tombstones = slots.iter().filter(|s| matches!(s, Slot::Vacated)).count();
        self.slots = slots;
    }

    fn find(&self, key: KeyId) -> Option<usize> {
        let mask = self.capacity() - 1;
        let mut index = key.hash() as usize & mask;
        for _ in 0..self.capacity() {
            match &self.slots[index] {
                Slot::Empty => return None,
                Slot::Occupied(entry) if entry.key == key => return Some(index),
                _ => index = (index + 1) & mask,
            }
        }
        None
    }

    fn rehash(&mut self) {
        // Dropping tombstones alone may free enough room; grow otherwise.
        let capacity = if self.size * 2 >= self.capacity() {
            self.capacity() * 2
        } else {
            self.capacity()
        };
        let old = std::mem::replace(&mut self.slots, vec![Slot::Empty; capacity]);
        self.size = 0;
        self.tombstones = 0;

        let mask = capacity - 1;
        for slot in old {
            if let Slot::Occupied(entry) = slot {
                let mut index = entry.key.hash() as usize & mask;
                while self.slots[index].is_occupied() {
                    index = (index + 1) & mask;
                }
                self.slots[index] = Slot::Occupied(entry);
                self.size += 1;
            }
        }
    }
}

/// Counts the live entries in a slot array.
#[must_use]
pub fn count_occupied(slots: &[Slot]) -> usize {
    slots.iter().filter(|slot| slot.is_occupied()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u64) -> KeyId {
        KeyId::new(id, (id as u32).wrapping_mul(0x61c8_8647))
    }

    fn value(v: i32) -> ContextValue {
        Arc::new(v)
    }

    fn read(table: &ThreadContextTable, k: KeyId) -> Option<i32> {
        table.get(k).and_then(|v| v.downcast_ref::<i32>().copied())
    }

    #[test]
    fn test_new_table_is_empty() {
        let table = ThreadContextTable::new();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), INITIAL_CAPACITY);
        assert!(table.is_consistent());
    }

    #[test]
    fn test_insert_get_replace() {
        let mut table = ThreadContextTable::new();
        assert!(table.insert(key(1), value(10)).is_none());
        assert_eq!(read(&table, key(1)), Some(10));

        let previous = table.insert(key(1), value(11)).unwrap();
        assert_eq!(previous.downcast_ref::<i32>(), Some(&10));
        assert_eq!(read(&table, key(1)), Some(11));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_leaves_tombstone() {
        let mut table = ThreadContextTable::new();
        table.insert(key(1), value(1));
        table.insert(key(2), value(2));

        assert!(table.remove(key(1)).is_some());
        assert!(table.remove(key(1)).is_none());
        assert_eq!(table.len(), 1);
        assert!(table.slots().iter().any(|s| matches!(s, Slot::Vacated)));
        assert_eq!(read(&table, key(2)), Some(2));
        assert!(table.is_consistent());
    }

    #[test]
    fn test_colliding_keys_probe_past_tombstones() {
        let mut table = ThreadContextTable::new();
        let a = KeyId::new(1, 3);
        let b = KeyId::new(2, 3);
        let c = KeyId::new(3, 3);
        table.insert(a, value(1));
        table.insert(b, value(2));
        table.insert(c, value(3));

        table.remove(b);
        assert_eq!(read(&table, c), Some(3));

        table.insert(b, value(22));
        assert_eq!(read(&table, b), Some(22));
        assert!(table.is_consistent());
    }

    #[test]
    fn test_grows_past_threshold() {
        let mut table = ThreadContextTable::new();
        for id in 0..100 {
            table.insert(key(id), value(id as i32));
        }
        assert_eq!(table.len(), 100);
        assert!(table.capacity() >= 150);
        assert!(table.capacity().is_power_of_two());
        for id in 0..100 {
            assert_eq!(read(&table, key(id)), Some(id as i32));
        }
    }

    #[test]
    fn test_churn_does_not_fill_with_tombstones() {
        let mut table = ThreadContextTable::new();
        for id in 0..1_000 {
            table.insert(key(id), value(1));
            table.remove(key(id));
        }
        assert!(table.is_empty());
        assert_eq!(table.capacity(), INITIAL_CAPACITY);
        assert!(table.is_consistent());
    }

    #[test]
    fn test_replace_slots_recounts() {
        let mut table = ThreadContextTable::new();
        table.insert(key(1), value(1));

        let mut slots = vec![Slot::Empty; 8];
        slots[2] = Slot::Vacated;
        slots[5] = Slot::Occupied(Entry { key: key(9), value: value(9) });
        slots[6] = Slot::Occupied(Entry { key: key(10), value: value(10) });
        table.replace_slots(slots);

        assert_eq!(table.len(), 2);
        assert_eq!(table.capacity(), 8);
        assert!(table.is_consistent());
    }

    #[test]
    fn test_clear() {
        let mut table = ThreadContextTable::new();
        table.insert(key(1), value(1));
        table.clear();
        assert!(table.is_empty());
        assert!(table.get(key(1)).is_none());
    }
}
