use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;

use crate::hash_table::Entry as TableEntry;
use crate::hash_table::HashTable;

/// A hash set implemented on top of the Robin Hood [`HashTable`].
///
/// `HashSet<T, S>` stores values that implement `Hash + Eq` and uses a
/// configurable hasher builder `S` to hash them. The value is its own
/// key: the underlying table stores the value directly alongside its hash
/// word.
///
/// Iteration order is bucket order: unrelated to insertion order and
/// unstable across mutations.
#[derive(Clone)]
pub struct HashSet<T, S> {
    table: HashTable<T>,
    hash_builder: S,
}

impl<T, S> Debug for HashSet<T, S>
where
    T: Debug + Hash + Eq,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut set = f.debug_set();
        for value in self.iter() {
            set.entry(value);
        }
        set.finish()
    }
}

impl<T, S> HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a new hash set with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use std::collections::hash_map::RandomState;
    /// # use rh_hash::HashSet;
    /// let set: HashSet<i32, _> = HashSet::with_hasher(RandomState::new());
    /// assert!(set.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new hash set with the specified capacity and hasher
    /// builder.
    ///
    /// The set will be able to hold at least `capacity` values before
    /// resizing.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
            hash_builder,
        }
    }

    /// Returns the number of values in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no values.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of values the set can hold before the underlying
    /// table resizes.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all values from the set.
    ///
    /// The allocated bucket array is retained.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Shrinks the underlying storage to the allocation policy's minimum
    /// for the current number of values.
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit();
    }

    /// Reserves capacity for at least `additional` more values.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Adds a value to the set.
    ///
    /// Returns whether the value was newly inserted. That is:
    ///
    /// - If the set did not previously contain this value, `true` is
    ///   returned.
    /// - If the set already contained this value, `false` is returned and
    ///   the set is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use std::collections::hash_map::RandomState;
    /// # use rh_hash::HashSet;
    /// let mut set = HashSet::with_hasher(RandomState::new());
    /// assert_eq!(set.insert(37), true);
    /// assert_eq!(set.insert(37), false);
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> bool {
        let hash = self.hash_builder.hash_one(&value);
        match self.table.entry(hash, |v| v == &value) {
            TableEntry::Occupied(_) => false,
            TableEntry::Vacant(entry) => {
                entry.insert(value);
                true
            }
        }
    }

    /// Returns `true` if the set contains a value.
    pub fn contains(&self, value: &T) -> bool {
        self.get(value).is_some()
    }

    /// Returns a reference to the stored value equal to the given value,
    /// if any.
    pub fn get(&self, value: &T) -> Option<&T> {
        let hash = self.hash_builder.hash_one(value);
        self.table.find(hash, |v| v == value)
    }

    /// Removes a value from the set. Returns whether the value was
    /// present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.take(value).is_some()
    }

    /// Removes and returns the stored value equal to the given value, if
    /// any.
    pub fn take(&mut self, value: &T) -> Option<T> {
        let hash = self.hash_builder.hash_one(value);
        self.table.remove(hash, |v| v == value)
    }

    /// Returns an iterator over the values of the set.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator that removes and yields all values from the
    /// set.
    ///
    /// After calling `drain()`, the set is empty.
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain {
            inner: self.table.drain(),
        }
    }
}

impl<T, S> HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Creates a new hash set using the default hasher builder.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash set with the specified capacity using the
    /// default hasher builder.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<T, S> Default for HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, S> Extend<T> for HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for value in iter {
            self.insert(value);
        }
    }
}

impl<'a, T, S> IntoIterator for &'a HashSet<T, S>
where
    T: Hash + Eq,
    S: BuildHasher,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over the values of a `HashSet`.
pub struct Iter<'a, T> {
    inner: crate::hash_table::Iter<'a, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A draining iterator over the values of a `HashSet`.
pub struct Drain<'a, T> {
    inner: crate::hash_table::Drain<'a, T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::hash::BuildHasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k1: rng.try_next_u64().unwrap_or(0),
                k2: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set = HashSet::with_hasher(SipHashBuilder::default());

        assert!(set.insert(1));
        assert!(set.insert(2));
        assert!(!set.insert(1));

        assert_eq!(set.len(), 2);
        assert!(set.contains(&1));
        assert!(set.contains(&2));
        assert!(!set.contains(&3));
    }

    #[test]
    fn test_get_returns_stored_value() {
        let mut set: HashSet<String, SipHashBuilder> = HashSet::new();
        set.insert("stored".to_string());

        let got = set.get(&"stored".to_string()).unwrap();
        assert_eq!(got, "stored");
        assert!(set.get(&"missing".to_string()).is_none());
    }

    #[test]
    fn test_remove_and_take() {
        let mut set = HashSet::with_hasher(SipHashBuilder::default());
        set.insert(10);
        set.insert(20);

        assert!(set.remove(&10));
        assert!(!set.remove(&10));
        assert_eq!(set.take(&20), Some(20));
        assert_eq!(set.take(&20), None);
        assert!(set.is_empty());
    }

    #[test]
    fn test_iter() {
        let mut set = HashSet::with_hasher(SipHashBuilder::default());
        for i in 0..10 {
            set.insert(i);
        }

        let mut values: Vec<i32> = set.iter().copied().collect();
        values.sort();
        assert_eq!(values, (0..10).collect::<Vec<_>>());

        let mut via_into: Vec<i32> = (&set).into_iter().copied().collect();
        via_into.sort();
        assert_eq!(via_into, values);
    }

    #[test]
    fn test_drain() {
        let mut set = HashSet::with_hasher(SipHashBuilder::default());
        for i in 0..15 {
            set.insert(i);
        }

        let mut drained: Vec<i32> = set.drain().collect();
        drained.sort();
        assert_eq!(drained, (0..15).collect::<Vec<_>>());
        assert!(set.is_empty());
    }

    #[test]
    fn test_clear_and_extend() {
        let mut set: HashSet<i32, SipHashBuilder> = HashSet::new();
        set.extend(0..100);
        assert_eq!(set.len(), 100);

        set.clear();
        assert!(set.is_empty());

        set.extend([5, 5, 6]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_clone_independence() {
        let mut set = HashSet::with_hasher(SipHashBuilder::default());
        for i in 0..25 {
            set.insert(i);
        }

        let mut copy = set.clone();
        copy.remove(&0);

        assert!(set.contains(&0));
        assert_eq!(set.len(), 25);
        assert_eq!(copy.len(), 24);
    }

    #[test]
    fn test_churn_through_set() {
        let mut set = HashSet::with_hasher(SipHashBuilder::default());
        for i in 0..500 {
            set.insert(i);
        }
        for i in 0..495 {
            assert!(set.remove(&i));
        }

        assert_eq!(set.len(), 5);
        for i in 495..500 {
            assert!(set.contains(&i));
        }
    }

    #[test]
    fn test_string_values() {
        let mut set: HashSet<String, SipHashBuilder> = HashSet::new();
        for word in ["alpha", "beta", "gamma"] {
            set.insert(word.to_string());
        }

        assert!(set.contains(&"beta".to_string()));
        assert_eq!(set.take(&"beta".to_string()), Some("beta".to_string()));
        assert!(!set.contains(&"beta".to_string()));
        assert_eq!(set.len(), 2);
    }
}
