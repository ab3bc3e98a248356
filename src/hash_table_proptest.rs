// HashTable property tests.
//
// Property 1: model equivalence under random operations.
//  - Model: std::collections::HashMap<u64, i32>.
//  - Operations: insert (entry + vacant insert), overwrite (occupied),
//    remove, lookup, decoded from (op, key) pairs.
//  - Invariant: len() matches the model, every lookup matches the model,
//    and the structural invariants hold after every step.
//  - Hashes are the key masked to a few low bits, so collision pile-ups
//    and long probe runs are common rather than rare.
//
// Property 2: resize churn with a small-bucket policy.
//  - A policy with a narrow band forces frequent grow and shrink; the
//    live key set must survive every resize.
//
// Property 3: clone and take independence.
//  - After random operations, a clone and a mem::take'd table must both
//    agree with the model while the source diverges.

use std::collections::HashMap as StdHashMap;

use proptest::prelude::*;

use crate::hash_table::AllocPolicy;
use crate::hash_table::Entry;
use crate::hash_table::HashTable;

#[derive(Debug, PartialEq, Eq, Clone)]
struct Item {
    key: u64,
    value: i32,
}

/// Mask the key into a few low bits so distinct keys share hashes often.
fn collision_hash(key: u64, hash_bits: u32) -> u64 {
    key & ((1u64 << hash_bits) - 1)
}

/// Aggressive policy: minimal headroom on both sides, so resizes happen
/// constantly under churn.
struct ChurnPolicy;

impl AllocPolicy for ChurnPolicy {
    fn min_desired_buckets(num_elements: usize) -> usize {
        let mut buckets = 4;
        while num_elements * 4 > buckets * 3 {
            buckets *= 2;
        }
        buckets
    }

    fn max_desired_buckets(num_elements: usize) -> usize {
        let mut buckets = 4;
        while buckets * 2 <= num_elements * 4 {
            buckets *= 2;
        }
        buckets.max(Self::min_desired_buckets(num_elements))
    }
}

fn apply_insert<A: AllocPolicy>(
    table: &mut HashTable<Item, A>,
    model: &mut StdHashMap<u64, i32>,
    key: u64,
    value: i32,
    hash_bits: u32,
) {
    let hash = collision_hash(key, hash_bits);
    match table.entry(hash, |v| v.key == key) {
        Entry::Occupied(mut entry) => {
            entry.insert(Item { key, value });
        }
        Entry::Vacant(entry) => {
            entry.insert(Item { key, value });
        }
    }
    model.insert(key, value);
}

proptest! {
    #[test]
    fn prop_model_equivalence(
        hash_bits in 1u32..8,
        ops in proptest::collection::vec((0u8..=2u8, 0u64..64u64, any::<i32>()), 1..400),
    ) {
        let mut table: HashTable<Item> = HashTable::new();
        let mut model: StdHashMap<u64, i32> = StdHashMap::new();

        for (op, key, value) in ops {
            let hash = collision_hash(key, hash_bits);
            match op {
                // Insert or overwrite through the entry API.
                0 => apply_insert(&mut table, &mut model, key, value, hash_bits),
                // Remove; present and absent keys must both agree.
                1 => {
                    let removed = table.remove(hash, |v| v.key == key);
                    let expected = model.remove(&key);
                    prop_assert_eq!(removed.map(|v| v.value), expected);
                }
                // Lookup only.
                2 => {
                    let found = table.find(hash, |v| v.key == key);
                    prop_assert_eq!(found.map(|v| v.value), model.get(&key).copied());
                }
                _ => unreachable!(),
            }

            table.check_invariants();
            prop_assert_eq!(table.len(), model.len());
        }

        // Final sweep: the table holds exactly the model's contents.
        for (&key, &value) in &model {
            let hash = collision_hash(key, hash_bits);
            let found = table.find(hash, |v| v.key == key);
            prop_assert_eq!(found.map(|v| v.value), Some(value));
        }
        let mut live: Vec<u64> = table.iter().map(|v| v.key).collect();
        live.sort_unstable();
        let mut expected: Vec<u64> = model.keys().copied().collect();
        expected.sort_unstable();
        prop_assert_eq!(live, expected);
    }

    #[test]
    fn prop_survives_resize_churn(
        hash_bits in 1u32..6,
        ops in proptest::collection::vec((any::<bool>(), 0u64..48u64), 1..300),
    ) {
        let mut table: HashTable<Item, ChurnPolicy> = HashTable::new();
        let mut model: StdHashMap<u64, i32> = StdHashMap::new();
        let mut resizes = 0usize;
        let mut last_buckets = table.bucket_count();

        for (add, key) in ops {
            let hash = collision_hash(key, hash_bits);
            if add {
                apply_insert(&mut table, &mut model, key, key as i32, hash_bits);
            } else {
                let removed = table.remove(hash, |v| v.key == key);
                let expected = model.remove(&key);
                prop_assert_eq!(removed.is_some(), expected.is_some());
            }

            if table.bucket_count() != last_buckets {
                resizes += 1;
                last_buckets = table.bucket_count();
            }

            table.check_invariants();

            // Every live key survives whatever resizing just happened.
            for (&k, &v) in &model {
                let h = collision_hash(k, hash_bits);
                let found = table.find(h, |item| item.key == k);
                prop_assert_eq!(found.map(|item| item.value), Some(v), "lost key {} after {} resizes", k, resizes);
            }
        }
    }

    #[test]
    fn prop_clone_and_take_are_independent(
        hash_bits in 1u32..8,
        keys in proptest::collection::btree_set(0u64..128u64, 1..64),
        mutate_key in 0u64..128u64,
    ) {
        let mut table: HashTable<Item> = HashTable::new();
        let mut model: StdHashMap<u64, i32> = StdHashMap::new();
        for &key in &keys {
            apply_insert(&mut table, &mut model, key, key as i32, hash_bits);
        }

        let clone = table.clone();
        clone.check_invariants();

        // Mutating the original leaves the clone on the model's state.
        apply_insert(&mut table, &mut model, mutate_key, -1, hash_bits);
        let hash = collision_hash(mutate_key, hash_bits);
        prop_assert_eq!(
            clone.find(hash, |v| v.key == mutate_key).map(|v| v.value),
            keys.contains(&mutate_key).then(|| mutate_key as i32)
        );
        prop_assert_eq!(clone.len(), keys.len());

        // A taken table carries the contents; the source is empty but
        // usable.
        let taken = core::mem::take(&mut table);
        taken.check_invariants();
        table.check_invariants();
        prop_assert_eq!(taken.len(), model.len());
        prop_assert_eq!(table.len(), 0);

        apply_insert(&mut table, &mut StdHashMap::new(), 7, 7, hash_bits);
        prop_assert_eq!(table.len(), 1);
        for (&k, &v) in &model {
            let h = collision_hash(k, hash_bits);
            prop_assert_eq!(taken.find(h, |item| item.key == k).map(|item| item.value), Some(v));
        }
    }
}
