use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use clap::Parser;
use rh_hash::HashTable;
use rh_hash::hash_table::Entry;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Fraction of inserted values to remove before reporting, in percent.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 25)]
    remove_percent: usize,
}

fn hash_u64(value: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    // The table reserves the top hash bit for occupancy.
    hasher.finish() >> 1
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: HashTable<u64> = HashTable::with_capacity(args.target_capacity);

    println!("Actual capacity: {}", table.capacity());
    println!("Filling table up to its capacity...");

    let num_values = table.capacity() as u64;
    for value in 0..num_values {
        let hash = hash_u64(value);
        match table.entry(hash, |&v| v == value) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(_) => unreachable!("values are distinct"),
        }
    }

    println!(
        "Populated {} values in {} buckets",
        table.len(),
        table.bucket_count()
    );

    table.analyze_space_usage().print();
    table.probe_histogram().print();

    let num_removed = num_values * args.remove_percent.min(100) as u64 / 100;
    if num_removed > 0 {
        println!();
        println!("Removing {} values and re-reporting...", num_removed);
        for value in 0..num_removed {
            let hash = hash_u64(value);
            table.remove(hash, |&v| v == value);
        }

        table.analyze_space_usage().print();
        table.probe_histogram().print();
    }
}
