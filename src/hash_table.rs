//! A hash table using Robin Hood linear probing with backward-shift
//! deletion.
//!
//! Robin Hood probing is linear probing with one extra rule on collision:
//! compare how far each of the two contenders currently is from its ideal
//! bucket (its *probe count*), and give the slot to whichever has probed
//! further. The displaced resident shifts forward and repeats the contest
//! at the next slot. The effect is that probe counts along any run of
//! occupied buckets are non-decreasing, which buys two things: probe
//! sequences stay short and tightly clustered even at high load, and a
//! lookup can give up as soon as it reaches a slot whose resident has a
//! smaller probe count than the search, since any matching key would have
//! displaced that resident on its way in.
//!
//! Deletion uses backward shifting instead of tombstones. After a value is
//! removed, the values following it are pulled one slot toward their ideal
//! buckets until the run reaches an empty slot or a value that already
//! sits in its ideal bucket. This restores the probe-count ordering
//! exactly, so the table never accumulates deletion debris and lookup
//! performance does not degrade with churn.
//!
//! [`HashTable<V>`] stores values of type `V` and provides insertion,
//! lookup, and removal. This is a fairly low-level structure that requires
//! you to provide both the hash value and an equality predicate for each
//! operation. Prefer the [`HashMap<K, V>`] or [`HashSet<V>`] wrappers for
//! a conventional key-value or set interface unless you are implementing
//! your own map or set structure.
//!
//! ## Design
//!
//! Each bucket is a `u64` *hash word* plus uninitialized storage for one
//! value. The top bit of the word is an occupancy flag; the remaining bits
//! hold the value's hash as supplied by the caller. A word of zero means
//! the bucket is empty, so the empty check is a single zero test, and a
//! candidate check during lookup is a single word comparison that rules
//! out nearly all non-matches before the key itself is ever compared. The
//! stored word also means resizing never re-hashes: the word travels with
//! the value.
//!
//! Callers are expected to supply hashes with the top bit clear. The table
//! ORs the occupancy flag into every incoming hash, so a violating top bit
//! is absorbed rather than corrupting the empty encoding; the only
//! consequence is that two hashes differing in just that bit are treated
//! as identical.
//!
//! The bucket count is always a power of two, and at least two, so a hash
//! maps to its ideal bucket with a mask rather than a modulo. Probing
//! wraps around the end of the array, and probe counts account for the
//! wrap.
//!
//! Words and value slots live in two parallel arrays inside one
//! type-erased allocation. Splitting them keeps the probe loop scanning
//! densely packed words instead of striding over full buckets, which
//! matters because the word scan is the hot path of every operation.
//!
//! Resizing is driven by an [`AllocPolicy`]: insertion grows the table
//! when the policy wants more buckets for the new element count, and
//! removal shrinks it when the policy tolerates fewer. The two thresholds
//! are separated by a wide hysteresis band so that inserting and removing
//! one element at a boundary cannot ping-pong the table between sizes.
//!
//! ## Safety Invariants
//!
//! The implementation relies on the following key invariants:
//!
//! 1. **Sizing**: `mask == bucket_count - 1`, `bucket_count` is a power of
//!    two `>= 2`, and the occupancy bit lies outside the mask.
//! 2. **Initialization**: a bucket's value storage is initialized if and
//!    only if its hash word is non-zero. Every non-zero word has the
//!    occupancy bit set.
//! 3. **Ordering**: walking forward from any occupied bucket, probe counts
//!    of consecutive occupied buckets are non-decreasing until the first
//!    empty bucket. Eviction and backward shifting both preserve this.
//! 4. **Headroom**: `populated < bucket_count` whenever an insertion walk
//!    runs, guaranteed by the policy check that precedes it. The eviction
//!    walk relies on this to find an empty slot.
//!
//! [`HashMap<K, V>`]: crate::hash_map::HashMap
//! [`HashSet<V>`]: crate::hash_set::HashSet

use alloc::alloc::handle_alloc_error;
use alloc::boxed::Box;
use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr::NonNull;

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "shrink-conservative")] {
        const SHRINK_HEADROOM_DOUBLINGS: u32 = 6;
    } else {
        const SHRINK_HEADROOM_DOUBLINGS: u32 = 4;
    }
}

/// Flag bit marking a hash word as occupied.
///
/// With the flag in the top bit, the value `0` unambiguously encodes
/// "empty", and matching a stored word checks hash and occupancy in one
/// compare.
const OCCUPIED_MASK: u64 = 1 << 63;

/// Decides bucket counts from element counts, in both directions.
///
/// Both methods must return a power of two that is at least 2, must be
/// monotonic in `num_elements`, and must satisfy
/// `min_desired_buckets(n) <= max_desired_buckets(n)` for every `n`. The
/// gap between the two is a hysteresis band: the table grows when it has
/// fewer buckets than `min_desired_buckets` wants and shrinks when it has
/// more than `max_desired_buckets` tolerates, so a narrow band causes
/// resize churn under insert/remove toggling at a threshold.
pub trait AllocPolicy {
    /// The smallest bucket count acceptable for `num_elements` elements.
    ///
    /// Insertion grows the table to this count when the current array is
    /// smaller. Must exceed `num_elements`, so that an insertion walk
    /// always has an empty bucket to terminate at.
    fn min_desired_buckets(num_elements: usize) -> usize;

    /// The largest bucket count acceptable for `num_elements` elements.
    ///
    /// Removal shrinks the table to this count when the current array is
    /// larger.
    fn max_desired_buckets(num_elements: usize) -> usize;
}

/// The allocation policy used when none is specified.
///
/// Grows at 3/4 occupancy and keeps a headroom of several doublings
/// before shrinking. The `shrink-conservative` feature widens the band
/// further, for churn-heavy workloads that repeatedly empty and refill.
pub struct DefaultAllocPolicy;

const MIN_BUCKETS: usize = 8;

impl AllocPolicy for DefaultAllocPolicy {
    fn min_desired_buckets(num_elements: usize) -> usize {
        // Smallest power of two keeping occupancy at or below 3/4.
        let required = num_elements + num_elements.div_ceil(3);
        required
            .checked_next_power_of_two()
            .expect("bucket count overflow")
            .max(MIN_BUCKETS)
    }

    fn max_desired_buckets(num_elements: usize) -> usize {
        let min = Self::min_desired_buckets(num_elements);
        min.checked_mul(1 << SHRINK_HEADROOM_DOUBLINGS).unwrap_or(min)
    }
}

#[derive(Debug, Clone, Copy)]
struct DataLayout {
    layout: Layout,
    words_offset: usize,
    slots_offset: usize,
}

impl DataLayout {
    fn new<V>(bucket_count: usize) -> Self {
        let words_layout = Layout::array::<u64>(bucket_count).expect("allocation size overflow");
        let slots_layout =
            Layout::array::<MaybeUninit<V>>(bucket_count).expect("allocation size overflow");

        let (layout, words_offset) = Layout::new::<()>().extend(words_layout).unwrap();
        let (layout, slots_offset) = layout.extend(slots_layout).unwrap();

        DataLayout {
            layout,
            words_offset,
            slots_offset,
        }
    }
}

/// Allocate backing storage for `layout` with every hash word zeroed.
///
/// Value storage is left uninitialized; a zero word marks it as such.
fn allocate_buckets(layout: DataLayout) -> NonNull<u8> {
    // SAFETY: The layout always covers at least two buckets of `u64`
    // words, so its size is non-zero. A null return is routed to
    // `handle_alloc_error` before the pointer is used.
    unsafe {
        let raw = alloc::alloc::alloc(layout.layout);
        if raw.is_null() {
            handle_alloc_error(layout.layout);
        }

        core::ptr::write_bytes(
            raw.add(layout.words_offset),
            0x0,
            layout.slots_offset - layout.words_offset,
        );

        NonNull::new_unchecked(raw)
    }
}

/// Space and probe statistics for a table, computed in a single pass over
/// the bucket array.
#[derive(Debug, Clone, Copy)]
pub struct SpaceUsage {
    /// Bytes held by the bucket array plus the table header itself.
    pub total_memory_bytes: usize,
    /// Largest probe count among occupied buckets.
    pub max_probe_count: usize,
    /// Fraction of buckets that are occupied.
    pub occupancy: f64,
    /// Mean probe count over occupied buckets; `0.0` for an empty table.
    pub average_probe_count: f64,
}

#[cfg(feature = "std")]
impl SpaceUsage {
    /// Pretty-print the space usage report.
    pub fn print(&self) {
        println!("=== Hash Table Space Usage ===");
        println!("Total memory: {} bytes", self.total_memory_bytes);
        println!("Occupancy: {:.2}%", self.occupancy * 100.0);
        println!(
            "Probe counts: max {}, average {:.3}",
            self.max_probe_count, self.average_probe_count
        );
    }
}

/// Distribution of probe counts over the occupied buckets.
#[cfg(feature = "stats")]
pub struct ProbeHistogram {
    #[cfg_attr(not(feature = "std"), allow(dead_code))]
    populated: usize,
    #[cfg_attr(not(feature = "std"), allow(dead_code))]
    buckets: usize,
    /// `count_by_probe_length[p]` is the number of values sitting `p`
    /// buckets past their ideal bucket; index 0 counts values that are in
    /// their ideal bucket. Empty when the table is empty.
    pub count_by_probe_length: alloc::vec::Vec<usize>,
}

#[cfg(feature = "stats")]
impl ProbeHistogram {
    /// Pretty-print the histogram as horizontal bars.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let max = self.count_by_probe_length.iter().copied().max().unwrap_or(0);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }

        let max_bar = 60usize;
        let total_units = max_bar * 8;
        println!(
            "probe counts ({} values, {} buckets):",
            self.populated, self.buckets
        );

        let make_bar = |count: usize| -> alloc::string::String {
            if count == 0 {
                return alloc::string::String::new();
            }
            let units = ((count as u128 * total_units as u128).div_ceil(max as u128)) as usize;
            let full = units / 8;
            let rem = units % 8;
            let mut bar = "█".repeat(full);
            if rem > 0 {
                let ch = match rem {
                    1 => '▏',
                    2 => '▎',
                    3 => '▍',
                    4 => '▌',
                    5 => '▋',
                    6 => '▊',
                    7 => '▉',
                    _ => unreachable!(),
                };
                bar.push(ch);
            }
            bar
        };

        for (length, &count) in self.count_by_probe_length.iter().enumerate() {
            let bar = make_bar(count);
            println!("{:>3} | {} ({})", length, bar, count);
        }
    }
}

/// A hash table using Robin Hood probing with backward-shift deletion.
///
/// `HashTable<V, A>` stores values of type `V` and sizes its bucket array
/// through the allocation policy `A`. Unlike standard hash maps, this
/// implementation requires you to provide both the hash value and an
/// equality predicate for each operation.
///
/// Hashes must be supplied with the top bit clear; the table reserves
/// that bit as its occupancy flag and ORs it into every stored word, so a
/// set top bit is silently absorbed and two hashes differing only there
/// collide with each other.
///
/// A moved-from table is obtained with [`core::mem::take`]: the previous
/// contents transfer out and the binding is left holding a fresh,
/// minimum-sized, empty table that remains fully usable.
///
/// ## Performance Characteristics
///
/// - **Memory**: 8 bytes per bucket overhead, plus the size of `V`.
/// - **Operations**: expected O(1); probe sequences cluster tightly
///   around the mean because eviction equalizes probe counts.
pub struct HashTable<V, A = DefaultAllocPolicy> {
    layout: DataLayout,
    alloc: NonNull<u8>,

    mask: usize,
    populated: usize,

    _phantom: PhantomData<(V, A)>,
}

impl<V, A> Debug for HashTable<V, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::vec::Vec;

        if self.is_empty() {
            return f
                .debug_struct("HashTable")
                .field("buckets", &"empty")
                .field("populated", &self.populated)
                .field("bucket_count", &self.bucket_count())
                .finish();
        }

        // SAFETY: `words_ptr` covers exactly `bucket_count` words, and
        // `probe_count` is only consulted where the word is non-zero.
        let words = unsafe { self.words_ptr().as_ref() };
        let rows = words
            .chunks(8)
            .enumerate()
            .map(|(chunk, words)| {
                let cells = words
                    .iter()
                    .enumerate()
                    .map(|(offset, &word)| {
                        if word == 0 {
                            String::from("..")
                        } else {
                            // SAFETY: The index addresses this word, which
                            // is non-zero.
                            format!("{:02}", unsafe { self.probe_count(chunk * 8 + offset) })
                        }
                    })
                    .collect::<Vec<_>>();
                cells.join(" ")
            })
            .collect::<Vec<_>>();

        f.debug_struct("HashTable")
            .field("probe_counts", &rows)
            .field("populated", &self.populated)
            .field("bucket_count", &self.bucket_count())
            .finish()
    }
}

impl<V, A> Clone for HashTable<V, A>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        let new_table = Self {
            layout: self.layout,
            alloc: allocate_buckets(self.layout),
            mask: self.mask,
            populated: self.populated,
            _phantom: PhantomData,
        };

        // The bucket layout is duplicated slot for slot, so the clone
        // inherits the probe structure without re-hashing anything.
        //
        // SAFETY: Both tables share one layout, so every index below is in
        // bounds on both sides. A non-zero source word guarantees the
        // source slot is initialized. Each destination word is written
        // only after its value slot is, so if a clone panics the
        // destination's words describe exactly the slots that were
        // completed and its `Drop` stays sound.
        unsafe {
            let src_words = self.words_ptr().as_ref();
            let src_slots = self.slots_ptr().as_ref();
            let dst_words = new_table.words_ptr().as_mut();
            let dst_slots = new_table.slots_ptr().as_mut();

            for index in 0..src_words.len() {
                let word = *src_words.get_unchecked(index);
                if word != 0 {
                    dst_slots
                        .get_unchecked_mut(index)
                        .write(src_slots.get_unchecked(index).assume_init_ref().clone());
                    *dst_words.get_unchecked_mut(index) = word;
                }
            }
        }

        new_table
    }
}

impl<V, A: AllocPolicy> Default for HashTable<V, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, A> Drop for HashTable<V, A> {
    fn drop(&mut self) {
        // SAFETY: A non-zero word marks its slot initialized, so each
        // occupied slot is dropped exactly once. The allocation matches
        // `self.layout` by construction.
        unsafe {
            if core::mem::needs_drop::<V>() && self.populated > 0 {
                for index in 0..=self.mask {
                    if *self.words_ptr().as_ref().get_unchecked(index) != 0 {
                        self.slots_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            alloc::alloc::dealloc(self.alloc.as_ptr(), self.layout.layout);
        }
    }
}

impl<V, A> HashTable<V, A> {
    fn words_ptr(&self) -> NonNull<[u64]> {
        // SAFETY: `self.alloc` points to a live allocation described by
        // `self.layout`, and the word array spans exactly `mask + 1`
        // entries starting at `words_offset`.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.words_offset).cast(),
                self.mask + 1,
            )
        }
    }

    fn slots_ptr(&self) -> NonNull<[MaybeUninit<V>]> {
        // SAFETY: `self.alloc` points to a live allocation described by
        // `self.layout`, and the slot array spans exactly `mask + 1`
        // entries starting at `slots_offset`.
        unsafe {
            NonNull::slice_from_raw_parts(
                self.alloc.add(self.layout.slots_offset).cast(),
                self.mask + 1,
            )
        }
    }

    /// Returns the number of buckets in the table.
    ///
    /// Always a power of two and at least 2. The ratio of
    /// [`len`](Self::len) to this is the table's occupancy.
    pub fn bucket_count(&self) -> usize {
        self.mask + 1
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Distance of the bucket at `index` from its occupant's ideal bucket,
    /// accounting for wrap-around.
    ///
    /// # Safety
    ///
    /// `index` must be within the bucket range and its word must be
    /// non-zero.
    #[inline(always)]
    unsafe fn probe_count(&self, index: usize) -> usize {
        // SAFETY: Caller ensures `index` is in bounds and occupied. The
        // occupancy bit lies outside `mask`, so it cannot perturb the
        // ideal bucket computation.
        let word = unsafe { *self.words_ptr().as_ref().get_unchecked(index) };
        debug_assert!(word != 0);
        debug_assert_eq!(self.mask as u64 & OCCUPIED_MASK, 0);

        let ideal = (word as usize) & self.mask;
        if ideal <= index {
            index - ideal
        } else {
            self.bucket_count() - ideal + index
        }
    }

    /// Walk the probe sequence of `word` looking for a matching value.
    ///
    /// Returns the index holding the match, or `None` once the walk hits
    /// an empty bucket or a resident with a smaller probe count than the
    /// search has accumulated; past that point the key cannot exist.
    #[inline]
    fn find_index(&self, word: u64, eq: &impl Fn(&V) -> bool) -> Option<usize> {
        let mut probe = 0;
        loop {
            let index = (word as usize).wrapping_add(probe) & self.mask;

            // SAFETY: `index` is masked into the bucket range.
            let occupant = unsafe { *self.words_ptr().as_ref().get_unchecked(index) };
            if occupant == 0 {
                return None;
            }

            if occupant == word {
                // SAFETY: A non-zero word marks the slot initialized.
                let value =
                    unsafe { self.slots_ptr().as_ref().get_unchecked(index).assume_init_ref() };
                if eq(value) {
                    return Some(index);
                }
            }

            // SAFETY: `index` is in bounds and `occupant` is non-zero.
            if unsafe { self.probe_count(index) } < probe {
                return None;
            }

            probe += 1;
            debug_assert!(probe <= self.mask);
        }
    }
}

impl<V, A> HashTable<V, A>
where
    A: AllocPolicy,
{
    /// Creates a new, empty hash table sized at the allocation policy's
    /// minimum.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new hash table sized for about `capacity` elements.
    ///
    /// The bucket count is whatever the allocation policy wants for that
    /// many elements, so the first resize is deferred until the estimate
    /// is exceeded.
    pub fn with_capacity(capacity: usize) -> Self {
        let bucket_count = A::min_desired_buckets(capacity);
        debug_assert!(bucket_count >= 2);
        debug_assert!(bucket_count.is_power_of_two());
        debug_assert_eq!(bucket_count as u64 & OCCUPIED_MASK, 0);

        let layout = DataLayout::new::<V>(bucket_count);
        Self {
            layout,
            alloc: allocate_buckets(layout),
            mask: bucket_count - 1,
            populated: 0,
            _phantom: PhantomData,
        }
    }

    /// Returns the number of elements the table can hold before the
    /// allocation policy asks for more buckets.
    pub fn capacity(&self) -> usize {
        // Invert the monotonic `min_desired_buckets` by binary search: the
        // largest element count whose desired bucket count still fits.
        let bucket_count = self.bucket_count();
        let mut lo = 0;
        let mut hi = bucket_count;
        while lo < hi {
            let mid = lo + (hi - lo).div_ceil(2);
            if A::min_desired_buckets(mid) <= bucket_count {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    /// Returns an iterator over all values in the table.
    ///
    /// The iterator yields `&V` references in bucket order, which is
    /// unrelated to insertion order and may change across mutations.
    pub fn iter(&self) -> Iter<'_, V, A> {
        Iter {
            table: self,
            index: 0,
        }
    }

    /// Returns an iterator that removes and yields all values from the
    /// table.
    ///
    /// After calling `drain()`, the table is empty but keeps its bucket
    /// array. Dropping the iterator drops any unyielded values; leaking it
    /// with `mem::forget` leaks them.
    pub fn drain(&mut self) -> Drain<'_, V, A> {
        let bucket_count = self.bucket_count();
        let mut occupied = alloc::vec![0u64; bucket_count].into_boxed_slice();

        // SAFETY: The snapshot and the word array have the same length.
        // Zeroing the table's words transfers ownership of every occupied
        // slot to the iterator: the table no longer sees them, and the
        // snapshot records exactly which slots hold live values.
        unsafe {
            core::ptr::copy_nonoverlapping(
                self.words_ptr().as_ref().as_ptr(),
                occupied.as_mut_ptr(),
                bucket_count,
            );
            core::ptr::write_bytes(
                self.alloc.as_ptr().add(self.layout.words_offset),
                0x0,
                self.layout.slots_offset - self.layout.words_offset,
            );
        }

        self.populated = 0;

        Drain {
            table: self,
            occupied,
            index: 0,
        }
    }

    /// Removes all elements from the table.
    ///
    /// The bucket array is retained, so the table keeps its capacity. All
    /// values are dropped.
    pub fn clear(&mut self) {
        // SAFETY: Occupied slots are exactly those with a non-zero word;
        // each is dropped once, then every word is zeroed so nothing is
        // seen as occupied afterwards.
        unsafe {
            if core::mem::needs_drop::<V>() && self.populated > 0 {
                for index in 0..=self.mask {
                    if *self.words_ptr().as_ref().get_unchecked(index) != 0 {
                        self.slots_ptr()
                            .as_mut()
                            .get_unchecked_mut(index)
                            .assume_init_drop();
                    }
                }
            }

            core::ptr::write_bytes(
                self.alloc.as_ptr().add(self.layout.words_offset),
                0x0,
                self.layout.slots_offset - self.layout.words_offset,
            );
        }

        self.populated = 0;
    }

    /// Reserves capacity for at least `additional` more elements.
    ///
    /// Resizes up front to whatever the allocation policy wants for
    /// `len() + additional` elements, so the following insertions do not
    /// resize one at a time.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.populated.saturating_add(additional);
        let min_desired = A::min_desired_buckets(required);
        if self.bucket_count() < min_desired {
            self.resize(min_desired);
        }
    }

    /// Shrinks the bucket array to the allocation policy's minimum for the
    /// current number of elements.
    pub fn shrink_to_fit(&mut self) {
        let min_desired = A::min_desired_buckets(self.populated);
        if self.bucket_count() > min_desired {
            self.resize(min_desired);
        }
    }

    /// Finds a value in the table by hash and equality predicate.
    ///
    /// Returns a reference to the value if found, or `None` if no matching
    /// value exists. This method does not modify the table and can be
    /// called on shared references.
    ///
    /// # Arguments
    ///
    /// * `hash` - The hash value to search for
    /// * `eq` - A predicate function that returns `true` for the desired
    ///   value
    #[inline]
    pub fn find(&self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&V> {
        if self.populated == 0 {
            return None;
        }

        let index = self.find_index(hash | OCCUPIED_MASK, &eq)?;
        // SAFETY: `find_index` only returns indices of occupied buckets,
        // whose slots are initialized.
        Some(unsafe { self.slots_ptr().as_ref().get_unchecked(index).assume_init_ref() })
    }

    /// Finds a value in the table by hash and equality predicate,
    /// returning a mutable reference.
    ///
    /// The caller may change the value, but must not change it in a way
    /// that alters its hash or its equality with the key it was stored
    /// under; use [`remove`](Self::remove) and re-insertion for that.
    #[inline]
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        if self.populated == 0 {
            return None;
        }

        let index = self.find_index(hash | OCCUPIED_MASK, &eq)?;
        // SAFETY: `find_index` only returns indices of occupied buckets,
        // whose slots are initialized.
        Some(unsafe {
            self.slots_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .assume_init_mut()
        })
    }

    /// Removes and returns a value from the table.
    ///
    /// The value is identified by its hash and an equality predicate. If
    /// the value is found it is removed, the buckets after it are shifted
    /// backward to close the gap, and the table may shrink if the
    /// allocation policy no longer wants this many buckets. Otherwise
    /// `None` is returned and the table is unchanged.
    ///
    /// # Arguments
    ///
    /// * `hash` - The hash value of the entry to remove
    /// * `eq` - A predicate function that returns `true` for the value to
    ///   remove
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Option<V> {
        if self.populated == 0 {
            return None;
        }

        let index = self.find_index(hash | OCCUPIED_MASK, &eq)?;

        // SAFETY: `find_index` returned an occupied bucket, so the slot is
        // initialized; after the read its storage is vacated, which is
        // exactly the state `erase_at` requires.
        let value = unsafe {
            let value = self
                .slots_ptr()
                .as_ref()
                .get_unchecked(index)
                .assume_init_read();
            self.erase_at(index);
            value
        };

        self.populated -= 1;
        self.shrink_if_sparse();

        Some(value)
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// This method returns an [`Entry`] that allows for insertion or
    /// modification of values without a second lookup. The table is grown
    /// up front if the allocation policy wants more buckets for one
    /// additional element, so a returned [`VacantEntry`] can always insert
    /// without resizing.
    ///
    /// # Arguments
    ///
    /// * `hash` - The hash value for the entry
    /// * `eq` - A predicate function that returns `true` for matching
    ///   values
    #[inline]
    pub fn entry(&mut self, hash: u64, eq: impl Fn(&V) -> bool) -> Entry<'_, V, A> {
        let min_desired = A::min_desired_buckets(self.populated + 1);
        if self.bucket_count() < min_desired {
            self.resize(min_desired);
        }

        let word = hash | OCCUPIED_MASK;
        match self.find_index(word, &eq) {
            Some(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            None => Entry::Vacant(VacantEntry { table: self, word }),
        }
    }

    /// Walk the probe sequence of `word` to a bucket the caller may fill.
    ///
    /// Stops at the first empty bucket, at a bucket already holding an
    /// equal value (same word and `eq`), or at a bucket whose resident has
    /// probed less than the search; in the last case the resident is
    /// evicted first and the emptied bucket is returned.
    ///
    /// # Safety
    ///
    /// The table must have at least one empty bucket; the eviction walk
    /// relies on it to terminate.
    #[inline]
    unsafe fn write_index(&mut self, word: u64, eq: &impl Fn(&V) -> bool) -> usize {
        debug_assert!(self.populated < self.bucket_count());

        let mut probe = 0;
        loop {
            let index = (word as usize).wrapping_add(probe) & self.mask;

            // SAFETY: `index` is masked into the bucket range.
            let occupant = unsafe { *self.words_ptr().as_ref().get_unchecked(index) };
            if occupant == 0 {
                return index;
            }

            if occupant == word {
                // SAFETY: A non-zero word marks the slot initialized.
                let value =
                    unsafe { self.slots_ptr().as_ref().get_unchecked(index).assume_init_ref() };
                if eq(value) {
                    return index;
                }
            }

            // SAFETY: `index` is in bounds and `occupant` is non-zero. The
            // caller guarantees an empty bucket exists, so the eviction
            // walk terminates.
            unsafe {
                if self.probe_count(index) < probe {
                    self.evict(index);
                    return index;
                }
            }

            probe += 1;
            debug_assert!(probe <= self.mask);
        }
    }

    /// Displace the resident of `index` forward to the next empty bucket.
    ///
    /// The resident moves into local state, then walks forward swapping
    /// itself with each occupant it meets until it lands in an empty
    /// bucket. Each value carries its own hash word along, so the probe
    /// ordering is preserved: every bucket the walk passes held a resident
    /// at the same or greater probe count.
    ///
    /// # Safety
    ///
    /// `index` must be within the bucket range and occupied, and the table
    /// must have at least one empty bucket.
    unsafe fn evict(&mut self, mut index: usize) {
        // SAFETY: Caller ensures `index` is occupied; reading the value
        // out and zeroing the word vacates the bucket. In the walk, every
        // accessed index is masked into range, a non-zero word marks its
        // slot initialized, and writes only target the vacated bucket.
        unsafe {
            let mut in_hand = self
                .slots_ptr()
                .as_ref()
                .get_unchecked(index)
                .assume_init_read();
            let mut in_hand_word = *self.words_ptr().as_ref().get_unchecked(index);
            debug_assert!(in_hand_word != 0);
            *self.words_ptr().as_mut().get_unchecked_mut(index) = 0;

            loop {
                index = (index + 1) & self.mask;

                if *self.words_ptr().as_ref().get_unchecked(index) == 0 {
                    self.slots_ptr()
                        .as_mut()
                        .get_unchecked_mut(index)
                        .write(in_hand);
                    *self.words_ptr().as_mut().get_unchecked_mut(index) = in_hand_word;
                    return;
                }

                core::mem::swap(
                    &mut in_hand,
                    self.slots_ptr()
                        .as_mut()
                        .get_unchecked_mut(index)
                        .assume_init_mut(),
                );
                core::mem::swap(
                    &mut in_hand_word,
                    self.words_ptr().as_mut().get_unchecked_mut(index),
                );
            }
        }
    }

    /// Close the gap left by an erased bucket by shifting successors
    /// backward.
    ///
    /// Successors shift one bucket toward their ideal until the run meets
    /// an empty bucket or a resident already in its ideal bucket (probe
    /// count 0), which must not move. Each shifted value carries its hash
    /// word; the final vacated bucket's word is zeroed.
    ///
    /// # Safety
    ///
    /// `index` must be within the bucket range, its word non-zero, and its
    /// value storage already moved out by the caller.
    unsafe fn erase_at(&mut self, mut index: usize) {
        // SAFETY: All indices are masked into range. `probe_count` is only
        // consulted for buckets with a non-zero word. The value read from
        // `next` pairs with exactly one write into the vacated `index`, so
        // every element is moved at most once; the starting bucket's
        // storage was vacated by the caller.
        unsafe {
            loop {
                let next = (index + 1) & self.mask;

                let next_word = *self.words_ptr().as_ref().get_unchecked(next);
                if next_word == 0 || self.probe_count(next) == 0 {
                    *self.words_ptr().as_mut().get_unchecked_mut(index) = 0;
                    return;
                }

                let value = self
                    .slots_ptr()
                    .as_ref()
                    .get_unchecked(next)
                    .assume_init_read();
                self.slots_ptr()
                    .as_mut()
                    .get_unchecked_mut(index)
                    .write(value);
                *self.words_ptr().as_mut().get_unchecked_mut(index) = next_word;

                index = next;
            }
        }
    }

    /// Shrink the bucket array if the policy no longer tolerates its size
    /// for the current element count.
    fn shrink_if_sparse(&mut self) {
        let max_desired = A::max_desired_buckets(self.populated);
        if self.bucket_count() > max_desired {
            self.resize(max_desired);
        }
    }

    /// Reallocate to `new_bucket_count` buckets and reinsert every value.
    ///
    /// Values are reinserted through the ordinary write walk using their
    /// stored hash words, so no value is re-hashed and the new array
    /// satisfies the probe ordering by construction. Used for both growth
    /// and shrinkage; the element count is unchanged.
    fn resize(&mut self, new_bucket_count: usize) {
        debug_assert!(new_bucket_count > 1);
        debug_assert!(new_bucket_count.is_power_of_two());
        debug_assert!(self.populated < new_bucket_count);
        debug_assert_eq!(new_bucket_count as u64 & OCCUPIED_MASK, 0);

        let old_layout = self.layout;
        let old_alloc = self.alloc;
        let old_bucket_count = self.bucket_count();

        self.layout = DataLayout::new::<V>(new_bucket_count);
        self.alloc = allocate_buckets(self.layout);
        self.mask = new_bucket_count - 1;

        // SAFETY: The old arrays stay live until the final dealloc and are
        // indexed within their own bucket count. Each occupied old slot is
        // read exactly once and written into a bucket that `write_index`
        // guarantees empty (the predicate never matches, and eviction
        // leaves its bucket vacated). The new table always has headroom
        // because `populated < new_bucket_count`.
        unsafe {
            let old_words = old_alloc.as_ptr().add(old_layout.words_offset) as *const u64;
            let old_slots = old_alloc.as_ptr().add(old_layout.slots_offset) as *const MaybeUninit<V>;

            for index in 0..old_bucket_count {
                let word = *old_words.add(index);
                if word != 0 {
                    let value = (*old_slots.add(index)).assume_init_read();
                    let new_index = self.write_index(word, &|_| false);
                    debug_assert_eq!(*self.words_ptr().as_ref().get_unchecked(new_index), 0);

                    self.slots_ptr()
                        .as_mut()
                        .get_unchecked_mut(new_index)
                        .write(value);
                    *self.words_ptr().as_mut().get_unchecked_mut(new_index) = word;
                }
            }

            alloc::alloc::dealloc(old_alloc.as_ptr(), old_layout.layout);
        }
    }

    /// Space and probe statistics from one pass over the bucket array.
    pub fn analyze_space_usage(&self) -> SpaceUsage {
        let mut max_probe_count = 0;
        let mut total_probe_count = 0usize;

        // SAFETY: Indices run over the bucket range; `probe_count` is only
        // consulted where the word is non-zero.
        unsafe {
            for index in 0..=self.mask {
                if *self.words_ptr().as_ref().get_unchecked(index) != 0 {
                    let probe_count = self.probe_count(index);
                    max_probe_count = max_probe_count.max(probe_count);
                    total_probe_count += probe_count;
                }
            }
        }

        SpaceUsage {
            total_memory_bytes: self.layout.layout.size() + core::mem::size_of::<Self>(),
            max_probe_count,
            occupancy: self.populated as f64 / self.bucket_count() as f64,
            average_probe_count: if self.populated == 0 {
                0.0
            } else {
                total_probe_count as f64 / self.populated as f64
            },
        }
    }

    /// Distribution of probe counts over the occupied buckets.
    #[cfg(feature = "stats")]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut count_by_probe_length = alloc::vec::Vec::new();

        // SAFETY: Indices run over the bucket range; `probe_count` is only
        // consulted where the word is non-zero.
        unsafe {
            for index in 0..=self.mask {
                if *self.words_ptr().as_ref().get_unchecked(index) != 0 {
                    let probe_count = self.probe_count(index);
                    if probe_count >= count_by_probe_length.len() {
                        count_by_probe_length.resize(probe_count + 1, 0);
                    }
                    count_by_probe_length[probe_count] += 1;
                }
            }
        }

        ProbeHistogram {
            populated: self.populated,
            buckets: self.bucket_count(),
            count_by_probe_length,
        }
    }

    /// Exhaustively verify the structural invariants. Test builds only.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        let bucket_count = self.bucket_count();
        assert!(bucket_count >= 2, "bucket count below minimum");
        assert!(
            bucket_count.is_power_of_two(),
            "bucket count not a power of two"
        );
        assert_eq!(self.mask, bucket_count - 1);
        assert_eq!(self.mask as u64 & OCCUPIED_MASK, 0);
        assert!(self.populated <= bucket_count);

        // SAFETY: All indices below are within the bucket range and
        // `probe_count` is only consulted for non-zero words.
        unsafe {
            let words = self.words_ptr().as_ref();

            let occupied = words.iter().filter(|&&word| word != 0).count();
            assert_eq!(occupied, self.populated, "phantom occupancy");

            for (index, &word) in words.iter().enumerate() {
                if word == 0 {
                    continue;
                }
                assert!(word & OCCUPIED_MASK != 0, "occupied word missing flag bit");

                let next = (index + 1) & self.mask;
                let next_word = words[next];
                if next_word != 0 {
                    assert!(
                        self.probe_count(next) <= self.probe_count(index) + 1,
                        "probe ordering violated between {} and {}",
                        index,
                        next,
                    );
                }

                // A displaced value always has an occupied predecessor;
                // otherwise a lookup would stop at the gap and miss it.
                let prev = (index + self.mask) & self.mask;
                if words[prev] == 0 {
                    assert_eq!(
                        self.probe_count(index),
                        0,
                        "bucket {} is displaced behind an empty bucket",
                        index,
                    );
                }
            }
        }
    }
}

/// A view into a single slot of the table, which may either be vacant or
/// occupied.
///
/// Constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V, A: AllocPolicy = DefaultAllocPolicy> {
    /// The table holds a matching value.
    Occupied(OccupiedEntry<'a, V, A>),
    /// The table holds no matching value; one may be inserted.
    Vacant(VacantEntry<'a, V, A>),
}

impl<'a, V, A: AllocPolicy> Entry<'a, V, A> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference to the value.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential insert.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }
}

impl<'a, V, A: AllocPolicy> Entry<'a, V, A>
where
    V: Default,
{
    /// Inserts the default value if the entry is vacant and returns a
    /// mutable reference to the value.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant slot in the table.
pub struct VacantEntry<'a, V, A: AllocPolicy = DefaultAllocPolicy> {
    table: &'a mut HashTable<V, A>,
    word: u64,
}

impl<'a, V, A: AllocPolicy> VacantEntry<'a, V, A> {
    /// Inserts the value and returns a mutable reference to it.
    ///
    /// This runs the write walk: the value lands in the first bucket it is
    /// entitled to, evicting a resident with a smaller probe count if the
    /// walk meets one. Until `insert` is called the table is untouched, so
    /// an abandoned vacant entry has no effect.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;

        // SAFETY: `entry` grew the table for one more element before
        // handing out this entry, so an empty bucket exists and the write
        // walk terminates. The returned bucket is empty (the predicate
        // never matched during `entry`, and eviction vacates), so writing
        // the value and word makes it occupied and initialized.
        unsafe {
            let index = table.write_index(self.word, &|_| false);
            debug_assert_eq!(*table.words_ptr().as_ref().get_unchecked(index), 0);

            table
                .slots_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .write(value);
            *table.words_ptr().as_mut().get_unchecked_mut(index) = self.word;
            table.populated += 1;

            table
                .slots_ptr()
                .as_mut()
                .get_unchecked_mut(index)
                .assume_init_mut()
        }
    }
}

/// A view into an occupied slot in the table.
pub struct OccupiedEntry<'a, V, A: AllocPolicy = DefaultAllocPolicy> {
    table: &'a mut HashTable<V, A>,
    index: usize,
}

impl<'a, V, A: AllocPolicy> OccupiedEntry<'a, V, A> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        // SAFETY: `self.index` was returned by a lookup on an occupied
        // bucket, and the table cannot change while this entry borrows it.
        unsafe {
            self.table
                .slots_ptr()
                .as_ref()
                .get_unchecked(self.index)
                .assume_init_ref()
        }
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: Same argument as `get`.
        unsafe {
            self.table
                .slots_ptr()
                .as_mut()
                .get_unchecked_mut(self.index)
                .assume_init_mut()
        }
    }

    /// Converts the entry into a mutable reference to the value with the
    /// table's lifetime.
    pub fn into_mut(self) -> &'a mut V {
        // SAFETY: Same argument as `get`.
        unsafe {
            self.table
                .slots_ptr()
                .as_mut()
                .get_unchecked_mut(self.index)
                .assume_init_mut()
        }
    }

    /// Replaces the value in the entry, returning the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }

    /// Removes the entry from the table and returns its value.
    ///
    /// The buckets after the removed value are shifted backward to close
    /// the gap, and the table may shrink per the allocation policy.
    pub fn remove(self) -> V {
        let table = self.table;

        // SAFETY: `self.index` is an occupied bucket, so the slot is
        // initialized; after the read its storage is vacated, which is the
        // state `erase_at` requires.
        let value = unsafe {
            let value = table
                .slots_ptr()
                .as_ref()
                .get_unchecked(self.index)
                .assume_init_read();
            table.erase_at(self.index);
            value
        };

        table.populated -= 1;
        table.shrink_if_sparse();

        value
    }
}

/// An iterator over the values of a [`HashTable`].
pub struct Iter<'a, V, A = DefaultAllocPolicy> {
    table: &'a HashTable<V, A>,
    index: usize,
}

impl<'a, V, A> Iterator for Iter<'a, V, A> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index <= self.table.mask {
            let index = self.index;
            self.index += 1;

            // SAFETY: `index` stays within the bucket range and a non-zero
            // word marks the slot initialized.
            unsafe {
                if *self.table.words_ptr().as_ref().get_unchecked(index) != 0 {
                    return Some(
                        self.table
                            .slots_ptr()
                            .as_ref()
                            .get_unchecked(index)
                            .assume_init_ref(),
                    );
                }
            }
        }

        None
    }
}

/// A draining iterator over the values of a [`HashTable`].
///
/// Yields every value that was in the table when [`HashTable::drain`] was
/// called; unyielded values are dropped with the iterator.
pub struct Drain<'a, V, A: AllocPolicy = DefaultAllocPolicy> {
    table: &'a mut HashTable<V, A>,
    occupied: Box<[u64]>,
    index: usize,
}

impl<V, A: AllocPolicy> Iterator for Drain<'_, V, A> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.occupied.len() {
            let index = self.index;
            self.index += 1;

            if self.occupied[index] != 0 {
                // SAFETY: The snapshot marks this slot as holding a live
                // value that the table disowned when `drain` zeroed its
                // words; the iterator yields each such slot exactly once.
                return Some(unsafe {
                    self.table
                        .slots_ptr()
                        .as_ref()
                        .get_unchecked(index)
                        .assume_init_read()
                });
            }
        }

        None
    }
}

impl<V, A: AllocPolicy> Drop for Drain<'_, V, A> {
    fn drop(&mut self) {
        for _ in self {}
    }
}
