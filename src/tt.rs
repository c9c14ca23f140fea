//! Implements the shared transposition table.

use libc::c_void;
use std::cell::UnsafeCell;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use crate::depth::Depth;
use crate::moves::Move;
use crate::value::{depth_to_mate, is_mate, mate_in, mated_in, Value};


/// `BOUND_UPPER`, `BOUND_EXACT`, or `BOUND_LOWER`.
///
/// * `BOUND_UPPER` -- fail-low / all-node: no move improved alpha, so
///   the stored value is an upper bound on the real one.
///
/// * `BOUND_EXACT` -- PV-node: alpha was improved without reaching
///   beta, the stored value is exact.
///
/// * `BOUND_LOWER` -- fail-high / cut-node: a beta cutoff occurred,
///   the stored value is a lower bound on the real one.
pub type Bound = u8;

pub const BOUND_UPPER: Bound = 0;
pub const BOUND_EXACT: Bound = 1;
pub const BOUND_LOWER: Bound = 2;


/// Re-expresses a mate value stored relative to a node as absolute
/// ("mate in N from the root").
#[inline]
pub fn absolute_mate_value(value: Value, plies_to_root: Depth) -> Value {
    if value < 0 {
        mated_in(depth_to_mate(value) + plies_to_root)
    } else {
        mate_in(depth_to_mate(value) + plies_to_root)
    }
}

/// Re-expresses an absolute mate value relative to the current node.
///
/// Mate values are stored relative to the node they were found at.
/// This solves the issue of retrieving a "mate in x" when the current
/// distance to the root exceeds x.
#[inline]
pub fn relative_mate_value(value: Value, plies_to_root: Depth) -> Value {
    if value < 0 {
        mated_in(depth_to_mate(value) - plies_to_root)
    } else {
        mate_in(depth_to_mate(value) - plies_to_root)
    }
}


/// A transposition table entry.
///
/// Contains the best move, the value, the bound qualifying the value,
/// the depth to which these were established, and the epoch of the
/// search that stored them.
#[derive(Clone, Copy, Debug)]
pub struct Entry {
    pub depth: Depth,
    pub m: Move,
    pub value: Value,
    pub bound: Bound,
    pub epoch: u8,
}

impl Entry {
    /// Packs the entry into a single word for atomic publication.
    #[inline]
    fn pack(&self) -> u64 {
        (self.depth as u64) | ((self.m.data() as u64) << 8) |
        ((self.value as u16 as u64) << 24) | ((self.bound as u64 & 0b11) << 40) |
        ((self.epoch as u64 & 0b111111) << 42)
    }

    /// The inverse of `pack`.
    #[inline]
    fn unpack(data: u64) -> Entry {
        Entry {
            depth: data as u8,
            m: Move::from_data((data >> 8) as u16),
            value: (data >> 24) as u16 as i16,
            bound: ((data >> 40) & 0b11) as Bound,
            epoch: ((data >> 42) & 0b111111) as u8,
        }
    }
}


/// A bucket holds the packed entry together with its key, XOR-ed with
/// the packed data.
///
/// Storing `key ^ data` instead of the key itself makes torn
/// key/entry pairs detectable: a probe recomputes the XOR and a
/// mismatched pair simply misses. The two words are written with
/// relaxed atomics; no lock is ever taken.
#[repr(C)]
struct Bucket {
    key_xor_data: AtomicU64,
    data: AtomicU64,
}

const BUCKET_SIZE: usize = 16;
const CACHE_LINE: usize = 64;


struct Table {
    alloc_ptr: *mut c_void,
    buckets: *mut Bucket,
    bucket_count: usize,
}

impl Table {
    /// Allocates a zeroed table of (at least one) bucket, aligned to
    /// the cache line size.
    fn new(size_bytes: usize) -> Table {
        assert_eq!(mem::size_of::<Bucket>(), BUCKET_SIZE);
        let bucket_count = (size_bytes / BUCKET_SIZE).max(1);
        let alloc_ptr;
        let buckets = unsafe {
            alloc_ptr = libc::calloc(bucket_count * BUCKET_SIZE + CACHE_LINE, 1);
            assert!(!alloc_ptr.is_null(), "hash table allocation failed");
            let mut addr = alloc_ptr as usize;
            addr += CACHE_LINE;
            addr &= !(CACHE_LINE - 1);
            addr as *mut Bucket
        };
        Table {
            alloc_ptr,
            buckets,
            bucket_count,
        }
    }

    #[inline]
    fn bucket(&self, key: u64) -> &Bucket {
        unsafe { &*self.buckets.add((key % self.bucket_count as u64) as usize) }
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        unsafe {
            libc::free(self.alloc_ptr);
        }
    }
}


/// A fixed-size, key-indexed, always-replace transposition table.
///
/// The table is shared by every search thread. Reads and writes are
/// lock-free; a torn read is detected by the XOR-ed key and treated
/// as a miss, so a probe never returns a structurally invalid entry
/// (at worst a logically stale one).
///
/// `resize` and `clear` reallocate or rewrite the storage through a
/// shared reference and are only sound while no search is running;
/// the protocol driver stops the search pool before calling them.
pub struct TranspositionTable {
    table: UnsafeCell<Table>,
    epoch: AtomicU8,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

unsafe impl Sync for TranspositionTable {}
unsafe impl Send for TranspositionTable {}

impl TranspositionTable {
    /// Default size of the transposition table in bytes.
    pub const DEFAULT_SIZE: usize = 8 * 1024 * 1024;

    /// Creates a new table of a given size in bytes.
    pub fn new(size_bytes: usize) -> TranspositionTable {
        TranspositionTable {
            table: UnsafeCell::new(Table::new(size_bytes)),
            epoch: AtomicU8::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    #[inline]
    fn table(&self) -> &Table {
        unsafe { &*self.table.get() }
    }

    /// Returns the number of buckets in the table.
    pub fn bucket_count(&self) -> usize {
        self.table().bucket_count
    }

    /// Returns the current epoch (a 6-bit counter bumped once per
    /// search).
    #[inline]
    pub fn current_epoch(&self) -> u8 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Advances the epoch. Called at the start of each `go`, so
    /// entries from earlier searches are recognizably old.
    pub fn increment_epoch(&self) {
        let epoch = self.epoch.load(Ordering::Relaxed);
        self.epoch.store((epoch + 1) & 0b111111, Ordering::Relaxed);
    }

    /// Probes for an entry by key.
    #[inline]
    pub fn probe(&self, key: u64) -> Option<Entry> {
        let bucket = self.table().bucket(key);
        let data = bucket.data.load(Ordering::Relaxed);
        let key_xor_data = bucket.key_xor_data.load(Ordering::Relaxed);
        if data != 0 && key_xor_data ^ data == key {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Some(Entry::unpack(data))
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Stores a search result, replacing whatever occupied the
    /// bucket.
    ///
    /// Mate values are stored relative to the current node by
    /// rebasing them with `plies_to_root`; `probe` callers shift them
    /// back.
    pub fn save(&self,
                key: u64,
                depth: Depth,
                plies_to_root: Depth,
                mut value: Value,
                bound: Bound,
                m: Move) {
        if is_mate(value) {
            value = relative_mate_value(value, plies_to_root);
        }
        let entry = Entry {
            depth,
            m,
            value,
            bound,
            epoch: self.current_epoch(),
        };
        let data = entry.pack();
        let bucket = self.table().bucket(key);
        bucket.key_xor_data.store(key ^ data, Ordering::Relaxed);
        bucket.data.store(data, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes all entries. The search must be stopped.
    pub fn clear(&self) {
        let table = self.table();
        for i in 0..table.bucket_count {
            let bucket = unsafe { &*table.buckets.add(i) };
            bucket.key_xor_data.store(0, Ordering::Relaxed);
            bucket.data.store(0, Ordering::Relaxed);
        }
        self.epoch.store(0, Ordering::Relaxed);
        self.reset_statistics();
    }

    /// Reallocates the table with a new size in bytes. The search
    /// must be stopped.
    pub fn resize(&self, size_bytes: usize) {
        unsafe {
            *self.table.get() = Table::new(size_bytes);
        }
        self.reset_statistics();
    }

    fn reset_statistics(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }

    /// Returns the percentage of probes that hit.
    pub fn hit_rate(&self) -> u64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        100 * hits / (hits + misses).max(1)
    }

    /// Returns an approximate permillage of used buckets, sampled
    /// from a prefix of the table.
    pub fn hashfull_approx(&self) -> u64 {
        let table = self.table();
        let sample_size = table.bucket_count.min(2048);
        let mut used = 0;
        for i in 0..sample_size {
            let bucket = unsafe { &*table.buckets.add(i) };
            used += (bucket.data.load(Ordering::Relaxed) != 0) as u64;
        }
        used * 1000 / sample_size as u64
    }
}
