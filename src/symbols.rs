use smallvec::SmallVec;
use std::sync::{Arc, PoisonError, RwLock};

/// Names at most this long (in bytes) are interned; longer ones are decoded
/// directly every time they occur.
pub(crate) const MAX_INTERNED_LEN: usize = 64;

pub(crate) type QuadKey = SmallVec<[u32; 2]>;

/// Pack UTF-8 name bytes into little-endian 32-bit quads, zero-padding the
/// final partial quad. The byte length disambiguates names that only differ
/// in padding.
pub(crate) fn pack_quads(bytes: &[u8]) -> QuadKey {
    let mut quads = QuadKey::with_capacity((bytes.len() + 3) / 4);
    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        quads.push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut last = [0u8; 4];
        last[..rest.len()].copy_from_slice(rest);
        quads.push(u32::from_le_bytes(last));
    }
    quads
}

fn hash(quads: &[u32], len: usize) -> u32 {
    let mut h = len as u32;
    for q in quads {
        h = h.wrapping_mul(33).wrapping_add(*q);
    }
    h ^ (h >> 16)
}

struct Entry {
    hash: u32,
    len: u32,
    quads: QuadKey,
    name: Arc<str>,
}

/// Canonicalising table for decoded field names, keyed by packed quads.
///
/// Open addressing with linear probing over a power-of-two bucket array;
/// the whole table is rehashed when the load factor crosses 3/4. Once the
/// configured cap on distinct names is reached, new names bypass interning
/// entirely (the table keeps serving hits for the names it already holds).
pub struct SymbolTable {
    buckets: Box<[u32]>,
    entries: Vec<Entry>,
    max_names: usize,
}

const EMPTY: u32 = u32::MAX;
const INITIAL_BUCKETS: usize = 64;
const DEFAULT_MAX_NAMES: usize = 10_000;

impl SymbolTable {
    fn new(max_names: usize) -> Self {
        Self {
            buckets: vec![EMPTY; INITIAL_BUCKETS].into_boxed_slice(),
            entries: Vec::new(),
            max_names,
        }
    }

    /// Number of distinct names currently interned.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, quads: &[u32], len: usize) -> Option<Arc<str>> {
        let h = hash(quads, len);
        let mask = self.buckets.len() - 1;
        let mut idx = h as usize & mask;
        loop {
            match self.buckets[idx] {
                EMPTY => return None,
                slot => {
                    let e = &self.entries[slot as usize];
                    if e.hash == h && e.len == len as u32 && e.quads[..] == *quads {
                        return Some(e.name.clone());
                    }
                }
            }
            idx = (idx + 1) & mask;
        }
    }

    fn intern(&mut self, quads: &[u32], len: usize, name: &str) -> Arc<str> {
        // coalesce with a concurrent insertion that won the write lock first
        if let Some(existing) = self.find(quads, len) {
            return existing;
        }
        let name: Arc<str> = Arc::from(name);
        if self.entries.len() >= self.max_names {
            return name;
        }
        let h = hash(quads, len);
        let slot = self.entries.len() as u32;
        self.entries.push(Entry {
            hash: h,
            len: len as u32,
            quads: SmallVec::from_slice(quads),
            name: name.clone(),
        });
        self.insert_slot(h, slot);
        if self.entries.len() * 4 >= self.buckets.len() * 3 {
            self.rehash();
        }
        name
    }

    fn insert_slot(&mut self, h: u32, slot: u32) {
        let mask = self.buckets.len() - 1;
        let mut idx = h as usize & mask;
        while self.buckets[idx] != EMPTY {
            idx = (idx + 1) & mask;
        }
        self.buckets[idx] = slot;
    }

    fn rehash(&mut self) {
        self.buckets = vec![EMPTY; self.buckets.len() * 2].into_boxed_slice();
        for slot in 0..self.entries.len() {
            let h = self.entries[slot].hash;
            self.insert_slot(h, slot as u32);
        }
    }
}

/// Shared handle to a [`SymbolTable`].
///
/// Cloning the handle shares the table, so all decoders created from the
/// same handle canonicalise field names against one vocabulary. Lookups on
/// the common path only take the read lock; interning a new name takes the
/// write lock and linearises with other writers (first writer wins, later
/// ones receive the already-interned name).
#[derive(Clone)]
pub struct Symbols(Arc<RwLock<SymbolTable>>);

impl Default for Symbols {
    fn default() -> Self {
        Self::new()
    }
}

impl Symbols {
    pub fn new() -> Self {
        Self::with_max_names(DEFAULT_MAX_NAMES)
    }

    /// A table that stops interning new names once `max_names` distinct
    /// names have been seen.
    pub fn with_max_names(max_names: usize) -> Self {
        Self(Arc::new(RwLock::new(SymbolTable::new(max_names))))
    }

    /// The canonical name for the given packed key, if already interned.
    pub(crate) fn find(&self, quads: &[u32], len: usize) -> Option<Arc<str>> {
        let table = self.0.read().unwrap_or_else(PoisonError::into_inner);
        table.find(quads, len)
    }

    /// Intern `name` under the given packed key, returning the canonical
    /// instance (which may stem from a concurrent insertion).
    pub(crate) fn intern(&self, quads: &[u32], len: usize, name: &str) -> Arc<str> {
        let mut table = self.0.write().unwrap_or_else(PoisonError::into_inner);
        table.intern(quads, len, name)
    }

    /// Number of distinct names currently interned.
    pub fn len(&self) -> usize {
        let table = self.0.read().unwrap_or_else(PoisonError::into_inner);
        table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
