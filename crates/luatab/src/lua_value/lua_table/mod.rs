// Lua table: array part for integer keys [1..n], hash part for the rest.
mod hash_table;
mod value_array;

use crate::error::{LuaError, LuaResult};
use crate::gc::WeakRef;
use crate::lua_value::LuaValue;

use hash_table::{HashTable, NextOutcome, NodeKey, SetOutcome};
use value_array::ValueArray;

/// Integer keys above this bound never qualify for the array part.
const MAX_ARRAY_KEY: i64 = 1 << 30;
const MAX_ARRAY_LOG: usize = 30;

/// Which sides of an entry are held weakly. Fixed at construction; the host
/// maps the metatable `__mode` field onto this with [`WeakMode::parse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeakMode {
    #[default]
    None,
    Keys,
    Values,
    Both,
}

impl WeakMode {
    /// Interpret a `__mode` string: 'k' for weak keys, 'v' for weak values.
    pub fn parse(mode: &str) -> WeakMode {
        match (mode.contains('k'), mode.contains('v')) {
            (false, false) => WeakMode::None,
            (true, false) => WeakMode::Keys,
            (false, true) => WeakMode::Values,
            (true, true) => WeakMode::Both,
        }
    }

    #[inline]
    pub fn weak_keys(self) -> bool {
        matches!(self, WeakMode::Keys | WeakMode::Both)
    }

    #[inline]
    pub fn weak_values(self) -> bool {
        matches!(self, WeakMode::Values | WeakMode::Both)
    }
}

/// A stored value cell. Weak cells do not keep their referent alive and are
/// re-checked on every load; strings and other scalars are always strong.
#[derive(Clone)]
pub(crate) enum TableSlot {
    Empty,
    Strong(LuaValue),
    Weak(WeakRef),
}

impl TableSlot {
    pub fn load(&self) -> Option<LuaValue> {
        match self {
            TableSlot::Empty => None,
            TableSlot::Strong(v) => Some(v.clone()),
            TableSlot::Weak(w) => w.upgrade(),
        }
    }

    pub fn is_present(&self) -> bool {
        match self {
            TableSlot::Empty => false,
            TableSlot::Strong(_) => true,
            TableSlot::Weak(w) => !w.is_dead(),
        }
    }
}

/// Hybrid table.
///
/// Contiguous integer keys from 1 live in a dense array part; every other
/// key lives in a chained-scatter hash part. Both parts are resized together
/// by the rehash pass, which keeps the array part covering the largest
/// power-of-two range that is at least half populated.
pub struct LuaTable {
    array: ValueArray,
    hash: HashTable,
    mode: WeakMode,
}

impl LuaTable {
    /// Create an empty table. Allocates nothing until first use.
    pub fn new() -> Self {
        LuaTable {
            array: ValueArray::new(),
            hash: HashTable::new(),
            mode: WeakMode::None,
        }
    }

    /// Create a table with capacity hints. Hints are advisory: the array
    /// hint rounds up to a power of two, and zero hints are valid.
    pub fn with_capacity(narray: usize, nhash: usize) -> Self {
        Self::with_mode(narray, nhash, WeakMode::None)
    }

    pub fn with_mode(narray: usize, nhash: usize, mode: WeakMode) -> Self {
        let array = if narray > 0 {
            ValueArray::with_len(narray.next_power_of_two())
        } else {
            ValueArray::new()
        };
        let hash = if nhash > 0 {
            HashTable::with_capacity(nhash)
        } else {
            HashTable::new()
        };
        LuaTable { array, hash, mode }
    }

    #[inline]
    pub fn weak_mode(&self) -> WeakMode {
        self.mode
    }

    /// Allocated size of the array part. Not the entry count: interior
    /// holes and slack from rehash sizing are included.
    #[inline]
    pub fn array_length(&self) -> usize {
        self.array.len()
    }

    /// Allocated size of the hash part.
    #[inline]
    pub fn hash_length(&self) -> usize {
        self.hash.capacity()
    }

    /// Live entry count of the hash part.
    pub fn hash_entries(&self) -> usize {
        self.hash.live_count()
    }

    // ============ Get / set ============

    /// Fast integer access - O(1) for the array part.
    #[inline]
    pub fn get_int(&self, key: i64) -> LuaValue {
        if self.array.in_bounds(key) {
            return self.array.get(key).unwrap_or(LuaValue::Nil);
        }
        self.hash
            .get(&LuaValue::integer(key))
            .unwrap_or(LuaValue::Nil)
    }

    /// Generic access. Total: invalid keys, absent keys and collected weak
    /// entries all read as nil.
    pub fn raw_get(&self, key: &LuaValue) -> LuaValue {
        let Ok(key) = key.clone().normalize_key() else {
            return LuaValue::Nil;
        };
        match key {
            LuaValue::Integer(i) => self.get_int(i),
            key => self.hash.get(&key).unwrap_or(LuaValue::Nil),
        }
    }

    /// Generic write. Assigning nil removes the key; nil and NaN keys are
    /// rejected.
    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        let key = key.normalize_key()?;
        self.set_norm(key, value);
        Ok(())
    }

    /// Integer write; integer keys are always valid.
    pub fn set_int(&mut self, key: i64, value: LuaValue) {
        self.set_norm(LuaValue::integer(key), value);
    }

    /// Write with a pre-normalized key.
    fn set_norm(&mut self, key: LuaValue, value: LuaValue) {
        if let LuaValue::Integer(i) = key {
            if self.array.in_bounds(i) {
                let removing = value.is_nil();
                let slot = self.wrap_value(value);
                self.array.set_slot(i, slot);
                if removing {
                    self.maybe_trim_array();
                }
                return;
            }
            if i == self.array.len() as i64 + 1 && i <= MAX_ARRAY_KEY && !value.is_nil() {
                self.append_and_migrate(value);
                return;
            }
        }

        if value.is_nil() {
            self.hash.remove(&key);
            return;
        }
        self.set_in_hash(key, value);
    }

    /// Append at array end, then pull any contiguous successors that were
    /// parked in the hash part.
    fn append_and_migrate(&mut self, value: LuaValue) {
        let slot = self.wrap_value(value);
        self.array.push_slot(slot);
        while let Some(slot) = self.hash.take_int(self.array.len() as i64 + 1) {
            self.array.push_slot(slot);
        }
    }

    fn set_in_hash(&mut self, key: LuaValue, value: LuaValue) {
        let slot = self.wrap_value(value);
        let slot = match self.hash.set(&key, slot, self.mode.weak_keys()) {
            SetOutcome::Done => return,
            SetOutcome::NeedsRehash(slot) => slot,
        };

        self.rehash(Some(&key));

        // The rebuild may have grown the array part over this key
        if let LuaValue::Integer(i) = key {
            if self.array.in_bounds(i) {
                self.array.set_slot(i, slot);
                return;
            }
            if i == self.array.len() as i64 + 1 && i <= MAX_ARRAY_KEY {
                self.array.push_slot(slot);
                while let Some(slot) = self.hash.take_int(self.array.len() as i64 + 1) {
                    self.array.push_slot(slot);
                }
                return;
            }
        }

        let retry = self.hash.set(&key, slot, self.mode.weak_keys());
        debug_assert!(
            matches!(retry, SetOutcome::Done),
            "rehash reserves room for the pending key"
        );
    }

    fn wrap_value(&self, value: LuaValue) -> TableSlot {
        if value.is_nil() {
            return TableSlot::Empty;
        }
        if self.mode.weak_values() {
            if let Some(weak) = WeakRef::demote(&value) {
                return TableSlot::Weak(weak);
            }
        }
        TableSlot::Strong(value)
    }

    /// Removal-side shrink: when more than half of the array part is one
    /// trailing run of holes, truncate the run. Nothing moves, so an
    /// in-flight iteration cursor stays valid.
    fn maybe_trim_array(&mut self) {
        let run = self.array.trailing_holes();
        let len = self.array.len();
        if run > len / 2 {
            self.array.truncate(len - run);
        }
    }

    // ============ Length ============

    /// A border: some n with `t[n] ~= nil` and `t[n+1] == nil` (0 for an
    /// empty sequence). Exact element count when the sequence has no holes.
    pub fn rawlen(&self) -> i64 {
        let a = self.array.len() as i64;
        let mut n = a + 1;
        let mut m = 0i64;
        // Gallop past the populated range, then binary-search the border
        while !self.get_int(n).is_nil() {
            m = n;
            n += a + self.hash.capacity() as i64 + 1;
        }
        while n > m + 1 {
            let k = (n + m) / 2;
            if !self.get_int(k).is_nil() {
                m = k;
            } else {
                n = k;
            }
        }
        m
    }

    // ============ List protocol ============

    /// Insert at a 1-based position, shifting the tail up. Position 0 means
    /// append after the current border.
    pub fn insert(&mut self, pos: i64, value: LuaValue) {
        let mut pos = if pos == 0 { self.rawlen() + 1 } else { pos };
        let mut value = value;
        while !value.is_nil() {
            let displaced = self.get_int(pos);
            self.set_norm(LuaValue::integer(pos), value);
            value = displaced;
            pos += 1;
        }
    }

    /// Remove at a 1-based position, shifting the tail down. Position 0
    /// means the current border; positions past it remove nothing. Returns
    /// the removed value, or nil when nothing was removed.
    pub fn remove(&mut self, pos: i64) -> LuaValue {
        let n = self.rawlen();
        let mut pos = pos;
        if pos == 0 {
            pos = n;
        } else if pos > n {
            return LuaValue::Nil;
        }
        let removed = self.get_int(pos);
        let mut shifted = removed.clone();
        while !shifted.is_nil() {
            shifted = self.get_int(pos + 1);
            self.set_norm(LuaValue::integer(pos), shifted.clone());
            pos += 1;
        }
        removed
    }

    // ============ Iteration ============

    /// Cursor protocol behind `pairs`: `next(nil)` starts, each call
    /// returns the following live entry, and None ends the traversal.
    ///
    /// The array part is visited in index order, then the hash part in node
    /// order. Entries already visited may be removed mid-iteration; the
    /// removed key stays usable as a cursor.
    pub fn next(&self, key: &LuaValue) -> LuaResult<Option<(LuaValue, LuaValue)>> {
        let start = if key.is_nil() {
            0
        } else {
            let key = key
                .clone()
                .normalize_key()
                .map_err(|_| LuaError::InvalidNext)?;
            if let LuaValue::Integer(i) = key {
                if self.array.in_bounds(i) {
                    // Continue scanning the array part after this index
                    i as usize
                } else {
                    match self.hash.next_after(&key) {
                        NextOutcome::Found(pair) => return Ok(pair),
                        // An integer cursor beyond the array bound was
                        // stranded by a trailing trim; its remaining array
                        // successors are gone, so fall through to the hash
                        NextOutcome::Unknown if i > self.array.len() as i64 && i >= 1 => {
                            return Ok(self.hash.first());
                        }
                        NextOutcome::Unknown => return Err(LuaError::InvalidNext),
                    }
                }
            } else {
                match self.hash.next_after(&key) {
                    NextOutcome::Found(pair) => return Ok(pair),
                    NextOutcome::Unknown => return Err(LuaError::InvalidNext),
                }
            }
        };

        if let Some(pair) = self.array.next_live(start) {
            return Ok(Some(pair));
        }
        Ok(self.hash.first())
    }

    /// Borrowing iterator over live entries, built on [`LuaTable::next`].
    pub fn pairs(&self) -> Pairs<'_> {
        Pairs {
            table: self,
            cursor: LuaValue::Nil,
            done: false,
        }
    }

    /// Count of live entries, via full traversal.
    pub fn key_count(&self) -> usize {
        let mut count = 0;
        let mut cursor = LuaValue::Nil;
        while let Ok(Some((key, _))) = self.next(&cursor) {
            count += 1;
            cursor = key;
        }
        count
    }

    // ============ Weak maintenance ============

    /// Drop every entry whose weakly-held key or value has been collected
    /// by the host. Purely an eager sweep: dead entries already read as
    /// absent, and no slot is relocated, so iteration order is unchanged.
    pub fn collect_dead(&mut self) {
        self.array.collect_dead();
        self.hash.collect_dead();
    }

    // ============ Rehash ============

    /// Rebuild both parts around the live entries plus one pending key.
    ///
    /// The array part becomes the largest power of two n such that more
    /// than half of [1, n] is populated (and integer keys are not too
    /// sparse overall); remaining entries get a freshly sized hash part.
    fn rehash(&mut self, pending: Option<&LuaValue>) {
        let old_array = std::mem::take(&mut self.array);
        let old_hash = std::mem::replace(&mut self.hash, HashTable::new());

        let mut int_entries = old_array.into_live();
        let mut to_hash: Vec<(NodeKey, TableSlot)> = Vec::new();
        for (key, slot) in old_hash.into_live_entries() {
            match &key {
                NodeKey::Strong(LuaValue::Integer(k)) if (1..=MAX_ARRAY_KEY).contains(k) => {
                    int_entries.push((*k, slot));
                }
                _ => to_hash.push((key, slot)),
            }
        }

        // Histogram of integer keys by ceil(log2) bucket; keys past the
        // array bound can only land in the hash part and don't vote
        let mut nums = [0usize; MAX_ARRAY_LOG + 1];
        let mut total = 0usize;
        for (k, _) in &int_entries {
            if *k <= MAX_ARRAY_KEY {
                nums[ceil_log2(*k as usize)] += 1;
                total += 1;
            }
        }
        if let Some(LuaValue::Integer(k)) = pending {
            if (1..=MAX_ARRAY_KEY).contains(k) {
                nums[ceil_log2(*k as usize)] += 1;
                total += 1;
            }
        }

        let mut keys = nums[0];
        let mut new_array_size = 0usize;
        for log in 1..=MAX_ARRAY_LOG {
            keys += nums[log];
            if total * 2 < (1usize << log) {
                // Not enough integer keys
                break;
            }
            if keys >= (1usize << (log - 1)) {
                new_array_size = 1 << log;
            }
        }

        self.array = ValueArray::with_len(new_array_size);
        for (k, slot) in int_entries {
            if k <= new_array_size as i64 {
                self.array.set_slot(k, slot);
            } else {
                to_hash.push((NodeKey::Strong(LuaValue::integer(k)), slot));
            }
        }

        // Reserve a node for the pending key unless the array absorbed it
        let pending_to_hash = match pending {
            None => false,
            Some(LuaValue::Integer(k)) => *k < 1 || *k > new_array_size as i64,
            Some(_) => true,
        };

        let hash_need = to_hash.len() + usize::from(pending_to_hash);
        self.hash = if hash_need == 0 {
            HashTable::new()
        } else {
            HashTable::with_capacity(hash_need)
        };
        for (key, slot) in to_hash {
            self.hash.insert_rebuilt(key, slot);
        }
    }
}

impl Default for LuaTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only traversal over a table's live entries.
pub struct Pairs<'a> {
    table: &'a LuaTable,
    cursor: LuaValue,
    done: bool,
}

impl Iterator for Pairs<'_> {
    type Item = (LuaValue, LuaValue);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.table.next(&self.cursor) {
            Ok(Some((key, value))) => {
                self.cursor = key.clone();
                Some((key, value))
            }
            _ => {
                self.done = true;
                None
            }
        }
    }
}

// Compute ceil(log2(x)) for x >= 1
fn ceil_log2(x: usize) -> usize {
    (usize::BITS - (x - 1).leading_zeros()) as usize
}
