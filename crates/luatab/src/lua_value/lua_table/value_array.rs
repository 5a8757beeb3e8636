// Array part: dense storage for integer keys [1..slots.len()].
//
// The slot count is the table's "array length" and is resized only by
// rehash, by appends, and by the trailing-hole trim; interior removals
// just leave empty slots behind.

use crate::lua_value::LuaValue;

use super::TableSlot;

#[derive(Default)]
pub(crate) struct ValueArray {
    slots: Vec<TableSlot>,
}

impl ValueArray {
    pub fn new() -> Self {
        ValueArray { slots: Vec::new() }
    }

    /// Allocate `len` empty slots up front (presize / rehash).
    pub fn with_len(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || TableSlot::Empty);
        ValueArray { slots }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn in_bounds(&self, key: i64) -> bool {
        key >= 1 && (key as usize) <= self.slots.len()
    }

    /// 1-based read; None for out-of-bounds, holes and dead weak slots.
    #[inline]
    pub fn get(&self, key: i64) -> Option<LuaValue> {
        if !self.in_bounds(key) {
            return None;
        }
        self.slots[(key - 1) as usize].load()
    }

    /// 1-based in-place write; key must be in bounds.
    pub fn set_slot(&mut self, key: i64, slot: TableSlot) {
        self.slots[(key - 1) as usize] = slot;
    }

    pub fn push_slot(&mut self, slot: TableSlot) {
        self.slots.push(slot);
    }

    /// First live entry at 0-based index >= `from`, as a (key, value) pair.
    pub fn next_live(&self, from: usize) -> Option<(LuaValue, LuaValue)> {
        for (i, slot) in self.slots.iter().enumerate().skip(from) {
            if let Some(value) = slot.load() {
                return Some((LuaValue::integer((i + 1) as i64), value));
            }
        }
        None
    }

    /// Length of the run of empty/dead slots at the tail.
    pub fn trailing_holes(&self) -> usize {
        self.slots
            .iter()
            .rev()
            .take_while(|slot| !slot.is_present())
            .count()
    }

    pub fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }

    /// Tombstone every slot whose weak referent has been collected.
    pub fn collect_dead(&mut self) {
        for slot in &mut self.slots {
            if let TableSlot::Weak(w) = slot {
                if w.is_dead() {
                    *slot = TableSlot::Empty;
                }
            }
        }
    }

    /// Consume the array part, yielding (key, slot) for each live entry.
    pub fn into_live(self) -> Vec<(i64, TableSlot)> {
        self.slots
            .into_iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_present())
            .map(|(i, slot)| ((i + 1) as i64, slot))
            .collect()
    }
}
