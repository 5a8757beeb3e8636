// Hash part: chained scatter table with Brent's variation.
//
// Invariant: an element that is not in its main position collided with an
// element that IS in its own main position. Performance stays good even at
// full load, so the load check is simply live-entries >= capacity.
//
// Removal never unlinks a node: the value slot is cleared and the key kept
// in place, so an iteration cursor parked on the removed key can still find
// its successor. Tombstones are reclaimed when the table part is rebuilt.

use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;

use crate::gc::WeakRef;
use crate::lua_value::LuaValue;

use super::TableSlot;

const MIN_CAPACITY: usize = 2;

pub(crate) struct HashTable {
    /// Node array: key/value pairs plus chain links
    nodes: Vec<Node>,

    /// Free-node search cursor (scans backwards)
    last_free: usize,

    /// Number of occupied value slots. Exact for strong tables; an upper
    /// bound for weak tables until the next collect/rebuild recounts.
    entries: usize,

    hash_state: RandomState,
}

struct Node {
    key: NodeKey,
    value: TableSlot,
    /// Chain link as a relative offset (0 = end of chain)
    next: i32,
}

/// Key slot of a hash node. Weak keys keep their allocation address
/// comparable after the referent dies, so lookups and chain maintenance
/// stay sound while the node awaits reclamation.
pub(crate) enum NodeKey {
    Vacant,
    Strong(LuaValue),
    Weak(WeakRef),
}

impl NodeKey {
    #[inline]
    fn is_vacant(&self) -> bool {
        matches!(self, NodeKey::Vacant)
    }

    /// The key as a strong value, if it is still alive.
    pub fn live(&self) -> Option<LuaValue> {
        match self {
            NodeKey::Vacant => None,
            NodeKey::Strong(k) => Some(k.clone()),
            NodeKey::Weak(w) => w.upgrade(),
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            NodeKey::Vacant => false,
            NodeKey::Strong(_) => false,
            NodeKey::Weak(w) => w.is_dead(),
        }
    }

    fn matches(&self, key: &LuaValue) -> bool {
        match self {
            NodeKey::Vacant => false,
            NodeKey::Strong(k) => k.raw_eq(key),
            NodeKey::Weak(w) => key.identity_addr().is_some_and(|addr| addr == w.addr()),
        }
    }
}

impl Node {
    #[inline]
    fn new_empty() -> Self {
        Node {
            key: NodeKey::Vacant,
            value: TableSlot::Empty,
            next: 0,
        }
    }

    /// Never-used node, available for allocation. Tombstones are not free:
    /// their keys still participate in chains and cursor lookups.
    #[inline]
    fn is_free(&self) -> bool {
        self.key.is_vacant()
    }

    fn is_live(&self) -> bool {
        let key_alive = match &self.key {
            NodeKey::Vacant => false,
            NodeKey::Strong(_) => true,
            NodeKey::Weak(w) => !w.is_dead(),
        };
        key_alive && self.value.is_present()
    }

    fn live_pair(&self) -> Option<(LuaValue, LuaValue)> {
        let key = self.key.live()?;
        let value = self.value.load()?;
        Some((key, value))
    }
}

/// Result of a plain insert attempt. The caller owns rehashing because
/// sizing needs the array part too.
pub(crate) enum SetOutcome {
    Done,
    /// Load factor reached or free nodes exhausted; the slot is handed back
    /// so the caller can rebuild and retry.
    NeedsRehash(TableSlot),
}

pub(crate) enum NextOutcome {
    /// Cursor key found; Some(successor) or None at the end of the part.
    Found(Option<(LuaValue, LuaValue)>),
    /// Cursor key is not (and never was) in this part.
    Unknown,
}

impl HashTable {
    pub fn new() -> Self {
        HashTable {
            nodes: Vec::new(),
            last_free: 0,
            entries: 0,
            hash_state: RandomState::new(),
        }
    }

    /// Capacity for `needed` live entries: next power of two, bumped to the
    /// adjacent odd number for better modulo distribution.
    pub fn capacity_for(needed: usize) -> usize {
        if needed == 0 {
            0
        } else {
            needed.next_power_of_two().max(MIN_CAPACITY) + 1
        }
    }

    pub fn with_capacity(needed: usize) -> Self {
        let capacity = Self::capacity_for(needed);
        let mut nodes = Vec::with_capacity(capacity);
        nodes.resize_with(capacity, Node::new_empty);
        HashTable {
            last_free: nodes.len(),
            nodes,
            entries: 0,
            hash_state: RandomState::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Exact live-entry count (recounts weak slots).
    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_live()).count()
    }

    // ============ Hashing ============

    fn hash_value(&self, key: &LuaValue) -> u64 {
        match key {
            LuaValue::Nil => 0,
            LuaValue::Boolean(b) => *b as u64 + 1,
            // Integers hash to their own value; with an odd modulus this
            // distributes well and keeps the common case branch-free
            LuaValue::Integer(i) => *i as u64,
            LuaValue::Float(n) => n.to_bits(),
            LuaValue::Str(s) => {
                let mut hasher = self.hash_state.build_hasher();
                s.as_str().hash(&mut hasher);
                hasher.finish()
            }
            _ => key.identity_addr().unwrap_or(0) as u64,
        }
    }

    fn node_hash(&self, key: &NodeKey) -> u64 {
        match key {
            NodeKey::Vacant => 0,
            NodeKey::Strong(k) => self.hash_value(k),
            NodeKey::Weak(w) => w.addr() as u64,
        }
    }

    #[inline]
    fn main_position(&self, hash: u64) -> usize {
        (hash as usize) % self.nodes.len()
    }

    fn node_main_position(&self, idx: usize) -> usize {
        let hash = self.node_hash(&self.nodes[idx].key);
        self.main_position(hash)
    }

    fn get_free_pos(&mut self) -> Option<usize> {
        while self.last_free > 0 {
            self.last_free -= 1;
            if self.nodes[self.last_free].is_free() {
                return Some(self.last_free);
            }
        }
        None
    }

    // ============ Lookup ============

    fn find_node(&self, key: &LuaValue) -> Option<usize> {
        if self.nodes.is_empty() {
            return None;
        }

        let hash = self.hash_value(key);
        let mut idx = self.main_position(hash);

        loop {
            let node = &self.nodes[idx];
            if node.key.matches(key) {
                return Some(idx);
            }
            if node.next == 0 {
                return None;
            }
            idx = (idx as i64 + node.next as i64) as usize;
        }
    }

    pub fn get(&self, key: &LuaValue) -> Option<LuaValue> {
        let idx = self.find_node(key)?;
        self.nodes[idx].value.load()
    }

    // ============ Mutation ============

    pub fn set(&mut self, key: &LuaValue, slot: TableSlot, weak_keys: bool) -> SetOutcome {
        if self.nodes.is_empty() {
            return SetOutcome::NeedsRehash(slot);
        }

        if let Some(idx) = self.find_node(key) {
            // In-place update; a tombstoned key comes back to life
            if matches!(self.nodes[idx].value, TableSlot::Empty) {
                self.entries += 1;
            }
            self.nodes[idx].value = slot;
            return SetOutcome::Done;
        }

        if self.entries >= self.nodes.len() {
            return SetOutcome::NeedsRehash(slot);
        }

        let hash = self.hash_value(key);
        let node_key = if weak_keys {
            match WeakRef::demote(key) {
                Some(w) => NodeKey::Weak(w),
                None => NodeKey::Strong(key.clone()),
            }
        } else {
            NodeKey::Strong(key.clone())
        };

        match self.insert_new_key(node_key, slot, hash) {
            Ok(()) => {
                self.entries += 1;
                SetOutcome::Done
            }
            Err(slot) => SetOutcome::NeedsRehash(slot),
        }
    }

    /// Insert a key known to be absent. Core of Brent's variation: if the
    /// main position holds a node that is not in its own main position,
    /// that node is evicted to a free slot and the new key takes its place.
    fn insert_new_key(
        &mut self,
        key: NodeKey,
        value: TableSlot,
        hash: u64,
    ) -> Result<(), TableSlot> {
        let main_pos = self.main_position(hash);

        if self.nodes[main_pos].is_free() {
            self.nodes[main_pos] = Node {
                key,
                value,
                next: 0,
            };
            return Ok(());
        }

        let Some(free_pos) = self.get_free_pos() else {
            return Err(value);
        };

        let other_main = self.node_main_position(main_pos);

        if other_main == main_pos {
            // Resident owns this position; link the new node at chain end
            self.nodes[free_pos] = Node {
                key,
                value,
                next: 0,
            };
            let mut idx = main_pos;
            loop {
                let next = self.nodes[idx].next;
                if next == 0 {
                    self.nodes[idx].next = free_pos as i32 - idx as i32;
                    break;
                }
                idx = (idx as i64 + next as i64) as usize;
            }
        } else {
            // Resident collided into this position; repoint its chain,
            // move it out, and claim the main position
            let mut idx = other_main;
            loop {
                let next = self.nodes[idx].next;
                let next_idx = (idx as i64 + next as i64) as usize;
                if next_idx == main_pos {
                    self.nodes[idx].next = free_pos as i32 - idx as i32;
                    break;
                }
                idx = next_idx;
            }

            let mut displaced = std::mem::replace(
                &mut self.nodes[main_pos],
                Node {
                    key,
                    value,
                    next: 0,
                },
            );
            if displaced.next != 0 {
                // Chain offsets are relative; keep the absolute target
                displaced.next += main_pos as i32 - free_pos as i32;
            }
            self.nodes[free_pos] = displaced;
        }

        Ok(())
    }

    /// Clear the value but keep the key, so `next` can still walk past it.
    /// Returns whether a live entry was removed.
    pub fn remove(&mut self, key: &LuaValue) -> bool {
        if let Some(idx) = self.find_node(key) {
            if !matches!(self.nodes[idx].value, TableSlot::Empty) {
                let was_live = self.nodes[idx].value.is_present();
                self.nodes[idx].value = TableSlot::Empty;
                self.entries -= 1;
                return was_live;
            }
        }
        false
    }

    /// Extract the live slot stored under an integer key, tombstoning the
    /// node. Used when the array part grows over contiguous hash keys.
    pub fn take_int(&mut self, key: i64) -> Option<TableSlot> {
        let key = LuaValue::integer(key);
        let idx = self.find_node(&key)?;
        let slot = std::mem::replace(&mut self.nodes[idx].value, TableSlot::Empty);
        match slot {
            TableSlot::Empty => None,
            slot => {
                self.entries -= 1;
                if slot.is_present() { Some(slot) } else { None }
            }
        }
    }

    // ============ Iteration ============

    /// First live entry in node order.
    pub fn first(&self) -> Option<(LuaValue, LuaValue)> {
        self.nodes.iter().find_map(Node::live_pair)
    }

    /// Successor of `key` in node order.
    pub fn next_after(&self, key: &LuaValue) -> NextOutcome {
        match self.find_node(key) {
            Some(idx) => {
                let successor = self.nodes[idx + 1..].iter().find_map(Node::live_pair);
                NextOutcome::Found(successor)
            }
            None => NextOutcome::Unknown,
        }
    }

    // ============ Weak maintenance / rebuild ============

    /// Tombstone every entry whose weak key or weak value has died.
    pub fn collect_dead(&mut self) {
        for node in &mut self.nodes {
            if node.key.is_vacant() || matches!(node.value, TableSlot::Empty) {
                continue;
            }
            let value_dead = matches!(&node.value, TableSlot::Weak(w) if w.is_dead());
            if node.key.is_dead() || value_dead {
                node.value = TableSlot::Empty;
                self.entries -= 1;
            }
        }
    }

    /// Consume the part, yielding every live (key, slot) pair. Tombstones
    /// and dead weak entries are dropped here.
    pub fn into_live_entries(self) -> Vec<(NodeKey, TableSlot)> {
        self.nodes
            .into_iter()
            .filter(|node| node.is_live())
            .map(|node| (node.key, node.value))
            .collect()
    }

    /// Reinsert an entry during a rebuild. The table was pre-sized for the
    /// full live set, so allocation cannot fail.
    pub fn insert_rebuilt(&mut self, key: NodeKey, slot: TableSlot) {
        let hash = self.node_hash(&key);
        let inserted = self.insert_new_key(key, slot, hash);
        debug_assert!(inserted.is_ok(), "rebuilt hash part is pre-sized");
        if inserted.is_ok() {
            self.entries += 1;
        }
    }
}
