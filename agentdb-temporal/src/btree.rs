//! The B+ tree itself.
//!
//! Keys are epoch-millisecond timestamps; each leaf key carries a bucket
//! of episode ids so episodes sharing a timestamp coexist. Interior
//! nodes hold separators only. All structural references are arena slot
//! indices; freed slots go on a free list and are reused.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ORDER: usize = 32;

#[derive(Debug)]
pub(crate) enum NodeSlot {
    Internal {
        keys: Vec<i64>,
        children: Vec<usize>,
    },
    Leaf {
        keys: Vec<i64>,
        buckets: Vec<Vec<String>>,
        prev: Option<usize>,
        next: Option<usize>,
    },
}

/// Shape summary returned by [`TimeIndex::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeIndexStats {
    /// Total `(timestamp, id)` entries.
    pub entries: usize,
    /// Distinct timestamps.
    pub keys: usize,
    pub leaves: usize,
    pub height: usize,
    pub order: usize,
}

/// Order-32 leaf-linked B+ tree over `timestamp -> [episode id]`.
pub struct TimeIndex {
    pub(crate) slots: Vec<Option<NodeSlot>>,
    free: Vec<usize>,
    pub(crate) root: usize,
    pub(crate) order: usize,
    entries: usize,
}

impl Default for TimeIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeIndex {
    pub fn new() -> Self {
        Self::with_order(DEFAULT_ORDER)
    }

    /// Order must be at least 4; anything lower cannot rebalance.
    pub fn with_order(order: usize) -> Self {
        let order = order.max(4);
        let mut index = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: 0,
            order,
            entries: 0,
        };
        index.root = index.alloc(NodeSlot::Leaf {
            keys: Vec::new(),
            buckets: Vec::new(),
            prev: None,
            next: None,
        });
        index
    }

    fn max_keys(&self) -> usize {
        self.order - 1
    }

    fn min_keys(&self) -> usize {
        self.order / 2 - 1
    }

    fn alloc(&mut self, node: NodeSlot) -> usize {
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(node);
            idx
        } else {
            self.slots.push(Some(node));
            self.slots.len() - 1
        }
    }

    fn dealloc(&mut self, idx: usize) {
        self.slots[idx] = None;
        self.free.push(idx);
    }

    fn node(&self, idx: usize) -> &NodeSlot {
        self.slots[idx].as_ref().expect("arena slot already freed")
    }

    fn node_mut(&mut self, idx: usize) -> &mut NodeSlot {
        self.slots[idx].as_mut().expect("arena slot already freed")
    }

    /// Number of `(timestamp, id)` entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Inserts `id` under `ts`. Idempotent per `(ts, id)` pair; returns
    /// whether anything was added.
    pub fn insert(&mut self, ts: i64, id: &str) -> bool {
        let (inserted, split) = self.insert_rec(self.root, ts, id);
        if let Some((separator, right)) = split {
            let old_root = self.root;
            self.root = self.alloc(NodeSlot::Internal {
                keys: vec![separator],
                children: vec![old_root, right],
            });
        }
        if inserted {
            self.entries += 1;
        }
        inserted
    }

    fn insert_rec(&mut self, idx: usize, ts: i64, id: &str) -> (bool, Option<(i64, usize)>) {
        let route = match self.node(idx) {
            NodeSlot::Leaf { .. } => None,
            NodeSlot::Internal { keys, children } => {
                let pos = keys.partition_point(|k| *k <= ts);
                Some((pos, children[pos]))
            }
        };
        let Some((pos, child)) = route else {
            return self.insert_into_leaf(idx, ts, id);
        };

        let (inserted, split) = self.insert_rec(child, ts, id);
        let mut promote = None;
        if let Some((separator, right)) = split {
            let max = self.max_keys();
            let overflow = {
                let NodeSlot::Internal { keys, children } = self.node_mut(idx) else {
                    unreachable!("node kind changed mid-insert");
                };
                keys.insert(pos, separator);
                children.insert(pos + 1, right);
                keys.len() > max
            };
            if overflow {
                promote = Some(self.split_internal(idx));
            }
        }
        (inserted, promote)
    }

    fn insert_into_leaf(&mut self, idx: usize, ts: i64, id: &str) -> (bool, Option<(i64, usize)>) {
        let max = self.max_keys();
        let needs_split;
        let inserted;
        {
            let NodeSlot::Leaf { keys, buckets, .. } = self.node_mut(idx) else {
                unreachable!("expected leaf");
            };
            match keys.binary_search(&ts) {
                Ok(pos) => {
                    if buckets[pos].iter().any(|existing| existing == id) {
                        return (false, None);
                    }
                    buckets[pos].push(id.to_string());
                    return (true, None);
                }
                Err(pos) => {
                    keys.insert(pos, ts);
                    buckets.insert(pos, vec![id.to_string()]);
                    inserted = true;
                    needs_split = keys.len() > max;
                }
            }
        }
        if !needs_split {
            return (inserted, None);
        }
        (inserted, Some(self.split_leaf(idx)))
    }

    fn split_leaf(&mut self, idx: usize) -> (i64, usize) {
        let (right_keys, right_buckets, old_next) = {
            let NodeSlot::Leaf {
                keys,
                buckets,
                next,
                ..
            } = self.node_mut(idx)
            else {
                unreachable!("expected leaf");
            };
            let mid = keys.len() / 2;
            (keys.split_off(mid), buckets.split_off(mid), *next)
        };
        let separator = right_keys[0];
        let right = self.alloc(NodeSlot::Leaf {
            keys: right_keys,
            buckets: right_buckets,
            prev: Some(idx),
            next: old_next,
        });
        if let Some(after) = old_next {
            if let NodeSlot::Leaf { prev, .. } = self.node_mut(after) {
                *prev = Some(right);
            }
        }
        if let NodeSlot::Leaf { next, .. } = self.node_mut(idx) {
            *next = Some(right);
        }
        (separator, right)
    }

    fn split_internal(&mut self, idx: usize) -> (i64, usize) {
        let (separator, right_keys, right_children) = {
            let NodeSlot::Internal { keys, children } = self.node_mut(idx) else {
                unreachable!("expected internal node");
            };
            let mid = keys.len() / 2;
            let right_keys = keys.split_off(mid + 1);
            let separator = keys.pop().expect("split node has keys");
            let right_children = children.split_off(mid + 1);
            (separator, right_keys, right_children)
        };
        let right = self.alloc(NodeSlot::Internal {
            keys: right_keys,
            children: right_children,
        });
        (separator, right)
    }

    /// Removes `id` from the bucket at `ts`; drops the key when its
    /// bucket empties and rebalances the tree. Returns whether the entry
    /// existed.
    pub fn remove(&mut self, ts: i64, id: &str) -> bool {
        let removed = self.remove_rec(self.root, ts, id);
        if removed {
            self.entries -= 1;
        }
        // Collapse an empty root: its sole child becomes the root.
        loop {
            let collapse = match self.node(self.root) {
                NodeSlot::Internal { keys, children } if keys.is_empty() => Some(children[0]),
                _ => None,
            };
            match collapse {
                Some(child) => {
                    let old = self.root;
                    self.dealloc(old);
                    self.root = child;
                }
                None => break,
            }
        }
        removed
    }

    fn remove_rec(&mut self, idx: usize, ts: i64, id: &str) -> bool {
        let route = match self.node(idx) {
            NodeSlot::Leaf { .. } => None,
            NodeSlot::Internal { keys, children } => {
                let pos = keys.partition_point(|k| *k <= ts);
                Some((pos, children[pos]))
            }
        };
        let Some((pos, child)) = route else {
            return self.remove_from_leaf(idx, ts, id);
        };

        let removed = self.remove_rec(child, ts, id);
        if removed && self.is_underfull(child) {
            self.fix_child(idx, pos);
        }
        removed
    }

    fn remove_from_leaf(&mut self, idx: usize, ts: i64, id: &str) -> bool {
        let NodeSlot::Leaf { keys, buckets, .. } = self.node_mut(idx) else {
            unreachable!("expected leaf");
        };
        let Ok(pos) = keys.binary_search(&ts) else {
            return false;
        };
        let Some(found) = buckets[pos].iter().position(|e| e == id) else {
            return false;
        };
        buckets[pos].remove(found);
        if buckets[pos].is_empty() {
            keys.remove(pos);
            buckets.remove(pos);
        }
        true
    }

    fn is_underfull(&self, idx: usize) -> bool {
        let count = match self.node(idx) {
            NodeSlot::Leaf { keys, .. } => keys.len(),
            NodeSlot::Internal { keys, .. } => keys.len(),
        };
        count < self.min_keys()
    }

    fn key_count(&self, idx: usize) -> usize {
        match self.node(idx) {
            NodeSlot::Leaf { keys, .. } => keys.len(),
            NodeSlot::Internal { keys, .. } => keys.len(),
        }
    }

    /// Restores occupancy of `children[pos]` by borrowing from a sibling
    /// when one can spare a key, merging otherwise.
    fn fix_child(&mut self, parent: usize, pos: usize) {
        let (left, right) = {
            let NodeSlot::Internal { children, .. } = self.node(parent) else {
                unreachable!("parent must be internal");
            };
            (
                pos.checked_sub(1).map(|p| children[p]),
                children.get(pos + 1).copied(),
            )
        };

        if let Some(left_idx) = left {
            if self.key_count(left_idx) > self.min_keys() {
                self.borrow_from_left(parent, pos);
                return;
            }
        }
        if let Some(right_idx) = right {
            if self.key_count(right_idx) > self.min_keys() {
                self.borrow_from_right(parent, pos);
                return;
            }
        }
        if left.is_some() {
            self.merge_children(parent, pos - 1);
        } else {
            self.merge_children(parent, pos);
        }
    }

    fn borrow_from_left(&mut self, parent: usize, pos: usize) {
        let (left_idx, child_idx) = {
            let NodeSlot::Internal { children, .. } = self.node(parent) else {
                unreachable!("parent must be internal");
            };
            (children[pos - 1], children[pos])
        };
        match self.node(child_idx) {
            NodeSlot::Leaf { .. } => {
                let (key, bucket) = {
                    let NodeSlot::Leaf { keys, buckets, .. } = self.node_mut(left_idx) else {
                        unreachable!("siblings share kind");
                    };
                    (
                        keys.pop().expect("donor has spare keys"),
                        buckets.pop().expect("donor has spare buckets"),
                    )
                };
                {
                    let NodeSlot::Leaf { keys, buckets, .. } = self.node_mut(child_idx) else {
                        unreachable!("expected leaf");
                    };
                    keys.insert(0, key);
                    buckets.insert(0, bucket);
                }
                let NodeSlot::Internal { keys, .. } = self.node_mut(parent) else {
                    unreachable!("parent must be internal");
                };
                keys[pos - 1] = key;
            }
            NodeSlot::Internal { .. } => {
                let (donated_key, donated_child) = {
                    let NodeSlot::Internal { keys, children } = self.node_mut(left_idx) else {
                        unreachable!("siblings share kind");
                    };
                    (
                        keys.pop().expect("donor has spare keys"),
                        children.pop().expect("donor has spare children"),
                    )
                };
                let separator = {
                    let NodeSlot::Internal { keys, .. } = self.node_mut(parent) else {
                        unreachable!("parent must be internal");
                    };
                    std::mem::replace(&mut keys[pos - 1], donated_key)
                };
                let NodeSlot::Internal { keys, children } = self.node_mut(child_idx) else {
                    unreachable!("expected internal node");
                };
                keys.insert(0, separator);
                children.insert(0, donated_child);
            }
        }
    }

    fn borrow_from_right(&mut self, parent: usize, pos: usize) {
        let (child_idx, right_idx) = {
            let NodeSlot::Internal { children, .. } = self.node(parent) else {
                unreachable!("parent must be internal");
            };
            (children[pos], children[pos + 1])
        };
        match self.node(child_idx) {
            NodeSlot::Leaf { .. } => {
                let (key, bucket, new_first) = {
                    let NodeSlot::Leaf { keys, buckets, .. } = self.node_mut(right_idx) else {
                        unreachable!("siblings share kind");
                    };
                    let key = keys.remove(0);
                    let bucket = buckets.remove(0);
                    (key, bucket, keys.first().copied())
                };
                {
                    let NodeSlot::Leaf { keys, buckets, .. } = self.node_mut(child_idx) else {
                        unreachable!("expected leaf");
                    };
                    keys.push(key);
                    buckets.push(bucket);
                }
                if let Some(new_first) = new_first {
                    let NodeSlot::Internal { keys, .. } = self.node_mut(parent) else {
                        unreachable!("parent must be internal");
                    };
                    keys[pos] = new_first;
                }
            }
            NodeSlot::Internal { .. } => {
                let (donated_key, donated_child) = {
                    let NodeSlot::Internal { keys, children } = self.node_mut(right_idx) else {
                        unreachable!("siblings share kind");
                    };
                    (keys.remove(0), children.remove(0))
                };
                let separator = {
                    let NodeSlot::Internal { keys, .. } = self.node_mut(parent) else {
                        unreachable!("parent must be internal");
                    };
                    std::mem::replace(&mut keys[pos], donated_key)
                };
                let NodeSlot::Internal { keys, children } = self.node_mut(child_idx) else {
                    unreachable!("expected internal node");
                };
                keys.push(separator);
                children.push(donated_child);
            }
        }
    }

    /// Merges `children[pos + 1]` into `children[pos]`.
    fn merge_children(&mut self, parent: usize, pos: usize) {
        let (left_idx, right_idx, separator) = {
            let NodeSlot::Internal { keys, children } = self.node_mut(parent) else {
                unreachable!("parent must be internal");
            };
            let separator = keys.remove(pos);
            let right = children.remove(pos + 1);
            (children[pos], right, separator)
        };
        let right_node = self.slots[right_idx].take().expect("arena slot already freed");
        self.free.push(right_idx);

        match right_node {
            NodeSlot::Leaf {
                keys: right_keys,
                buckets: right_buckets,
                next: right_next,
                ..
            } => {
                {
                    let NodeSlot::Leaf { keys, buckets, next, .. } = self.node_mut(left_idx) else {
                        unreachable!("siblings share kind");
                    };
                    keys.extend(right_keys);
                    buckets.extend(right_buckets);
                    *next = right_next;
                }
                if let Some(after) = right_next {
                    if let NodeSlot::Leaf { prev, .. } = self.node_mut(after) {
                        *prev = Some(left_idx);
                    }
                }
            }
            NodeSlot::Internal {
                keys: right_keys,
                children: right_children,
            } => {
                let NodeSlot::Internal { keys, children } = self.node_mut(left_idx) else {
                    unreachable!("siblings share kind");
                };
                keys.push(separator);
                keys.extend(right_keys);
                children.extend(right_children);
            }
        }
    }

    fn find_leaf(&self, ts: i64) -> usize {
        let mut idx = self.root;
        loop {
            match self.node(idx) {
                NodeSlot::Leaf { .. } => return idx,
                NodeSlot::Internal { keys, children } => {
                    idx = children[keys.partition_point(|k| *k <= ts)];
                }
            }
        }
    }

    fn first_leaf(&self) -> usize {
        let mut idx = self.root;
        loop {
            match self.node(idx) {
                NodeSlot::Leaf { .. } => return idx,
                NodeSlot::Internal { children, .. } => idx = children[0],
            }
        }
    }

    /// All `(timestamp, ids)` groups with `start <= timestamp <= end`,
    /// chronological, walking the leaf chain.
    pub fn query_range(&self, start: i64, end: i64) -> Vec<(i64, Vec<String>)> {
        let mut out = Vec::new();
        if start > end {
            return out;
        }
        let mut leaf = Some(self.find_leaf(start));
        while let Some(idx) = leaf {
            let NodeSlot::Leaf { keys, buckets, next, .. } = self.node(idx) else {
                unreachable!("leaf chain holds leaves");
            };
            for (key, bucket) in keys.iter().zip(buckets.iter()) {
                if *key < start {
                    continue;
                }
                if *key > end {
                    return out;
                }
                out.push((*key, bucket.clone()));
            }
            leaf = *next;
        }
        out
    }

    /// Episode ids in `[start, end]`, flattened, chronological. Ids that
    /// share a timestamp keep bucket insertion order.
    pub fn ids_in_range(&self, start: i64, end: i64) -> Vec<String> {
        self.query_range(start, end)
            .into_iter()
            .flat_map(|(_, ids)| ids)
            .collect()
    }

    /// Up to `k` entries nearest to `ts`: a two-pointer sweep outward
    /// from the anchoring leaf, preferring the earlier timestamp on
    /// distance ties.
    pub fn nearest(&self, ts: i64, k: usize) -> Vec<(i64, String)> {
        let mut out = Vec::new();
        if k == 0 || self.entries == 0 {
            return out;
        }

        let anchor = self.find_leaf(ts);
        let pos = {
            let NodeSlot::Leaf { keys, .. } = self.node(anchor) else {
                unreachable!("anchor is a leaf");
            };
            keys.partition_point(|key| *key <= ts)
        };
        let mut left = self.step_left(anchor, pos);
        let mut right = self.step_right(anchor, pos);

        while out.len() < k {
            let left_key = left.and_then(|(leaf, p)| self.leaf_key(leaf, p));
            let right_key = right.and_then(|(leaf, p)| self.leaf_key(leaf, p));
            let take_left = match (left_key, right_key) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(l), Some(r)) => (ts - l) <= (r - ts),
            };
            if take_left {
                let (leaf, p) = left.expect("left cursor is live");
                self.push_bucket(leaf, p, k, &mut out);
                left = self.step_left(leaf, p);
            } else {
                let (leaf, p) = right.expect("right cursor is live");
                self.push_bucket(leaf, p, k, &mut out);
                right = self.step_right(leaf, p + 1);
            }
        }
        out
    }

    fn leaf_key(&self, leaf: usize, pos: usize) -> Option<i64> {
        let NodeSlot::Leaf { keys, .. } = self.node(leaf) else {
            return None;
        };
        keys.get(pos).copied()
    }

    fn push_bucket(&self, leaf: usize, pos: usize, k: usize, out: &mut Vec<(i64, String)>) {
        let NodeSlot::Leaf { keys, buckets, .. } = self.node(leaf) else {
            return;
        };
        if let (Some(key), Some(bucket)) = (keys.get(pos), buckets.get(pos)) {
            for id in bucket {
                if out.len() == k {
                    return;
                }
                out.push((*key, id.clone()));
            }
        }
    }

    /// Position strictly left of `(leaf, pos)`, hopping leaves.
    fn step_left(&self, leaf: usize, pos: usize) -> Option<(usize, usize)> {
        if pos > 0 {
            return Some((leaf, pos - 1));
        }
        let mut current = leaf;
        loop {
            let NodeSlot::Leaf { prev, .. } = self.node(current) else {
                return None;
            };
            let previous = (*prev)?;
            let NodeSlot::Leaf { keys, .. } = self.node(previous) else {
                return None;
            };
            if keys.is_empty() {
                current = previous;
                continue;
            }
            return Some((previous, keys.len() - 1));
        }
    }

    /// First real position at or right of `(leaf, pos)`, hopping leaves.
    fn step_right(&self, leaf: usize, pos: usize) -> Option<(usize, usize)> {
        let NodeSlot::Leaf { keys, next, .. } = self.node(leaf) else {
            return None;
        };
        if pos < keys.len() {
            return Some((leaf, pos));
        }
        let mut current = *next;
        while let Some(idx) = current {
            let NodeSlot::Leaf { keys, next, .. } = self.node(idx) else {
                return None;
            };
            if !keys.is_empty() {
                return Some((idx, 0));
            }
            current = *next;
        }
        None
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.entries = 0;
        self.root = self.alloc(NodeSlot::Leaf {
            keys: Vec::new(),
            buckets: Vec::new(),
            prev: None,
            next: None,
        });
    }

    pub fn stats(&self) -> TimeIndexStats {
        let mut keys = 0;
        let mut leaves = 0;
        let mut leaf = Some(self.first_leaf());
        while let Some(idx) = leaf {
            let NodeSlot::Leaf { keys: k, next, .. } = self.node(idx) else {
                break;
            };
            keys += k.len();
            leaves += 1;
            leaf = *next;
        }
        let mut height = 1;
        let mut idx = self.root;
        while let NodeSlot::Internal { children, .. } = self.node(idx) {
            height += 1;
            idx = children[0];
        }
        TimeIndexStats {
            entries: self.entries,
            keys,
            leaves,
            height,
            order: self.order,
        }
    }

    /// Every `(timestamp, ids)` group in chronological order. Used by the
    /// snapshot writer and by tests.
    pub fn dump(&self) -> Vec<(i64, Vec<String>)> {
        let mut out = Vec::new();
        let mut leaf = Some(self.first_leaf());
        while let Some(idx) = leaf {
            let NodeSlot::Leaf { keys, buckets, next, .. } = self.node(idx) else {
                break;
            };
            for (key, bucket) in keys.iter().zip(buckets.iter()) {
                out.push((*key, bucket.clone()));
            }
            leaf = *next;
        }
        out
    }

    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        // Leaf chain strictly ascending, buckets non-empty.
        let dump = self.dump();
        for window in dump.windows(2) {
            assert!(window[0].0 < window[1].0, "leaf keys out of order");
        }
        for (_, bucket) in &dump {
            assert!(!bucket.is_empty(), "empty bucket left behind");
        }
        assert_eq!(
            dump.iter().map(|(_, b)| b.len()).sum::<usize>(),
            self.entries,
            "entry count drifted"
        );
        self.check_occupancy(self.root, true);
    }

    #[cfg(test)]
    fn check_occupancy(&self, idx: usize, is_root: bool) {
        match self.node(idx) {
            NodeSlot::Leaf { keys, buckets, .. } => {
                assert_eq!(keys.len(), buckets.len());
                assert!(keys.len() <= self.max_keys());
                if !is_root {
                    assert!(
                        keys.len() >= self.min_keys(),
                        "leaf underfull: {} < {}",
                        keys.len(),
                        self.min_keys()
                    );
                }
            }
            NodeSlot::Internal { keys, children } => {
                assert_eq!(children.len(), keys.len() + 1);
                assert!(keys.len() <= self.max_keys());
                let floor = if is_root { 1 } else { self.min_keys() };
                assert!(keys.len() >= floor, "internal underfull");
                for child in children {
                    self.check_occupancy(*child, false);
                }
            }
        }
    }
}
