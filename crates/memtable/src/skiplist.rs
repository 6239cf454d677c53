use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use record::Record;

/// Maximum number of levels a node can participate in.
pub const MAX_LEVEL: usize = 10;

/// One entry in the list. Links are indices into the owning arena; `None`
/// means end-of-level.
struct Node {
    key: Vec<u8>,
    value: Vec<u8>,
    tombstone: bool,
    forward: Vec<Option<usize>>,
}

/// An ordered map from key to `(value, tombstone)` backed by a classic
/// probabilistic skip list with coin-flip level promotion.
///
/// Nodes live in an arena (`Vec<Node>`) and link to each other by index,
/// so the structure is plain safe Rust. Entries are never unlinked: a
/// `set` on an existing key overwrites the node in place, which keeps the
/// byte-size counter monotonic (it approximates live bytes and is only a
/// soft flush signal).
pub struct SkipList {
    nodes: Vec<Node>,
    /// Head sentinel links, one per level.
    head: [Option<usize>; MAX_LEVEL],
    /// Highest level currently in use (1..=MAX_LEVEL).
    level: usize,
    size: u64,
    rng: SmallRng,
}

impl SkipList {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: [None; MAX_LEVEL],
            level: 1,
            size: 0,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Inserts or overwrites the entry for `key`.
    ///
    /// An overwrite updates value and tombstone in place and leaves `size`
    /// untouched; a fresh insert splices a new node and grows `size` by
    /// `key.len() + value.len()`.
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>, tombstone: bool) {
        let mut update: [Option<usize>; MAX_LEVEL] = [None; MAX_LEVEL];
        let mut cur: Option<usize> = None;
        for lvl in (0..self.level).rev() {
            while let Some(n) = self.next(cur, lvl) {
                if self.nodes[n].key < key {
                    cur = Some(n);
                } else {
                    break;
                }
            }
            update[lvl] = cur;
        }

        if let Some(n) = self.next(update[0], 0) {
            if self.nodes[n].key == key {
                let node = &mut self.nodes[n];
                node.value = value;
                node.tombstone = tombstone;
                return;
            }
        }

        let mut lvl = self.random_level();
        if lvl > self.level {
            // Grow the list by at most one level per insert; the update
            // path for the fresh level is the head sentinel (already None).
            self.level = (self.level + 1).min(MAX_LEVEL);
            lvl = self.level;
        }

        self.size += (key.len() + value.len()) as u64;
        let idx = self.nodes.len();
        self.nodes.push(Node {
            key,
            value,
            tombstone,
            forward: vec![None; lvl],
        });
        for i in 0..lvl {
            let next = self.next(update[i], i);
            self.nodes[idx].forward[i] = next;
            self.set_next(update[i], i, Some(idx));
        }
    }

    /// Returns `(value, tombstone)` for `key`, or `None` when absent.
    pub fn get(&self, key: &[u8]) -> Option<(&[u8], bool)> {
        let mut cur: Option<usize> = None;
        for lvl in (0..self.level).rev() {
            while let Some(n) = self.next(cur, lvl) {
                match self.nodes[n].key.as_slice().cmp(key) {
                    std::cmp::Ordering::Less => cur = Some(n),
                    std::cmp::Ordering::Equal => {
                        let node = &self.nodes[n];
                        return Some((&node.value, node.tombstone));
                    }
                    std::cmp::Ordering::Greater => break,
                }
            }
        }
        None
    }

    /// Cumulative `key.len() + value.len()` over first insertions. Never
    /// decreases between clears.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of distinct keys stored (tombstones included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ordered iteration over every entry, ascending by key.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            next: self.head[0],
        }
    }

    fn next(&self, at: Option<usize>, lvl: usize) -> Option<usize> {
        match at {
            None => self.head[lvl],
            Some(i) => self.nodes[i].forward[lvl],
        }
    }

    fn set_next(&mut self, at: Option<usize>, lvl: usize, to: Option<usize>) {
        match at {
            None => self.head[lvl] = to,
            Some(i) => self.nodes[i].forward[lvl] = to,
        }
    }

    fn random_level(&mut self) -> usize {
        let mut lvl = 1;
        while lvl < MAX_LEVEL && self.rng.gen_bool(0.5) {
            lvl += 1;
        }
        lvl
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy ordered walk of the level-0 chain, yielding owned [`Record`]s.
pub struct Iter<'a> {
    list: &'a SkipList,
    next: Option<usize>,
}

impl Iterator for Iter<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let idx = self.next?;
        let node = &self.list.nodes[idx];
        self.next = node.forward[0];
        Some(Record {
            key: node.key.clone(),
            value: node.value.clone(),
            tombstone: node.tombstone,
        })
    }
}
