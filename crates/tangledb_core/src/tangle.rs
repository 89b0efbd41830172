//! Causal DAG index over one tangle.
//!
//! A [`Tangle`] is an in-memory view of the messages belonging to one root:
//! depths, parent sets, current tips, and depth buckets for deterministic
//! topological ordering. It is rebuilt by replaying messages in any order;
//! tip tracking is insensitive to insertion order because ids referenced
//! before they arrive are remembered.

use crate::message::Message;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// In-memory causal index for a single tangle root.
#[derive(Debug, Clone)]
pub struct Tangle {
    root_id: String,
    has_root: bool,
    depth_of: HashMap<String, u64>,
    prev_of: HashMap<String, Vec<String>>,
    tips: BTreeSet<String>,
    referenced: HashSet<String>,
    by_depth: BTreeMap<u64, Vec<String>>,
    max_depth: u64,
}

impl Tangle {
    /// Creates an empty tangle for `root_id`.
    #[must_use]
    pub fn new(root_id: &str) -> Self {
        Self {
            root_id: root_id.to_string(),
            has_root: false,
            depth_of: HashMap::new(),
            prev_of: HashMap::new(),
            tips: BTreeSet::new(),
            referenced: HashSet::new(),
            by_depth: BTreeMap::new(),
            max_depth: 0,
        }
    }

    /// Records `msg` under `id`. Messages may arrive in any order; a message
    /// without an entry for this tangle (other than the root itself) is
    /// ignored.
    pub fn add(&mut self, id: &str, msg: &Message) {
        let (depth, prev) = if id == self.root_id {
            self.has_root = true;
            (0, Vec::new())
        } else {
            match msg.metadata.tangles.get(&self.root_id) {
                Some(entry) => (entry.depth, entry.prev.clone().unwrap_or_default()),
                None => return,
            }
        };

        if self.depth_of.contains_key(id) {
            return;
        }
        self.depth_of.insert(id.to_string(), depth);
        self.prev_of.insert(id.to_string(), prev.clone());
        self.max_depth = self.max_depth.max(depth);

        let bucket = self.by_depth.entry(depth).or_default();
        if let Err(pos) = bucket.binary_search(&id.to_string()) {
            bucket.insert(pos, id.to_string());
        }

        if !self.referenced.contains(id) {
            self.tips.insert(id.to_string());
        }
        for p in &prev {
            self.referenced.insert(p.clone());
            self.tips.remove(p);
        }
    }

    /// The tangle's root id.
    #[must_use]
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Whether the root message itself has been recorded.
    #[must_use]
    pub fn has_root(&self) -> bool {
        self.has_root
    }

    /// Whether `id` has been recorded.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.depth_of.contains_key(id)
    }

    /// Depth of `id`, if recorded.
    #[must_use]
    pub fn depth_of(&self, id: &str) -> Option<u64> {
        self.depth_of.get(id).copied()
    }

    /// Greatest recorded depth.
    #[must_use]
    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }

    /// Current tips: recorded messages no other recorded or expected message
    /// points at, sorted ascending.
    #[must_use]
    pub fn tips(&self) -> &BTreeSet<String> {
        &self.tips
    }

    /// Ids a new message at `depth` must cite for its lipmaa skip-link:
    /// every message in the bucket at the lipmaa target depth. Empty when the
    /// target is the depth directly below, since ordinary tip citation
    /// already covers it.
    #[must_use]
    pub fn lipmaa_set(&self, depth: u64) -> Vec<String> {
        let target = lipmaa(depth + 1);
        if target == 0 || target == depth {
            return Vec::new();
        }
        self.by_depth
            .get(&(target - 1))
            .cloned()
            .unwrap_or_default()
    }

    /// Deterministic topological order: depth buckets ascending, ids sorted
    /// within each bucket.
    #[must_use]
    pub fn topo_sort(&self) -> Vec<String> {
        self.by_depth.values().flatten().cloned().collect()
    }

    /// Shortest path from `id` down to the root, following at each step the
    /// recorded parent of least depth (ties broken by id order). Excludes
    /// `id`; ends with the root.
    ///
    /// Returns an empty path if `id` is the root, unrecorded, or the chain
    /// breaks on an unrecorded parent.
    #[must_use]
    pub fn shortest_path_to_root(&self, id: &str) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = id.to_string();
        while current != self.root_id {
            let prev = match self.prev_of.get(&current) {
                Some(prev) => prev,
                None => return Vec::new(),
            };
            let next = prev
                .iter()
                .filter(|p| self.depth_of.contains_key(*p))
                .min_by_key(|p| (self.depth_of[*p], (*p).clone()));
            match next {
                Some(next) => {
                    path.push(next.clone());
                    current = next.clone();
                }
                None => return Vec::new(),
            }
        }
        path
    }

    /// Whether `a` causally precedes `b`: reachable from `b` by following
    /// parent links. `false` when `a == b` or `b` is the root.
    #[must_use]
    pub fn precedes(&self, a: &str, b: &str) -> bool {
        if a == b || b == self.root_id {
            return false;
        }
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut seen: HashSet<&str> = HashSet::new();
        queue.push_back(b);
        while let Some(current) = queue.pop_front() {
            if let Some(prev) = self.prev_of.get(current) {
                for p in prev {
                    if p == a {
                        return true;
                    }
                    if seen.insert(p) {
                        queue.push_back(p);
                    }
                }
            }
        }
        false
    }

    /// Partitions the messages topologically before `id` into those safe to
    /// delete outright and those that must only be erased.
    ///
    /// Erasable messages are the ones on the shortest path from `id` to the
    /// root; they keep the citation chain verifiable. Everything else before
    /// `id` in topological order is deletable.
    #[must_use]
    pub fn deletables_and_erasables(&self, id: &str) -> (Vec<String>, Vec<String>) {
        let erasable = self.shortest_path_to_root(id);
        let keep: HashSet<&String> = erasable.iter().collect();
        let deletable = self
            .topo_sort()
            .into_iter()
            .take_while(|m| m != id)
            .filter(|m| !keep.contains(m))
            .collect();
        (deletable, erasable)
    }
}

/// The lipmaa backlink target for 1-based sequence number `n`.
///
/// Produces chains where most entries link one step back, with periodic
/// long-range leaps that give logarithmic certification paths back to the
/// first entry.
#[must_use]
pub fn lipmaa(n: u64) -> u64 {
    let mut m = 1u64;
    let mut po3 = 3u64;
    while m < n {
        po3 *= 3;
        m = (po3 - 1) / 2;
    }
    po3 /= 3;
    if m != n {
        let mut u = n;
        while u != 0 {
            m = (po3 - 1) / 2;
            po3 /= 3;
            u %= m;
        }
        if m != po3 {
            po3 = m;
        }
    }
    n - po3
}
