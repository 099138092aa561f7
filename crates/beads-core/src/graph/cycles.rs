//! Cycle detection for the blocking dependency graph.
//!
//! # Overview
//!
//! Blocking dependencies form a directed graph. Cycles make items permanently
//! stuck (each item waits on another in the loop), so a link that would close
//! one is rejected before it is written.
//!
//! # Design
//!
//! - **BFS-based**: breadth-first walk from the would-be blocker, following
//!   `blocked_by` edges, looking for the source of the new edge. The walk runs
//!   under the store's write lock, so no concurrent link can slip in between
//!   the check and the write.
//! - **O(V+E)**: each node and edge is visited at most once.
//!
//! [`reachable`] and [`reaching`] expose the same walk in both directions for
//! the parent/child deadlock check.

#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;

use crate::model::Item;

// ---------------------------------------------------------------------------
// CycleWarning
// ---------------------------------------------------------------------------

/// Describes the cycle a new blocking edge would close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleWarning {
    /// The ordered list of item IDs forming the cycle.
    ///
    /// Starts at the source of the new edge, follows blocking dependencies,
    /// and ends at the source again. Adding `A→B` over an existing `B→C→A`
    /// yields `["A", "B", "C", "A"]`.
    pub cycle_path: Vec<String>,

    /// The source of the new edge (the item being blocked).
    pub edge_from: String,

    /// The target of the new edge (the blocker).
    pub edge_to: String,
}

impl CycleWarning {
    /// Number of distinct items in the cycle.
    pub fn cycle_len(&self) -> usize {
        self.cycle_path.len().saturating_sub(1)
    }

    pub fn is_self_loop(&self) -> bool {
        self.edge_from == self.edge_to
    }

    /// Returns `true` for a 2-node cycle (A↔B).
    pub fn is_mutual_block(&self) -> bool {
        self.cycle_len() == 2
    }
}

impl fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_self_loop() {
            write!(f, "cycle: '{}' would block itself", self.edge_from)
        } else if self.is_mutual_block() {
            write!(
                f,
                "cycle: '{}' and '{}' would block each other",
                self.edge_from, self.edge_to
            )
        } else {
            write!(
                f,
                "cycle ({} items): {}",
                self.cycle_len(),
                self.cycle_path.join(" → ")
            )
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Would adding `from → to` (`from` blocked by `to`) close a cycle?
///
/// Checks for an existing path from `to` back to `from`.
pub fn detect_cycle_on_add(
    items: &BTreeMap<String, Item>,
    from: &str,
    to: &str,
) -> Option<CycleWarning> {
    if from == to {
        return Some(CycleWarning {
            cycle_path: vec![from.to_string(), from.to_string()],
            edge_from: from.to_string(),
            edge_to: to.to_string(),
        });
    }

    let path = find_path(items, to, from)?;
    let mut cycle_path = Vec::with_capacity(path.len() + 1);
    cycle_path.push(from.to_string());
    cycle_path.extend(path);
    Some(CycleWarning {
        cycle_path,
        edge_from: from.to_string(),
        edge_to: to.to_string(),
    })
}

/// Shortest `blocked_by` path from `start` to `goal`, both ends included.
pub fn find_path(items: &BTreeMap<String, Item>, start: &str, goal: &str) -> Option<Vec<String>> {
    let mut came_from: HashMap<&str, &str> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::from([start]);
    let mut queue: VecDeque<&str> = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if current == goal {
            let mut path = vec![goal.to_string()];
            let mut cursor = goal;
            while let Some(prev) = came_from.get(cursor) {
                path.push((*prev).to_string());
                cursor = prev;
            }
            path.reverse();
            return Some(path);
        }
        let Some(item) = items.get(current) else {
            continue;
        };
        for next in &item.blocked_by {
            if visited.insert(next.as_str()) {
                came_from.insert(next.as_str(), current);
                queue.push_back(next.as_str());
            }
        }
    }
    None
}

/// Every id reachable from `start` along `blocked_by` edges, `start` included.
pub fn reachable<'a>(items: &'a BTreeMap<String, Item>, start: &'a str) -> HashSet<&'a str> {
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut queue: VecDeque<&str> = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        if let Some(item) = items.get(current) {
            for next in &item.blocked_by {
                if seen.insert(next.as_str()) {
                    queue.push_back(next.as_str());
                }
            }
        }
    }
    seen
}

/// Every id with a `blocked_by` path to `target`, `target` included.
pub fn reaching<'a>(items: &'a BTreeMap<String, Item>, target: &'a str) -> HashSet<&'a str> {
    let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
    for (id, item) in items {
        for blocker in &item.blocked_by {
            reverse.entry(blocker.as_str()).or_default().push(id.as_str());
        }
    }
    let mut seen: HashSet<&str> = HashSet::from([target]);
    let mut queue: VecDeque<&str> = VecDeque::from([target]);
    while let Some(current) = queue.pop_front() {
        for prev in reverse.get(current).into_iter().flatten() {
            if seen.insert(prev) {
                queue.push_back(prev);
            }
        }
    }
    seen
}

/// Check whether the blocking graph has any cycle at all.
pub fn has_cycles(items: &BTreeMap<String, Item>) -> bool {
    let mut color: HashMap<&str, Color> = HashMap::new();
    items
        .keys()
        .any(|id| !color.contains_key(id.as_str()) && dfs_has_cycle(items, id, &mut color))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the DFS stack.
    Gray,
    /// Fully processed.
    Black,
}

fn dfs_has_cycle<'a>(
    items: &'a BTreeMap<String, Item>,
    node: &'a str,
    color: &mut HashMap<&'a str, Color>,
) -> bool {
    color.insert(node, Color::Gray);
    if let Some(item) = items.get(node) {
        for next in &item.blocked_by {
            match color.get(next.as_str()) {
                Some(Color::Gray) => return true,
                Some(Color::Black) => {}
                None => {
                    if dfs_has_cycle(items, next, color) {
                        return true;
                    }
                }
            }
        }
    }
    color.insert(node, Color::Black);
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
