//! The cached route tree.
//!
//! One tree is built per (origin, query start) by discovery and describes
//! every reachable storage endpoint together with the filter/round-robin
//! gates along the way. The tree stores geometry only; filters and
//! round-robin flags are read *live* from the owning nodes at query time, so
//! toggling either is observed without invalidating the cache.

use crate::grid::{Direction, Pos3};
use crate::path::{PotentialPath, QuantifiedPath};
use crate::resource::{ResourceFilter, ResourceHandler};
use std::collections::HashMap;

/// Live access to gate state by node position. Implemented by the engine's
/// node map; queries resolve gate positions through it every time.
pub trait GateState<H: ResourceHandler> {
    /// The filter owned by the node at `pos`, if the node still exists.
    fn filter(&self, pos: Pos3) -> Option<&H::Filter>;

    /// The round-robin flag of the node at `pos`. Missing nodes read as
    /// nearest-mode.
    fn round_robin(&self, pos: Pos3) -> bool;
}

/// Index of a node within a [`RouteTree`] arena.
pub type RouteNodeIdx = usize;

#[derive(Debug, Clone)]
enum RouteNode {
    /// A filter/round-robin gate. `gate` is the position of the pipe node
    /// whose filter and round-robin flag guard this subtree; children are in
    /// discovery (nearest-first) order.
    Gate {
        gate: Pos3,
        children: Vec<RouteNodeIdx>,
    },
    /// A reachable storage endpoint.
    Terminal(PotentialPath),
}

/// Arena-backed recursive route structure. The root is always a gate reading
/// the origin node's own filter and round-robin flag.
#[derive(Debug, Clone)]
pub struct RouteTree {
    nodes: Vec<RouteNode>,
    root: RouteNodeIdx,
}

impl RouteTree {
    /// An empty tree whose root gate reads the node at `origin`.
    pub fn new(origin: Pos3) -> Self {
        Self {
            nodes: vec![RouteNode::Gate {
                gate: origin,
                children: Vec::new(),
            }],
            root: 0,
        }
    }

    pub fn root(&self) -> RouteNodeIdx {
        self.root
    }

    /// Append a terminal leaf under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is a terminal: discovery never expands past an
    /// endpoint, so this indicates a discovery bug.
    pub fn add_terminal(&mut self, parent: RouteNodeIdx, path: PotentialPath) -> RouteNodeIdx {
        let idx = self.nodes.len();
        self.nodes.push(RouteNode::Terminal(path));
        self.attach(parent, idx);
        idx
    }

    /// Append a gate under `parent` guarding a new subtree.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is a terminal.
    pub fn add_gate(&mut self, parent: RouteNodeIdx, gate: Pos3) -> RouteNodeIdx {
        let idx = self.nodes.len();
        self.nodes.push(RouteNode::Gate {
            gate,
            children: Vec::new(),
        });
        self.attach(parent, idx);
        idx
    }

    fn attach(&mut self, parent: RouteNodeIdx, child: RouteNodeIdx) {
        match &mut self.nodes[parent] {
            RouteNode::Gate { children, .. } => children.push(child),
            RouteNode::Terminal(_) => panic!("cannot add a child to a terminal route node"),
        }
    }

    pub fn is_terminal(&self, idx: RouteNodeIdx) -> bool {
        matches!(self.nodes[idx], RouteNode::Terminal(_))
    }

    /// Number of terminal leaves in the whole tree.
    pub fn terminal_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, RouteNode::Terminal(_)))
            .count()
    }

    /// Query the tree for feasible destinations for `resource`.
    ///
    /// `check` judges each leaf and returns the quantity its endpoint can
    /// still accept (zero meaning infeasible); it is injected at query time
    /// so the cached tree stays valid across capacity and flow changes.
    ///
    /// Gate behavior, reading flags live through `gates`:
    /// - non-empty filter rejecting the resource prunes the whole subtree;
    /// - round-robin off: children are visited in stored (nearest-first)
    ///   order and the first non-empty result set wins;
    /// - round-robin on: all children contribute and the caller rotates
    ///   through the concatenated set with its cursor.
    ///
    /// Results are deduplicated by (destination, arrival face), keeping the
    /// higher-yield path when several branches reach the same slot.
    pub fn paths_for<H, G, F>(&self, resource: &H::Unit, gates: &G, check: &F) -> Vec<QuantifiedPath>
    where
        H: ResourceHandler,
        G: GateState<H>,
        F: Fn(&H::Unit, Pos3, Direction) -> u64,
    {
        let raw = self.collect::<H, G, F>(self.root, resource, gates, check);
        dedup_by_slot(raw)
    }

    fn collect<H, G, F>(
        &self,
        idx: RouteNodeIdx,
        resource: &H::Unit,
        gates: &G,
        check: &F,
    ) -> Vec<QuantifiedPath>
    where
        H: ResourceHandler,
        G: GateState<H>,
        F: Fn(&H::Unit, Pos3, Direction) -> u64,
    {
        match &self.nodes[idx] {
            RouteNode::Terminal(path) => {
                let amount = check(resource, path.destination, path.direction);
                if amount > 0 {
                    vec![QuantifiedPath {
                        potential: path.clone(),
                        amount,
                    }]
                } else {
                    Vec::new()
                }
            }
            RouteNode::Gate { gate, children } => {
                // A vanished gate node means the cache is one ripple behind;
                // degrade to pass-all rather than dropping the subtree.
                if let Some(filter) = gates.filter(*gate) {
                    if !filter.accepts(resource) {
                        return Vec::new();
                    }
                }

                if gates.round_robin(*gate) {
                    let mut all = Vec::new();
                    for &child in children {
                        all.extend(self.collect::<H, G, F>(child, resource, gates, check));
                    }
                    all
                } else {
                    for &child in children {
                        let found = self.collect::<H, G, F>(child, resource, gates, check);
                        if !found.is_empty() {
                            return found;
                        }
                    }
                    Vec::new()
                }
            }
        }
    }
}

/// Keep one entry per (destination, arrival face), preferring the higher
/// accepted amount. First-seen order is preserved so nearest-first ordering
/// survives deduplication.
fn dedup_by_slot(paths: Vec<QuantifiedPath>) -> Vec<QuantifiedPath> {
    let mut out: Vec<QuantifiedPath> = Vec::with_capacity(paths.len());
    let mut seen: HashMap<(Pos3, Direction), usize> = HashMap::new();
    for path in paths {
        let slot = (path.potential.destination, path.potential.direction);
        match seen.get(&slot) {
            Some(&at) => {
                if path.amount > out[at].amount {
                    out[at] = path;
                }
            }
            None => {
                seen.insert(slot, out.len());
                out.push(path);
            }
        }
    }
    out
}
