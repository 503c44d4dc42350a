//! Route discovery: breadth-first walk of a connected component, producing
//! the gated route tree that gets cached on the querying node.
//!
//! Discovery runs once per (origin, start) and records geometry only. Which
//! destinations are *feasible* for a given unit is decided later, at query
//! time, against live filters and the flow index.

use crate::grid::{Direction, Pos3};
use crate::logic::PipeLogic;
use crate::node::{PipeNode, PipeSide};
use crate::path::PotentialPath;
use crate::resource::ResourceHandler;
use crate::routes::{RouteNodeIdx, RouteTree};
use std::collections::{BTreeMap, HashSet, VecDeque};

struct WorkItem {
    pos: Pos3,
    /// Nodes traversed so far, origin first, including `pos`.
    hops: Vec<Pos3>,
    parent: RouteNodeIdx,
    /// Set when this node was entered through its servo side; the gate is
    /// materialized when the node is actually expanded, so unreachable
    /// branches never allocate tree nodes.
    gate: Option<Pos3>,
}

/// Walk outward from `origin` and build its route tree.
///
/// `start` is the position the query is about: the source storage during
/// extraction (excluded from the results so a unit is never routed straight
/// back), or the origin itself when rerouting a unit already in the pipe.
/// The origin-to-start direction, when they are adjacent, becomes the
/// animation hint on every discovered path.
///
/// Expansion leaves a node through its `Connected` sides only. A neighboring
/// pipe accepts through its own `Connected` back side directly, or through a
/// `Servo` back side behind a gate reading that neighbor's filter. A
/// non-pipe neighbor with storage becomes a terminal, entered through the
/// face adjacent to the pipe; duplicate (endpoint, face) pairs reached along
/// longer walks are dropped.
pub fn discover_routes<H, L>(
    nodes: &BTreeMap<Pos3, PipeNode<H>>,
    logic: &L,
    world: &L::World,
    origin: Pos3,
    start: Pos3,
) -> RouteTree
where
    H: ResourceHandler,
    L: PipeLogic<H>,
{
    let mut tree = RouteTree::new(origin);
    if !nodes.contains_key(&origin) {
        return tree;
    }
    let anim = Direction::between(origin, start);

    let mut queue = VecDeque::new();
    queue.push_back(WorkItem {
        pos: origin,
        hops: vec![origin],
        parent: tree.root(),
        gate: None,
    });
    let mut visited: HashSet<Pos3> = HashSet::new();
    let mut seen_terminals: HashSet<(Pos3, Direction)> = HashSet::new();

    while let Some(item) = queue.pop_front() {
        if visited.contains(&item.pos) {
            continue;
        }
        let Some(node) = nodes.get(&item.pos) else {
            continue;
        };
        let parent = match item.gate {
            Some(gate) => tree.add_gate(item.parent, gate),
            None => item.parent,
        };

        for dir in Direction::ALL {
            if node.side(dir) != PipeSide::Connected {
                continue;
            }
            let next = item.pos.offset(dir);
            match nodes.get(&next) {
                Some(neighbor) => {
                    if visited.contains(&next) {
                        continue;
                    }
                    let gate = match neighbor.side(dir.opposite()) {
                        PipeSide::Connected => None,
                        PipeSide::Servo => Some(next),
                        PipeSide::None => continue,
                    };
                    let mut hops = item.hops.clone();
                    hops.push(next);
                    queue.push_back(WorkItem {
                        pos: next,
                        hops,
                        parent,
                        gate,
                    });
                }
                None => {
                    let face = dir.opposite();
                    if next == start {
                        continue;
                    }
                    if !logic.has_storage(world, next, face) {
                        continue;
                    }
                    if !seen_terminals.insert((next, face)) {
                        continue;
                    }
                    tree.add_terminal(
                        parent,
                        PotentialPath::new(next, item.hops.clone(), face, anim),
                    );
                }
            }
        }
        visited.insert(item.pos);
    }

    tree
}
