//! A single pipe node: its six sides, gate configuration, timing counters,
//! the transits it currently holds, and its cached routes.

use crate::grid::{Direction, Pos3};
use crate::network::NetworkId;
use crate::path::Transit;
use crate::resource::ResourceHandler;
use crate::routes::{GateState, RouteTree};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What one face of a pipe node is doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipeSide {
    /// Nothing on this side participates in routing.
    #[default]
    None,
    /// Open connection: transits pass through, discovery expands through it.
    Connected,
    /// Extraction gate: pulls from adjacent storage and applies this node's
    /// filter to traffic entering through it.
    Servo,
}

/// Runtime state of one pipe node. Route cache and network id are derived
/// state, rebuilt by the invalidation ripple; everything else persists.
pub struct PipeNode<H: ResourceHandler> {
    pub sides: [PipeSide; 6],
    /// Wrenched faces never connect, whatever sits next to them.
    pub wrenched: [bool; 6],
    pub filter: H::Filter,
    pub round_robin_mode: bool,
    /// Rotating cursor into the destination list, kept across operations and
    /// wrapped back to the front when it runs past the end.
    pub round_robin_index: usize,
    /// Ticks until the next extraction attempt is allowed.
    pub cooldown: u32,
    pub ticks_per_op: u32,
    /// Ripple guard: zero while a ripple already visited this node during the
    /// current tick, bumped back each tick. Stops invalidation storms from
    /// re-walking the same component.
    pub ticks_since_cache_clear: u32,
    pub transits: Vec<Transit<H::Unit>>,
    /// Route trees keyed by query start position.
    pub route_cache: BTreeMap<Pos3, RouteTree>,
    pub network: NetworkId,
}

impl<H: ResourceHandler> PipeNode<H> {
    pub fn new(ticks_per_op: u32) -> Self {
        Self {
            sides: [PipeSide::None; 6],
            wrenched: [false; 6],
            filter: H::Filter::default(),
            round_robin_mode: false,
            round_robin_index: 0,
            cooldown: 0,
            ticks_per_op,
            // Fresh nodes are immediately eligible for a ripple.
            ticks_since_cache_clear: 1,
            transits: Vec::new(),
            route_cache: BTreeMap::new(),
            network: NetworkId::default(),
        }
    }

    pub fn side(&self, dir: Direction) -> PipeSide {
        self.sides[dir.index()]
    }

    pub fn set_side(&mut self, dir: Direction, side: PipeSide) {
        self.sides[dir.index()] = side;
    }

    pub fn is_wrenched(&self, dir: Direction) -> bool {
        self.wrenched[dir.index()]
    }

    /// Directions with a servo gate, in fixed direction order.
    pub fn servo_sides(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL
            .into_iter()
            .filter(|d| self.side(*d) == PipeSide::Servo)
    }

    pub fn take_transit(&mut self, id: crate::path::TransitId) -> Option<Transit<H::Unit>> {
        let at = self.transits.iter().position(|t| t.id == id)?;
        Some(self.transits.remove(at))
    }

    pub fn to_state(&self) -> NodeState<H> {
        NodeState {
            sides: self.sides,
            wrenched: self.wrenched,
            filter: self.filter.clone(),
            round_robin_mode: self.round_robin_mode,
            round_robin_index: self.round_robin_index,
            cooldown: self.cooldown,
            ticks_per_op: self.ticks_per_op,
            transits: self.transits.clone(),
        }
    }

    pub fn from_state(state: NodeState<H>) -> Self {
        Self {
            sides: state.sides,
            wrenched: state.wrenched,
            filter: state.filter,
            round_robin_mode: state.round_robin_mode,
            round_robin_index: state.round_robin_index,
            cooldown: state.cooldown,
            ticks_per_op: state.ticks_per_op,
            ticks_since_cache_clear: 1,
            transits: state.transits,
            route_cache: BTreeMap::new(),
            network: NetworkId::default(),
        }
    }
}

impl<H: ResourceHandler> std::fmt::Debug for PipeNode<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeNode")
            .field("sides", &self.sides)
            .field("round_robin", &self.round_robin_mode)
            .field("transits", &self.transits.len())
            .field("cached_routes", &self.route_cache.len())
            .finish()
    }
}

/// Persistent subset of a node, as written to snapshots. Derived state
/// (routes, network id, ripple guard) is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct NodeState<H: ResourceHandler> {
    pub sides: [PipeSide; 6],
    #[serde(default)]
    pub wrenched: [bool; 6],
    pub filter: H::Filter,
    #[serde(default)]
    pub round_robin_mode: bool,
    #[serde(default)]
    pub round_robin_index: usize,
    #[serde(default)]
    pub cooldown: u32,
    pub ticks_per_op: u32,
    #[serde(default)]
    pub transits: Vec<Transit<H::Unit>>,
}

/// The engine's node map doubles as the live gate table for route queries.
impl<H: ResourceHandler> GateState<H> for BTreeMap<Pos3, PipeNode<H>> {
    fn filter(&self, pos: Pos3) -> Option<&H::Filter> {
        self.get(&pos).map(|node| &node.filter)
    }

    fn round_robin(&self, pos: Pos3) -> bool {
        self.get(&pos).map(|node| node.round_robin_mode).unwrap_or(false)
    }
}
