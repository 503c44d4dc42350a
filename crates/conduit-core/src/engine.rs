//! The simulation engine: owns every pipe node and network, and advances the
//! whole system one tick at a time.
//!
//! Nodes are stored in a `BTreeMap` keyed by position and processed in that
//! order each tick, so two engines fed the same edits and the same world
//! produce identical state. Networks live in a slotmap arena; nodes refer to
//! theirs by id and the invalidation ripple reassigns ids wholesale.

use crate::config::PipeConfig;
use crate::discovery::discover_routes;
use crate::event::{Event, EventBus};
use crate::grid::{Direction, Pos3};
use crate::logic::PipeLogic;
use crate::network::{NetworkId, NetworkInformation};
use crate::node::{PipeNode, PipeSide};
use crate::path::{PipePath, QuantifiedPath, Transit, TransitId};
use crate::resource::ResourceHandler;
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("a pipe node already exists at {0:?}")]
    PositionOccupied(Pos3),
    #[error("no pipe node at {0:?}")]
    UnknownNode(Pos3),
}

/// Read-only view of one in-flight unit, for renderers.
#[derive(Debug, Clone, Copy)]
pub struct TransitView<'a, U> {
    pub id: TransitId,
    /// The node currently holding the unit.
    pub at: Pos3,
    /// Where the unit is headed next: the following hop, or the destination.
    pub next: Pos3,
    pub resource: &'a U,
    pub ticks_remaining: u32,
    pub anim: Option<Direction>,
}

pub struct PipeEngine<H: ResourceHandler, L: PipeLogic<H>> {
    pub(crate) nodes: BTreeMap<Pos3, PipeNode<H>>,
    pub(crate) networks: SlotMap<NetworkId, NetworkInformation<H>>,
    logic: L,
    pub(crate) config: PipeConfig,
    events: EventBus,
    pub(crate) tick: u64,
    pub(crate) next_transit: u64,
}

impl<H: ResourceHandler, L: PipeLogic<H>> PipeEngine<H, L> {
    pub fn new(logic: L, config: PipeConfig) -> Self {
        Self {
            nodes: BTreeMap::new(),
            networks: SlotMap::with_key(),
            logic,
            config,
            events: EventBus::default(),
            tick: 0,
            next_transit: 0,
        }
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn node(&self, pos: Pos3) -> Option<&PipeNode<H>> {
        self.nodes.get(&pos)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every node position, in deterministic order.
    pub fn positions(&self) -> impl Iterator<Item = Pos3> + '_ {
        self.nodes.keys().copied()
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    // ---- topology edits ----

    /// Place a pipe node. Sides connect automatically toward neighboring
    /// pipes and connectable world blocks; the component is rebuilt.
    pub fn place_node(&mut self, world: &L::World, pos: Pos3) -> Result<(), EngineError> {
        if self.nodes.contains_key(&pos) {
            return Err(EngineError::PositionOccupied(pos));
        }
        self.nodes
            .insert(pos, PipeNode::new(self.config.ticks_per_operation));
        self.recompute_sides(world, pos);
        for dir in Direction::ALL {
            let next = pos.offset(dir);
            if self.nodes.contains_key(&next) {
                self.recompute_sides(world, next);
            }
        }
        self.events.push(Event::NodePlaced { at: pos });
        self.ripple(pos, true);
        Ok(())
    }

    /// Remove a pipe node, returning the transits it was holding so the host
    /// can spill them. Every formerly adjacent component is rebuilt, which
    /// splits the network when the removed node was a bridge.
    pub fn remove_node(
        &mut self,
        world: &L::World,
        pos: Pos3,
    ) -> Result<Vec<Transit<H::Unit>>, EngineError> {
        let node = self.nodes.remove(&pos).ok_or(EngineError::UnknownNode(pos))?;
        if let Some(net) = self.networks.get_mut(node.network) {
            net.remove_member(pos);
            for transit in &node.transits {
                net.untrack(transit.id);
            }
        }
        for dir in Direction::ALL {
            let next = pos.offset(dir);
            if self.nodes.contains_key(&next) {
                self.recompute_sides(world, next);
                self.ripple(next, true);
            }
        }
        self.sweep_network(node.network);
        self.events.push(Event::NodeRemoved {
            at: pos,
            transits: node.transits.len(),
        });
        Ok(node.transits)
    }

    /// Turn a side into an extraction gate (or back into a plain side).
    pub fn set_servo(
        &mut self,
        world: &L::World,
        pos: Pos3,
        dir: Direction,
        on: bool,
    ) -> Result<(), EngineError> {
        if !self.nodes.contains_key(&pos) {
            return Err(EngineError::UnknownNode(pos));
        }
        if on {
            self.nodes.get_mut(&pos).unwrap().set_side(dir, PipeSide::Servo);
        } else {
            self.nodes.get_mut(&pos).unwrap().set_side(dir, PipeSide::None);
            self.recompute_sides(world, pos);
        }
        self.ripple(pos, true);
        Ok(())
    }

    /// Force-close or reopen a side. Returns the new wrenched state.
    pub fn toggle_wrench(
        &mut self,
        world: &L::World,
        pos: Pos3,
        dir: Direction,
    ) -> Result<bool, EngineError> {
        {
            let node = self
                .nodes
                .get_mut(&pos)
                .ok_or(EngineError::UnknownNode(pos))?;
            node.wrenched[dir.index()] = !node.wrenched[dir.index()];
        }
        self.recompute_sides(world, pos);
        let next = pos.offset(dir);
        if self.nodes.contains_key(&next) {
            self.recompute_sides(world, next);
            self.ripple(next, true);
        }
        self.ripple(pos, true);
        Ok(self.nodes[&pos].is_wrenched(dir))
    }

    /// Replace a node's filter. Filters are read live by route queries, so
    /// cached trees stay valid; only flow bookkeeping is refreshed.
    pub fn set_filter(&mut self, pos: Pos3, filter: H::Filter) -> Result<(), EngineError> {
        let node = self
            .nodes
            .get_mut(&pos)
            .ok_or(EngineError::UnknownNode(pos))?;
        node.filter = filter;
        self.ripple(pos, false);
        Ok(())
    }

    /// Flip between nearest-first and round-robin selection. Read live, so no
    /// invalidation at all.
    pub fn set_round_robin(&mut self, pos: Pos3, on: bool) -> Result<(), EngineError> {
        let node = self
            .nodes
            .get_mut(&pos)
            .ok_or(EngineError::UnknownNode(pos))?;
        node.round_robin_mode = on;
        Ok(())
    }

    /// Manual invalidation entry point: rebuild the component containing
    /// `pos`, optionally dropping cached route trees too.
    pub fn clear_network_cache(&mut self, pos: Pos3, rebuild_routes: bool) {
        self.ripple(pos, rebuild_routes);
    }

    // ---- side recomputation ----

    fn recompute_sides(&mut self, world: &L::World, pos: Pos3) {
        let Some(node) = self.nodes.get(&pos) else { return };
        let wrenched = node.wrenched;
        let sides = node.sides;
        let mut updated = sides;
        for dir in Direction::ALL {
            let i = dir.index();
            if wrenched[i] {
                updated[i] = PipeSide::None;
                continue;
            }
            if sides[i] == PipeSide::Servo {
                continue;
            }
            let next = pos.offset(dir);
            let connectable = self.nodes.contains_key(&next)
                || self.logic.is_connectable(world, next, dir.opposite());
            updated[i] = if connectable {
                PipeSide::Connected
            } else {
                PipeSide::None
            };
        }
        self.nodes.get_mut(&pos).unwrap().sides = updated;
    }

    // ---- invalidation ripple ----

    /// Flood the connected component containing `origin` with a fresh
    /// network, retracking every live transit. At most one ripple touches a
    /// node per tick; re-entry within the same tick is a no-op.
    fn ripple(&mut self, origin: Pos3, rebuild_routes: bool) {
        let Some(node) = self.nodes.get(&origin) else { return };
        if node.ticks_since_cache_clear == 0 {
            return;
        }
        let new_id = self.networks.insert(NetworkInformation::new());
        let mut displaced: BTreeSet<NetworkId> = BTreeSet::new();
        let mut visited: HashSet<Pos3> = HashSet::new();
        let mut queue = VecDeque::from([origin]);

        while let Some(pos) = queue.pop_front() {
            if !visited.insert(pos) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&pos) else { continue };
            if node.network != NetworkId::default() {
                displaced.insert(node.network);
            }
            node.network = new_id;
            node.ticks_since_cache_clear = 0;
            if rebuild_routes {
                node.route_cache.clear();
            }
            let sides = node.sides;
            let tracked: Vec<(TransitId, H::Unit, Pos3)> = node
                .transits
                .iter()
                .filter(|t| !t.stuck)
                .map(|t| (t.id, t.path.resource.clone(), t.destination()))
                .collect();

            let net = &mut self.networks[new_id];
            net.add_member(pos);
            for (id, unit, destination) in &tracked {
                net.track(*id, unit, *destination);
            }

            for dir in Direction::ALL {
                let side = sides[dir.index()];
                if side == PipeSide::None {
                    continue;
                }
                let next = pos.offset(dir);
                if visited.contains(&next) {
                    continue;
                }
                let Some(neighbor) = self.nodes.get(&next) else { continue };
                let crosses = match neighbor.side(dir.opposite()) {
                    PipeSide::Connected => true,
                    PipeSide::Servo => side != PipeSide::Servo,
                    PipeSide::None => false,
                };
                if crosses {
                    queue.push_back(next);
                }
            }
        }

        displaced.remove(&new_id);
        for id in displaced {
            self.sweep_network(id);
        }
        self.events.push(Event::NetworkRebuilt {
            at: origin,
            nodes: visited.len(),
        });
    }

    fn sweep_network(&mut self, id: NetworkId) {
        if !self.networks.contains_key(id) {
            return;
        }
        let referenced = self.nodes.values().any(|n| n.network == id);
        if !referenced {
            self.networks.remove(id);
        }
    }

    fn ensure_network(&mut self, pos: Pos3) {
        let Some(node) = self.nodes.get(&pos) else { return };
        let live = self
            .networks
            .get(node.network)
            .map(|n| !n.is_empty())
            .unwrap_or(false);
        if !live {
            self.ripple(pos, true);
        }
    }

    // ---- routing ----

    /// Feasible destinations for `unit`, querying (and if needed building)
    /// the cached route tree of the node at `origin`.
    ///
    /// `start` keys the cache and excludes the source storage during
    /// extraction; rerouting passes the origin itself. `stuck` relaxes the
    /// capacity probe: a waiting unit ignores in-flight flow so it can take
    /// the last open slot.
    pub fn find_destinations(
        &mut self,
        world: &L::World,
        unit: &H::Unit,
        origin: Pos3,
        start: Pos3,
        stuck: bool,
    ) -> Vec<QuantifiedPath> {
        self.ensure_network(origin);
        let Some(node) = self.nodes.get(&origin) else {
            return Vec::new();
        };
        let network_id = node.network;
        if !node.route_cache.contains_key(&start) {
            let tree = discover_routes(&self.nodes, &self.logic, world, origin, start);
            self.nodes
                .get_mut(&origin)
                .unwrap()
                .route_cache
                .insert(start, tree);
        }

        let node = &self.nodes[&origin];
        let tree = &node.route_cache[&start];
        let network = self.networks.get(network_id);
        let logic = &self.logic;
        let check = |unit: &H::Unit, dest: Pos3, face: Direction| -> u64 {
            let flow = if stuck {
                0
            } else {
                network.map(|n| n.flow_toward(unit, dest)).unwrap_or(0)
            };
            let room = logic.insertion_amount(world, unit, dest, face, stuck, flow);
            room.saturating_sub(flow)
        };
        tree.paths_for::<H, _, _>(unit, &self.nodes, &check)
    }

    // ---- per-tick state machine ----

    /// Advance the whole system one tick: per node in position order, lazy
    /// network rebuild, cooldown, transit movement, then extraction.
    pub fn step(&mut self, world: &mut L::World) {
        let positions: Vec<Pos3> = self.nodes.keys().copied().collect();
        for pos in positions {
            if !self.nodes.contains_key(&pos) {
                continue;
            }
            self.ensure_network(pos);
            {
                let node = self.nodes.get_mut(&pos).unwrap();
                if node.cooldown > 0 {
                    node.cooldown -= 1;
                }
            }
            self.advance_transits(world, pos);
            self.try_extract(world, pos);
            if let Some(node) = self.nodes.get_mut(&pos) {
                node.ticks_since_cache_clear = node.ticks_since_cache_clear.saturating_add(1);
            }
        }
        self.tick += 1;
    }

    fn advance_transits(&mut self, world: &mut L::World, pos: Pos3) {
        let ready: Vec<TransitId> = {
            let Some(node) = self.nodes.get_mut(&pos) else { return };
            node.transits.iter_mut().for_each(Transit::tick_down);
            node.transits
                .iter()
                .filter(|t| t.ticks_remaining == 0)
                .map(|t| t.id)
                .collect()
        };

        for id in ready {
            let Some(mut transit) = self
                .nodes
                .get_mut(&pos)
                .and_then(|node| node.take_transit(id))
            else {
                continue;
            };
            if transit.path.hops.front() == Some(&pos) {
                transit.path.hops.pop_front();
            }

            match transit.path.hops.front().copied() {
                Some(next) => {
                    if self.can_cross(pos, next) {
                        let receiver_tpo = self.nodes[&next].ticks_per_op;
                        transit.ticks_remaining = receiver_tpo;
                        transit.stuck = false;
                        self.move_tracking(&transit, pos, next);
                        self.events.push(Event::TransitHop { id, from: pos, to: next });
                        self.nodes.get_mut(&next).unwrap().transits.push(transit);
                    } else {
                        self.reroute(world, pos, transit);
                    }
                }
                None => {
                    let destination = transit.path.destination;
                    let face = transit.path.direction;
                    if self
                        .logic
                        .insert(world, destination, face, &transit.path.resource)
                    {
                        let network = self.nodes[&pos].network;
                        if let Some(net) = self.networks.get_mut(network) {
                            net.untrack(id);
                        }
                        self.events.push(Event::TransitDelivered { id, destination });
                    } else {
                        self.reroute(world, pos, transit);
                    }
                }
            }
        }
    }

    fn can_cross(&self, pos: Pos3, next: Pos3) -> bool {
        let Some(dir) = Direction::between(pos, next) else {
            return false;
        };
        let Some(node) = self.nodes.get(&pos) else { return false };
        let Some(neighbor) = self.nodes.get(&next) else { return false };
        node.side(dir) == PipeSide::Connected && neighbor.side(dir.opposite()) != PipeSide::None
    }

    /// Re-home a transit's flow reservation when it crosses between nodes.
    /// Tracking is unconditional so a formerly stuck unit regains its
    /// reservation the moment it moves again.
    fn move_tracking(&mut self, transit: &Transit<H::Unit>, from: Pos3, to: Pos3) {
        let old = self.nodes[&from].network;
        let new = self.nodes[&to].network;
        if old != new {
            if let Some(net) = self.networks.get_mut(old) {
                net.untrack(transit.id);
            }
        }
        if let Some(net) = self.networks.get_mut(new) {
            net.track(transit.id, &transit.path.resource, transit.destination());
        }
    }

    /// A transit whose path broke or whose delivery was refused picks a new
    /// route from the node currently holding it. With nothing feasible it
    /// parks as stuck, releases its reservation, and retries later.
    fn reroute(&mut self, world: &mut L::World, pos: Pos3, mut transit: Transit<H::Unit>) {
        let results =
            self.find_destinations(world, &transit.path.resource, pos, pos, transit.stuck);
        let id = transit.id;
        if results.is_empty() {
            transit.ticks_remaining = self.config.stuck_retry_ticks;
            if !transit.stuck {
                transit.stuck = true;
                let network = self.nodes[&pos].network;
                if let Some(net) = self.networks.get_mut(network) {
                    net.untrack(id);
                }
            }
            self.events.push(Event::TransitStuck { id, at: pos });
            self.nodes.get_mut(&pos).unwrap().transits.push(transit);
        } else {
            let chosen = &results[0];
            let path = PipePath::from_potential(&chosen.potential, transit.path.resource.clone());
            let fresh = Transit::new(id, path, self.config.ticks_per_operation);
            let network = self.nodes[&pos].network;
            if let Some(net) = self.networks.get_mut(network) {
                net.track(id, &fresh.path.resource, fresh.destination());
            }
            self.events.push(Event::TransitRerouted { id, at: pos });
            self.nodes.get_mut(&pos).unwrap().transits.push(fresh);
        }
    }

    fn try_extract(&mut self, world: &mut L::World, pos: Pos3) {
        {
            let Some(node) = self.nodes.get(&pos) else { return };
            if node.cooldown > 0 {
                return;
            }
        }
        let servos: Vec<Direction> = self.nodes[&pos].servo_sides().collect();
        let max = self.config.max_extraction_per_operation;

        'servos: for dir in servos {
            let filter = self.nodes[&pos].filter.clone();
            let start = pos.offset(dir);
            // Walk the storage's candidates in order; one that cannot be
            // routed steps aside for the stacks behind it.
            for skip in 0.. {
                let Some(candidate) = self.logic.extract(world, pos, dir, &filter, max, skip)
                else {
                    break;
                };
                let results = self.find_destinations(world, &candidate, pos, start, false);
                if results.is_empty() {
                    continue;
                }

                let chosen = {
                    let node = self.nodes.get_mut(&pos).unwrap();
                    if results.len() <= node.round_robin_index {
                        node.round_robin_index = 0;
                    }
                    let picked = results[node.round_robin_index].clone();
                    node.round_robin_index += 1;
                    picked
                };

                let send = chosen.amount.min(H::quantity(&candidate));
                let removed = self.logic.commit_extract(world, pos, dir, &candidate, send);
                if removed == 0 {
                    continue;
                }
                let unit = H::with_quantity(&candidate, removed);
                let id = self.allocate_transit_id();
                let path = PipePath::from_potential(&chosen.potential, unit.clone());
                let transit = Transit::new(id, path, self.config.extraction_transit_ticks());
                let network = self.nodes[&pos].network;
                if let Some(net) = self.networks.get_mut(network) {
                    net.track(id, &unit, chosen.potential.destination);
                }
                self.events.push(Event::TransitStarted { id, from: pos });
                self.nodes.get_mut(&pos).unwrap().transits.push(transit);
                break 'servos;
            }
        }

        self.nodes.get_mut(&pos).unwrap().cooldown = self.config.cooldown_ticks();
    }

    fn allocate_transit_id(&mut self) -> TransitId {
        let id = TransitId(self.next_transit);
        self.next_transit += 1;
        id
    }

    // ---- observation ----

    /// Every renderable in-flight unit. Empty when rendering is disabled;
    /// units on paths longer than the cutoff are omitted.
    pub fn render_transits(&self) -> Vec<TransitView<'_, H::Unit>> {
        if !self.config.render_items {
            return Vec::new();
        }
        let mut views = Vec::new();
        for (&pos, node) in &self.nodes {
            for transit in &node.transits {
                if transit.path.length() >= self.config.max_render_path_length {
                    continue;
                }
                let next = match transit.path.hops.front() {
                    Some(&front) if front == pos => transit.path.hops.get(1).copied(),
                    Some(&front) => Some(front),
                    None => None,
                }
                .unwrap_or(transit.path.destination);
                views.push(TransitView {
                    id: transit.id,
                    at: pos,
                    next,
                    resource: &transit.path.resource,
                    ticks_remaining: transit.ticks_remaining,
                    anim: transit.anim(),
                });
            }
        }
        views
    }

    /// FNV-1a digest of all simulation-relevant state, for determinism
    /// checks between engines fed the same inputs.
    pub fn state_hash(&self) -> u64 {
        let mut hash = StateHash::new();
        hash.write_u64(self.tick);
        for (pos, node) in &self.nodes {
            hash.write_pos(*pos);
            for side in node.sides {
                hash.write_u8(side as u8);
            }
            for wrenched in node.wrenched {
                hash.write_u8(wrenched as u8);
            }
            hash.write_u8(node.round_robin_mode as u8);
            hash.write_u64(node.round_robin_index as u64);
            hash.write_u64(node.cooldown as u64);
            for transit in &node.transits {
                hash.write_u64(transit.id.0);
                hash.write_u64(transit.ticks_remaining as u64);
                hash.write_u8(transit.stuck as u8);
                hash.write_pos(transit.path.destination);
                hash.write_u64(H::resource_hash(&transit.path.resource));
            }
        }
        hash.finish()
    }
}

impl<H: ResourceHandler, L: PipeLogic<H>> std::fmt::Debug for PipeEngine<H, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeEngine")
            .field("tick", &self.tick)
            .field("nodes", &self.nodes.len())
            .field("networks", &self.networks.len())
            .finish()
    }
}

// ---- state hashing ----

struct StateHash(u64);

impl StateHash {
    fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }

    fn write_u8(&mut self, byte: u8) {
        self.0 ^= u64::from(byte);
        self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
    }

    fn write_u64(&mut self, value: u64) {
        for byte in value.to_le_bytes() {
            self.write_u8(byte);
        }
    }

    fn write_pos(&mut self, pos: Pos3) {
        for part in [pos.x, pos.y, pos.z] {
            self.write_u64(part as u64);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::test_utils::{MarbleFilter, MarbleHandler, TestLogic, TestWorld};

    fn p(x: i32, y: i32, z: i32) -> Pos3 {
        Pos3::new(x, y, z)
    }

    fn engine() -> PipeEngine<MarbleHandler, TestLogic> {
        PipeEngine::new(TestLogic, PipeConfig::default())
    }

    /// Source chest at `from`, pipes across the span, sink chest at `to`,
    /// servo pulling from the source. Positions along the x axis.
    fn line(world: &mut TestWorld, eng: &mut PipeEngine<MarbleHandler, TestLogic>, pipes: i32) {
        world.add_storage(p(0, 0, 0), 64);
        world.add_storage(p(pipes + 1, 0, 0), 64);
        for x in 1..=pipes {
            eng.place_node(world, p(x, 0, 0)).unwrap();
        }
        eng.set_servo(world, p(1, 0, 0), Direction::West, true).unwrap();
    }

    fn run(world: &mut TestWorld, eng: &mut PipeEngine<MarbleHandler, TestLogic>, ticks: u32) {
        for _ in 0..ticks {
            eng.step(world);
        }
    }

    #[test]
    fn place_rejects_duplicates_and_remove_unknown() {
        let world = TestWorld::new();
        let mut eng = engine();
        eng.place_node(&world, p(0, 0, 0)).unwrap();
        assert_eq!(
            eng.place_node(&world, p(0, 0, 0)),
            Err(EngineError::PositionOccupied(p(0, 0, 0)))
        );
        assert!(matches!(
            eng.remove_node(&world, p(9, 9, 9)),
            Err(EngineError::UnknownNode(_))
        ));
    }

    #[test]
    fn delivers_across_a_line_of_pipes() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        line(&mut world, &mut eng, 3);
        world.put(p(0, 0, 0), 1, 1);

        // Extraction fires on the first tick (cooldown starts at zero), then
        // 30 ticks for the first hop and 20 per following hop.
        run(&mut world, &mut eng, 1);
        assert_eq!(world.total(p(0, 0, 0)), 0);
        run(&mut world, &mut eng, 100);
        assert_eq!(world.count_of(p(4, 0, 0), 1), 1);
        let events = eng.drain_events();
        assert!(events.iter().any(|e| e.kind() == EventKind::TransitDelivered));
    }

    #[test]
    fn extraction_respects_node_filter() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        line(&mut world, &mut eng, 2);
        eng.set_filter(p(1, 0, 0), MarbleFilter::allowing([5])).unwrap();
        world.put(p(0, 0, 0), 1, 4);

        run(&mut world, &mut eng, 60);
        assert_eq!(world.count_of(p(0, 0, 0), 1), 4);

        world.put(p(0, 0, 0), 5, 1);
        run(&mut world, &mut eng, 120);
        assert_eq!(world.count_of(p(3, 0, 0), 5), 1);
        assert_eq!(world.count_of(p(0, 0, 0), 1), 4);
    }

    #[test]
    fn flow_reserves_capacity_at_destination() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        // Sink with room for exactly one marble.
        world.add_storage(p(0, 0, 0), 64);
        world.add_storage(p(3, 0, 0), 1);
        for x in 1..=2 {
            eng.place_node(&world, p(x, 0, 0)).unwrap();
        }
        eng.set_servo(&world, p(1, 0, 0), Direction::West, true).unwrap();
        world.put(p(0, 0, 0), 1, 2);

        // First extraction commits the only slot; the second marble has no
        // feasible destination and stays put until the first one lands.
        run(&mut world, &mut eng, 12);
        assert_eq!(world.count_of(p(0, 0, 0), 1), 1);
        run(&mut world, &mut eng, 60);
        assert_eq!(world.count_of(p(3, 0, 0), 1), 1);
        assert_eq!(world.count_of(p(0, 0, 0), 1), 1);
    }

    #[test]
    fn no_destination_means_no_extraction() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        world.add_storage(p(0, 0, 0), 64);
        eng.place_node(&world, p(1, 0, 0)).unwrap();
        eng.set_servo(&world, p(1, 0, 0), Direction::West, true).unwrap();
        world.put(p(0, 0, 0), 1, 3);

        run(&mut world, &mut eng, 50);
        assert_eq!(world.count_of(p(0, 0, 0), 1), 3);
        assert_eq!(eng.node(p(1, 0, 0)).unwrap().transits.len(), 0);
    }

    #[test]
    fn removing_a_bridge_splits_the_network() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        for x in 0..5 {
            eng.place_node(&world, p(x, 0, 0)).unwrap();
        }
        eng.step(&mut world);
        // All five share one network.
        let first = eng.node(p(0, 0, 0)).unwrap().network;
        assert!((0..5).all(|x| eng.node(p(x, 0, 0)).unwrap().network == first));

        eng.remove_node(&world, p(2, 0, 0)).unwrap();
        let left = eng.node(p(0, 0, 0)).unwrap().network;
        let right = eng.node(p(3, 0, 0)).unwrap().network;
        assert_ne!(left, right);
        assert_eq!(eng.node(p(1, 0, 0)).unwrap().network, left);
        assert_eq!(eng.node(p(4, 0, 0)).unwrap().network, right);
    }

    #[test]
    fn ripple_runs_at_most_once_per_tick() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        for x in 0..3 {
            eng.place_node(&world, p(x, 0, 0)).unwrap();
        }
        eng.step(&mut world);
        eng.drain_events();

        // First ripple walks the component; same-tick re-entry from any
        // member is swallowed by the guard.
        eng.clear_network_cache(p(0, 0, 0), true);
        eng.clear_network_cache(p(1, 0, 0), true);
        let rebuilds = eng
            .drain_events()
            .into_iter()
            .filter(|e| e.kind() == EventKind::NetworkRebuilt)
            .count();
        assert_eq!(rebuilds, 1);

        eng.step(&mut world);
        eng.drain_events();
        eng.clear_network_cache(p(1, 0, 0), true);
        assert_eq!(eng.drain_events().len(), 1);
    }

    #[test]
    fn orphaned_networks_are_swept() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        for x in 0..4 {
            eng.place_node(&world, p(x, 0, 0)).unwrap();
        }
        eng.step(&mut world);
        assert_eq!(eng.network_count(), 1);
        eng.remove_node(&world, p(1, 0, 0)).unwrap();
        assert_eq!(eng.network_count(), 2);
        eng.remove_node(&world, p(0, 0, 0)).unwrap();
        eng.remove_node(&world, p(2, 0, 0)).unwrap();
        eng.remove_node(&world, p(3, 0, 0)).unwrap();
        assert_eq!(eng.network_count(), 0);
    }

    #[test]
    fn wrench_blocks_traffic() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        line(&mut world, &mut eng, 2);
        eng.toggle_wrench(&world, p(2, 0, 0), Direction::East).unwrap();
        world.put(p(0, 0, 0), 1, 1);

        run(&mut world, &mut eng, 80);
        // Nothing could be routed past the wrenched face.
        assert_eq!(world.count_of(p(0, 0, 0), 1), 1);
        assert_eq!(world.total(p(3, 0, 0)), 0);
    }

    #[test]
    fn render_views_follow_config() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        line(&mut world, &mut eng, 2);
        world.put(p(0, 0, 0), 1, 1);
        run(&mut world, &mut eng, 5);

        let views = eng.render_transits();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].at, p(1, 0, 0));
        assert_eq!(views[0].next, p(2, 0, 0));
        assert_eq!(views[0].anim, Some(Direction::West));

        // The cutoff is exclusive: a path exactly at the limit hides.
        eng.config.max_render_path_length = 2;
        assert!(eng.render_transits().is_empty());
        eng.config.max_render_path_length = 3;
        assert_eq!(eng.render_transits().len(), 1);

        eng.config.render_items = false;
        assert!(eng.render_transits().is_empty());
    }

    #[test]
    fn unroutable_candidate_does_not_starve_the_rest() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        line(&mut world, &mut eng, 2);
        // The second pipe gates westbound traffic on its filter, so color 1
        // has no route while color 2 does.
        eng.set_servo(&world, p(2, 0, 0), Direction::West, true).unwrap();
        eng.set_filter(p(2, 0, 0), MarbleFilter::allowing([2])).unwrap();
        world.put(p(0, 0, 0), 1, 1);
        world.put(p(0, 0, 0), 2, 1);

        run(&mut world, &mut eng, 80);
        // The blocked stack steps aside instead of stopping extraction.
        assert_eq!(world.count_of(p(3, 0, 0), 2), 1);
        assert_eq!(world.count_of(p(0, 0, 0), 1), 1);
        assert_eq!(world.count_of(p(3, 0, 0), 1), 0);
    }

    #[test]
    fn debug_output_summarizes_the_engine() {
        let world = TestWorld::new();
        let mut eng = engine();
        eng.place_node(&world, p(0, 0, 0)).unwrap();
        let rendered = format!("{eng:?}");
        assert!(rendered.contains("PipeEngine"));
        assert!(rendered.contains("nodes: 1"));
    }

    #[test]
    fn state_hash_is_reproducible() {
        let build = || {
            let mut world = TestWorld::new();
            let mut eng = engine();
            line(&mut world, &mut eng, 3);
            world.put(p(0, 0, 0), 1, 5);
            run(&mut world, &mut eng, 137);
            eng.state_hash()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn state_hash_tracks_divergence() {
        let mut world = TestWorld::new();
        let mut eng = engine();
        line(&mut world, &mut eng, 3);
        let before = eng.state_hash();
        eng.set_round_robin(p(1, 0, 0), true).unwrap();
        assert_ne!(before, eng.state_hash());
    }
}
