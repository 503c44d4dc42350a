//! Shared setup for the scenario tests: an engine over the in-memory
//! inventory backend, plus small world builders.
#![allow(dead_code)]

use conduit_core::{Direction, PipeConfig, PipeEngine, Pos3};
use conduit_memory::{GridWorld, Inventory, InventoryPipeLogic, ItemHandler, ItemId, ItemStack};

pub type Engine = PipeEngine<ItemHandler, InventoryPipeLogic>;

pub fn engine() -> Engine {
    PipeEngine::new(InventoryPipeLogic, PipeConfig::default())
}

pub fn p(x: i32, y: i32, z: i32) -> Pos3 {
    Pos3::new(x, y, z)
}

pub fn stack(id: u32, quantity: u64) -> ItemStack {
    ItemStack::new(ItemId(id), quantity)
}

/// An inventory with `slots` slots of `max_stack` items each.
pub fn chest(world: &mut GridWorld, pos: Pos3, slots: usize, max_stack: u64) {
    world.add_inventory(pos, Inventory::new(slots, max_stack));
}

pub fn run(eng: &mut Engine, world: &mut GridWorld, ticks: u32) {
    for _ in 0..ticks {
        eng.step(world);
    }
}

/// Pipes along the x axis, inclusive on both ends.
pub fn pipe_line(eng: &mut Engine, world: &GridWorld, from_x: i32, to_x: i32) {
    for x in from_x..=to_x {
        eng.place_node(world, p(x, 0, 0)).unwrap();
    }
}

pub fn count_of(world: &GridWorld, pos: Pos3, id: u32) -> u64 {
    world
        .inventory(pos)
        .map(|inv| inv.count_of(ItemId(id)))
        .unwrap_or(0)
}

pub fn total(world: &GridWorld, pos: Pos3) -> u64 {
    world.inventory(pos).map(|inv| inv.total()).unwrap_or(0)
}

/// Items currently riding the pipes.
pub fn in_transit(eng: &Engine) -> u64 {
    eng.positions()
        .filter_map(|pos| eng.node(pos))
        .flat_map(|node| node.transits.iter())
        .map(|t| t.path.resource.quantity)
        .sum()
}

pub const WEST: Direction = Direction::West;
pub const EAST: Direction = Direction::East;
pub const DOWN: Direction = Direction::Down;
