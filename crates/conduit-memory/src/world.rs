//! The in-memory world and its storage adapter.

use crate::inventory::Inventory;
use crate::item::{ItemFilter, ItemHandler, ItemStack};
use conduit_core::{Direction, PipeLogic, Pos3};
use std::collections::{BTreeMap, BTreeSet};

/// A sparse grid of inventories, plus positions pipes may visually connect
/// to without offering storage (machine faces, decorative blocks).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridWorld {
    inventories: BTreeMap<Pos3, Inventory>,
    connectable: BTreeSet<Pos3>,
}

impl GridWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inventory(&mut self, pos: Pos3, inventory: Inventory) {
        self.inventories.insert(pos, inventory);
    }

    pub fn remove_inventory(&mut self, pos: Pos3) -> Option<Inventory> {
        self.inventories.remove(&pos)
    }

    pub fn inventory(&self, pos: Pos3) -> Option<&Inventory> {
        self.inventories.get(&pos)
    }

    pub fn inventory_mut(&mut self, pos: Pos3) -> Option<&mut Inventory> {
        self.inventories.get_mut(&pos)
    }

    pub fn mark_connectable(&mut self, pos: Pos3) {
        self.connectable.insert(pos);
    }
}

/// Storage adapter over [`GridWorld`]: unsided inventories, all-or-nothing
/// inserts, slot-simulating capacity probes.
pub struct InventoryPipeLogic;

impl PipeLogic<ItemHandler> for InventoryPipeLogic {
    type World = GridWorld;

    fn is_connectable(&self, world: &GridWorld, pos: Pos3, _face: Direction) -> bool {
        world.inventories.contains_key(&pos) || world.connectable.contains(&pos)
    }

    fn has_storage(&self, world: &GridWorld, pos: Pos3, _face: Direction) -> bool {
        world.inventories.contains_key(&pos)
    }

    fn insertion_amount(
        &self,
        world: &GridWorld,
        unit: &ItemStack,
        pos: Pos3,
        _face: Direction,
        _is_stuck: bool,
        flow: u64,
    ) -> u64 {
        let Some(inventory) = world.inventory(pos) else {
            return 0;
        };
        (flow + unit.quantity).min(inventory.capacity_for(unit.item))
    }

    fn extract(
        &self,
        world: &GridWorld,
        pipe_pos: Pos3,
        dir: Direction,
        filter: &ItemFilter,
        max: u64,
        skip: usize,
    ) -> Option<ItemStack> {
        world
            .inventory(pipe_pos.offset(dir))?
            .nth_matching(filter, skip, max)
    }

    fn commit_extract(
        &self,
        world: &mut GridWorld,
        pipe_pos: Pos3,
        dir: Direction,
        unit: &ItemStack,
        amount: u64,
    ) -> u64 {
        world
            .inventory_mut(pipe_pos.offset(dir))
            .map(|inv| inv.remove(unit.item, amount))
            .unwrap_or(0)
    }

    fn insert(&self, world: &mut GridWorld, pos: Pos3, _face: Direction, unit: &ItemStack) -> bool {
        world
            .inventory_mut(pos)
            .map(|inv| inv.insert(unit))
            .unwrap_or(false)
    }
}
