//! Shared test fixtures: a minimal marble resource, a capacity-counting
//! storage world, and grid builders.
//!
//! Compiled for this crate's own tests and, behind the `test-utils` feature,
//! for downstream integration tests.

use crate::grid::{Direction, Pos3};
use crate::logic::PipeLogic;
use crate::node::{PipeNode, PipeSide};
use crate::resource::{ResourceFilter, ResourceHandler};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---- marble resource ----

/// The simplest possible resource unit: a colored stack of marbles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marble {
    pub color: u32,
    pub quantity: u64,
}

pub fn marble(color: u32, quantity: u64) -> Marble {
    Marble { color, quantity }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarbleFilter {
    allowed: BTreeSet<u32>,
}

impl MarbleFilter {
    pub fn allowing<I: IntoIterator<Item = u32>>(colors: I) -> Self {
        Self {
            allowed: colors.into_iter().collect(),
        }
    }
}

impl ResourceFilter<Marble> for MarbleFilter {
    fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    fn allows(&self, unit: &Marble) -> bool {
        self.allowed.contains(&unit.color)
    }
}

pub struct MarbleHandler;

impl ResourceHandler for MarbleHandler {
    type Unit = Marble;
    type Filter = MarbleFilter;

    fn same_resource(a: &Marble, b: &Marble) -> bool {
        a == b
    }

    fn resource_hash(unit: &Marble) -> u64 {
        // FNV-1a over color then quantity.
        let mut hash = 0xcbf2_9ce4_8422_2325u64;
        for byte in unit
            .color
            .to_le_bytes()
            .into_iter()
            .chain(unit.quantity.to_le_bytes())
        {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn quantity(unit: &Marble) -> u64 {
        unit.quantity
    }

    fn with_quantity(unit: &Marble, amount: u64) -> Marble {
        Marble {
            color: unit.color,
            quantity: amount,
        }
    }
}

// ---- counting storage world ----

/// A chest that holds up to `capacity` marbles total, counted per color.
#[derive(Debug, Clone, Default)]
pub struct TestStorage {
    capacity: u64,
    held: BTreeMap<u32, u64>,
}

impl TestStorage {
    pub fn total(&self) -> u64 {
        self.held.values().sum()
    }

    pub fn free(&self) -> u64 {
        self.capacity - self.total()
    }

    pub fn count_of(&self, color: u32) -> u64 {
        self.held.get(&color).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestWorld {
    pub storages: BTreeMap<Pos3, TestStorage>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_storage(&mut self, pos: Pos3, capacity: u64) {
        self.storages.insert(
            pos,
            TestStorage {
                capacity,
                held: BTreeMap::new(),
            },
        );
    }

    /// Drop marbles straight into a chest, ignoring capacity.
    pub fn put(&mut self, pos: Pos3, color: u32, quantity: u64) {
        let storage = self.storages.get_mut(&pos).expect("no storage here");
        *storage.held.entry(color).or_insert(0) += quantity;
    }

    pub fn total(&self, pos: Pos3) -> u64 {
        self.storages.get(&pos).map(TestStorage::total).unwrap_or(0)
    }

    pub fn count_of(&self, pos: Pos3, color: u32) -> u64 {
        self.storages
            .get(&pos)
            .map(|s| s.count_of(color))
            .unwrap_or(0)
    }
}

/// Storage adapter over [`TestWorld`]: unsided, all-or-nothing inserts,
/// extraction in color order.
pub struct TestLogic;

impl PipeLogic<MarbleHandler> for TestLogic {
    type World = TestWorld;

    fn is_connectable(&self, world: &TestWorld, pos: Pos3, _face: Direction) -> bool {
        world.storages.contains_key(&pos)
    }

    fn has_storage(&self, world: &TestWorld, pos: Pos3, _face: Direction) -> bool {
        world.storages.contains_key(&pos)
    }

    fn insertion_amount(
        &self,
        world: &TestWorld,
        unit: &Marble,
        pos: Pos3,
        _face: Direction,
        _is_stuck: bool,
        flow: u64,
    ) -> u64 {
        let Some(storage) = world.storages.get(&pos) else {
            return 0;
        };
        (flow + unit.quantity).min(storage.free())
    }

    fn extract(
        &self,
        world: &TestWorld,
        pipe_pos: Pos3,
        dir: Direction,
        filter: &MarbleFilter,
        max: u64,
        skip: usize,
    ) -> Option<Marble> {
        let storage = world.storages.get(&pipe_pos.offset(dir))?;
        storage
            .held
            .iter()
            .filter(|(color, count)| **count > 0 && filter.accepts(&marble(**color, 1)))
            .nth(skip)
            .map(|(color, count)| marble(*color, (*count).min(max)))
    }

    fn commit_extract(
        &self,
        world: &mut TestWorld,
        pipe_pos: Pos3,
        dir: Direction,
        unit: &Marble,
        amount: u64,
    ) -> u64 {
        let Some(storage) = world.storages.get_mut(&pipe_pos.offset(dir)) else {
            return 0;
        };
        let Some(count) = storage.held.get_mut(&unit.color) else {
            return 0;
        };
        let removed = (*count).min(amount);
        *count -= removed;
        if *count == 0 {
            storage.held.remove(&unit.color);
        }
        removed
    }

    fn insert(&self, world: &mut TestWorld, pos: Pos3, _face: Direction, unit: &Marble) -> bool {
        let Some(storage) = world.storages.get_mut(&pos) else {
            return false;
        };
        if storage.free() < unit.quantity {
            return false;
        }
        *storage.held.entry(unit.color).or_insert(0) += unit.quantity;
        true
    }
}

// ---- grid builders ----

/// Pipe nodes at the given positions, adjacent ones connected both ways.
pub fn pipe_grid<I: IntoIterator<Item = Pos3>>(
    positions: I,
) -> BTreeMap<Pos3, PipeNode<MarbleHandler>> {
    let mut nodes: BTreeMap<Pos3, PipeNode<MarbleHandler>> = positions
        .into_iter()
        .map(|pos| (pos, PipeNode::new(20)))
        .collect();
    let all: Vec<Pos3> = nodes.keys().copied().collect();
    for pos in all {
        for dir in Direction::ALL {
            if nodes.contains_key(&pos.offset(dir)) {
                nodes.get_mut(&pos).unwrap().set_side(dir, PipeSide::Connected);
            }
        }
    }
    nodes
}

/// Connect node sides toward world storages, the way side recomputation
/// would. Servo and wrenched sides are left alone.
pub fn wire(nodes: &mut BTreeMap<Pos3, PipeNode<MarbleHandler>>, world: &TestWorld) {
    let all: Vec<Pos3> = nodes.keys().copied().collect();
    for pos in all {
        for dir in Direction::ALL {
            let node = nodes.get(&pos).unwrap();
            if node.is_wrenched(dir) || node.side(dir) != PipeSide::None {
                continue;
            }
            if world.storages.contains_key(&pos.offset(dir)) {
                nodes.get_mut(&pos).unwrap().set_side(dir, PipeSide::Connected);
            }
        }
    }
}
