//! In-memory backend for `conduit-core`: item stacks, slot inventories, and
//! a [`PipeLogic`](conduit_core::PipeLogic) adapter over a sparse grid
//! world. Useful as a reference backend and for end-to-end testing.

pub mod inventory;
pub mod item;
pub mod world;

pub use inventory::Inventory;
pub use item::{FilterMode, ItemFilter, ItemHandler, ItemId, ItemStack};
pub use world::{GridWorld, InventoryPipeLogic};
