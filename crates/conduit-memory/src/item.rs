//! Item resources: stacks, filters, and the handler wiring them into the
//! routing core.

use conduit_core::{ResourceFilter, ResourceHandler};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque item kind identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// A stack of identical items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemId,
    pub quantity: u64,
}

impl ItemStack {
    pub fn new(item: ItemId, quantity: u64) -> Self {
        Self { item, quantity }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    Whitelist,
    Blacklist,
}

/// Item filter applied at extraction gates. An empty entry set restricts
/// nothing in either mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    entries: BTreeSet<ItemId>,
    mode: FilterMode,
}

impl ItemFilter {
    pub fn whitelist<I: IntoIterator<Item = ItemId>>(items: I) -> Self {
        Self {
            entries: items.into_iter().collect(),
            mode: FilterMode::Whitelist,
        }
    }

    pub fn blacklist<I: IntoIterator<Item = ItemId>>(items: I) -> Self {
        Self {
            entries: items.into_iter().collect(),
            mode: FilterMode::Blacklist,
        }
    }
}

impl ResourceFilter<ItemStack> for ItemFilter {
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn allows(&self, unit: &ItemStack) -> bool {
        match self.mode {
            FilterMode::Whitelist => self.entries.contains(&unit.item),
            FilterMode::Blacklist => !self.entries.contains(&unit.item),
        }
    }
}

/// Capability handler for [`ItemStack`] resources.
pub struct ItemHandler;

impl ResourceHandler for ItemHandler {
    type Unit = ItemStack;
    type Filter = ItemFilter;

    fn same_resource(a: &ItemStack, b: &ItemStack) -> bool {
        a == b
    }

    fn resource_hash(unit: &ItemStack) -> u64 {
        // FNV-1a over id then quantity.
        let mut hash = 0xcbf2_9ce4_8422_2325u64;
        for byte in unit
            .item
            .0
            .to_le_bytes()
            .into_iter()
            .chain(unit.quantity.to_le_bytes())
        {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    fn quantity(unit: &ItemStack) -> u64 {
        unit.quantity
    }

    fn with_quantity(unit: &ItemStack, amount: u64) -> ItemStack {
        ItemStack::new(unit.item, amount)
    }
}
