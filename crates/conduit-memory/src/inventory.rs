//! Slot-based inventories with per-slot stack limits and merge-by-kind
//! insertion, the storage model the routing core's capacity probes are
//! written against.

use crate::item::{ItemFilter, ItemId, ItemStack};
use conduit_core::ResourceFilter;
use serde::{Deserialize, Serialize};

/// A fixed number of slots, each holding at most `max_stack` items of one
/// kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
    max_stack: u64,
}

impl Inventory {
    pub fn new(slot_count: usize, max_stack: u64) -> Self {
        Self {
            slots: vec![None; slot_count],
            max_stack,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    /// Overwrite a slot directly. Quantities above the stack limit are
    /// clamped.
    pub fn set_slot(&mut self, index: usize, stack: ItemStack) {
        let quantity = stack.quantity.min(self.max_stack);
        self.slots[index] = if quantity == 0 {
            None
        } else {
            Some(ItemStack::new(stack.item, quantity))
        };
    }

    pub fn clear_slot(&mut self, index: usize) {
        self.slots[index] = None;
    }

    pub fn total(&self) -> u64 {
        self.slots
            .iter()
            .flatten()
            .map(|stack| stack.quantity)
            .sum()
    }

    pub fn count_of(&self, item: ItemId) -> u64 {
        self.slots
            .iter()
            .flatten()
            .filter(|stack| stack.item == item)
            .map(|stack| stack.quantity)
            .sum()
    }

    /// How many items of `item` this inventory could take: headroom in
    /// matching slots plus full empty slots. The quantity a flow-aware probe
    /// compares reservations against.
    pub fn capacity_for(&self, item: ItemId) -> u64 {
        self.slots
            .iter()
            .map(|slot| match slot {
                Some(stack) if stack.item == item => self.max_stack - stack.quantity,
                Some(_) => 0,
                None => self.max_stack,
            })
            .sum()
    }

    /// All-or-nothing insertion: merge into matching slots first, then fill
    /// empty slots. Returns false, leaving the inventory untouched, if the
    /// whole stack does not fit.
    pub fn insert(&mut self, stack: &ItemStack) -> bool {
        if self.capacity_for(stack.item) < stack.quantity {
            return false;
        }
        let mut remaining = stack.quantity;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if let Some(existing) = slot {
                if existing.item == stack.item {
                    let moved = remaining.min(self.max_stack - existing.quantity);
                    existing.quantity += moved;
                    remaining -= moved;
                }
            }
        }
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let moved = remaining.min(self.max_stack);
                *slot = Some(ItemStack::new(stack.item, moved));
                remaining -= moved;
            }
        }
        debug_assert_eq!(remaining, 0);
        true
    }

    /// Peek at the `skip`-th filter-passing stack in slot order, capped at
    /// `max`. Nothing is removed.
    pub fn nth_matching(&self, filter: &ItemFilter, skip: usize, max: u64) -> Option<ItemStack> {
        self.slots
            .iter()
            .flatten()
            .filter(|stack| filter.accepts(stack))
            .nth(skip)
            .map(|stack| ItemStack::new(stack.item, stack.quantity.min(max)))
    }

    /// Peek at the first filter-passing stack, capped at `max`. Nothing is
    /// removed.
    pub fn first_matching(&self, filter: &ItemFilter, max: u64) -> Option<ItemStack> {
        self.nth_matching(filter, 0, max)
    }

    /// Remove up to `amount` items of `item`, front slots first. Returns the
    /// quantity actually removed.
    pub fn remove(&mut self, item: ItemId, amount: u64) -> u64 {
        let mut remaining = amount;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            let Some(stack) = slot else { continue };
            if stack.item != item {
                continue;
            }
            let taken = remaining.min(stack.quantity);
            stack.quantity -= taken;
            remaining -= taken;
            if stack.quantity == 0 {
                *slot = None;
            }
        }
        amount - remaining
    }
}
