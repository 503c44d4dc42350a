//! Resource capability traits.
//!
//! The core is generic over a [`ResourceHandler`]: a zero-sized capability
//! type describing one kind of resource unit (items, fluids, ...) and its
//! filter. Everything the routing core needs to know about a unit — identity,
//! quantity, re-quantification — goes through the handler, so the same engine
//! moves any resource kind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A predicate over resource units, owned by a node and applied at servo
/// gates. An *empty* filter passes everything.
pub trait ResourceFilter<U> {
    /// True if the filter has no entries and therefore restricts nothing.
    fn is_empty(&self) -> bool;

    /// Whether the filter's entries match this unit. Only consulted when the
    /// filter is non-empty.
    fn allows(&self, unit: &U) -> bool;

    /// The gate test: empty filters pass everything.
    fn accepts(&self, unit: &U) -> bool {
        self.is_empty() || self.allows(unit)
    }
}

/// Capability contract for one resource kind.
///
/// Identity (`same_resource`/`resource_hash`) covers the full unit including
/// its quantity; flow indexing normalizes quantity to one via [`one_unit`]
/// before keying, so units of the same kind collide regardless of stack size.
///
/// [`one_unit`]: ResourceHandler::one_unit
pub trait ResourceHandler: Sized + 'static {
    /// The resource unit type carried through the network.
    type Unit: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static;

    /// The filter type applied at servo gates.
    type Filter: ResourceFilter<Self::Unit>
        + Clone
        + fmt::Debug
        + Default
        + Serialize
        + DeserializeOwned
        + 'static;

    /// Value equality for units, including quantity.
    fn same_resource(a: &Self::Unit, b: &Self::Unit) -> bool;

    /// Hash consistent with [`same_resource`](ResourceHandler::same_resource).
    fn resource_hash(unit: &Self::Unit) -> u64;

    /// How many discrete units this resource represents.
    fn quantity(unit: &Self::Unit) -> u64;

    /// A copy of `unit` carrying `amount` instead of its own quantity.
    fn with_quantity(unit: &Self::Unit, amount: u64) -> Self::Unit;

    /// A copy normalized to quantity one, used for identity-keyed indexing.
    fn one_unit(unit: &Self::Unit) -> Self::Unit {
        Self::with_quantity(unit, 1)
    }
}

/// Hash-map key over a quantity-normalized resource unit.
///
/// Equality and hashing are delegated to the handler, so backends with
/// interior structure (damage values, payloads) key correctly without the
/// unit type itself implementing `Eq`/`Hash`.
pub struct FlowKey<H: ResourceHandler>(H::Unit);

impl<H: ResourceHandler> FlowKey<H> {
    pub fn new(unit: &H::Unit) -> Self {
        Self(H::one_unit(unit))
    }

    pub fn unit(&self) -> &H::Unit {
        &self.0
    }
}

impl<H: ResourceHandler> Clone for FlowKey<H> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<H: ResourceHandler> fmt::Debug for FlowKey<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FlowKey").field(&self.0).finish()
    }
}

impl<H: ResourceHandler> PartialEq for FlowKey<H> {
    fn eq(&self, other: &Self) -> bool {
        H::same_resource(&self.0, &other.0)
    }
}

impl<H: ResourceHandler> Eq for FlowKey<H> {}

impl<H: ResourceHandler> Hash for FlowKey<H> {
    fn hash<S: Hasher>(&self, state: &mut S) {
        state.write_u64(H::resource_hash(&self.0));
    }
}
