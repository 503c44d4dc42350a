//! The storage adapter contract.
//!
//! A [`PipeLogic`] answers every question the routing core has about the
//! world outside the pipe network: what can be connected to, where storage
//! endpoints are, how much a destination can still accept, and how units are
//! physically pulled and committed. One logic instance is injected at engine
//! construction; the core never inspects the world directly.

use crate::grid::{Direction, Pos3};
use crate::resource::ResourceHandler;

/// Pluggable storage backend for one resource kind.
///
/// Directions follow the arrival convention: where a method takes a `face`,
/// it is the side of the *storage* block adjacent to the pipe, i.e. the side
/// a unit enters through. Sided backends may refuse faces; unsided backends
/// ignore them.
pub trait PipeLogic<H: ResourceHandler> {
    /// The backend's world representation. The engine threads a reference
    /// through every operation; it never stores one.
    type World;

    /// Whether a route could pass through `pos` at all. Consulted when
    /// recomputing a node's connection sides; returning false keeps the side
    /// unconnected so discovery never looks there.
    fn is_connectable(&self, world: &Self::World, pos: Pos3, face: Direction) -> bool;

    /// Whether a storage endpoint exists at `pos`, accessed through `face`.
    fn has_storage(&self, world: &Self::World, pos: Pos3, face: Direction) -> bool;

    /// Quantified, flow-aware capacity probe.
    ///
    /// Returns how much of `unit`'s kind the storage at `pos` could accept if
    /// `flow` units of the same kind were already committed to it. The result
    /// includes the flow: the maximum is `flow + quantity(unit)` and the
    /// minimum is zero. The caller subtracts `flow` to get the headroom for
    /// this unit.
    fn insertion_amount(
        &self,
        world: &Self::World,
        unit: &H::Unit,
        pos: Pos3,
        face: Direction,
        is_stuck: bool,
        flow: u64,
    ) -> u64;

    /// Non-destructive extraction probe: the `skip`-th filter-passing
    /// candidate of up to `max` units available to a pipe at `pipe_pos`
    /// pulling through its `dir` side, or `None` when fewer candidates
    /// remain.
    ///
    /// Nothing is removed; the engine routes each candidate in turn, stepping
    /// `skip` past stacks it cannot place, and commits only the amount it
    /// could actually send. A stack with no feasible destination therefore
    /// never blocks extraction of the stacks behind it.
    fn extract(
        &self,
        world: &Self::World,
        pipe_pos: Pos3,
        dir: Direction,
        filter: &H::Filter,
        max: u64,
        skip: usize,
    ) -> Option<H::Unit>;

    /// Remove up to `amount` units matching `unit` from the storage adjacent
    /// to `pipe_pos` through `dir`. Returns the quantity actually removed,
    /// which may be less than requested if the storage changed since the
    /// probe.
    fn commit_extract(
        &self,
        world: &mut Self::World,
        pipe_pos: Pos3,
        dir: Direction,
        unit: &H::Unit,
        amount: u64,
    ) -> u64;

    /// Commit a delivery of `unit` into the storage at `pos`. Returns false
    /// if the storage rejects it; the engine then reroutes or marks the
    /// carrying transit stuck.
    fn insert(&self, world: &mut Self::World, pos: Pos3, face: Direction, unit: &H::Unit) -> bool;
}
