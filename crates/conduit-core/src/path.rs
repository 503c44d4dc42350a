//! Paths and transits.
//!
//! A [`PotentialPath`] is pure geometry: the hop sequence from an origin to a
//! storage endpoint, computed once by discovery and cached inside a route
//! tree. Binding a resource to that geometry produces a [`PipePath`], and a
//! `PipePath` plus a countdown is a [`Transit`] — one unit actually moving
//! through the network.

use crate::grid::{Direction, Pos3};
use crate::resource::ResourceHandler;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Identifies one in-flight transit for the lifetime of the engine. Flow
/// bookkeeping mirrors node transit lists through this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitId(pub u64);

/// Route geometry from an origin to one storage endpoint. Immutable once
/// discovered; carries no resource so one potential serves every query
/// against the cached tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialPath {
    /// Node positions traversed, origin first. Does not include the
    /// destination.
    pub hops: Vec<Pos3>,
    /// The storage endpoint position.
    pub destination: Pos3,
    /// The face of the destination the unit enters through.
    pub direction: Direction,
    /// Which side of the origin the unit visually entered from, if any.
    pub anim: Option<Direction>,
}

impl PotentialPath {
    pub fn new(
        destination: Pos3,
        hops: Vec<Pos3>,
        direction: Direction,
        anim: Option<Direction>,
    ) -> Self {
        Self {
            hops,
            destination,
            direction,
            anim,
        }
    }

    /// Hop count, the distance measure used for nearest-first ordering and
    /// the render cutoff.
    pub fn len(&self) -> u32 {
        self.hops.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }
}

/// A potential path together with the quantity its endpoint can still accept,
/// as judged by a flow-aware capacity probe at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantifiedPath {
    pub potential: PotentialPath,
    pub amount: u64,
}

/// Route geometry bound to a concrete resource unit. The hop queue is
/// consumed from the front as the unit advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipePath<U> {
    pub hops: VecDeque<Pos3>,
    pub destination: Pos3,
    pub direction: Direction,
    pub anim: Option<Direction>,
    pub resource: U,
    /// Original hop count, preserved as hops are consumed.
    length: u32,
}

impl<U> PipePath<U> {
    pub fn from_potential(potential: &PotentialPath, resource: U) -> Self {
        Self {
            hops: potential.hops.iter().copied().collect(),
            destination: potential.destination,
            direction: potential.direction,
            anim: potential.anim,
            resource,
            length: potential.len(),
        }
    }

    /// Bind a quantified path, re-quantifying `resource` to the accepted
    /// amount through the handler.
    pub fn quantified<H>(path: &QuantifiedPath, resource: &U) -> Self
    where
        H: ResourceHandler<Unit = U>,
    {
        Self::from_potential(&path.potential, H::with_quantity(resource, path.amount))
    }

    pub fn length(&self) -> u32 {
        self.length
    }
}

/// One resource unit in motion: a bound path, a per-hop countdown, and the
/// stuck flag raised when no route to any destination currently exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transit<U> {
    pub id: TransitId,
    pub path: PipePath<U>,
    /// Ticks until this unit leaves the node currently holding it.
    pub ticks_remaining: u32,
    /// Set when rerouting found no destination; cleared on a successful
    /// hand-off.
    pub stuck: bool,
    /// The animation hint stays alive only until the countdown first hits
    /// zero; after that the unit renders without a directional cue.
    anim_live: bool,
}

impl<U> Transit<U> {
    pub fn new(id: TransitId, path: PipePath<U>, ticks: u32) -> Self {
        Self {
            id,
            path,
            ticks_remaining: ticks,
            stuck: false,
            anim_live: true,
        }
    }

    pub fn tick_down(&mut self) {
        self.ticks_remaining = self.ticks_remaining.saturating_sub(1);
        if self.ticks_remaining == 0 {
            self.anim_live = false;
        }
    }

    /// Cosmetic direction hint for renderers; `None` once the first hop has
    /// elapsed.
    pub fn anim(&self) -> Option<Direction> {
        if self.anim_live {
            self.path.anim
        } else {
            None
        }
    }

    pub fn destination(&self) -> Pos3 {
        self.path.destination
    }
}
