//! Deterministic routing and transit simulation for grid-based conveyor
//! networks.
//!
//! The crate is generic over a [`ResourceHandler`] (what moves) and a
//! [`PipeLogic`] (where it comes from and goes). A [`PipeEngine`] owns the
//! pipe nodes, discovers routes through connected components, reserves
//! destination capacity for units in flight, and advances everything one
//! tick at a time. Hosts drive it with topology edits and [`step`], observe
//! it through [`render_transits`] and the event bus, and persist it with
//! [`save_engine`]/[`load_engine`].
//!
//! [`step`]: PipeEngine::step
//! [`render_transits`]: PipeEngine::render_transits

pub mod config;
pub mod discovery;
pub mod engine;
pub mod event;
pub mod grid;
pub mod logic;
pub mod network;
pub mod node;
pub mod path;
pub mod resource;
pub mod routes;
pub mod serialize;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::PipeConfig;
pub use engine::{EngineError, PipeEngine, TransitView};
pub use event::{Event, EventBus, EventKind};
pub use grid::{Direction, Pos3};
pub use logic::PipeLogic;
pub use network::{NetworkId, NetworkInformation};
pub use node::{NodeState, PipeNode, PipeSide};
pub use path::{PipePath, PotentialPath, QuantifiedPath, Transit, TransitId};
pub use resource::{FlowKey, ResourceFilter, ResourceHandler};
pub use routes::{GateState, RouteTree};
pub use serialize::{load_engine, save_engine, DeserializeError, SerializeError};
