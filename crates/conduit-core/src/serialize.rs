//! Engine snapshots.
//!
//! A snapshot is a versioned bitcode blob: a small header (magic, format
//! version, tick) followed by the config and the persistent state of every
//! node. Derived state — networks, route caches, ripple guards — is not
//! written; a restored engine rebuilds it lazily on first use.

use crate::config::PipeConfig;
use crate::engine::PipeEngine;
use crate::grid::Pos3;
use crate::logic::PipeLogic;
use crate::network::NetworkId;
use crate::node::{NodeState, PipeNode};
use crate::resource::ResourceHandler;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SNAPSHOT_MAGIC: u32 = 0xC04D_0001;
pub const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] bitcode::Error),
}

#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("snapshot decoding failed: {0}")]
    Decode(#[from] bitcode::Error),
    #[error("bad snapshot magic {found:#010x}")]
    BadMagic { found: u32 },
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: u32,
    version: u16,
    tick: u64,
}

impl SnapshotHeader {
    fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::BadMagic { found: self.magic });
        }
        if self.version != FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion {
                found: self.version,
                expected: FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
struct EngineSnapshot<H: ResourceHandler> {
    header: SnapshotHeader,
    config: PipeConfig,
    next_transit: u64,
    nodes: Vec<(Pos3, NodeState<H>)>,
}

/// Serialize the persistent state of `engine`.
pub fn save_engine<H, L>(engine: &PipeEngine<H, L>) -> Result<Vec<u8>, SerializeError>
where
    H: ResourceHandler,
    L: PipeLogic<H>,
{
    let snapshot = EngineSnapshot::<H> {
        header: SnapshotHeader {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick: engine.tick,
        },
        config: engine.config.clone(),
        next_transit: engine.next_transit,
        nodes: engine
            .nodes
            .iter()
            .map(|(pos, node)| (*pos, node.to_state()))
            .collect(),
    };
    Ok(bitcode::serialize(&snapshot)?)
}

/// Rebuild an engine from snapshot bytes, injecting a fresh logic instance.
/// Transit ids resume past the highest id in flight, whatever the stored
/// counter says.
pub fn load_engine<H, L>(bytes: &[u8], logic: L) -> Result<PipeEngine<H, L>, DeserializeError>
where
    H: ResourceHandler,
    L: PipeLogic<H>,
{
    let snapshot: EngineSnapshot<H> = bitcode::deserialize(bytes)?;
    snapshot.header.validate()?;

    let mut engine = PipeEngine::new(logic, snapshot.config);
    engine.tick = snapshot.header.tick;
    let mut next_transit = snapshot.next_transit;
    for (pos, state) in snapshot.nodes {
        let node = PipeNode::from_state(state);
        for transit in &node.transits {
            next_transit = next_transit.max(transit.id.0 + 1);
        }
        engine.nodes.insert(pos, node);
    }
    engine.next_transit = next_transit;

    // Re-form networks eagerly; one ripple per component, route caches stay
    // cold until queried.
    let positions: Vec<Pos3> = engine.nodes.keys().copied().collect();
    for pos in positions {
        if engine.nodes[&pos].network == NetworkId::default() {
            engine.clear_network_cache(pos, true);
        }
    }
    engine.events_mut().drain();
    Ok(engine)
}
