//! Error types for the step engine.
//!
//! Mirrors the error taxonomy from spec.md §7: `LoadError` is fatal and
//! surfaced from construction; `NoPath`/`NoDestination` are fatal during a
//! tick (the spawn/jam-reroute loops swallow `NoPath` internally and only
//! escalate to `NoDestination` once every candidate has been tried);
//! `BadLane`/`CellOutOfRange` are programmer errors.

use thiserror::Error;

use crate::ids::{ActorId, JunctionId, LightId, RoadId};

/// Errors surfaced while loading a scene into a [`crate::world::World`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadErrorKind {
    #[error("dangling junction reference {0}")]
    DanglingJunction(JunctionId),
    #[error("dangling road reference {0}")]
    DanglingRoad(RoadId),
    #[error("dangling light reference {0}")]
    DanglingLight(LightId),
    #[error("vehicle road {0} is not vehicular")]
    VehicleOnNonVehicularRoad(RoadId),
    #[error("pedestrian road {0} is not a sidewalk")]
    PedestrianOnNonPedestrianRoad(RoadId),
    #[error("vehicle spawner at junction {0} has no outgoing vehicular edge")]
    VehicleSpawnerHasNoOutgoingRoad(JunctionId),
    #[error("pedestrian spawner at junction {0} has no adjacent sidewalk")]
    PedestrianSpawnerHasNoAdjacentRoad(JunctionId),
    #[error("complementary light {0} targets light {1} which does not exist")]
    ComplementaryLightMissing(LightId, LightId),
    #[error("road {0} has zero lanes")]
    ZeroLanes(RoadId),
    #[error("duplicate junction id {0}")]
    DuplicateJunction(JunctionId),
    #[error("duplicate road id {0}")]
    DuplicateRoad(RoadId),
    #[error("duplicate light id {0}")]
    DuplicateLight(LightId),
    #[error("cell ({lane}, {cell}) on road {road} is out of bounds")]
    BadInitialPlacement {
        road: RoadId,
        lane: u32,
        cell: u32,
    },
    #[error("cell ({lane}, {cell}) on road {road} is already occupied")]
    OccupiedInitialPlacement {
        road: RoadId,
        lane: u32,
        cell: u32,
    },
}

/// Top-level error type for everything that can go wrong in the engine.
#[derive(Debug, Error)]
pub enum SimError {
    /// Malformed scene, dangling references, or a violated load-time invariant.
    #[error("failed to load scene: {detail}")]
    LoadError {
        kind: LoadErrorKind,
        detail: String,
    },

    /// A* found no path for an actor that has already committed to a route.
    #[error("actor {actor} has no path from junction {from} to junction {to}")]
    NoPath {
        actor: ActorId,
        from: JunctionId,
        to: JunctionId,
    },

    /// Spawn or jam-reroute exhausted every candidate terminal junction.
    #[error("no reachable destination junction available")]
    NoDestination,

    /// A lane index outside `[0, lane_count)` was used.
    #[error("lane {lane} is out of range for road {road} with {lane_count} lanes")]
    BadLane {
        road: RoadId,
        lane: u32,
        lane_count: u32,
    },

    /// A cell index outside `[0, cell_count)` was used.
    #[error("cell {cell} is out of range for road {road} with {cell_count} cells")]
    CellOutOfRange {
        road: RoadId,
        cell: u32,
        cell_count: u32,
    },
}

impl SimError {
    pub fn load(kind: LoadErrorKind) -> Self {
        let detail = kind.to_string();
        SimError::LoadError { kind, detail }
    }
}

pub type SimResult<T> = Result<T, SimError>;
