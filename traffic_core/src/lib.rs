//! The step engine for a microscopic, discrete-time road-traffic simulator:
//! road grids, traffic lights, spawners, the road network and its A*
//! subgraph views, the lane-preference oracle, and the vehicle/pedestrian
//! cellular-automaton step rules, tied together by [`world::World`] and
//! [`engine::Engine`].

pub mod engine;
pub mod error;
pub mod grid;
pub mod ids;
pub mod lane_oracle;
pub mod light;
pub mod network;
pub mod pedestrian;
pub mod rng;
pub mod snapshot;
pub mod spawner;
pub mod vehicle;
pub mod world;

pub use engine::Engine;
pub use error::{LoadErrorKind, SimError, SimResult};
pub use ids::{ActorId, JunctionId, LightId, RoadId};
pub use light::{Phase, TrafficLight};
pub use network::{Junction, Road, RoadKind, RoadNetwork};
pub use pedestrian::{Pedestrian, PedestrianOutcome};
pub use snapshot::{CarRow, LightRow, SnapshotTables};
pub use spawner::{Spawner, SpawnerKind};
pub use vehicle::{Vehicle, VehicleOutcome};
pub use world::{
    JunctionSpec, LightSpec, PedestrianSpec, RoadSpec, SpawnerSpec, VehicleSpec, World, WorldSpec,
};
