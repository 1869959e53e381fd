//! Plain integer ids for every table in the world.
//!
//! The world is a set of integer-indexed tables (roads, junctions, lights,
//! actors); nothing holds a reference to anything else, only an id. This
//! keeps the simulator free of shared ownership or cycles even though the
//! domain (junctions connected by roads connected by junctions...) is
//! naturally cyclic.

pub type JunctionId = u32;
pub type RoadId = u32;
pub type LightId = u32;
pub type ActorId = u64;

/// Reserved sentinel for an empty grid cell.
pub const EMPTY_CELL: i64 = -1;

/// Fixed simulation step duration, in seconds.
pub const STEP_TIME: f64 = 1.0;
