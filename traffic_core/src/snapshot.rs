//! Append-only per-step snapshot tables (spec §3, §4.9).
//!
//! Rows are plain data, cheap to clone; readers take a copy under the
//! world-wide mutex rather than holding a reference into live state.

use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, JunctionId, LightId, RoadId};
use crate::light::Phase;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CarRow {
    pub step: u64,
    pub id: ActorId,
    pub road: RoadId,
    pub lane: u32,
    pub cell: u32,
    pub velocity: f64,
    pub target: JunctionId,
    pub closest_junction: JunctionId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LightRow {
    pub step: u64,
    pub id: LightId,
    pub road: RoadId,
    pub phase: Phase,
    pub remaining: f64,
}

impl Serialize for Phase {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Phase::Green => "green",
            Phase::Red => "red",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for Phase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "green" => Ok(Phase::Green),
            "red" => Ok(Phase::Red),
            other => Err(serde::de::Error::custom(format!("unknown phase {other}"))),
        }
    }
}

/// Append-only tables accumulated one row-group per tick.
#[derive(Debug, Default)]
pub struct SnapshotTables {
    cars: Vec<CarRow>,
    lights: Vec<LightRow>,
}

impl SnapshotTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_car(&mut self, row: CarRow) {
        self.cars.push(row);
    }

    pub fn append_light(&mut self, row: LightRow) {
        self.lights.push(row);
    }

    /// All car rows for a given step, in append order.
    pub fn cars_at(&self, step: u64) -> Vec<CarRow> {
        self.cars.iter().filter(|r| r.step == step).copied().collect()
    }

    /// All light rows for a given step, in append order.
    pub fn lights_at(&self, step: u64) -> Vec<LightRow> {
        self.lights.iter().filter(|r| r.step == step).copied().collect()
    }

    pub fn all_cars(&self) -> &[CarRow] {
        &self.cars
    }

    pub fn all_lights(&self) -> &[LightRow] {
        &self.lights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_query_by_step() {
        let mut tables = SnapshotTables::new();
        tables.append_car(CarRow {
            step: 0,
            id: 1,
            road: 0,
            lane: 0,
            cell: 0,
            velocity: 0.0,
            target: 1,
            closest_junction: 1,
        });
        tables.append_car(CarRow {
            step: 1,
            id: 1,
            road: 0,
            lane: 0,
            cell: 1,
            velocity: 2.0,
            target: 1,
            closest_junction: 1,
        });
        assert_eq!(tables.cars_at(0).len(), 1);
        assert_eq!(tables.cars_at(1).len(), 1);
        assert_eq!(tables.all_cars().len(), 2);
    }

    #[test]
    fn phase_round_trips_through_json() {
        let row = LightRow {
            step: 3,
            id: 0,
            road: 0,
            phase: Phase::Green,
            remaining: 4.5,
        };
        let json = serde_json::to_string(&row).unwrap();
        let back: LightRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
