//! Loads a JSON scene file from disk and resolves it into a
//! [`traffic_core::World`].

use std::path::Path;

use tracing::info;

use traffic_core::{
    JunctionSpec, LightSpec, Phase, PedestrianSpec, RoadKind, RoadSpec, SpawnerSpec, VehicleSpec,
    World, WorldSpec,
};

use crate::error::SceneError;
use crate::scene::{Scene, SceneLight, SceneLightState};

/// Parses the scene file at `path` and builds a [`World`] with the given
/// RNG seed.
pub fn load_world(path: impl AsRef<Path>, seed: u64) -> Result<World, SceneError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let scene: Scene = serde_json::from_str(&raw)?;
    info!(
        junctions = scene.junctions.len(),
        roads = scene.roads.len(),
        cars = scene.cars.len(),
        pedestrians = scene.pedestrians.len(),
        "parsed scene file"
    );
    let spec = resolve(scene)?;
    World::from_spec(spec, seed).map_err(SceneError::from)
}

fn resolve(scene: Scene) -> Result<WorldSpec, SceneError> {
    let junctions = scene
        .junctions
        .into_iter()
        .map(|j| JunctionSpec {
            id: j.id,
            x: j.x,
            y: j.y,
            terminal: j.terminal,
        })
        .collect();

    let mut roads = scene
        .roads
        .into_iter()
        .map(|r| RoadSpec {
            id: r.id,
            source: r.source,
            target: r.target,
            lanes: r.lanes,
            v_avg: r.v_avg,
            v_std: r.v_std,
            kind: if r.is_sidewalk {
                RoadKind::Pedestrian
            } else {
                RoadKind::Vehicular
            },
            light: None,
        })
        .collect::<Vec<_>>();

    // Lights carry a `road` field of their own in the scene schema; wire
    // each light's road entry back onto that road's `light` slot.
    let light_ids: std::collections::HashSet<u32> = scene
        .lights
        .iter()
        .map(|l| match l {
            SceneLight::Timed { id, .. } => *id,
            SceneLight::Complementary { id, .. } => *id,
        })
        .collect();
    for l in &scene.lights {
        if let SceneLight::Complementary { complementary_to, .. } = l {
            if !light_ids.contains(complementary_to) {
                return Err(SceneError::UnknownComplementaryTarget(*complementary_to));
            }
        }
    }

    let mut lights = Vec::with_capacity(scene.lights.len());
    for l in scene.lights {
        let (id, road) = match &l {
            SceneLight::Timed { id, road, .. } => (*id, *road),
            SceneLight::Complementary { id, road, .. } => (*id, *road),
        };
        if let Some(r) = roads.iter_mut().find(|r| r.id == road) {
            r.light = Some(id);
        }
        lights.push(match l {
            SceneLight::Timed {
                id,
                road,
                duration_green,
                duration_red,
                state,
            } => LightSpec::Timed {
                id,
                road,
                duration_green,
                duration_red,
                initial_phase: match state {
                    SceneLightState::Green => Phase::Green,
                    SceneLightState::Red => Phase::Red,
                },
            },
            SceneLight::Complementary {
                id,
                road,
                complementary_to,
                negates,
            } => LightSpec::Complementary {
                id,
                road,
                complementary_to,
                negates,
            },
        });
    }

    let cars = scene
        .cars
        .into_iter()
        .map(|c| VehicleSpec {
            id: c.id,
            road: c.road,
            lane: c.lane,
            cell: c.cell,
            target: c.target_junction,
            velocity: c.velocity,
        })
        .collect();

    let pedestrians = scene
        .pedestrians
        .into_iter()
        .map(|p| PedestrianSpec {
            id: p.id,
            road: p.road,
            lane: p.lane,
            cell: p.cell,
            target: p.target_junction,
            velocity: p.velocity,
            t_walk_lights: p.t_walk_lights,
        })
        .collect();

    let spawners = scene
        .spawners
        .into_iter()
        .map(|s| SpawnerSpec {
            junction: s.junction,
            spawns_pedestrians: s.spawns_pedestrians,
            spawn_freq: s.spawn_freq,
            spawn_freq_std: s.spawn_freq_std,
            random_delay_on_start: s.random_delay_on_start,
        })
        .collect();

    Ok(WorldSpec {
        junctions,
        roads,
        cars,
        pedestrians,
        lights,
        spawners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_minimal_scene() {
        let scene = Scene {
            width: 100.0,
            height: 100.0,
            junctions: vec![
                crate::scene::SceneJunction { id: 0, x: 0.0, y: 0.0, terminal: true },
                crate::scene::SceneJunction { id: 1, x: 50.0, y: 0.0, terminal: true },
            ],
            roads: vec![crate::scene::SceneRoad {
                id: 0,
                source: 0,
                target: 1,
                lanes: 1,
                v_avg: 10.0,
                v_std: 0.0,
                is_sidewalk: false,
            }],
            cars: vec![],
            pedestrians: vec![],
            lights: vec![],
            spawners: vec![],
        };
        let spec = resolve(scene).unwrap();
        let world = World::from_spec(spec, 1).unwrap();
        assert_eq!(world.vehicle_count(), 0);
    }

    #[test]
    fn wires_light_road_back_reference() {
        let scene = Scene {
            width: 10.0,
            height: 10.0,
            junctions: vec![
                crate::scene::SceneJunction { id: 0, x: 0.0, y: 0.0, terminal: true },
                crate::scene::SceneJunction { id: 1, x: 10.0, y: 0.0, terminal: true },
            ],
            roads: vec![crate::scene::SceneRoad {
                id: 0,
                source: 0,
                target: 1,
                lanes: 1,
                v_avg: 10.0,
                v_std: 0.0,
                is_sidewalk: false,
            }],
            cars: vec![],
            pedestrians: vec![],
            lights: vec![SceneLight::Timed {
                id: 7,
                road: 0,
                duration_green: 10.0,
                duration_red: 20.0,
                state: SceneLightState::Green,
            }],
            spawners: vec![],
        };
        let spec = resolve(scene).unwrap();
        let road = spec.roads.iter().find(|r| r.id == 0).unwrap();
        assert_eq!(road.light, Some(7));
    }

    #[test]
    fn rejects_complementary_light_with_unknown_target() {
        let scene = Scene {
            width: 10.0,
            height: 10.0,
            junctions: vec![
                crate::scene::SceneJunction { id: 0, x: 0.0, y: 0.0, terminal: true },
                crate::scene::SceneJunction { id: 1, x: 10.0, y: 0.0, terminal: true },
            ],
            roads: vec![crate::scene::SceneRoad {
                id: 0,
                source: 0,
                target: 1,
                lanes: 1,
                v_avg: 10.0,
                v_std: 0.0,
                is_sidewalk: false,
            }],
            cars: vec![],
            pedestrians: vec![],
            lights: vec![SceneLight::Complementary {
                id: 1,
                road: 0,
                complementary_to: 42,
                negates: false,
            }],
            spawners: vec![],
        };
        let err = resolve(scene).unwrap_err();
        match err {
            SceneError::UnknownComplementaryTarget(42) => {}
            other => panic!("expected UnknownComplementaryTarget, got {other:?}"),
        }
    }
}
