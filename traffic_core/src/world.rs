//! The world: load-time assembly of a scene into a live, tickable state, and
//! the tick loop itself (spec §4.8, §6).

use std::collections::HashMap;

use tracing::debug;

use crate::error::{LoadErrorKind, SimError, SimResult};
use crate::grid::RoadGrid;
use crate::ids::{ActorId, JunctionId, LightId, RoadId, STEP_TIME};
use crate::light::{Phase, TrafficLight};
use crate::network::{Junction, Road, RoadKind, RoadNetwork};
use crate::pedestrian::{Pedestrian, PedestrianOutcome};
use crate::rng::SimRng;
use crate::snapshot::{CarRow, LightRow, SnapshotTables};
use crate::spawner::{Spawner, SpawnerKind};
use crate::vehicle::{Vehicle, VehicleOutcome};

/// Plain builder describing a junction before the network is assembled.
#[derive(Debug, Clone)]
pub struct JunctionSpec {
    pub id: JunctionId,
    pub x: f64,
    pub y: f64,
    pub terminal: bool,
}

/// Plain builder describing a road. `length` is derived from the two
/// junctions' positions by the loader, not taken from the scene file.
#[derive(Debug, Clone)]
pub struct RoadSpec {
    pub id: RoadId,
    pub source: JunctionId,
    pub target: JunctionId,
    pub lanes: u32,
    pub v_avg: f64,
    pub v_std: f64,
    pub kind: RoadKind,
    pub light: Option<LightId>,
}

#[derive(Debug, Clone)]
pub enum LightSpec {
    Timed {
        id: LightId,
        road: RoadId,
        duration_green: f64,
        duration_red: f64,
        initial_phase: Phase,
    },
    Complementary {
        id: LightId,
        road: RoadId,
        complementary_to: LightId,
        negates: bool,
    },
}

#[derive(Debug, Clone)]
pub struct VehicleSpec {
    pub id: ActorId,
    pub road: RoadId,
    pub lane: u32,
    pub cell: u32,
    pub target: JunctionId,
    pub velocity: f64,
}

#[derive(Debug, Clone)]
pub struct PedestrianSpec {
    pub id: ActorId,
    pub road: RoadId,
    pub lane: u32,
    pub cell: u32,
    pub target: JunctionId,
    pub velocity: f64,
    pub t_walk_lights: f64,
}

#[derive(Debug, Clone)]
pub struct SpawnerSpec {
    pub junction: JunctionId,
    pub spawns_pedestrians: bool,
    pub spawn_freq: f64,
    pub spawn_freq_std: f64,
    pub random_delay_on_start: bool,
}

/// Everything needed to assemble a [`World`]; the scene loader's job is to
/// parse JSON into one of these.
#[derive(Debug, Clone, Default)]
pub struct WorldSpec {
    pub junctions: Vec<JunctionSpec>,
    pub roads: Vec<RoadSpec>,
    pub cars: Vec<VehicleSpec>,
    pub pedestrians: Vec<PedestrianSpec>,
    pub lights: Vec<LightSpec>,
    pub spawners: Vec<SpawnerSpec>,
}

fn load_err(kind: LoadErrorKind) -> SimError {
    SimError::load(kind)
}

pub struct World {
    network: RoadNetwork,
    grids: HashMap<RoadId, RoadGrid>,
    lights: HashMap<LightId, TrafficLight>,
    vehicles: HashMap<ActorId, Vehicle>,
    pedestrians: HashMap<ActorId, Pedestrian>,
    spawners: Vec<Spawner>,
    rng: SimRng,
    snapshots: SnapshotTables,
    step: u64,
    next_actor_id: ActorId,
}

impl World {
    /// Assembles a `World` from a parsed scene, performing every load-time
    /// validation named in spec §6 and returning `LoadError` on the first
    /// violation found.
    pub fn from_spec(spec: WorldSpec, seed: u64) -> SimResult<World> {
        let mut rng = SimRng::new(seed);

        let mut junction_ids = std::collections::HashSet::new();
        for j in &spec.junctions {
            if !junction_ids.insert(j.id) {
                return Err(load_err(LoadErrorKind::DuplicateJunction(j.id)));
            }
        }

        let junction_lookup: HashMap<JunctionId, (f64, f64)> =
            spec.junctions.iter().map(|j| (j.id, (j.x, j.y))).collect();

        let mut road_ids = std::collections::HashSet::new();
        let mut roads = Vec::with_capacity(spec.roads.len());
        for r in &spec.roads {
            if !road_ids.insert(r.id) {
                return Err(load_err(LoadErrorKind::DuplicateRoad(r.id)));
            }
            if r.lanes == 0 {
                return Err(load_err(LoadErrorKind::ZeroLanes(r.id)));
            }
            let (sx, sy) = junction_lookup
                .get(&r.source)
                .copied()
                .ok_or_else(|| load_err(LoadErrorKind::DanglingJunction(r.source)))?;
            let (tx, ty) = junction_lookup
                .get(&r.target)
                .copied()
                .ok_or_else(|| load_err(LoadErrorKind::DanglingJunction(r.target)))?;
            let length = ((tx - sx).powi(2) + (ty - sy).powi(2)).sqrt().max(1e-6);
            roads.push(Road::new(
                r.id, r.source, r.target, length, r.lanes, r.v_avg, r.v_std, r.kind, r.light,
            ));
        }

        let junctions: Vec<Junction> = spec
            .junctions
            .iter()
            .map(|j| Junction {
                id: j.id,
                x: j.x,
                y: j.y,
                terminal: j.terminal,
            })
            .collect();

        let mut grids = HashMap::new();
        for r in &roads {
            grids.insert(r.id, RoadGrid::new(r.id, r.lanes, r.cell_count));
        }

        // Lights: resolve timed lights first, then complementary ones (which
        // may reference a timed or another complementary light already built).
        let mut lights: HashMap<LightId, TrafficLight> = HashMap::new();
        let mut pending: Vec<&LightSpec> = Vec::new();
        for l in &spec.lights {
            match l {
                LightSpec::Timed {
                    id,
                    road,
                    duration_green,
                    duration_red,
                    initial_phase,
                } => {
                    if !road_ids.contains(road) {
                        return Err(load_err(LoadErrorKind::DanglingRoad(*road)));
                    }
                    if lights.contains_key(id) {
                        return Err(load_err(LoadErrorKind::DuplicateLight(*id)));
                    }
                    lights.insert(
                        *id,
                        TrafficLight::new(*id, *road, *duration_green, *duration_red, *initial_phase),
                    );
                }
                LightSpec::Complementary { .. } => pending.push(l),
            }
        }
        // Resolve complementary lights in a fixed-point pass so chains of
        // complementary-on-complementary references (inserted in any scene
        // order) still settle, as long as no cycle exists.
        let mut remaining = pending;
        while !remaining.is_empty() {
            let before = remaining.len();
            let mut still_pending = Vec::new();
            for l in remaining {
                if let LightSpec::Complementary {
                    id,
                    road,
                    complementary_to,
                    negates,
                } = l
                {
                    if !road_ids.contains(road) {
                        return Err(load_err(LoadErrorKind::DanglingRoad(*road)));
                    }
                    if lights.contains_key(id) {
                        return Err(load_err(LoadErrorKind::DuplicateLight(*id)));
                    }
                    if let Some(other) = lights.get(complementary_to) {
                        let other = other.clone();
                        lights.insert(*id, TrafficLight::complementary(*id, *road, &other, *negates));
                    } else {
                        still_pending.push(l);
                    }
                }
            }
            if still_pending.len() == before {
                let (id, missing) = match still_pending[0] {
                    LightSpec::Complementary {
                        id, complementary_to, ..
                    } => (*id, *complementary_to),
                    _ => unreachable!(),
                };
                return Err(load_err(LoadErrorKind::ComplementaryLightMissing(id, missing)));
            }
            remaining = still_pending;
        }

        for r in &roads {
            if let Some(light) = r.light {
                if !lights.contains_key(&light) {
                    return Err(load_err(LoadErrorKind::DanglingLight(light)));
                }
            }
        }

        let network = RoadNetwork::build(junctions, roads);

        for car in &spec.cars {
            let road = network
                .road(car.road)
                .ok_or_else(|| load_err(LoadErrorKind::DanglingRoad(car.road)))?;
            if road.kind != RoadKind::Vehicular {
                return Err(load_err(LoadErrorKind::VehicleOnNonVehicularRoad(car.road)));
            }
            if car.lane >= road.lanes {
                return Err(load_err(LoadErrorKind::BadInitialPlacement {
                    road: car.road,
                    lane: car.lane,
                    cell: car.cell,
                }));
            }
            if car.cell >= road.cell_count {
                return Err(load_err(LoadErrorKind::BadInitialPlacement {
                    road: car.road,
                    lane: car.lane,
                    cell: car.cell,
                }));
            }
        }

        for ped in &spec.pedestrians {
            let road = network
                .road(ped.road)
                .ok_or_else(|| load_err(LoadErrorKind::DanglingRoad(ped.road)))?;
            if road.kind != RoadKind::Pedestrian {
                return Err(load_err(LoadErrorKind::PedestrianOnNonPedestrianRoad(ped.road)));
            }
            if ped.lane >= road.lanes || ped.cell >= road.cell_count {
                return Err(load_err(LoadErrorKind::BadInitialPlacement {
                    road: ped.road,
                    lane: ped.lane,
                    cell: ped.cell,
                }));
            }
        }

        for s in &spec.spawners {
            if s.spawns_pedestrians {
                if network.pedestrian_out(s.junction).is_empty() {
                    return Err(load_err(LoadErrorKind::PedestrianSpawnerHasNoAdjacentRoad(s.junction)));
                }
            } else if network.vehicular_out(s.junction).is_empty() {
                return Err(load_err(LoadErrorKind::VehicleSpawnerHasNoOutgoingRoad(s.junction)));
            }
        }

        let mut vehicles = HashMap::new();
        let mut max_id = 0u64;
        for car in &spec.cars {
            grids.get_mut(&car.road).unwrap().occupy(car.lane, car.cell, car.id).map_err(|_| {
                load_err(LoadErrorKind::OccupiedInitialPlacement {
                    road: car.road,
                    lane: car.lane,
                    cell: car.cell,
                })
            })?;
            max_id = max_id.max(car.id);
            vehicles.insert(
                car.id,
                Vehicle::from_profile(car.id, car.road, car.lane, car.cell, car.target, car.velocity, rng.unit()),
            );
        }

        let mut pedestrians = HashMap::new();
        for ped in &spec.pedestrians {
            grids.get_mut(&ped.road).unwrap().occupy(ped.lane, ped.cell, ped.id).map_err(|_| {
                load_err(LoadErrorKind::OccupiedInitialPlacement {
                    road: ped.road,
                    lane: ped.lane,
                    cell: ped.cell,
                })
            })?;
            max_id = max_id.max(ped.id);
            pedestrians.insert(
                ped.id,
                Pedestrian::new(ped.id, ped.road, ped.lane, ped.cell, ped.target, ped.velocity, ped.t_walk_lights),
            );
        }

        let spawners = spec
            .spawners
            .iter()
            .map(|s| {
                Spawner::new(
                    s.junction,
                    if s.spawns_pedestrians {
                        SpawnerKind::Pedestrian
                    } else {
                        SpawnerKind::Vehicle
                    },
                    s.spawn_freq,
                    s.spawn_freq_std,
                    s.random_delay_on_start,
                    &mut rng,
                )
            })
            .collect();

        Ok(World {
            network,
            grids,
            lights,
            vehicles,
            pedestrians,
            spawners,
            rng,
            snapshots: SnapshotTables::new(),
            step: 0,
            next_actor_id: max_id + 1,
        })
    }

    pub fn current_step(&self) -> u64 {
        self.step
    }

    pub fn time_elapsed(&self) -> f64 {
        self.step as f64 * STEP_TIME
    }

    pub fn snapshots(&self) -> &SnapshotTables {
        &self.snapshots
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn pedestrian_count(&self) -> usize {
        self.pedestrians.len()
    }

    /// Current overflow-queue depth of each spawner, in scene declaration
    /// order. Exposed for analytics and tests; the engine itself never reads
    /// this back.
    pub fn spawner_queue_lens(&self) -> Vec<u32> {
        self.spawners.iter().map(|s| s.queue_len()).collect()
    }

    /// Runs exactly one tick, in the fixed order of spec §4.8: lights,
    /// vehicles (stable order), prune, pedestrians, prune, spawners,
    /// snapshot append.
    pub fn tick(&mut self) -> SimResult<()> {
        self.step += 1;

        for light in self.lights.values_mut() {
            let phase_before = light.phase;
            light.tick(STEP_TIME);
            if light.phase != phase_before {
                debug!(light = light.id, road = light.road, phase = ?light.phase, "light flipped");
            }
        }

        let vehicle_ids = Self::stable_order(self.vehicles.keys().copied());
        for id in vehicle_ids {
            let Some(mut vehicle) = self.vehicles.remove(&id) else {
                continue;
            };
            let outcome = vehicle.step(&self.network, &mut self.grids, &self.lights, &self.vehicles, &mut self.rng);
            match outcome {
                Ok(VehicleOutcome::Continue) => {
                    self.vehicles.insert(id, vehicle);
                }
                Ok(VehicleOutcome::Destroyed) => {}
                Err(err) => {
                    self.vehicles.insert(id, vehicle);
                    return Err(err);
                }
            }
        }

        let pedestrian_ids = Self::stable_order(self.pedestrians.keys().copied());
        for id in pedestrian_ids {
            let Some(mut pedestrian) = self.pedestrians.remove(&id) else {
                continue;
            };
            let outcome = pedestrian.step(&self.network, &mut self.grids, &self.lights, &mut self.rng);
            match outcome {
                Ok(PedestrianOutcome::Continue) => {
                    self.pedestrians.insert(id, pedestrian);
                }
                Ok(PedestrianOutcome::Destroyed) => {}
                Err(err) => {
                    self.pedestrians.insert(id, pedestrian);
                    return Err(err);
                }
            }
        }

        self.fire_spawners()?;
        self.append_snapshot();

        debug!(
            step = self.step,
            vehicles = self.vehicles.len(),
            pedestrians = self.pedestrians.len(),
            "tick complete"
        );

        Ok(())
    }

    fn stable_order(ids: impl Iterator<Item = ActorId>) -> Vec<ActorId> {
        let mut v: Vec<ActorId> = ids.collect();
        v.sort_unstable();
        v
    }

    fn fire_spawners(&mut self) -> SimResult<()> {
        for idx in 0..self.spawners.len() {
            let fired = self.spawners[idx].tick(STEP_TIME, &mut self.rng);
            if fired {
                self.spawners[idx].enqueue();
                debug!(
                    junction = self.spawners[idx].junction,
                    queue = self.spawners[idx].queue_len(),
                    "spawner fired"
                );
            }
            // At most one actor placed per spawner per tick, even if the
            // queue holds more and several entry cells are free.
            if self.spawners[idx].queue_len() > 0 && self.try_place_from_spawner(idx)? {
                self.spawners[idx].dequeue_one();
            }
        }
        Ok(())
    }

    /// Attempts to place one actor from `spawners[idx]`. Returns `Ok(true)`
    /// if placed, `Ok(false)` if no entry cell was free this tick.
    fn try_place_from_spawner(&mut self, idx: usize) -> SimResult<bool> {
        let junction = self.spawners[idx].junction;
        match self.spawners[idx].kind {
            SpawnerKind::Vehicle => self.try_place_vehicle(junction),
            SpawnerKind::Pedestrian => self.try_place_pedestrian(junction),
        }
    }

    fn try_place_vehicle(&mut self, junction: JunctionId) -> SimResult<bool> {
        let out_edges = self.network.vehicular_out(junction).to_vec();
        if out_edges.is_empty() {
            return Ok(false);
        }
        let edge = *self.rng.choose(&out_edges);
        let road = self.network.road(edge.road).expect("edge must reference a real road");
        let lanes = road.lanes;

        let grid = self.grids.get(&edge.road).unwrap();
        let mut free_lane = None;
        for lane in 0..lanes {
            if grid.get(lane, 0)?.is_none() {
                free_lane = Some(lane);
                break;
            }
        }
        let Some(lane) = free_lane else {
            return Ok(false);
        };

        let target = self.pick_destination(junction, false)?;
        let id = self.next_actor_id;
        self.next_actor_id += 1;
        self.grids.get_mut(&edge.road).unwrap().occupy(lane, 0, id)?;
        let vehicle = Vehicle::new(id, edge.road, lane, 0, target, 0.0, &mut self.rng);
        self.vehicles.insert(id, vehicle);
        Ok(true)
    }

    fn try_place_pedestrian(&mut self, junction: JunctionId) -> SimResult<bool> {
        let out_edges = self.network.pedestrian_out(junction).to_vec();
        if out_edges.is_empty() {
            return Ok(false);
        }
        let edge = *self.rng.choose(&out_edges);
        let road = self.network.road(edge.road).expect("edge must reference a real road");
        let entry_cell = if road.source == junction { 0 } else { road.cell_count - 1 };
        let lanes = road.lanes;

        let grid = self.grids.get(&edge.road).unwrap();
        let mut free_lane = None;
        for lane in 0..lanes {
            if grid.get(lane, entry_cell)?.is_none() {
                free_lane = Some(lane);
                break;
            }
        }
        let Some(lane) = free_lane else {
            return Ok(false);
        };

        let target = self.pick_destination(junction, true)?;
        let id = self.next_actor_id;
        self.next_actor_id += 1;
        self.grids.get_mut(&edge.road).unwrap().occupy(lane, entry_cell, id)?;
        let pedestrian = Pedestrian::new(id, edge.road, lane, entry_cell, target, 1.1, 5.0);
        self.pedestrians.insert(id, pedestrian);
        Ok(true)
    }

    /// Shrinking-candidate-list destination pick, shared by spawners and the
    /// vehicle jam-reroute rule's semantics (spec §9: never fall back to the
    /// full terminal list once a candidate is rejected). `pedestrian` selects
    /// which subgraph reachability is checked against.
    fn pick_destination(&mut self, from: JunctionId, pedestrian: bool) -> SimResult<JunctionId> {
        let mut candidates: Vec<JunctionId> = self
            .network
            .terminals()
            .iter()
            .copied()
            .filter(|&t| t != from)
            .collect();
        while !candidates.is_empty() {
            let idx = self.rng.index(candidates.len());
            let candidate = candidates[idx];
            let reachable = if pedestrian {
                self.network.pedestrian_path(from, candidate).is_some()
            } else {
                self.network.vehicular_path(from, candidate).is_some()
            };
            if reachable {
                return Ok(candidate);
            }
            candidates.remove(idx);
        }
        Err(SimError::NoDestination)
    }

    fn append_snapshot(&mut self) {
        for (id, v) in &self.vehicles {
            self.snapshots.append_car(CarRow {
                step: self.step,
                id: *id,
                road: v.road,
                lane: v.lane,
                cell: v.cell,
                velocity: v.velocity,
                target: v.target,
                closest_junction: self.network.closest_junction(v.road).unwrap_or(v.target),
            });
        }
        for light in self.lights.values() {
            self.snapshots.append_light(LightRow {
                step: self.step,
                id: light.id,
                road: light.road,
                phase: light.phase,
                remaining: light.remaining(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_junction_spec() -> WorldSpec {
        WorldSpec {
            junctions: vec![
                JunctionSpec { id: 0, x: 0.0, y: 0.0, terminal: true },
                JunctionSpec { id: 1, x: 10.0, y: 0.0, terminal: true },
            ],
            roads: vec![RoadSpec {
                id: 0,
                source: 0,
                target: 1,
                lanes: 1,
                v_avg: 10.0,
                v_std: 0.0,
                kind: RoadKind::Vehicular,
                light: None,
            }],
            ..WorldSpec::default()
        }
    }

    #[test]
    fn rejects_duplicate_light_id() {
        let mut spec = two_junction_spec();
        spec.lights = vec![
            LightSpec::Timed {
                id: 0,
                road: 0,
                duration_green: 10.0,
                duration_red: 10.0,
                initial_phase: Phase::Green,
            },
            LightSpec::Timed {
                id: 0,
                road: 0,
                duration_green: 5.0,
                duration_red: 5.0,
                initial_phase: Phase::Red,
            },
        ];
        let err = World::from_spec(spec, 1).unwrap_err();
        match err {
            SimError::LoadError { kind: LoadErrorKind::DuplicateLight(0), .. } => {}
            other => panic!("expected DuplicateLight, got {other:?}"),
        }
    }

    #[test]
    fn rejects_road_with_dangling_light_reference() {
        let mut spec = two_junction_spec();
        spec.roads[0].light = Some(99);
        let err = World::from_spec(spec, 1).unwrap_err();
        match err {
            SimError::LoadError { kind: LoadErrorKind::DanglingLight(99), .. } => {}
            other => panic!("expected DanglingLight, got {other:?}"),
        }
    }
}
