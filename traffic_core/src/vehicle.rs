//! Vehicle state and the per-tick CA step rule (spec §3, §4.6).

use std::collections::HashMap;

use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::grid::RoadGrid;
use crate::ids::{ActorId, JunctionId, LightId, RoadId, STEP_TIME};
use crate::lane_oracle::preferred_lanes;
use crate::light::{Phase, TrafficLight};
use crate::network::RoadNetwork;
use crate::rng::SimRng;

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: ActorId,
    pub road: RoadId,
    pub lane: u32,
    pub cell: u32,
    pub target: JunctionId,
    pub velocity: f64,
    /// Per-driver profile in `[0, 1)`, sampled once at creation.
    pub profile: f64,
    /// Velocity the vehicle enters a new road at, sampled once at creation.
    pub junction_velocity: f64,
    /// Seconds spent at `velocity == 0`, reset on successful jam reroute.
    pub jam_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleOutcome {
    Continue,
    Destroyed,
}

impl Vehicle {
    pub fn new(
        id: ActorId,
        road: RoadId,
        lane: u32,
        cell: u32,
        target: JunctionId,
        velocity: f64,
        rng: &mut SimRng,
    ) -> Self {
        let profile = rng.unit();
        Self {
            id,
            road,
            lane,
            cell,
            target,
            velocity,
            profile,
            junction_velocity: 5.0 + (2.0 * profile - 1.0),
            jam_seconds: 0.0,
        }
    }

    /// Restores a vehicle with a profile fixed at load time (scene loader
    /// path), rather than sampled fresh.
    pub fn from_profile(
        id: ActorId,
        road: RoadId,
        lane: u32,
        cell: u32,
        target: JunctionId,
        velocity: f64,
        profile: f64,
    ) -> Self {
        Self {
            id,
            road,
            lane,
            cell,
            target,
            velocity,
            profile,
            junction_velocity: 5.0 + (2.0 * profile - 1.0),
            jam_seconds: 0.0,
        }
    }

    pub fn velocity_kmh(&self) -> f64 {
        self.velocity * 3.6
    }

    fn max_accel(&self) -> f64 {
        1.25 + self.profile
    }

    /// Advances the vehicle by one tick. `other_vehicles` is the full table
    /// (including `self`'s own old copy, which is never consulted by id)
    /// used to read a blocking vehicle's velocity for the opportunistic
    /// pass rule.
    pub fn step(
        &mut self,
        network: &RoadNetwork,
        grids: &mut HashMap<RoadId, RoadGrid>,
        lights: &HashMap<LightId, TrafficLight>,
        other_vehicles: &HashMap<ActorId, Vehicle>,
        rng: &mut SimRng,
    ) -> SimResult<VehicleOutcome> {
        // (a) Jam reroute.
        if self.velocity == 0.0 {
            self.jam_seconds += STEP_TIME;
        }
        let jam_threshold = 60.0 * (3.0 + (2.0 * self.profile - 1.0));
        if self.jam_seconds > jam_threshold {
            self.jam_seconds = 0.0;
            self.reroute(network, rng)?;
        }

        // (b) Route.
        let from = network
            .closest_junction(self.road)
            .ok_or(SimError::NoPath {
                actor: self.id,
                from: 0,
                to: self.target,
            })?;
        let path = network.vehicular_path(from, self.target).ok_or(SimError::NoPath {
            actor: self.id,
            from,
            to: self.target,
        })?;

        let road = network.road(self.road).expect("vehicle on unknown road");
        let n_cell = road.cell_count;

        // (c) End of road.
        if self.cell + 1 == n_cell {
            if path.len() == 1 {
                grids
                    .get_mut(&self.road)
                    .expect("grid for vehicle's road must exist")
                    .free(self.lane, self.cell)?;
                return Ok(VehicleOutcome::Destroyed);
            }

            if let Some(light_id) = road.light {
                if let Some(light) = lights.get(&light_id) {
                    if light.phase == Phase::Red {
                        self.velocity = 0.0;
                        return Ok(VehicleOutcome::Continue);
                    }
                }
            }

            let next_road_id = network
                .vehicular_out(path[0])
                .iter()
                .find(|e| e.to == path[1])
                .map(|e| e.road)
                .ok_or(SimError::NoPath {
                    actor: self.id,
                    from: path[0],
                    to: path[1],
                })?;
            let next_lanes = network
                .road(next_road_id)
                .expect("path edge must reference a real road")
                .lanes;
            let lower = ((self.lane as usize * next_lanes as usize) as f64 / road.lanes as f64)
                .floor() as u32;
            let upper_exclusive = (((self.lane as usize + 1) * next_lanes as usize) as f64
                / road.lanes as f64)
                .ceil() as u32;
            let upper_exclusive = upper_exclusive.max(lower + 1).min(next_lanes);

            let next_grid = grids
                .get(&next_road_id)
                .expect("next road must have a grid");
            let mut chosen = None;
            for lane in lower..upper_exclusive {
                if next_grid.get(lane, 0)?.is_none() {
                    chosen = Some(lane);
                    break;
                }
            }

            match chosen {
                Some(lane) => {
                    grids.get_mut(&self.road).unwrap().free(self.lane, self.cell)?;
                    grids.get_mut(&next_road_id).unwrap().occupy(lane, 0, self.id)?;
                    self.road = next_road_id;
                    self.lane = lane;
                    self.cell = 0;
                    self.velocity = self.junction_velocity;
                    return Ok(VehicleOutcome::Continue);
                }
                None => {
                    self.velocity = 0.0;
                    return Ok(VehicleOutcome::Continue);
                }
            }
        }

        // (d) Pre-junction lane change.
        if path.len() >= 2 {
            let next_road_id = network
                .vehicular_out(path[0])
                .iter()
                .find(|e| e.to == path[1])
                .map(|e| e.road);
            if let Some(next_road_id) = next_road_id {
                let d_rem = road.length - (self.cell as f64 + 1.0) * road.cell_length;
                let rising_prob = if d_rem < 10.0 {
                    1.0
                } else if d_rem < 20.0 {
                    2.0 / 3.0
                } else if d_rem < 40.0 {
                    1.0 / 3.0
                } else {
                    0.0
                };
                let triggered = rng.coin(rising_prob) || rng.coin(0.4);
                if triggered {
                    if let Some(desired) =
                        preferred_lanes(network, path[0], self.road, next_road_id)
                    {
                        if !desired.is_empty() {
                            if !desired.contains(&self.lane) {
                                let l_star = if self.lane > desired[0] {
                                    desired[0]
                                } else {
                                    *desired.last().unwrap()
                                };
                                let grid = grids.get(&self.road).unwrap();
                                if grid.get(l_star, self.cell)?.is_none() && rng.coin(0.5) {
                                    let delta = (l_star as i32 - self.lane as i32).signum();
                                    if delta != 0 {
                                        let new_lane = (self.lane as i32 + delta) as u32;
                                        self.move_lane(grids, new_lane)?;
                                    }
                                } else {
                                    let clear_ahead = grid
                                        .lane_view(l_star)?
                                        .iter()
                                        .skip(self.cell as usize)
                                        .any(|o| o.is_none());
                                    if !clear_ahead {
                                        self.velocity = 0.0;
                                        return Ok(VehicleOutcome::Continue);
                                    }
                                }
                            } else {
                                for &ln in &desired {
                                    if ln == self.lane {
                                        break;
                                    }
                                    let adjacent = (ln as i32 - self.lane as i32).abs() == 1;
                                    let grid = grids.get(&self.road).unwrap();
                                    if adjacent && grid.get(ln, self.cell)?.is_none() && rng.coin(0.5) {
                                        self.move_lane(grids, ln)?;
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        // (e) Longitudinal update.
        let grid = grids.get(&self.road).unwrap();
        let occupant_ahead = grid.distance_to_next_occupant(self.lane, self.cell)?;
        let v_special = if occupant_ahead.is_none() {
            self.junction_velocity
        } else {
            0.0
        };

        let mut d_rem = road.length - (self.cell as f64 + 1.0) * road.cell_length;
        if let Some(cells_ahead) = occupant_ahead {
            d_rem = d_rem.min((cells_ahead as f64 - 1.0).max(0.0) * road.cell_length);
        }

        let a_max = self.max_accel();
        let braking = if self.velocity > v_special {
            let d_safe = ((self.velocity - v_special) / a_max) * ((self.velocity + v_special) / 2.0)
                + road.cell_length;
            d_rem < d_safe
        } else {
            false
        };

        let v_des = if braking {
            v_special
        } else {
            let comfort = self.velocity + a_max * (1.0 + self.profile) / (2.0 * STEP_TIME);
            let cruise = road.v_avg + road.v_std * (2.0 * self.profile - 1.0);
            comfort.min(cruise)
        };
        let accel = ((v_des - self.velocity) / STEP_TIME).clamp(-a_max, a_max);
        let mut v_new = (self.velocity + accel * STEP_TIME).max(0.0);

        let mut delta_c = (v_new * STEP_TIME / road.cell_length).floor() as i64;
        if v_new > 0.0 && delta_c == 0 {
            delta_c = 1;
        }
        let max_delta = (n_cell - 1 - self.cell) as i64;
        delta_c = delta_c.min(max_delta).max(0);

        let desired_delta_c = delta_c;
        while delta_c > 0 {
            let landing = self.cell + delta_c as u32;
            if grids.get(&self.road).unwrap().get(self.lane, landing)?.is_none() {
                break;
            }
            delta_c -= 1;
        }
        // Only quantize velocity down to the distance actually covered when
        // the desired landing cell was occupied; on a clear road `v_new`
        // keeps the continuous value from the acceleration formula above.
        if delta_c < desired_delta_c {
            v_new = (delta_c as f64 * road.cell_length / STEP_TIME).max(0.0);
        }

        // (f) Opportunistic pass.
        let landing_cell = self.cell + delta_c as u32;
        if self.lane > 0 && (n_cell - 1 - landing_cell) >= 3 {
            let grid = grids.get(&self.road).unwrap();
            if let Some(ahead_id) = grid.get(self.lane, self.cell + 1)? {
                if let Some(blocker) = other_vehicles.get(&ahead_id) {
                    if blocker.velocity != 0.0 && self.velocity / blocker.velocity >= 1.5 {
                        let left = self.lane - 1;
                        if landing_cell >= 2 {
                            let behind_one = grid.get(left, landing_cell - 1)?.is_none();
                            let behind_two = grid.get(left, landing_cell - 2)?.is_none();
                            if behind_one && behind_two && rng.coin(0.5) {
                                let cap = road.v_avg + road.v_std.abs() + 2.0;
                                self.move_lane(grids, left)?;
                                v_new = (v_new + 2.0).min(cap);
                            }
                        }
                    }
                }
            }
        }

        // (g) Commit.
        let grid = grids.get_mut(&self.road).unwrap();
        grid.free(self.lane, self.cell)?;
        let new_cell = self.cell + delta_c as u32;
        grid.occupy(self.lane, new_cell, self.id)?;
        self.cell = new_cell;
        self.velocity = v_new;

        Ok(VehicleOutcome::Continue)
    }

    fn move_lane(&mut self, grids: &mut HashMap<RoadId, RoadGrid>, new_lane: u32) -> SimResult<()> {
        let grid = grids.get_mut(&self.road).unwrap();
        grid.free(self.lane, self.cell)?;
        grid.occupy(new_lane, self.cell, self.id)?;
        self.lane = new_lane;
        Ok(())
    }

    /// Picks a new reachable terminal destination other than the current
    /// one, consulting only the shrinking candidate list (spec §9).
    fn reroute(&mut self, network: &RoadNetwork, rng: &mut SimRng) -> SimResult<()> {
        let from = network.closest_junction(self.road).unwrap_or(self.target);
        let mut candidates: Vec<JunctionId> = network
            .terminals()
            .iter()
            .copied()
            .filter(|&t| t != self.target)
            .collect();

        while !candidates.is_empty() {
            let idx = rng.index(candidates.len());
            let candidate = candidates[idx];
            if network.vehicular_path(from, candidate).is_some() {
                debug!(actor = self.id, old_target = self.target, new_target = candidate, "vehicle rerouted");
                self.target = candidate;
                return Ok(());
            }
            candidates.remove(idx);
        }
        Err(SimError::NoDestination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Junction, Road, RoadKind, RoadNetwork};

    fn straight_network(length: f64, lanes: u32) -> (RoadNetwork, RoadId) {
        let junctions = vec![
            Junction { id: 0, x: 0.0, y: 0.0, terminal: true },
            Junction { id: 1, x: length, y: 0.0, terminal: true },
        ];
        let roads = vec![Road::new(0, 0, 1, length, lanes, 10.0, 0.0, RoadKind::Vehicular, None)];
        (RoadNetwork::build(junctions, roads), 0)
    }

    #[test]
    fn car_accelerates_forward_on_clear_road() {
        let (network, road_id) = straight_network(100.0, 1);
        let mut grids = HashMap::new();
        let road = network.road(road_id).unwrap();
        let mut grid = RoadGrid::new(road_id, road.lanes, road.cell_count);
        grid.occupy(0, 0, 1).unwrap();
        grids.insert(road_id, grid);

        let lights = HashMap::new();
        let others = HashMap::new();
        let mut rng = SimRng::new(1);
        let mut car = Vehicle::new(1, road_id, 0, 0, 1, 0.0, &mut rng);
        car.profile = 0.0;
        car.junction_velocity = 5.0;

        for _ in 0..50 {
            let outcome = car.step(&network, &mut grids, &lights, &others, &mut rng).unwrap();
            if outcome == VehicleOutcome::Destroyed {
                break;
            }
        }
        assert!(car.velocity >= 0.0);
    }

    #[test]
    fn velocity_never_negative_after_many_steps() {
        let (network, road_id) = straight_network(500.0, 1);
        let mut grids = HashMap::new();
        let road = network.road(road_id).unwrap();
        let grid = RoadGrid::new(road_id, road.lanes, road.cell_count);
        grids.insert(road_id, grid);
        grids.get_mut(&road_id).unwrap().occupy(0, 0, 1).unwrap();

        let lights = HashMap::new();
        let others = HashMap::new();
        let mut rng = SimRng::new(42);
        let mut car = Vehicle::new(1, road_id, 0, 0, 1, 0.0, &mut rng);

        for _ in 0..80 {
            match car.step(&network, &mut grids, &lights, &others, &mut rng) {
                Ok(VehicleOutcome::Destroyed) => break,
                Ok(VehicleOutcome::Continue) => assert!(car.velocity >= 0.0),
                Err(_) => break,
            }
        }
    }

    #[test]
    fn red_light_stops_car_at_road_end() {
        let junctions = vec![
            Junction { id: 0, x: 0.0, y: 0.0, terminal: true },
            Junction { id: 1, x: 10.0, y: 0.0, terminal: false },
            Junction { id: 2, x: 20.0, y: 0.0, terminal: true },
        ];
        let roads = vec![
            Road::new(0, 0, 1, 10.0, 1, 10.0, 0.0, RoadKind::Vehicular, Some(0)),
            Road::new(1, 1, 2, 10.0, 1, 10.0, 0.0, RoadKind::Vehicular, None),
        ];
        let network = RoadNetwork::build(junctions, roads);

        let mut grids = HashMap::new();
        let r0 = network.road(0).unwrap();
        let mut g0 = RoadGrid::new(0, r0.lanes, r0.cell_count);
        let last_cell = r0.cell_count - 1;
        g0.occupy(0, last_cell, 1).unwrap();
        grids.insert(0, g0);
        let r1 = network.road(1).unwrap();
        grids.insert(1, RoadGrid::new(1, r1.lanes, r1.cell_count));

        let mut lights = HashMap::new();
        lights.insert(0, TrafficLight::new(0, 0, 10.0, 30.0, Phase::Red));

        let others = HashMap::new();
        let mut rng = SimRng::new(3);
        let mut car = Vehicle::new(1, 0, 0, last_cell, 2, 5.0, &mut rng);

        let outcome = car.step(&network, &mut grids, &lights, &others, &mut rng).unwrap();
        assert_eq!(outcome, VehicleOutcome::Continue);
        assert_eq!(car.velocity, 0.0);
        assert_eq!(car.road, 0);
    }

    #[test]
    fn arriving_at_destination_destroys_vehicle() {
        let (network, road_id) = straight_network(10.0, 1);
        let mut grids = HashMap::new();
        let road = network.road(road_id).unwrap();
        let last_cell = road.cell_count - 1;
        let mut grid = RoadGrid::new(road_id, road.lanes, road.cell_count);
        grid.occupy(0, last_cell, 1).unwrap();
        grids.insert(road_id, grid);

        let lights = HashMap::new();
        let others = HashMap::new();
        let mut rng = SimRng::new(5);
        let mut car = Vehicle::new(1, road_id, 0, last_cell, 1, 3.0, &mut rng);

        let outcome = car.step(&network, &mut grids, &lights, &others, &mut rng).unwrap();
        assert_eq!(outcome, VehicleOutcome::Destroyed);
        assert_eq!(grids.get(&road_id).unwrap().get(0, last_cell).unwrap(), None);
    }
}
