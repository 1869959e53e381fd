//! Pedestrian state and the per-tick bidirectional walk rule (spec §4.7).

use std::collections::HashMap;

use crate::error::{SimError, SimResult};
use crate::grid::RoadGrid;
use crate::ids::{ActorId, JunctionId, LightId, RoadId};
use crate::light::{Phase, TrafficLight};
use crate::network::RoadNetwork;
use crate::rng::SimRng;

const WALK_SPEED: f64 = 1.1;

#[derive(Debug, Clone)]
pub struct Pedestrian {
    pub id: ActorId,
    pub road: RoadId,
    pub lane: u32,
    pub cell: u32,
    pub target: JunctionId,
    pub velocity: f64,
    /// Minimum green time remaining required to start a crossing.
    pub t_walk_lights: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedestrianOutcome {
    Continue,
    Destroyed,
}

impl Pedestrian {
    pub fn new(
        id: ActorId,
        road: RoadId,
        lane: u32,
        cell: u32,
        target: JunctionId,
        velocity: f64,
        t_walk_lights: f64,
    ) -> Self {
        Self {
            id,
            road,
            lane,
            cell,
            target,
            velocity,
            t_walk_lights,
        }
    }

    pub fn step(
        &mut self,
        network: &RoadNetwork,
        grids: &mut HashMap<RoadId, RoadGrid>,
        lights: &HashMap<LightId, TrafficLight>,
        rng: &mut SimRng,
    ) -> SimResult<PedestrianOutcome> {
        let road = network.road(self.road).expect("pedestrian on unknown road");
        let n_cell = road.cell_count;

        let closest = network.closest_junction(self.road).ok_or(SimError::NoPath {
            actor: self.id,
            from: 0,
            to: self.target,
        })?;
        let path = network
            .pedestrian_path(closest, self.target)
            .ok_or(SimError::NoPath {
                actor: self.id,
                from: closest,
                to: self.target,
            })?;

        // `reversed_order`: true when the pedestrian's forward progress
        // actually walks back along R's stored (source -> target) direction.
        let reversed_order = if path.len() == 1 {
            closest == road.source
        } else {
            path[1] == road.source
        };

        let at_forward_end = if reversed_order {
            self.cell == 0
        } else {
            self.cell + 1 == n_cell
        };

        if at_forward_end {
            if path.len() == 1 {
                grids
                    .get_mut(&self.road)
                    .expect("grid for pedestrian's road must exist")
                    .free(self.lane, self.cell)?;
                return Ok(PedestrianOutcome::Destroyed);
            }

            if let Some(light_id) = road.light {
                if let Some(light) = lights.get(&light_id) {
                    match light.phase {
                        Phase::Red => {
                            self.velocity = 0.0;
                            return Ok(PedestrianOutcome::Continue);
                        }
                        Phase::Green if light.remaining() < self.t_walk_lights => {
                            self.velocity = 0.0;
                            return Ok(PedestrianOutcome::Continue);
                        }
                        Phase::Green => {}
                    }
                }
            }

            let next_junction = path[1];
            let next_road_id = network
                .pedestrian_out(closest)
                .iter()
                .find(|e| e.to == next_junction)
                .map(|e| e.road)
                .ok_or(SimError::NoPath {
                    actor: self.id,
                    from: closest,
                    to: next_junction,
                })?;
            let next_road = network
                .road(next_road_id)
                .expect("path edge must reference a real road");
            let next_reversed = next_road.target == closest;
            let entry_cell = if next_reversed { next_road.cell_count - 1 } else { 0 };

            let mirrored_lane = if reversed_order != next_reversed {
                next_road.lanes.saturating_sub(1).saturating_sub(self.lane)
            } else {
                self.lane
            };

            let next_grid = grids.get(&next_road_id).expect("next road must have a grid");
            let lane = if mirrored_lane < next_road.lanes
                && next_grid.get(mirrored_lane, entry_cell)?.is_none()
            {
                Some(mirrored_lane)
            } else {
                let free_lanes: Vec<u32> = (0..next_road.lanes)
                    .filter(|&l| next_grid.get(l, entry_cell).ok().flatten().is_none())
                    .collect();
                if free_lanes.is_empty() {
                    None
                } else {
                    Some(*rng.choose(&free_lanes))
                }
            };

            return match lane {
                Some(lane) => {
                    grids.get_mut(&self.road).unwrap().free(self.lane, self.cell)?;
                    grids
                        .get_mut(&next_road_id)
                        .unwrap()
                        .occupy(lane, entry_cell, self.id)?;
                    self.road = next_road_id;
                    self.lane = lane;
                    self.cell = entry_cell;
                    self.velocity = WALK_SPEED;
                    Ok(PedestrianOutcome::Continue)
                }
                None => {
                    self.velocity = 0.0;
                    Ok(PedestrianOutcome::Continue)
                }
            };
        }

        // Dawdling: stall with probability 0.2 when not at the forward end.
        if rng.coin(0.2) {
            self.velocity = 0.0;
            return Ok(PedestrianOutcome::Continue);
        }

        // Lane discipline: drift toward the "right half" of the road
        // relative to the direction of travel.
        let half = road.lanes / 2;
        let in_right_half = if reversed_order {
            self.lane < half
        } else {
            self.lane >= half
        };
        if !in_right_half && rng.coin(0.5) {
            let toward = if reversed_order {
                self.lane.saturating_sub(1)
            } else {
                (self.lane + 1).min(road.lanes - 1)
            };
            self.try_lane_move(grids, toward)?;
        } else if in_right_half && rng.coin(0.25) {
            let away = if reversed_order {
                (self.lane + 1).min(road.lanes - 1)
            } else {
                self.lane.saturating_sub(1)
            };
            self.try_lane_move(grids, away)?;
        }

        let next_cell = if reversed_order {
            self.cell.checked_sub(1)
        } else {
            Some(self.cell + 1)
        };

        match next_cell {
            Some(next_cell) if next_cell < n_cell => {
                let grid = grids.get(&self.road).unwrap();
                if grid.get(self.lane, next_cell)?.is_none() {
                    let grid = grids.get_mut(&self.road).unwrap();
                    grid.free(self.lane, self.cell)?;
                    grid.occupy(self.lane, next_cell, self.id)?;
                    self.cell = next_cell;
                    self.velocity = WALK_SPEED;
                } else {
                    self.velocity = 0.0;
                }
            }
            _ => {
                self.velocity = 0.0;
            }
        }

        Ok(PedestrianOutcome::Continue)
    }

    fn try_lane_move(&mut self, grids: &mut HashMap<RoadId, RoadGrid>, new_lane: u32) -> SimResult<()> {
        if new_lane == self.lane {
            return Ok(());
        }
        let grid = grids.get(&self.road).unwrap();
        if grid.get(new_lane, self.cell)?.is_some() {
            return Ok(());
        }
        let grid = grids.get_mut(&self.road).unwrap();
        grid.free(self.lane, self.cell)?;
        grid.occupy(new_lane, self.cell, self.id)?;
        self.lane = new_lane;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Junction, Road, RoadKind, RoadNetwork};

    fn sidewalk(length: f64, lanes: u32) -> (RoadNetwork, RoadId) {
        let junctions = vec![
            Junction { id: 0, x: 0.0, y: 0.0, terminal: true },
            Junction { id: 1, x: length, y: 0.0, terminal: true },
        ];
        let roads = vec![Road::new(0, 0, 1, length, lanes, 0.0, 0.0, RoadKind::Pedestrian, None)];
        (RoadNetwork::build(junctions, roads), 0)
    }

    #[test]
    fn pedestrian_reaches_destination_and_is_destroyed() {
        let (network, road_id) = sidewalk(6.0, 1);
        let mut grids = HashMap::new();
        let road = network.road(road_id).unwrap();
        let last_cell = road.cell_count - 1;
        let mut grid = RoadGrid::new(road_id, road.lanes, road.cell_count);
        grid.occupy(0, last_cell, 1).unwrap();
        grids.insert(road_id, grid);

        let lights = HashMap::new();
        let mut rng = SimRng::new(9);
        let mut ped = Pedestrian::new(1, road_id, 0, last_cell, 1, 1.1, 5.0);

        let outcome = ped.step(&network, &mut grids, &lights, &mut rng).unwrap();
        assert_eq!(outcome, PedestrianOutcome::Destroyed);
    }

    #[test]
    fn refuses_crossing_when_green_remaining_too_short() {
        let junctions = vec![
            Junction { id: 0, x: 0.0, y: 0.0, terminal: true },
            Junction { id: 1, x: 6.0, y: 0.0, terminal: false },
            Junction { id: 2, x: 12.0, y: 0.0, terminal: true },
        ];
        let roads = vec![
            Road::new(0, 0, 1, 6.0, 1, 0.0, 0.0, RoadKind::Pedestrian, Some(0)),
            Road::new(1, 1, 2, 6.0, 1, 0.0, 0.0, RoadKind::Pedestrian, None),
        ];
        let network = RoadNetwork::build(junctions, roads);

        let mut grids = HashMap::new();
        let r0 = network.road(0).unwrap();
        let last_cell = r0.cell_count - 1;
        let mut g0 = RoadGrid::new(0, r0.lanes, r0.cell_count);
        g0.occupy(0, last_cell, 1).unwrap();
        grids.insert(0, g0);
        let r1 = network.road(1).unwrap();
        grids.insert(1, RoadGrid::new(1, r1.lanes, r1.cell_count));

        let mut light = TrafficLight::new(0, 0, 10.0, 30.0, Phase::Green);
        // force remaining below t_walk_lights
        light.tick(9.0);
        let mut lights = HashMap::new();
        lights.insert(0, light);

        let mut rng = SimRng::new(4);
        let mut ped = Pedestrian::new(1, 0, 0, last_cell, 2, 1.1, 5.0);
        let outcome = ped.step(&network, &mut grids, &lights, &mut rng).unwrap();
        assert_eq!(outcome, PedestrianOutcome::Continue);
        assert_eq!(ped.velocity, 0.0);
        assert_eq!(ped.road, 0);
    }
}
