//! Road grid: the lane×cell occupancy matrix for a single road (spec §4.1).

use crate::error::{SimError, SimResult};
use crate::ids::{ActorId, RoadId, EMPTY_CELL};

/// Occupancy matrix for one road. `cells[lane][cell]` holds an actor id or
/// [`EMPTY_CELL`]. Bounds are checked on every access; callers are
/// responsible for only ever advancing an actor monotonically along a lane.
#[derive(Debug, Clone)]
pub struct RoadGrid {
    road: RoadId,
    lanes: u32,
    cell_count: u32,
    cells: Vec<i64>,
}

impl RoadGrid {
    pub fn new(road: RoadId, lanes: u32, cell_count: u32) -> Self {
        Self {
            road,
            lanes,
            cell_count,
            cells: vec![EMPTY_CELL; (lanes as usize) * (cell_count as usize)],
        }
    }

    pub fn lanes(&self) -> u32 {
        self.lanes
    }

    pub fn cell_count(&self) -> u32 {
        self.cell_count
    }

    fn index(&self, lane: u32, cell: u32) -> SimResult<usize> {
        if lane >= self.lanes {
            return Err(SimError::BadLane {
                road: self.road,
                lane,
                lane_count: self.lanes,
            });
        }
        if cell >= self.cell_count {
            return Err(SimError::CellOutOfRange {
                road: self.road,
                cell,
                cell_count: self.cell_count,
            });
        }
        Ok((lane as usize) * (self.cell_count as usize) + cell as usize)
    }

    /// Returns the occupant of `(lane, cell)`, or `None` if empty.
    pub fn get(&self, lane: u32, cell: u32) -> SimResult<Option<ActorId>> {
        let idx = self.index(lane, cell)?;
        Ok(occupant(self.cells[idx]))
    }

    /// Marks `(lane, cell)` as empty.
    pub fn free(&mut self, lane: u32, cell: u32) -> SimResult<()> {
        let idx = self.index(lane, cell)?;
        self.cells[idx] = EMPTY_CELL;
        Ok(())
    }

    /// Occupies `(lane, cell)` with `id`. Does not check for a prior
    /// occupant; callers guarantee they only ever move into cells they
    /// have already verified are empty.
    pub fn occupy(&mut self, lane: u32, cell: u32, id: ActorId) -> SimResult<()> {
        let idx = self.index(lane, cell)?;
        self.cells[idx] = id as i64;
        Ok(())
    }

    /// Iterates the column view for one lane as `(cell_index, occupant)`.
    pub fn lane_view(&self, lane: u32) -> SimResult<Vec<Option<ActorId>>> {
        if lane >= self.lanes {
            return Err(SimError::BadLane {
                road: self.road,
                lane,
                lane_count: self.lanes,
            });
        }
        let start = (lane as usize) * (self.cell_count as usize);
        let end = start + self.cell_count as usize;
        Ok(self.cells[start..end].iter().copied().map(occupant).collect())
    }

    /// Distance (in cells) from `cell` to the nearest occupied cell ahead in
    /// `lane`, strictly after `cell`. `None` if the lane is clear ahead.
    pub fn distance_to_next_occupant(&self, lane: u32, cell: u32) -> SimResult<Option<u32>> {
        let view = self.lane_view(lane)?;
        for (i, occ) in view.iter().enumerate().skip(cell as usize + 1) {
            if occ.is_some() {
                return Ok(Some((i - cell as usize) as u32));
            }
        }
        Ok(None)
    }
}

fn occupant(raw: i64) -> Option<ActorId> {
    if raw == EMPTY_CELL {
        None
    } else {
        Some(raw as ActorId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupy_then_get() {
        let mut g = RoadGrid::new(1, 2, 5);
        g.occupy(0, 2, 42).unwrap();
        assert_eq!(g.get(0, 2).unwrap(), Some(42));
        g.free(0, 2).unwrap();
        assert_eq!(g.get(0, 2).unwrap(), None);
    }

    #[test]
    fn bad_lane_errors() {
        let g = RoadGrid::new(1, 2, 5);
        assert!(matches!(g.get(5, 0), Err(SimError::BadLane { .. })));
    }

    #[test]
    fn bad_cell_errors() {
        let g = RoadGrid::new(1, 2, 5);
        assert!(matches!(g.get(0, 99), Err(SimError::CellOutOfRange { .. })));
    }

    #[test]
    fn distance_to_next_occupant_finds_nearest() {
        let mut g = RoadGrid::new(1, 1, 10);
        g.occupy(0, 7, 1).unwrap();
        assert_eq!(g.distance_to_next_occupant(0, 3).unwrap(), Some(4));
        assert_eq!(g.distance_to_next_occupant(0, 8).unwrap(), None);
    }
}
