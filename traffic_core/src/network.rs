//! Road network: junctions, roads, and the vehicular/pedestrian subgraph
//! views used for pathfinding (spec §3, §4.4).

use std::collections::{BinaryHeap, HashMap};
use std::cmp::Ordering;

use crate::ids::{JunctionId, LightId, RoadId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoadKind {
    Vehicular,
    Pedestrian,
}

#[derive(Debug, Clone)]
pub struct Junction {
    pub id: JunctionId,
    pub x: f64,
    pub y: f64,
    pub terminal: bool,
}

#[derive(Debug, Clone)]
pub struct Road {
    pub id: RoadId,
    pub source: JunctionId,
    pub target: JunctionId,
    pub length: f64,
    pub lanes: u32,
    pub v_avg: f64,
    pub v_std: f64,
    pub kind: RoadKind,
    pub light: Option<LightId>,
    pub cell_count: u32,
    pub cell_length: f64,
}

const VEHICULAR_CELL_AVG: f64 = 5.0;
const PEDESTRIAN_CELL_AVG: f64 = 2.0;

impl Road {
    pub fn new(
        id: RoadId,
        source: JunctionId,
        target: JunctionId,
        length: f64,
        lanes: u32,
        v_avg: f64,
        v_std: f64,
        kind: RoadKind,
        light: Option<LightId>,
    ) -> Self {
        let cell_avg = match kind {
            RoadKind::Vehicular => VEHICULAR_CELL_AVG,
            RoadKind::Pedestrian => PEDESTRIAN_CELL_AVG,
        };
        let cell_count = (length / cell_avg).ceil().max(1.0) as u32;
        let cell_length = length / cell_count as f64;
        Self {
            id,
            source,
            target,
            length,
            lanes,
            v_avg,
            v_std,
            kind,
            light,
            cell_count,
            cell_length,
        }
    }
}

/// Directed edge view used by the A* search: which road to take and which
/// junction it leads to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    pub(crate) road: RoadId,
    pub(crate) to: JunctionId,
}

/// The full network plus its two immutable subgraph views, built once at
/// load time (spec's design note: the source rebuilds these on every call;
/// here they are adjacency lists computed once and shared read-only).
pub struct RoadNetwork {
    junctions: HashMap<JunctionId, Junction>,
    roads: HashMap<RoadId, Road>,
    vehicular_adj: HashMap<JunctionId, Vec<Edge>>,
    /// Pedestrian adjacency is undirected: both endpoints of a sidewalk
    /// list an edge to the other, tagged with the *stored* road id so the
    /// caller can recover whether the traversal reverses the road.
    pedestrian_adj: HashMap<JunctionId, Vec<Edge>>,
    terminals: Vec<JunctionId>,
}

impl RoadNetwork {
    pub fn build(junctions: Vec<Junction>, roads: Vec<Road>) -> Self {
        let mut junction_map = HashMap::new();
        let mut terminals = Vec::new();
        for j in junctions {
            if j.terminal {
                terminals.push(j.id);
            }
            junction_map.insert(j.id, j);
        }

        let mut vehicular_adj: HashMap<JunctionId, Vec<Edge>> = HashMap::new();
        let mut pedestrian_adj: HashMap<JunctionId, Vec<Edge>> = HashMap::new();
        let mut road_map = HashMap::new();

        for r in roads {
            match r.kind {
                RoadKind::Vehicular => {
                    vehicular_adj.entry(r.source).or_default().push(Edge {
                        road: r.id,
                        to: r.target,
                    });
                }
                RoadKind::Pedestrian => {
                    pedestrian_adj.entry(r.source).or_default().push(Edge {
                        road: r.id,
                        to: r.target,
                    });
                    pedestrian_adj.entry(r.target).or_default().push(Edge {
                        road: r.id,
                        to: r.source,
                    });
                }
            }
            road_map.insert(r.id, r);
        }

        Self {
            junctions: junction_map,
            roads: road_map,
            vehicular_adj,
            pedestrian_adj,
            terminals,
        }
    }

    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(&id)
    }

    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(&id)
    }

    pub fn road_mut(&mut self, id: RoadId) -> Option<&mut Road> {
        self.roads.get_mut(&id)
    }

    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    pub fn junctions(&self) -> impl Iterator<Item = &Junction> {
        self.junctions.values()
    }

    pub fn terminals(&self) -> &[JunctionId] {
        &self.terminals
    }

    /// Outgoing vehicular edges at `j`, in stable (insertion) order.
    pub(crate) fn vehicular_out(&self, j: JunctionId) -> &[Edge] {
        self.vehicular_adj.get(&j).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub(crate) fn pedestrian_out(&self, j: JunctionId) -> &[Edge] {
        self.pedestrian_adj.get(&j).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The junction a vehicle/pedestrian on `road` is approaching.
    pub fn closest_junction(&self, road: RoadId) -> Option<JunctionId> {
        self.roads.get(&road).map(|r| r.target)
    }

    fn heuristic(&self, a: JunctionId, b: JunctionId) -> f64 {
        let (ja, jb) = match (self.junctions.get(&a), self.junctions.get(&b)) {
            (Some(ja), Some(jb)) => (ja, jb),
            _ => return 0.0,
        };
        ((ja.x - jb.x).powi(2) + (ja.y - jb.y).powi(2)).sqrt()
    }

    fn road_cost(&self, road: RoadId) -> f64 {
        self.roads.get(&road).map(|r| r.length).unwrap_or(0.0)
    }

    /// A* shortest path over the vehicular subgraph, from `from` to `to`,
    /// returning the sequence of junctions visited (including both ends).
    pub fn vehicular_path(&self, from: JunctionId, to: JunctionId) -> Option<Vec<JunctionId>> {
        self.astar(from, to, |j| self.vehicular_out(j))
    }

    /// A* shortest path over the pedestrian subgraph, treated as undirected.
    pub fn pedestrian_path(&self, from: JunctionId, to: JunctionId) -> Option<Vec<JunctionId>> {
        self.astar(from, to, |j| self.pedestrian_out(j))
    }

    fn astar<'a>(
        &'a self,
        from: JunctionId,
        to: JunctionId,
        neighbors: impl Fn(JunctionId) -> &'a [Edge],
    ) -> Option<Vec<JunctionId>> {
        if from == to {
            return Some(vec![from]);
        }

        #[derive(PartialEq)]
        struct Candidate {
            priority: f64,
            node: JunctionId,
        }
        impl Eq for Candidate {}
        impl Ord for Candidate {
            fn cmp(&self, other: &Self) -> Ordering {
                // BinaryHeap is a max-heap; we want the smallest priority first.
                other
                    .priority
                    .partial_cmp(&self.priority)
                    .unwrap_or(Ordering::Equal)
            }
        }
        impl PartialOrd for Candidate {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<JunctionId, f64> = HashMap::new();
        let mut came_from: HashMap<JunctionId, JunctionId> = HashMap::new();

        g_score.insert(from, 0.0);
        open.push(Candidate {
            priority: self.heuristic(from, to),
            node: from,
        });

        let mut visited: HashMap<JunctionId, bool> = HashMap::new();

        while let Some(Candidate { node: current, .. }) = open.pop() {
            if current == to {
                let mut path = vec![current];
                let mut cur = current;
                while let Some(&prev) = came_from.get(&cur) {
                    path.push(prev);
                    cur = prev;
                }
                path.reverse();
                return Some(path);
            }
            if *visited.get(&current).unwrap_or(&false) {
                continue;
            }
            visited.insert(current, true);

            let current_g = *g_score.get(&current).unwrap_or(&f64::INFINITY);
            for edge in neighbors(current) {
                let tentative_g = current_g + self.road_cost(edge.road);
                if tentative_g < *g_score.get(&edge.to).unwrap_or(&f64::INFINITY) {
                    g_score.insert(edge.to, tentative_g);
                    came_from.insert(edge.to, current);
                    open.push(Candidate {
                        priority: tentative_g + self.heuristic(edge.to, to),
                        node: edge.to,
                    });
                }
            }
        }
        None
    }
}
