//! Lane-preference oracle (spec §4.5).
//!
//! Maps `(incoming road, outgoing road)` at a junction to the set of lanes
//! on the incoming road that should be used to reach that exit, under the
//! convention "rightmost lane is preferred for rightmost exit".

use crate::network::RoadNetwork;
use crate::ids::{JunctionId, RoadId};

/// Bearing of `from -> to`, normalized to `(-pi, pi]` via `atan2`. Using
/// `atan2` (rather than the original's `atan(dy/dx)`) avoids the
/// quadrant/division-by-zero issues of a bare slope while preserving the
/// "sort outgoing edges by bearing relative to the arrival direction" rule
/// from spec §4.5.
fn bearing(from: (f64, f64), to: (f64, f64)) -> f64 {
    (to.1 - from.1).atan2(to.0 - from.0)
}

/// Normalizes an angle difference into `(-pi, pi]` so sorting reflects
/// angular distance rather than raw subtraction artifacts at the wrap.
fn normalize(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

/// Returns the preferred outgoing lanes on `incoming_road` for reaching
/// `outgoing_road` through `junction`, in reversed (rightmost-first) order.
///
/// Returns `None` if either road is not actually incident to `junction` the
/// way the caller expects (incoming road's target must be `junction`,
/// outgoing road must originate at `junction`).
pub fn preferred_lanes(
    network: &RoadNetwork,
    junction: JunctionId,
    incoming_road: RoadId,
    outgoing_road: RoadId,
) -> Option<Vec<u32>> {
    let j = network.junction(junction)?;
    let incoming = network.road(incoming_road)?;
    let src = network.junction(incoming.source)?;
    let bearing_in = bearing((src.x, src.y), (j.x, j.y));

    let mut out_edges: Vec<(f64, RoadId)> = network
        .vehicular_out(junction)
        .iter()
        .map(|e| {
            let target = network.junction(e.to).unwrap();
            let diff = normalize(bearing((j.x, j.y), (target.x, target.y)) - bearing_in);
            (diff, e.road)
        })
        .collect();
    out_edges.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let k = out_edges.iter().position(|(_, road)| *road == outgoing_road)?;
    let count = out_edges.len();
    let lanes = incoming.lanes;

    let lower = ((k * lanes as usize) as f64 / count as f64).floor() as u32;
    let upper_exclusive = (((k + 1) * lanes as usize) as f64 / count as f64).ceil() as u32;
    let upper_exclusive = upper_exclusive.max(lower + 1).min(lanes);

    let mut lane_set: Vec<u32> = (lower..upper_exclusive).collect();
    lane_set.reverse();
    Some(lane_set)
}
