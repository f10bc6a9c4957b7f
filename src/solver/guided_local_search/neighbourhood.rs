//! Local search moves priced under the augmented (penalised) cost.
//!
//! Routes are viewed as paths `0, visits.., 0`; path position 0 and the last
//! position are the depot. A move is only generated when every arc it creates
//! is reachable and, across routes, the receiving vehicle has room.

use tracing::trace;

use crate::distance::matrix::DistanceMatrix;
use crate::domain::solution::{fits_capacity, route_load};
use crate::domain::types::{ProblemInstance, Route};
use crate::evaluation::penalty::{route_arcs, EdgePenalties};
use crate::utils::move_segment;

pub const MAX_SEGMENT_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Reverse visits `i..=j` of one route.
    TwoOpt { route: usize, i: usize, j: usize },
    /// Move `len` visits starting at `from` out of `source` and insert them
    /// into `target` at `to` (a position in `target` after the removal).
    OrOpt {
        source: usize,
        from: usize,
        len: usize,
        target: usize,
        to: usize,
    },
}

impl Move {
    pub fn apply(&self, routes: &mut [Route], loads: &mut [u64], demands: &[u64]) {
        match *self {
            Move::TwoOpt { route, i, j } => routes[route].visits[i..=j].reverse(),
            Move::OrOpt {
                source,
                from,
                len,
                target,
                to,
            } => {
                let segment = move_segment(&mut routes[source].visits, from, len);
                let segment_demand: u64 = segment.iter().map(|&s| demands[s]).sum();
                loads[source] -= segment_demand;
                loads[target] += segment_demand;
                routes[target].visits.splice(to..to, segment);
            }
        }
    }
}

/// Augmented arc prices plus prefix sums for one route path.
struct PathCosts {
    path: Vec<usize>,
    // forward[k]: sum of a(path[t], path[t+1]) for t < k
    forward: Vec<i64>,
    // backward[k]: sum of a(path[t+1], path[t]) for t < k
    backward: Vec<i64>,
    // blocked_backward[k]: unreachable reversed arcs for t < k
    blocked_backward: Vec<usize>,
}

impl PathCosts {
    fn new(route: &Route, instance: &ProblemInstance, penalties: &EdgePenalties) -> Self {
        let dm = &instance.distance_matrix;
        let path = route.sequence();
        let mut forward = vec![0; path.len()];
        let mut backward = vec![0; path.len()];
        let mut blocked_backward = vec![0; path.len()];
        for k in 1..path.len() {
            let (a, b) = (path[k - 1], path[k]);
            forward[k] = forward[k - 1] + penalties.augmented_arc(a, b, dm) as i64;
            backward[k] = backward[k - 1] + penalties.augmented_arc(b, a, dm) as i64;
            blocked_backward[k] = blocked_backward[k - 1] + usize::from(!dm.is_reachable(b, a));
        }
        PathCosts {
            path,
            forward,
            backward,
            blocked_backward,
        }
    }
}

struct Pricer<'a> {
    dm: &'a DistanceMatrix,
    penalties: &'a EdgePenalties,
}

impl Pricer<'_> {
    fn arc(&self, from: usize, to: usize) -> i64 {
        self.penalties.augmented_arc(from, to, self.dm) as i64
    }

    fn usable(&self, from: usize, to: usize) -> bool {
        self.dm.is_reachable(from, to)
    }
}

/// Best augmented-cost improving move, scanning 2-opt first, then or-opt.
/// Ties keep the first move found, so the scan order is the tie-break.
pub fn find_best_move(
    routes: &[Route],
    loads: &[u64],
    instance: &ProblemInstance,
    penalties: &EdgePenalties,
) -> Option<(i64, Move)> {
    let pricer = Pricer {
        dm: &instance.distance_matrix,
        penalties,
    };
    let costs: Vec<PathCosts> = routes
        .iter()
        .map(|route| PathCosts::new(route, instance, penalties))
        .collect();

    let mut best: Option<(i64, Move)> = None;
    let mut consider = |delta: i64, mv: Move| {
        if delta < 0 && best.map_or(true, |(d, _)| delta < d) {
            best = Some((delta, mv));
        }
    };

    for (r, path_costs) in costs.iter().enumerate() {
        two_opt_moves(r, path_costs, &pricer, &mut consider);
    }

    // only the first idle vehicle is tried as a target; idle vehicles are interchangeable
    let first_idle = routes.iter().position(|route| route.is_empty());
    for (s, source) in costs.iter().enumerate() {
        for (t, target) in costs.iter().enumerate() {
            if t != s && routes[t].is_empty() && Some(t) != first_idle {
                continue;
            }
            or_opt_moves(s, source, t, target, loads, instance, &pricer, &mut consider);
        }
    }

    if let Some((delta, mv)) = best {
        trace!("Best move {:?} (augmented delta {})", mv, delta);
    }
    best
}

fn two_opt_moves(
    r: usize,
    pc: &PathCosts,
    pricer: &Pricer,
    consider: &mut impl FnMut(i64, Move),
) {
    let path = &pc.path;
    let n = path.len() - 2;
    for i in 1..n {
        for j in (i + 1)..=n {
            let (prev, first, last, next) = (path[i - 1], path[i], path[j], path[j + 1]);
            if !pricer.usable(prev, last)
                || !pricer.usable(first, next)
                || pc.blocked_backward[j] - pc.blocked_backward[i] > 0
            {
                continue;
            }
            let inner_old = pc.forward[j] - pc.forward[i];
            let inner_new = pc.backward[j] - pc.backward[i];
            let delta = pricer.arc(prev, last) + pricer.arc(first, next) + inner_new
                - pricer.arc(prev, first)
                - pricer.arc(last, next)
                - inner_old;
            consider(
                delta,
                Move::TwoOpt {
                    route: r,
                    i: i - 1,
                    j: j - 1,
                },
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn or_opt_moves(
    s: usize,
    source: &PathCosts,
    t: usize,
    target: &PathCosts,
    loads: &[u64],
    instance: &ProblemInstance,
    pricer: &Pricer,
    consider: &mut impl FnMut(i64, Move),
) {
    let path = &source.path;
    let n = path.len() - 2;

    for len in 1..=MAX_SEGMENT_LEN.min(n) {
        for start in 1..=(n + 1 - len) {
            let end = start + len - 1;
            let (prev, first, last, next) = (path[start - 1], path[start], path[end], path[end + 1]);
            if !pricer.usable(prev, next) {
                continue;
            }
            let segment_demand: u64 = path[start..=end].iter().map(|&v| instance.demands[v]).sum();
            let capacity = instance.fleet.capacity;
            if s != t && !fits_capacity(loads[t], segment_demand, capacity) {
                continue;
            }
            let removal_gain = pricer.arc(prev, first) + pricer.arc(last, next) - pricer.arc(prev, next);

            // path of the receiving route, with the segment already removed when s == t
            let receiving: Vec<usize> = if s == t {
                path[..start].iter().chain(&path[end + 1..]).copied().collect()
            } else {
                target.path.clone()
            };

            for to in 1..receiving.len() {
                if s == t && to == start {
                    continue;
                }
                let (x, y) = (receiving[to - 1], receiving[to]);
                if !pricer.usable(x, first) || !pricer.usable(last, y) {
                    continue;
                }
                let insertion = pricer.arc(x, first) + pricer.arc(last, y) - pricer.arc(x, y);
                consider(
                    insertion - removal_gain,
                    Move::OrOpt {
                        source: s,
                        from: start - 1,
                        len,
                        target: t,
                        to: to - 1,
                    },
                );
            }
        }
    }
}

/// Depot-to-depot arc count over all non-empty routes.
pub fn arc_count(routes: &[Route]) -> usize {
    routes
        .iter()
        .filter(|route| !route.is_empty())
        .map(|route| route.len() + 1)
        .sum()
}

pub fn route_loads(routes: &[Route], demands: &[u64]) -> Vec<u64> {
    routes
        .iter()
        .map(|route| route_load(route, demands))
        .collect()
}

/// Whether a depot-anchored path avoids every unreachable arc.
pub fn is_path_usable(visits: &[usize], dm: &DistanceMatrix) -> bool {
    route_arcs(visits).all(|(from, to)| dm.is_reachable(from, to))
}
