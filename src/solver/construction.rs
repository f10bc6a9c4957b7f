use std::cmp::Reverse;

use tracing::{debug, trace, warn};

use crate::domain::solution::fits_capacity;
use crate::domain::types::{ProblemInstance, Route, DEPOT};
use crate::error::{RoutingError, RoutingResult};
use crate::solver::clock::Deadline;
use crate::solver::ConstructionStrategy;

/// Greedy route building: always extend the open route whose end gains the
/// cheapest arc to a stop that still fits; open the next vehicle only when no
/// open route can take any remaining stop.
///
/// Ties prefer the lowest stop index, then the lowest route.
pub struct PathCheapestArc;

impl ConstructionStrategy for PathCheapestArc {
    fn name(&self) -> &'static str {
        "path_cheapest_arc"
    }

    fn construct(&self, instance: &ProblemInstance, _: &Deadline) -> RoutingResult<Vec<Route>> {
        let capacity = instance.fleet.capacity;
        let mut routes: Vec<Vec<usize>> = vec![vec![]];
        let mut loads: Vec<u64> = vec![0];
        let mut assigned = vec![false; instance.stop_count()];
        assigned[DEPOT] = true;
        let mut remaining = instance.stop_count() - 1;

        while remaining > 0 {
            let mut best: Option<(i64, usize, usize)> = None;

            for (r, route) in routes.iter().enumerate() {
                let last = route.last().copied().unwrap_or(DEPOT);
                for stop in instance.customers().filter(|&s| !assigned[s]) {
                    if !fits_capacity(loads[r], instance.demands[stop], capacity)
                        || !instance.is_arc_usable(last, stop)
                        || !instance.is_arc_usable(stop, DEPOT)
                    {
                        continue;
                    }
                    let delta = instance.cost(last, stop) as i64 + instance.cost(stop, DEPOT) as i64
                        - instance.cost(last, DEPOT) as i64;
                    let candidate = (delta, stop, r);
                    if best.map_or(true, |b| candidate < b) {
                        best = Some(candidate);
                    }
                }
            }

            match best {
                Some((delta, stop, r)) => {
                    trace!("Extending route {} with stop {} (+{})", r, stop, delta);
                    routes[r].push(stop);
                    loads[r] += instance.demands[stop];
                    assigned[stop] = true;
                    remaining -= 1;
                }
                None if routes.len() < instance.fleet.num_vehicles
                    && routes.last().is_some_and(|route| !route.is_empty()) =>
                {
                    debug!("Opening vehicle {} ({} stops left)", routes.len(), remaining);
                    routes.push(vec![]);
                    loads.push(0);
                }
                None => {
                    debug!(
                        "Cheapest-arc construction stuck with {} unassigned stops",
                        remaining
                    );
                    return Err(RoutingError::NoSolutionFound);
                }
            }
        }

        Ok(pad_to_fleet(routes, instance))
    }
}

/// Bin-packing fallback: place stops by decreasing demand, each at its
/// cheapest feasible insertion position over all vehicles.
pub struct DemandFirstFit;

impl ConstructionStrategy for DemandFirstFit {
    fn name(&self) -> &'static str {
        "demand_first_fit"
    }

    fn construct(&self, instance: &ProblemInstance, _: &Deadline) -> RoutingResult<Vec<Route>> {
        let capacity = instance.fleet.capacity;
        let mut routes: Vec<Vec<usize>> = vec![vec![]; instance.fleet.num_vehicles];
        let mut loads = vec![0; instance.fleet.num_vehicles];

        for stop in by_decreasing_demand(instance) {
            let mut best: Option<(i64, usize, usize)> = None;
            for (r, route) in routes.iter().enumerate() {
                if !fits_capacity(loads[r], instance.demands[stop], capacity) {
                    continue;
                }
                if let Some((delta, position)) = cheapest_insertion(instance, route, stop) {
                    let candidate = (delta, r, position);
                    if best.map_or(true, |b| candidate < b) {
                        best = Some(candidate);
                    }
                }
                // idle vehicles are interchangeable
                if route.is_empty() {
                    break;
                }
            }

            let Some((_, r, position)) = best else {
                debug!("First-fit construction could not place stop {}", stop);
                return Err(RoutingError::NoSolutionFound);
            };
            routes[r].insert(position, stop);
            loads[r] += instance.demands[stop];
        }

        Ok(pad_to_fleet(routes, instance))
    }
}

/// Depth-first packing for instances the greedy passes cannot fit.
///
/// Stops are placed by decreasing demand. Each one is tried on every route
/// with room, cheapest insertion first, and on a single idle vehicle. Dead
/// ends backtrack. The search ends with a full assignment, with every
/// branch exhausted, or when the deadline passes.
pub struct PackingSearch;

enum Placement {
    Done,
    Exhausted,
    TimedOut,
}

struct Packing {
    routes: Vec<Vec<usize>>,
    loads: Vec<u64>,
    nodes: usize,
}

impl ConstructionStrategy for PackingSearch {
    fn name(&self) -> &'static str {
        "packing_search"
    }

    fn construct(
        &self,
        instance: &ProblemInstance,
        deadline: &Deadline,
    ) -> RoutingResult<Vec<Route>> {
        let total_demand = instance
            .demands
            .iter()
            .fold(0u64, |total, &demand| total.saturating_add(demand));
        let fleet_capacity = instance
            .fleet
            .capacity
            .saturating_mul(instance.fleet.num_vehicles as u64);
        if total_demand > fleet_capacity {
            debug!(
                "Total demand {} exceeds fleet capacity {}",
                total_demand, fleet_capacity
            );
            return Err(RoutingError::NoSolutionFound);
        }

        let order = by_decreasing_demand(instance);
        let mut packing = Packing {
            routes: vec![vec![]; instance.fleet.num_vehicles],
            loads: vec![0; instance.fleet.num_vehicles],
            nodes: 0,
        };

        match packing.place(instance, &order, deadline) {
            Placement::Done => {
                debug!("Packing search placed every stop after {} nodes", packing.nodes);
                Ok(pad_to_fleet(packing.routes, instance))
            }
            Placement::Exhausted => {
                debug!("Packing search exhausted after {} nodes", packing.nodes);
                Err(RoutingError::NoSolutionFound)
            }
            Placement::TimedOut => {
                warn!("Packing search hit the deadline after {} nodes", packing.nodes);
                Err(RoutingError::NoSolutionFound)
            }
        }
    }
}

impl Packing {
    fn place(
        &mut self,
        instance: &ProblemInstance,
        pending: &[usize],
        deadline: &Deadline,
    ) -> Placement {
        let Some((&stop, rest)) = pending.split_first() else {
            return Placement::Done;
        };
        self.nodes += 1;
        if deadline.expired() {
            return Placement::TimedOut;
        }

        let demand = instance.demands[stop];
        for (r, position) in self.options(instance, stop) {
            self.routes[r].insert(position, stop);
            self.loads[r] += demand;
            match self.place(instance, rest, deadline) {
                Placement::Exhausted => {}
                placement => return placement,
            }
            self.routes[r].remove(position);
            self.loads[r] -= demand;
        }
        Placement::Exhausted
    }

    /// `(route, position)` pairs for `stop`, cheapest first.
    fn options(&self, instance: &ProblemInstance, stop: usize) -> Vec<(usize, usize)> {
        let mut options: Vec<(i64, usize, usize)> = Vec::new();
        let mut idle_offered = false;
        for (r, route) in self.routes.iter().enumerate() {
            if route.is_empty() {
                if idle_offered {
                    continue;
                }
                idle_offered = true;
            }
            if !fits_capacity(self.loads[r], instance.demands[stop], instance.fleet.capacity) {
                continue;
            }
            if let Some((delta, position)) = cheapest_insertion(instance, route, stop) {
                options.push((delta, r, position));
            }
        }
        options.sort_unstable();
        options.into_iter().map(|(_, r, position)| (r, position)).collect()
    }
}

/// Customers ordered by demand, largest first, then by index.
fn by_decreasing_demand(instance: &ProblemInstance) -> Vec<usize> {
    let mut order: Vec<usize> = instance.customers().collect();
    order.sort_by_key(|&stop| (Reverse(instance.demands[stop]), stop));
    order
}

/// Cheapest `(delta, position)` at which `stop` can join `route` over usable arcs.
fn cheapest_insertion(
    instance: &ProblemInstance,
    route: &[usize],
    stop: usize,
) -> Option<(i64, usize)> {
    (0..=route.len())
        .filter_map(|position| {
            let prev = if position == 0 { DEPOT } else { route[position - 1] };
            let next = route.get(position).copied().unwrap_or(DEPOT);
            if !instance.is_arc_usable(prev, stop) || !instance.is_arc_usable(stop, next) {
                return None;
            }
            let delta = instance.cost(prev, stop) as i64 + instance.cost(stop, next) as i64
                - instance.cost(prev, next) as i64;
            Some((delta, position))
        })
        .min()
}

/// One route per vehicle, idle vehicles as empty routes.
fn pad_to_fleet(mut routes: Vec<Vec<usize>>, instance: &ProblemInstance) -> Vec<Route> {
    routes.resize(instance.fleet.num_vehicles, vec![]);
    routes.into_iter().map(Route::new).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::constant::UNREACHABLE_COST;
    use crate::distance::matrix::DistanceMatrix;
    use crate::domain::types::{Fleet, Solution};
    use crate::solver::clock::ManualClock;

    const X: u64 = UNREACHABLE_COST;

    static CLOCK: ManualClock = ManualClock::new();

    fn deadline() -> Deadline<'static> {
        Deadline::new(&CLOCK, Duration::from_secs(5))
    }

    /// Two tight vehicles: each must take one 4 and two 3s.
    fn tight_packing() -> ProblemInstance {
        let rows = (0..7)
            .map(|i| {
                (0..7)
                    .map(|j| match (i, j) {
                        _ if i == j => 0,
                        (0..=2, 0..=2) => 1,
                        _ => 100,
                    })
                    .collect()
            })
            .collect();
        instance(rows, vec![0, 4, 4, 3, 3, 3, 3], Fleet::new(2, 10))
    }

    fn instance(rows: Vec<Vec<u64>>, demands: Vec<u64>, fleet: Fleet) -> ProblemInstance {
        ProblemInstance::new(DistanceMatrix::from_rows(rows).unwrap(), demands, fleet).unwrap()
    }

    fn line(n: usize) -> Vec<Vec<u64>> {
        (0..n)
            .map(|i| (0..n).map(|j| (i as i64 - j as i64).unsigned_abs() * 10).collect())
            .collect()
    }

    #[test]
    fn cheapest_arc_packs_three_stops_into_two_vehicles() {
        let inst = instance(line(4), vec![0, 10, 20, 15], Fleet::new(2, 30));
        let routes = PathCheapestArc.construct(&inst, &deadline()).unwrap();
        assert_eq!(routes.len(), 2);
        assert!(Solution::from_routes(routes, &inst).is_feasible(&inst));
    }

    #[test]
    fn cheapest_arc_is_deterministic_on_ties() {
        // every customer is equally far from everything
        let rows = (0..4)
            .map(|i| (0..4).map(|j| if i == j { 0 } else { 5 }).collect())
            .collect();
        let inst = instance(rows, vec![0, 1, 1, 1], Fleet::new(1, 10));
        let routes = PathCheapestArc.construct(&inst, &deadline()).unwrap();
        assert_eq!(routes[0].visits, vec![1, 2, 3]);
    }

    #[test]
    fn cheapest_arc_reports_overflowing_fleet() {
        let inst = instance(line(4), vec![0, 20, 20, 20], Fleet::new(2, 30));
        assert_eq!(PathCheapestArc.construct(&inst, &deadline()), Err(RoutingError::NoSolutionFound));
    }

    #[test]
    fn cheapest_arc_never_uses_unreachable_arcs() {
        let rows = vec![
            vec![0, 10, 10],
            vec![10, 0, X],
            vec![10, X, 0],
        ];
        let inst = instance(rows, vec![0, 1, 1], Fleet::new(2, 10));
        let routes = PathCheapestArc.construct(&inst, &deadline()).unwrap();
        assert_eq!(routes[0].visits, vec![1]);
        assert_eq!(routes[1].visits, vec![2]);
    }

    #[test]
    fn first_fit_packs_what_greedy_arcs_cannot() {
        // the cheapest arc chain fills vehicle one with 15 + 10 and strands 15 + 20
        let inst = instance(line(5), vec![0, 15, 10, 15, 20], Fleet::new(2, 30));
        assert_eq!(PathCheapestArc.construct(&inst, &deadline()), Err(RoutingError::NoSolutionFound));

        let routes = DemandFirstFit.construct(&inst, &deadline()).unwrap();
        assert!(Solution::from_routes(routes, &inst).is_feasible(&inst));
    }

    #[test]
    fn packing_search_finds_the_tight_split() {
        let inst = tight_packing();
        let no_solution = Err(RoutingError::NoSolutionFound);
        assert_eq!(PathCheapestArc.construct(&inst, &deadline()), no_solution);
        assert_eq!(DemandFirstFit.construct(&inst, &deadline()), no_solution);

        let routes = PackingSearch.construct(&inst, &deadline()).unwrap();
        assert!(Solution::from_routes(routes.clone(), &inst).is_feasible(&inst));
        for route in &routes {
            let mut demands: Vec<u64> = route.visits.iter().map(|&s| inst.demands[s]).collect();
            demands.sort();
            assert_eq!(demands, vec![3, 3, 4]);
        }
    }

    #[test]
    fn packing_search_stops_at_the_deadline() {
        let clock = ManualClock::new();
        let expired = Deadline::new(&clock, Duration::ZERO);
        assert_eq!(
            PackingSearch.construct(&tight_packing(), &expired),
            Err(RoutingError::NoSolutionFound)
        );
    }

    #[test]
    fn packing_search_exhausts_impossible_packings() {
        // total demand fits the fleet, but no two stops share a vehicle
        let inst = instance(line(4), vec![0, 6, 6, 6], Fleet::new(2, 10));
        assert_eq!(PackingSearch.construct(&inst, &deadline()), Err(RoutingError::NoSolutionFound));

        let inst = instance(line(4), vec![0, 8, 8, 8], Fleet::new(2, 10));
        assert_eq!(PackingSearch.construct(&inst, &deadline()), Err(RoutingError::NoSolutionFound));
    }

    #[test]
    fn huge_loads_do_not_overflow() {
        let inst = instance(line(3), vec![0, u64::MAX, 1], Fleet::new(2, u64::MAX));
        let strategies: [&dyn ConstructionStrategy; 3] =
            [&PathCheapestArc, &DemandFirstFit, &PackingSearch];
        for strategy in strategies {
            let routes = strategy.construct(&inst, &deadline()).unwrap();
            let solution = Solution::from_routes(routes, &inst);
            assert!(solution.is_feasible(&inst), "{}", strategy.name());
            assert_eq!(solution.route_count(), 2, "{}", strategy.name());
        }
    }

    #[test]
    fn routes_are_padded_to_fleet_size() {
        let inst = instance(line(2), vec![0, 5], Fleet::new(3, 10));
        let routes = DemandFirstFit.construct(&inst, &deadline()).unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].visits, vec![1]);
        assert!(routes[1].is_empty() && routes[2].is_empty());
    }
}
