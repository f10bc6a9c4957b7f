use std::cmp::Reverse;

use tracing::{debug, info};

use crate::domain::types::{ProblemInstance, Route, Solution, DEPOT};
use crate::evaluation::fitness::{find_distance, route_distance};

/// Sum of customer demands carried by a route, saturating at `u64::MAX`.
pub fn route_load(route: &Route, demands: &[u64]) -> u64 {
    route
        .visits
        .iter()
        .fold(0, |load, &stop| load.saturating_add(demands[stop]))
}

/// Whether `demand` can join a vehicle already carrying `load`.
pub fn fits_capacity(load: u64, demand: u64, capacity: u64) -> bool {
    load.checked_add(demand).is_some_and(|total| total <= capacity)
}

impl Solution {
    /// Builds a solution from routes and prices it against the instance.
    pub fn from_routes(routes: Vec<Route>, instance: &ProblemInstance) -> Self {
        let cost = find_distance(&routes, &instance.distance_matrix);
        Solution { routes, cost }
    }

    pub fn non_empty_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(|route| !route.is_empty())
    }

    pub fn route_count(&self) -> usize {
        self.non_empty_routes().count()
    }

    /// Drops degenerate depot-only routes.
    pub fn into_non_empty(self) -> Self {
        Solution {
            routes: self
                .routes
                .into_iter()
                .filter(|route| !route.is_empty())
                .collect(),
            cost: self.cost,
        }
    }

    /// Describes the first broken invariant, if any: coverage, capacity,
    /// vehicle count or use of an unreachable arc.
    pub fn feasibility_violation(&self, instance: &ProblemInstance) -> Option<String> {
        let mut seen = vec![false; instance.stop_count()];
        for route in self.non_empty_routes() {
            for &stop in &route.visits {
                if stop == DEPOT || stop >= seen.len() {
                    return Some(format!("route visits invalid stop {}", stop));
                }
                if seen[stop] {
                    return Some(format!("stop {} is assigned twice", stop));
                }
                seen[stop] = true;
            }

            let within_capacity = route
                .visits
                .iter()
                .try_fold(0u64, |load, &stop| load.checked_add(instance.demands[stop]))
                .is_some_and(|load| load <= instance.fleet.capacity);
            if !within_capacity {
                let load = route_load(route, &instance.demands);
                return Some(format!(
                    "route load {} exceeds capacity {}",
                    load, instance.fleet.capacity
                ));
            }

            let sequence = route.sequence();
            if let Some(arc) = sequence
                .windows(2)
                .find(|arc| !instance.is_arc_usable(arc[0], arc[1]))
            {
                return Some(format!("route uses unreachable arc {} -> {}", arc[0], arc[1]));
            }
        }

        if let Some(missing) = instance.customers().find(|&stop| !seen[stop]) {
            return Some(format!("stop {} is not assigned", missing));
        }

        if self.route_count() > instance.fleet.num_vehicles {
            return Some(format!(
                "{} routes for {} vehicles",
                self.route_count(),
                instance.fleet.num_vehicles
            ));
        }

        None
    }

    pub fn is_feasible(&self, instance: &ProblemInstance) -> bool {
        self.feasibility_violation(instance).is_none()
    }
}

/// Per-route (visits, load, capacity), heaviest route first.
pub fn partition_solution(
    solution: &Solution,
    instance: &ProblemInstance,
) -> Vec<(Vec<usize>, u64, u64)> {
    let mut partition: Vec<(Vec<usize>, u64, u64)> = solution
        .non_empty_routes()
        .map(|route| {
            (
                route.visits.clone(),
                route_load(route, &instance.demands),
                instance.fleet.capacity,
            )
        })
        .collect();

    partition.sort_by_key(|(_, load, _)| Reverse(*load));
    partition
}

pub fn print_solution(solution: &Solution, instance: &ProblemInstance) {
    info!(
        "Distance: {}, routes: {} / {} vehicles",
        solution.cost,
        solution.route_count(),
        instance.fleet.num_vehicles
    );

    for (visits, load, capacity) in partition_solution(solution, instance) {
        let route = Route::new(visits);
        debug!(
            "{} / {} : {:?} (distance {})",
            load,
            capacity,
            route.sequence(),
            route_distance(&route, &instance.distance_matrix)
        );
    }
}
