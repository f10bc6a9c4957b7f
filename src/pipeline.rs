use tracing::{info, span, warn, Level};

use crate::config::SolverSettings;
use crate::distance::matrix::{create_dm, DistanceMatrix};
use crate::domain::types::{Coordinate, Fleet, ProblemInstance, Solution, Stop, DEPOT};
use crate::error::{RoutingError, RoutingResult};
use crate::graph::road_graph::RoadGraph;
use crate::graph::snapping::snap_all;
use crate::reconstruct::RouteReconstructor;
use crate::solver::clock::{Clock, SystemClock};
use crate::solver::{CvrpSolver, SearchReport};

/// Everything one optimization run produced.
#[derive(Debug, Clone)]
pub struct Optimization {
    pub solution: Solution,
    pub matrix: DistanceMatrix,
    pub report: SearchReport,
    /// One coordinate sequence per non-empty route, depot omitted.
    pub routes: Vec<Vec<Coordinate>>,
}

/// Snap, build the matrix, solve and reconstruct. `stops[0]` is the depot and
/// stop `i` is the `i`-th entry of `stops`, whose `index` must be `i`.
pub fn optimize(
    stops: &[Stop],
    fleet: Fleet,
    graph: &RoadGraph,
    settings: &SolverSettings,
) -> RoutingResult<Optimization> {
    optimize_with_clock(stops, fleet, graph, settings, &SystemClock::new())
}

pub fn optimize_with_clock(
    stops: &[Stop],
    fleet: Fleet,
    graph: &RoadGraph,
    settings: &SolverSettings,
    clock: &dyn Clock,
) -> RoutingResult<Optimization> {
    let demands = validate(stops, fleet, graph)?;

    let nodes = {
        let snap_span = span!(Level::INFO, "snap", stops = stops.len());
        let _guard = snap_span.enter();
        snap_all(graph, stops)?
    };

    let matrix = {
        let matrix_span = span!(Level::INFO, "distance_matrix");
        let _guard = matrix_span.enter();
        create_dm(graph, &nodes)?
    };

    let instance = ProblemInstance::new(matrix, demands, fleet)?;
    let solver = CvrpSolver::new(settings.clone());
    let (solution, report) = solver.solve_with_clock(&instance, clock)?;

    let routes = RouteReconstructor::new().reconstruct(&solution, stops)?;
    info!(
        "Optimized {} stops into {} routes, total distance {} m",
        stops.len(),
        routes.len(),
        solution.cost
    );

    Ok(Optimization {
        solution,
        matrix: instance.distance_matrix,
        report,
        routes,
    })
}

/// Input checks before any graph work, in reporting order. Returns the
/// demand vector with the depot forced to zero.
fn validate(stops: &[Stop], fleet: Fleet, graph: &RoadGraph) -> RoutingResult<Vec<u64>> {
    if stops.len() < 2 {
        return Err(RoutingError::InsufficientStops { found: stops.len() });
    }
    if let Some((position, stop)) = stops
        .iter()
        .enumerate()
        .find(|(position, stop)| stop.index != *position)
    {
        return Err(RoutingError::StopIndexMismatch {
            position,
            index: stop.index,
        });
    }
    fleet.validate()?;

    let mut demands: Vec<u64> = stops.iter().map(|stop| stop.demand).collect();
    if demands[DEPOT] != 0 {
        warn!(
            "Depot was given demand {}, treating it as 0",
            demands[DEPOT]
        );
        demands[DEPOT] = 0;
    }
    if let Some((stop, &demand)) = demands
        .iter()
        .enumerate()
        .find(|(_, &demand)| demand > fleet.capacity)
    {
        return Err(RoutingError::InfeasibleCapacity {
            stop,
            demand,
            capacity: fleet.capacity,
        });
    }

    if graph.is_empty() {
        return Err(RoutingError::EmptyGraph);
    }
    Ok(demands)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::graph::road_graph::{GraphEdge, GraphNode};
    use crate::solver::clock::ManualClock;

    // 0 - 1 - 2 - 3 along a street, two-way, 100 m apart
    fn street() -> RoadGraph {
        let nodes = (0..4)
            .map(|i| GraphNode::new(i, 1.30, 103.80 + i as f64 * 0.001))
            .collect();
        let edges = (0..3)
            .flat_map(|i| [GraphEdge::new(i, i + 1, 100.0), GraphEdge::new(i + 1, i, 100.0)])
            .collect();
        RoadGraph::new(nodes, edges).unwrap()
    }

    fn settings() -> SolverSettings {
        SolverSettings::default()
            .with_time_limit(Duration::from_secs(5))
            .with_max_stagnation(10)
    }

    fn stops() -> Vec<Stop> {
        vec![
            Stop::depot(1.30, 103.800),
            Stop::new(1, 1.30, 103.803, 3),
            Stop::new(2, 1.30, 103.801, 2),
        ]
    }

    #[test]
    fn street_is_driven_in_order() {
        let result =
            optimize_with_clock(&stops(), Fleet::new(1, 10), &street(), &settings(), &ManualClock::new())
                .unwrap();
        assert_eq!(result.solution.cost, 600);
        assert_eq!(result.matrix.get(0, 1), 300);
        assert_eq!(result.routes.len(), 1);
        assert_eq!(result.routes[0].len(), 2);
    }

    #[test]
    fn depot_demand_is_ignored() {
        let mut stops = stops();
        stops[0].demand = 500;
        let result =
            optimize_with_clock(&stops, Fleet::new(1, 10), &street(), &settings(), &ManualClock::new());
        assert!(result.is_ok());
    }

    #[test]
    fn errors_are_reported_in_order() {
        let empty = RoadGraph::new(vec![], vec![]).unwrap();
        let one = vec![Stop::depot(1.30, 103.80)];

        let err = optimize(&one, Fleet::new(0, 0), &empty, &settings()).unwrap_err();
        assert_eq!(err.kind(), "InsufficientStops");

        let mut shuffled = stops();
        shuffled.swap(1, 2);
        let err = optimize(&shuffled, Fleet::new(0, 10), &empty, &settings()).unwrap_err();
        assert_eq!(err, RoutingError::StopIndexMismatch { position: 1, index: 2 });

        let err = optimize(&stops(), Fleet::new(0, 10), &empty, &settings()).unwrap_err();
        assert_eq!(err.kind(), "InvalidFleet");

        let err = optimize(&stops(), Fleet::new(1, 2), &empty, &settings()).unwrap_err();
        assert_eq!(
            err,
            RoutingError::InfeasibleCapacity {
                stop: 1,
                demand: 3,
                capacity: 2
            }
        );

        let err = optimize(&stops(), Fleet::new(1, 10), &empty, &settings()).unwrap_err();
        assert_eq!(err, RoutingError::EmptyGraph);
    }

    #[test]
    fn depot_must_sit_at_position_zero() {
        let stops = vec![
            Stop::new(1, 1.30, 103.803, 3),
            Stop::depot(1.30, 103.800),
            Stop::new(2, 1.30, 103.801, 2),
        ];
        let err = optimize(&stops, Fleet::new(1, 10), &street(), &settings()).unwrap_err();
        assert_eq!(err.kind(), "StopIndexMismatch");
    }

    #[test]
    fn isolated_stop_has_no_solution() {
        // node 9 has no roads at all
        let mut nodes: Vec<GraphNode> = street().nodes().to_vec();
        nodes.push(GraphNode::new(9, 1.31, 103.80));
        let edges: Vec<GraphEdge> = (0..3)
            .flat_map(|i| [GraphEdge::new(i, i + 1, 100.0), GraphEdge::new(i + 1, i, 100.0)])
            .collect();
        let graph = RoadGraph::new(nodes, edges).unwrap();

        let stops = vec![
            Stop::depot(1.30, 103.800),
            Stop::new(1, 1.30, 103.803, 1),
            Stop::new(2, 1.31, 103.800, 1),
        ];
        let err =
            optimize_with_clock(&stops, Fleet::new(2, 10), &graph, &settings(), &ManualClock::new())
                .unwrap_err();
        assert_eq!(err, RoutingError::NoSolutionFound);
    }
}
