use tracing::debug;

use crate::domain::types::{Coordinate, Stop};
use crate::error::{RoutingError, RoutingResult};
use crate::graph::road_graph::{NodeId, RoadGraph};
use crate::utils::{haversine_meters, unit_sphere_point};

/// Chord lengths this close to the nearest one are re-ranked by haversine.
const TIE_RELATIVE_SLACK: f64 = 1e-9;
const TIE_ABSOLUTE_SLACK: f64 = 1e-24;

/// Nearest graph node by haversine distance; ties go to the lowest node id.
pub fn snap(graph: &RoadGraph, coordinate: &Coordinate) -> RoutingResult<NodeId> {
    snap_with_distance(graph, coordinate).map(|(id, _)| id)
}

fn snap_with_distance(graph: &RoadGraph, coordinate: &Coordinate) -> RoutingResult<(NodeId, f64)> {
    let query = unit_sphere_point(coordinate);
    let mut candidates = graph.locations().nearest_neighbor_iter_with_distance_2(&query);
    let (nearest, nearest_d2) = candidates.next().ok_or(RoutingError::EmptyGraph)?;
    let limit = nearest_d2 * (1.0 + TIE_RELATIVE_SLACK) + TIE_ABSOLUTE_SLACK;

    let mut best: Option<(NodeId, f64)> = None;
    for (location, _) in std::iter::once((nearest, nearest_d2))
        .chain(candidates.take_while(|&(_, d2)| d2 <= limit))
    {
        let id = location.data;
        let distance = haversine_meters(coordinate, &graph.coordinate(id)?);
        let closer = best.map_or(true, |(best_id, best_distance)| {
            distance.total_cmp(&best_distance).then(id.cmp(&best_id)).is_lt()
        });
        if closer {
            best = Some((id, distance));
        }
    }
    best.ok_or(RoutingError::EmptyGraph)
}

/// Snaps every stop, in stop order.
pub fn snap_all(graph: &RoadGraph, stops: &[Stop]) -> RoutingResult<Vec<NodeId>> {
    if graph.is_empty() {
        return Err(RoutingError::EmptyGraph);
    }

    stops
        .iter()
        .map(|stop| {
            let (node, distance) = snap_with_distance(graph, &stop.coordinate)?;
            debug!(
                "Snapped stop {} ({:.6}, {:.6}) to node {} at {:.1} m",
                stop.index, stop.coordinate.lat, stop.coordinate.lon, node, distance
            );
            Ok(node)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::data_generator::{generate_grid_graph, generate_random_stops};
    use crate::graph::road_graph::GraphNode;

    fn graph(nodes: Vec<GraphNode>) -> RoadGraph {
        RoadGraph::new(nodes, vec![]).unwrap()
    }

    #[test]
    fn picks_the_closest_node() {
        let g = graph(vec![
            GraphNode::new(1, 0.0, 0.0),
            GraphNode::new(2, 0.0, 0.01),
            GraphNode::new(3, 0.0, 0.02),
        ]);
        assert_eq!(snap(&g, &Coordinate::new(0.0, 0.011)).unwrap(), 2);
    }

    #[test]
    fn ties_go_to_the_lowest_id() {
        let g = graph(vec![GraphNode::new(9, 0.0, 0.01), GraphNode::new(4, 0.0, -0.01)]);
        assert_eq!(snap(&g, &Coordinate::new(0.0, 0.0)).unwrap(), 4);
    }

    #[test]
    fn stacked_nodes_go_to_the_lowest_id() {
        let g = graph(vec![
            GraphNode::new(12, 1.30, 103.80),
            GraphNode::new(7, 1.30, 103.80),
            GraphNode::new(30, 1.30, 103.80),
            GraphNode::new(2, 1.40, 103.90),
        ]);
        assert_eq!(snap(&g, &Coordinate::new(1.3001, 103.8001)).unwrap(), 7);
    }

    #[test]
    fn index_lookup_matches_a_full_scan() {
        let center = Coordinate::new(1.3521, 103.8198);
        let g = generate_grid_graph(&center, 2000.0, 9).unwrap();
        for stop in generate_random_stops(&center, 2500.0, 40, 1, 7) {
            let scanned = g
                .nodes()
                .iter()
                .map(|node| (node.id, haversine_meters(&stop.coordinate, &node.coordinate)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
                .unwrap();
            assert_eq!(snap(&g, &stop.coordinate).unwrap(), scanned.0);
        }
    }

    #[test]
    fn empty_graph_is_an_error() {
        let g = graph(vec![]);
        assert_eq!(snap(&g, &Coordinate::new(0.0, 0.0)), Err(RoutingError::EmptyGraph));
        assert_eq!(
            snap_all(&g, &[Stop::depot(0.0, 0.0)]),
            Err(RoutingError::EmptyGraph)
        );
    }

    #[test]
    fn snap_all_keeps_stop_order() {
        let g = graph(vec![GraphNode::new(1, 0.0, 0.0), GraphNode::new(2, 1.0, 1.0)]);
        let stops = vec![Stop::depot(0.9, 0.9), Stop::new(1, 0.1, 0.0, 3)];
        assert_eq!(snap_all(&g, &stops).unwrap(), vec![2, 1]);
    }
}
