use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::constant::UNREACHABLE_COST;
use crate::distance::dijkstra::shortest_path_lengths;
use crate::error::{RoutingError, RoutingResult};
use crate::graph::road_graph::{NodeId, RoadGraph};

/// Square matrix of integer travel costs between stops. Not necessarily symmetric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    size: usize,
    data: Vec<u64>,
}

impl DistanceMatrix {
    /// Builds a matrix from rows; they must be square with a zero diagonal.
    pub fn from_rows(rows: Vec<Vec<u64>>) -> RoutingResult<Self> {
        let size = rows.len();
        let mut data = Vec::with_capacity(size * size);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != size {
                return Err(RoutingError::InvalidGraph(format!(
                    "distance matrix row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    size
                )));
            }
            if row[i] != 0 {
                return Err(RoutingError::InvalidGraph(format!(
                    "distance matrix diagonal at {} is {}",
                    i, row[i]
                )));
            }
            data.extend(row);
        }
        Ok(DistanceMatrix { size, data })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, from: usize, to: usize) -> u64 {
        self.data[from * self.size + to]
    }

    pub fn row(&self, from: usize) -> &[u64] {
        &self.data[from * self.size..(from + 1) * self.size]
    }

    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.get(from, to) < UNREACHABLE_COST
    }

    pub fn unreachable_pairs(&self) -> usize {
        self.data.iter().filter(|&&c| c >= UNREACHABLE_COST).count()
    }
}

/// Create the stop-to-stop distance matrix over the road graph, one Dijkstra
/// run per snapped node, rows computed in parallel.
pub fn create_dm(graph: &RoadGraph, nodes: &[NodeId]) -> RoutingResult<DistanceMatrix> {
    info!(
        "Creating distance matrix for {} stops over {} nodes / {} edges",
        nodes.len(),
        graph.node_count(),
        graph.edge_count()
    );

    let positions = nodes
        .iter()
        .map(|&id| graph.position(id))
        .collect::<RoutingResult<Vec<usize>>>()?;

    let rows: Vec<Vec<u64>> = positions
        .par_iter()
        .enumerate()
        .map(|(i, &source)| {
            shortest_path_lengths(graph, source, &positions)
                .into_iter()
                .enumerate()
                .map(|(j, length)| match length {
                    _ if i == j => 0,
                    Some(length) => to_cost(length),
                    None => {
                        warn!(
                            "No path from stop {} (node {}) to stop {} (node {})",
                            i, nodes[i], j, nodes[j]
                        );
                        UNREACHABLE_COST
                    }
                })
                .collect()
        })
        .collect();

    let matrix = DistanceMatrix::from_rows(rows)?;
    info!(
        "Created {0}x{0} distance matrix ({1} unreachable pairs)",
        matrix.size(),
        matrix.unreachable_pairs()
    );
    print_dist_matrix(&matrix);
    Ok(matrix)
}

/// Truncates to whole meters, staying below the sentinel.
fn to_cost(length: f64) -> u64 {
    let cost = length as u64;
    if cost >= UNREACHABLE_COST {
        warn!(
            "Path length {:.0} m reaches the unreachable sentinel, saturating",
            length
        );
        UNREACHABLE_COST - 1
    } else {
        cost
    }
}

// Print distance matrix for debugging
pub fn print_dist_matrix(dm: &DistanceMatrix) {
    debug!("Distance matrix:");
    for i in 0..dm.size() {
        debug!("{:?}", dm.row(i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::road_graph::{GraphEdge, GraphNode};

    fn graph() -> RoadGraph {
        RoadGraph::new(
            (1..=5).map(|id| GraphNode::new(id, 0.0, id as f64 * 0.01)).collect(),
            vec![
                GraphEdge::new(1, 2, 100.7),
                GraphEdge::new(2, 1, 100.7),
                GraphEdge::new(2, 3, 50.2),
                GraphEdge::new(3, 2, 80.0),
                GraphEdge::new(3, 1, 500.0),
                // 4 <-> 5 form an island
                GraphEdge::new(4, 5, 10.0),
                GraphEdge::new(5, 4, 10.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn matrix_holds_truncated_shortest_paths() {
        let dm = create_dm(&graph(), &[1, 2, 3]).unwrap();
        assert_eq!(dm.row(0), &[0, 100, 150]);
        assert_eq!(dm.row(1), &[100, 0, 50]);
        assert_eq!(dm.row(2), &[180, 80, 0]);
    }

    #[test]
    fn unreachable_pairs_get_the_sentinel() {
        let dm = create_dm(&graph(), &[1, 4]).unwrap();
        assert_eq!(dm.get(0, 1), UNREACHABLE_COST);
        assert_eq!(dm.get(1, 0), UNREACHABLE_COST);
        assert!(!dm.is_reachable(0, 1));
        assert_eq!(dm.unreachable_pairs(), 2);
    }

    #[test]
    fn stops_on_the_same_node_cost_nothing() {
        let dm = create_dm(&graph(), &[2, 2, 3]).unwrap();
        assert_eq!(dm.get(0, 1), 0);
        assert_eq!(dm.get(1, 0), 0);
        assert_eq!(dm.get(0, 2), 50);
    }

    #[test]
    fn rebuilding_is_deterministic() {
        let g = graph();
        let nodes = [3, 1, 2, 5, 4];
        assert_eq!(create_dm(&g, &nodes).unwrap(), create_dm(&g, &nodes).unwrap());
    }

    #[test]
    fn unknown_nodes_abort() {
        assert_eq!(create_dm(&graph(), &[1, 99]), Err(RoutingError::UnknownNode(99)));
    }

    #[test]
    fn from_rows_validates_shape_and_diagonal() {
        assert!(DistanceMatrix::from_rows(vec![vec![0, 1], vec![1]]).is_err());
        assert!(DistanceMatrix::from_rows(vec![vec![0, 1], vec![1, 2]]).is_err());
        assert!(DistanceMatrix::from_rows(vec![vec![0, 1], vec![1, 0]]).is_ok());
    }
}
