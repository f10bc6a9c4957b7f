use std::collections::HashMap;
use std::io::Read;

use rstar::primitives::GeomWithData;
use rstar::RTree;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::types::Coordinate;
use crate::error::{RoutingError, RoutingResult};
use crate::utils::unit_sphere_point;

pub type NodeId = u64;

/// A node placed on the unit sphere for nearest-node lookups.
pub type NodeLocation = GeomWithData<[f64; 3], NodeId>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    #[serde(flatten)]
    pub coordinate: Coordinate,
}

impl GraphNode {
    pub fn new(id: NodeId, lat: f64, lon: f64) -> Self {
        GraphNode {
            id,
            coordinate: Coordinate::new(lat, lon),
        }
    }
}

/// Directed road segment; `length` in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub length: f64,
}

impl GraphEdge {
    pub fn new(from: NodeId, to: NodeId, length: f64) -> Self {
        GraphEdge { from, to, length }
    }
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

/// Read-only directed road network, supplied per optimisation run.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<NodeId, usize>,
    adjacency: Vec<Vec<(usize, f64)>>,
    edge_count: usize,
    locations: RTree<NodeLocation>,
}

impl RoadGraph {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> RoutingResult<Self> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            if index.insert(node.id, position).is_some() {
                return Err(RoutingError::InvalidGraph(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
        }

        let mut adjacency = vec![vec![]; nodes.len()];
        for edge in &edges {
            if !edge.length.is_finite() || edge.length < 0.0 {
                return Err(RoutingError::InvalidGraph(format!(
                    "edge {} -> {} has invalid length {}",
                    edge.from, edge.to, edge.length
                )));
            }
            let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
                return Err(RoutingError::InvalidGraph(format!(
                    "edge {} -> {} references a missing node",
                    edge.from, edge.to
                )));
            };
            adjacency[from].push((to, edge.length));
        }

        let locations = RTree::bulk_load(
            nodes
                .iter()
                .map(|node| NodeLocation::new(unit_sphere_point(&node.coordinate), node.id))
                .collect(),
        );

        Ok(RoadGraph {
            nodes,
            index,
            adjacency,
            edge_count: edges.len(),
            locations,
        })
    }

    /// Loads `{"nodes": [{"id", "lat", "lon"}], "edges": [{"from", "to", "length"}]}`.
    pub fn from_json_reader<R: Read>(reader: R) -> RoutingResult<Self> {
        let file: GraphFile = serde_json::from_reader(reader)
            .map_err(|e| RoutingError::InvalidGraph(format!("unreadable graph json: {}", e)))?;
        let graph = RoadGraph::new(file.nodes, file.edges)?;
        info!(
            "Loaded road graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(graph)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, position: usize) -> &GraphNode {
        &self.nodes[position]
    }

    /// Internal position of a node id.
    pub fn position(&self, id: NodeId) -> RoutingResult<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or(RoutingError::UnknownNode(id))
    }

    pub fn coordinate(&self, id: NodeId) -> RoutingResult<Coordinate> {
        Ok(self.nodes[self.position(id)?].coordinate)
    }

    /// Spatial index over every node, built once with the graph.
    pub fn locations(&self) -> &RTree<NodeLocation> {
        &self.locations
    }

    /// Outgoing `(position, length)` pairs.
    pub fn neighbours(&self, position: usize) -> &[(usize, f64)] {
        &self.adjacency[position]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_forward_adjacency() {
        let graph = RoadGraph::new(
            vec![GraphNode::new(10, 0.0, 0.0), GraphNode::new(20, 0.0, 0.001)],
            vec![GraphEdge::new(10, 20, 111.0)],
        )
        .unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.neighbours(0), &[(1, 111.0)]);
        assert!(graph.neighbours(1).is_empty());
    }

    #[test]
    fn rejects_negative_lengths_and_dangling_edges() {
        let nodes = vec![GraphNode::new(1, 0.0, 0.0), GraphNode::new(2, 0.0, 0.0)];
        assert!(matches!(
            RoadGraph::new(nodes.clone(), vec![GraphEdge::new(1, 2, -1.0)]),
            Err(RoutingError::InvalidGraph(_))
        ));
        assert!(matches!(
            RoadGraph::new(nodes, vec![GraphEdge::new(1, 3, 1.0)]),
            Err(RoutingError::InvalidGraph(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let nodes = vec![GraphNode::new(1, 0.0, 0.0), GraphNode::new(1, 1.0, 1.0)];
        assert!(RoadGraph::new(nodes, vec![]).is_err());
    }

    #[test]
    fn spatial_index_holds_every_node() {
        let graph = RoadGraph::new(
            vec![
                GraphNode::new(3, 1.30, 103.80),
                GraphNode::new(5, 1.31, 103.81),
                GraphNode::new(8, 1.32, 103.82),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(graph.locations().size(), 3);
        let mut ids: Vec<NodeId> = graph.locations().iter().map(|location| location.data).collect();
        ids.sort();
        assert_eq!(ids, vec![3, 5, 8]);
    }

    #[test]
    fn loads_from_json() {
        let json = r#"{
            "nodes": [{"id": 7, "lat": 1.5, "lon": 2.5}, {"id": 8, "lat": 1.6, "lon": 2.6}],
            "edges": [{"from": 7, "to": 8, "length": 42.0}]
        }"#;
        let graph = RoadGraph::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(graph.coordinate(7).unwrap(), Coordinate::new(1.5, 2.5));
        assert_eq!(graph.position(8).unwrap(), 1);
        assert_eq!(graph.position(9), Err(RoutingError::UnknownNode(9)));
    }
}
