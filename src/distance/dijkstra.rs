use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::road_graph::RoadGraph;

#[derive(Copy, Clone, Debug)]
struct HeapItem {
    position: usize,
    weight: f64,
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &HeapItem) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &HeapItem) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flip weight to make this a min-heap
        other
            .weight
            .total_cmp(&self.weight)
            .then_with(|| other.position.cmp(&self.position))
    }
}

/// Shortest path lengths from `source` to each of `targets` (graph positions).
/// `None` marks a target with no path. Stops once every target is settled.
pub fn shortest_path_lengths(
    graph: &RoadGraph,
    source: usize,
    targets: &[usize],
) -> Vec<Option<f64>> {
    let mut weights = vec![f64::INFINITY; graph.node_count()];
    let mut settled = vec![false; graph.node_count()];
    let mut is_target = vec![false; graph.node_count()];
    let mut remaining = 0;
    for &target in targets {
        if !is_target[target] {
            is_target[target] = true;
            remaining += 1;
        }
    }

    let mut heap = BinaryHeap::with_capacity(1024);
    weights[source] = 0.0;
    heap.push(HeapItem {
        position: source,
        weight: 0.0,
    });

    while let Some(HeapItem { position, weight }) = heap.pop() {
        if settled[position] || weight > weights[position] {
            continue;
        }
        settled[position] = true;

        if is_target[position] {
            remaining -= 1;
            if remaining == 0 {
                break;
            }
        }

        for &(adj, length) in graph.neighbours(position) {
            if settled[adj] {
                continue;
            }
            let next_weight = weight + length;
            if next_weight < weights[adj] {
                weights[adj] = next_weight;
                heap.push(HeapItem {
                    position: adj,
                    weight: next_weight,
                });
            }
        }
    }

    targets
        .iter()
        .map(|&target| settled[target].then_some(weights[target]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::road_graph::{GraphEdge, GraphNode};

    // 1 -> 2 -> 3 is cheaper than 1 -> 3; 4 is isolated
    fn graph() -> RoadGraph {
        RoadGraph::new(
            (1..=4).map(|id| GraphNode::new(id, 0.0, id as f64)).collect(),
            vec![
                GraphEdge::new(1, 2, 2.0),
                GraphEdge::new(2, 3, 3.5),
                GraphEdge::new(1, 3, 10.0),
                GraphEdge::new(3, 1, 1.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn finds_cheapest_path() {
        let lengths = shortest_path_lengths(&graph(), 0, &[0, 1, 2]);
        assert_eq!(lengths, vec![Some(0.0), Some(2.0), Some(5.5)]);
    }

    #[test]
    fn respects_edge_direction() {
        let lengths = shortest_path_lengths(&graph(), 2, &[0, 1]);
        assert_eq!(lengths, vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn unreachable_targets_are_none() {
        let lengths = shortest_path_lengths(&graph(), 0, &[3, 2, 3]);
        assert_eq!(lengths, vec![None, Some(5.5), None]);
    }
}
