use crate::config::constant::{
    DEPOT_LAT, DEPOT_LON, FIXTURE_GRID_SIZE, FIXTURE_MAX_DEMAND, GRAPH_RADIUS_METERS,
};
use crate::domain::types::{Coordinate, Stop};
use crate::error::RoutingResult;
use crate::graph::road_graph::{GraphEdge, GraphNode, NodeId, RoadGraph};
use crate::utils::haversine_meters;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Degree offsets of one meter north and one meter east at `center`.
fn degrees_per_meter(center: &Coordinate) -> (f64, f64) {
    let d_lat = 1.0 / METERS_PER_DEGREE_LAT;
    let d_lon = 1.0 / (METERS_PER_DEGREE_LAT * center.lat.to_radians().cos());
    (d_lat, d_lon)
}

/// Square street grid of `size` x `size` intersections covering `radius_m`
/// around `center`. Avenues (columns) are two-way; every fourth street (row)
/// is one-way eastbound, so the network is directed but strongly connected.
pub fn generate_grid_graph(
    center: &Coordinate,
    radius_m: f64,
    size: usize,
) -> RoutingResult<RoadGraph> {
    let size = size.max(2);
    let (d_lat, d_lon) = degrees_per_meter(center);
    let spacing = 2.0 * radius_m / (size - 1) as f64;
    let half = (size - 1) as f64 / 2.0;
    let id = |row: usize, col: usize| (row * size + col) as NodeId;

    let mut nodes = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            nodes.push(GraphNode::new(
                id(row, col),
                center.lat + (row as f64 - half) * spacing * d_lat,
                center.lon + (col as f64 - half) * spacing * d_lon,
            ));
        }
    }

    let length = |a: NodeId, b: NodeId| {
        haversine_meters(&nodes[a as usize].coordinate, &nodes[b as usize].coordinate)
    };
    let mut edges = Vec::new();
    for row in 0..size {
        let one_way = row % 4 == 2;
        for col in 0..size {
            let here = id(row, col);
            if col + 1 < size {
                let east = id(row, col + 1);
                edges.push(GraphEdge::new(here, east, length(here, east)));
                if !one_way {
                    edges.push(GraphEdge::new(east, here, length(east, here)));
                }
            }
            if row + 1 < size {
                let north = id(row + 1, col);
                edges.push(GraphEdge::new(here, north, length(here, north)));
                edges.push(GraphEdge::new(north, here, length(north, here)));
            }
        }
    }

    RoadGraph::new(nodes, edges)
}

/// Depot at `center` followed by `count` customers scattered uniformly over
/// the square of half-width `radius_m`, with demands in `1..=max_demand`.
pub fn generate_random_stops(
    center: &Coordinate,
    radius_m: f64,
    count: usize,
    max_demand: u64,
    seed: u64,
) -> Vec<Stop> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let (d_lat, d_lon) = degrees_per_meter(center);

    let mut stops = Vec::with_capacity(count + 1);
    stops.push(Stop::depot(center.lat, center.lon));
    for index in 1..=count {
        let north = rng.gen_range(-radius_m..=radius_m);
        let east = rng.gen_range(-radius_m..=radius_m);
        let demand = rng.gen_range(1..=max_demand.max(1));
        stops.push(Stop::new(
            index,
            center.lat + north * d_lat,
            center.lon + east * d_lon,
            demand,
        ));
    }
    stops
}

/// Fixture stops and a grid road network around the default depot.
pub fn generate_random_inputs(count: usize, seed: u64) -> RoutingResult<(Vec<Stop>, RoadGraph)> {
    let center = Coordinate::new(DEPOT_LAT, DEPOT_LON);
    let graph = generate_grid_graph(&center, GRAPH_RADIUS_METERS, FIXTURE_GRID_SIZE)?;
    let stops = generate_random_stops(&center, GRAPH_RADIUS_METERS, count, FIXTURE_MAX_DEMAND, seed);

    let total_demand: u64 = stops.iter().map(|stop| stop.demand).sum();
    info!(
        "Generated {} stops (total demand {}) on a {}x{} grid of {} edges",
        stops.len(),
        total_demand,
        FIXTURE_GRID_SIZE,
        FIXTURE_GRID_SIZE,
        graph.edge_count()
    );
    Ok((stops, graph))
}
