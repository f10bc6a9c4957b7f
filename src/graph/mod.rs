pub mod road_graph;
pub mod snapping;

pub use road_graph::*;
pub use snapping::*;
