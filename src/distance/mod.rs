pub mod dijkstra;
pub mod matrix;

pub use matrix::*;
