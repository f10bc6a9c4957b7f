//! Capacitated vehicle routing over a road graph: snap stops, build a
//! shortest-path distance matrix, search for short routes under a deadline,
//! and turn the result back into coordinate sequences.

pub mod config;
pub mod database;
pub mod distance;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod fixtures;
pub mod graph;
pub mod pipeline;
pub mod reconstruct;
pub mod runner;
pub mod solver;
pub mod utils;

pub use config::{RunSettings, SolverSettings};
pub use domain::types::{Coordinate, Fleet, ProblemInstance, Route, Solution, Stop};
pub use error::{RoutingError, RoutingResult};
pub use pipeline::{optimize, Optimization};
pub use reconstruct::{OptimizeResponse, RouteReconstructor};
pub use solver::CvrpSolver;
