use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenv::dotenv;
use tracing::warn;

pub mod constant {
    /// Cost recorded for a pair of stops with no path between their snapped nodes.
    pub const UNREACHABLE_COST: u64 = 999_999;
    pub const TIME_LIMIT_SECS: u64 = 30;
    pub const NUM_VEHICLES: usize = 1;
    pub const VEHICLE_CAPACITY: u64 = 100;
    pub const SEED: u64 = 12345;
    pub const RESTARTS: usize = 1;
    pub const GLS_ALPHA: f64 = 0.1;
    pub const MAX_ITERATIONS: usize = 100_000;
    pub const MIN_STAGNATION: usize = 300;
    pub const GRAPH_RADIUS_METERS: f64 = 5000.0;
    pub const DATABASE_URL: &str = "sqlite:waypoints.sqlite";
    pub const REPORT_CSV_PATH: &str = "best_so_far.csv";
    pub const FIXTURE_STOP_COUNT: usize = 12;
    pub const FIXTURE_MAX_DEMAND: u64 = 8;
    pub const FIXTURE_GRID_SIZE: usize = 15;
    pub const DEPOT_LAT: f64 = 1.3521;
    pub const DEPOT_LON: f64 = 103.8198;
}

/// Knobs for a single solver run.
#[derive(Debug, Clone)]
pub struct SolverSettings {
    pub time_limit: Duration,
    pub restarts: usize,
    pub seed: u64,
    pub gls_alpha: f64,
    pub max_iterations: usize,
    /// Penalisation rounds without a new best before the search gives up.
    /// `None` derives the limit from the instance size.
    pub max_stagnation: Option<usize>,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            time_limit: Duration::from_secs(constant::TIME_LIMIT_SECS),
            restarts: constant::RESTARTS,
            seed: constant::SEED,
            gls_alpha: constant::GLS_ALPHA,
            max_iterations: constant::MAX_ITERATIONS,
            max_stagnation: None,
        }
    }
}

impl SolverSettings {
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_gls_alpha(mut self, gls_alpha: f64) -> Self {
        self.gls_alpha = gls_alpha;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_stagnation(mut self, max_stagnation: usize) -> Self {
        self.max_stagnation = Some(max_stagnation);
        self
    }

    /// Stagnation limit for an instance with `stop_count` stops.
    pub fn stagnation_limit(&self, stop_count: usize) -> usize {
        self.max_stagnation
            .unwrap_or_else(|| calculate_max_no_improvement(stop_count))
    }
}

/// Scales superlinearly with instance size, with a floor for small instances.
pub fn calculate_max_no_improvement(stop_count: usize) -> usize {
    let scaling_factor = if stop_count < 50 { 15.0 } else { 9.0 };
    std::cmp::max(
        constant::MIN_STAGNATION,
        (scaling_factor * (stop_count as f64).powf(1.33)) as usize,
    )
}

/// Settings of the `route-optimizer` binary, read from the environment.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub database_url: String,
    pub road_graph_path: Option<String>,
    pub num_vehicles: usize,
    pub vehicle_capacity: u64,
    pub report_csv_path: String,
    pub solver: SolverSettings,
}

impl RunSettings {
    pub fn from_env() -> Self {
        dotenv().ok();

        let defaults = SolverSettings::default();
        let solver = SolverSettings::default()
            .with_time_limit(Duration::from_secs(env_or(
                "SOLVER_TIME_LIMIT_SECS",
                defaults.time_limit.as_secs(),
            )))
            .with_restarts(env_or("SOLVER_RESTARTS", defaults.restarts))
            .with_seed(env_or("SOLVER_SEED", defaults.seed));

        RunSettings {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| {
                warn!("DATABASE_URL not set, using default SQLite file");
                constant::DATABASE_URL.to_string()
            }),
            road_graph_path: env::var("ROAD_GRAPH_PATH").ok(),
            num_vehicles: env_or("NUM_VEHICLES", constant::NUM_VEHICLES),
            vehicle_capacity: env_or("VEHICLE_CAPACITY", constant::VEHICLE_CAPACITY),
            report_csv_path: env::var("REPORT_CSV_PATH")
                .unwrap_or_else(|_| constant::REPORT_CSV_PATH.to_string()),
            solver,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Could not parse {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}
