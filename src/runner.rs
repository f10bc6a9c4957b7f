use std::error::Error;
use std::fs::File;
use std::io::BufReader;

use colored::*;
use csv::Writer;
use dotenv::dotenv;
use tracing::{error, info, span, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::constant::{
    DEPOT_LAT, DEPOT_LON, FIXTURE_GRID_SIZE, FIXTURE_STOP_COUNT, GRAPH_RADIUS_METERS, SEED,
};
use crate::config::RunSettings;
use crate::database::sqlx::{add_waypoint, db_connection, get_waypoints};
use crate::domain::solution::route_load;
use crate::domain::types::{Coordinate, Fleet, Stop};
use crate::fixtures::data_generator::{generate_grid_graph, generate_random_inputs};
use crate::graph::road_graph::RoadGraph;
use crate::pipeline::{optimize, Optimization};
use crate::reconstruct::OptimizeResponse;

/// Initialize tracing and environment
fn init_tracing_and_env() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                .pretty(),
        )
        .init();

    dotenv().ok();
    Ok(())
}

/// Stored waypoints, or freshly generated ones written to the store when it is empty.
async fn load_stops(pool: &sqlx::SqlitePool) -> Result<Vec<Stop>, Box<dyn Error>> {
    let stops = get_waypoints(pool).await?;
    if !stops.is_empty() {
        return Ok(stops);
    }

    warn!("No waypoints stored, seeding {} generated stops", FIXTURE_STOP_COUNT);
    let (generated, _) = generate_random_inputs(FIXTURE_STOP_COUNT, SEED)?;
    for stop in &generated {
        add_waypoint(pool, &stop.coordinate, stop.demand).await?;
    }
    Ok(get_waypoints(pool).await?)
}

/// Road graph from `ROAD_GRAPH_PATH`, or the generated grid around the depot.
fn load_graph(settings: &RunSettings) -> Result<RoadGraph, Box<dyn Error>> {
    match &settings.road_graph_path {
        Some(path) => {
            info!("Loading road graph from {}", path);
            let reader = BufReader::new(File::open(path)?);
            Ok(RoadGraph::from_json_reader(reader)?)
        }
        None => {
            warn!("ROAD_GRAPH_PATH not set, using the generated grid");
            let depot = Coordinate::new(DEPOT_LAT, DEPOT_LON);
            Ok(generate_grid_graph(&depot, GRAPH_RADIUS_METERS, FIXTURE_GRID_SIZE)?)
        }
    }
}

fn print_summary(optimization: &Optimization, stops: &[Stop], fleet: &Fleet) {
    let demands: Vec<u64> = stops.iter().map(|stop| stop.demand).collect();
    for (vehicle, route) in optimization.solution.non_empty_routes().enumerate() {
        let path = route
            .sequence()
            .iter()
            .map(|stop| stop.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        println!(
            "{} {} {}",
            format!("Vehicle {}:", vehicle + 1).bold(),
            path,
            format!("(load {}/{})", route_load(route, &demands), fleet.capacity).cyan()
        );
    }

    let report = &optimization.report;
    println!(
        "{} , {}",
        format_args!("Distance: {} m", optimization.solution.cost)
            .to_string()
            .green(),
        format!(
            "initial {} m, {} iterations, {} penalisations{}",
            report.initial_cost,
            report.iterations,
            report.penalisations,
            if report.timed_out { ", deadline hit" } else { "" }
        )
    );
}

fn save_to_csv(
    best_so_far_updates: &[(usize, u64)],
    best_iteration: usize,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_path(filename)?;

    wtr.write_record(["iteration", "new_best_so_far", "best_iteration"])?;

    for (iteration, value) in best_so_far_updates {
        wtr.write_record([
            iteration.to_string(),
            value.to_string(),
            best_iteration.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    init_tracing_and_env()?;
    let settings = RunSettings::from_env();
    let db_pool = db_connection(&settings.database_url).await?;

    let stops = load_stops(&db_pool).await?;
    let graph = load_graph(&settings)?;
    let fleet = Fleet::new(settings.num_vehicles, settings.vehicle_capacity);

    info!(
        "Starting route optimizer with {} stops, {} vehicles of capacity {}",
        stops.len(),
        fleet.num_vehicles,
        fleet.capacity
    );

    let input = stops.clone();
    let solver_settings = settings.solver.clone();
    let result = tokio::task::spawn_blocking(move || {
        let span = span!(Level::INFO, "optimize");
        let _guard = span.enter();
        optimize(&input, fleet, &graph, &solver_settings)
    })
    .await?;

    let response = match result {
        Ok(optimization) => {
            print_summary(&optimization, &stops, &fleet);
            save_to_csv(
                &optimization.report.best_so_far_updates,
                optimization.report.best_iteration,
                &settings.report_csv_path,
            )?;
            info!("Best-so-far history written to {}", settings.report_csv_path);
            OptimizeResponse::from_result(Ok(optimization.routes))
        }
        Err(e) => {
            error!("Optimization failed: {}", e);
            println!("{}", format!("Optimization failed: {}", e).red());
            OptimizeResponse::from(&e)
        }
    };

    println!("{}", response.to_json()?);
    Ok(())
}
