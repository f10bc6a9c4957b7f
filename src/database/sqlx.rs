use chrono::Utc;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use crate::domain::types::{Coordinate, Stop};

/// Opens (creating if missing) the waypoint store at `database_url`.
pub async fn db_connection(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    // a single connection keeps `sqlite::memory:` databases shared across queries
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    info!("Connected to SQLite database at {database_url}");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS waypoints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            demand INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Appends a waypoint; the first one stored is the depot. Returns its row id.
pub async fn add_waypoint(
    pool: &SqlitePool,
    coordinate: &Coordinate,
    demand: u64,
) -> Result<i64, sqlx::Error> {
    let demand = i64::try_from(demand).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let result = sqlx::query(
        r#"
        INSERT INTO waypoints (lat, lon, demand, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(coordinate.lat)
    .bind(coordinate.lon)
    .bind(demand)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    debug!(
        "Stored waypoint {} at ({:.6}, {:.6}) with demand {}",
        id, coordinate.lat, coordinate.lon, demand
    );
    Ok(id)
}

/// All waypoints in insertion order as stops; stop 0 is the depot.
pub async fn get_waypoints(pool: &SqlitePool) -> Result<Vec<Stop>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, (f64, f64, i64)>(
        "SELECT lat, lon, demand FROM waypoints ORDER BY id",
    )
    .fetch(pool);

    let mut stops = Vec::new();
    while let Some((lat, lon, demand)) = rows.try_next().await? {
        let demand = u64::try_from(demand).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        stops.push(Stop::new(stops.len(), lat, lon, demand));
    }
    info!("Loaded {} waypoints from the database", stops.len());
    Ok(stops)
}

/// Removes every waypoint. Returns how many were deleted.
pub async fn clear_waypoints(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM waypoints").execute(pool).await?;
    info!("Cleared {} waypoints", result.rows_affected());
    Ok(result.rows_affected())
}
