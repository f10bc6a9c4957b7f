use serde::{Deserialize, Serialize};
use tracing::{debug, span, Level};

use crate::domain::types::{Coordinate, Solution, Stop};
use crate::error::{RoutingError, RoutingResult};

/// Turns routes of stop indices back into coordinate sequences.
///
/// Stop `i` of a route is looked up as `stops[i]`; a stop missing from
/// `stops` is an error. Routes with no visits are dropped. By default the
/// depot is left out at both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteReconstructor {
    pub include_depot: bool,
}

impl RouteReconstructor {
    pub fn new() -> Self {
        RouteReconstructor::default()
    }

    pub fn with_depot(include_depot: bool) -> Self {
        RouteReconstructor { include_depot }
    }

    pub fn reconstruct(
        &self,
        solution: &Solution,
        stops: &[Stop],
    ) -> RoutingResult<Vec<Vec<Coordinate>>> {
        let reconstruct_span = span!(Level::INFO, "reconstruct");
        let _guard = reconstruct_span.enter();

        let routes: Vec<Vec<Coordinate>> = solution
            .non_empty_routes()
            .map(|route| {
                let stop_ids = if self.include_depot {
                    route.sequence()
                } else {
                    route.visits.clone()
                };
                stop_ids
                    .into_iter()
                    .map(|i| {
                        stops
                            .get(i)
                            .map(|stop| stop.coordinate)
                            .ok_or(RoutingError::UnknownStop(i))
                    })
                    .collect::<RoutingResult<Vec<Coordinate>>>()
            })
            .collect::<RoutingResult<_>>()?;

        debug!(
            "Reconstructed {} routes ({} depot anchors)",
            routes.len(),
            if self.include_depot { "with" } else { "without" }
        );
        Ok(routes)
    }
}

/// What callers of the optimizer receive, as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptimizeResponse {
    Routes { routes: Vec<Vec<Coordinate>> },
    Error { error: String },
}

impl OptimizeResponse {
    pub fn from_result(result: RoutingResult<Vec<Vec<Coordinate>>>) -> Self {
        match result {
            Ok(routes) => OptimizeResponse::Routes { routes },
            Err(e) => OptimizeResponse::from(&e),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, OptimizeResponse::Error { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&RoutingError> for OptimizeResponse {
    fn from(error: &RoutingError) -> Self {
        OptimizeResponse::Error {
            error: error.kind().to_string(),
        }
    }
}
