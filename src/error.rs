use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("road graph has no nodes")]
    EmptyGraph,

    #[error("at least 2 stops required (depot + one customer), got {found}")]
    InsufficientStops { found: usize },

    #[error("stop at position {position} carries index {index}")]
    StopIndexMismatch { position: usize, index: usize },

    #[error("stop {0} is not in the stop list")]
    UnknownStop(usize),

    #[error("stop {stop} has demand {demand} above vehicle capacity {capacity}")]
    InfeasibleCapacity {
        stop: usize,
        demand: u64,
        capacity: u64,
    },

    #[error("no feasible assignment of stops to vehicles was found")]
    NoSolutionFound,

    #[error("invalid fleet: {0}")]
    InvalidFleet(String),

    #[error("invalid road graph: {0}")]
    InvalidGraph(String),

    #[error("node {0} is not part of the road graph")]
    UnknownNode(u64),
}

impl RoutingError {
    /// Stable name reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            RoutingError::EmptyGraph => "EmptyGraph",
            RoutingError::InsufficientStops { .. } => "InsufficientStops",
            RoutingError::StopIndexMismatch { .. } => "StopIndexMismatch",
            RoutingError::UnknownStop(_) => "UnknownStop",
            RoutingError::InfeasibleCapacity { .. } => "InfeasibleCapacity",
            RoutingError::NoSolutionFound => "NoSolutionFound",
            RoutingError::InvalidFleet(_) => "InvalidFleet",
            RoutingError::InvalidGraph(_) => "InvalidGraph",
            RoutingError::UnknownNode(_) => "UnknownNode",
        }
    }
}

pub type RoutingResult<T> = Result<T, RoutingError>;
