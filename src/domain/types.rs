use serde::{Deserialize, Serialize};

use crate::config::constant::UNREACHABLE_COST;
use crate::distance::matrix::DistanceMatrix;
use crate::error::{RoutingError, RoutingResult};

pub const DEPOT: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinate { lat, lon }
    }
}

/// A location to visit. Index 0 is the depot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub index: usize,
    pub coordinate: Coordinate,
    pub demand: u64,
}

impl Stop {
    pub fn new(index: usize, lat: f64, lon: f64, demand: u64) -> Self {
        Stop {
            index,
            coordinate: Coordinate::new(lat, lon),
            demand,
        }
    }

    pub fn depot(lat: f64, lon: f64) -> Self {
        Stop::new(DEPOT, lat, lon, 0)
    }

    pub fn is_depot(&self) -> bool {
        self.index == DEPOT
    }
}

/// Homogeneous vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub num_vehicles: usize,
    pub capacity: u64,
}

impl Fleet {
    pub fn new(num_vehicles: usize, capacity: u64) -> Self {
        Fleet {
            num_vehicles,
            capacity,
        }
    }

    pub fn validate(&self) -> RoutingResult<()> {
        if self.num_vehicles == 0 {
            return Err(RoutingError::InvalidFleet(
                "at least one vehicle is required".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(RoutingError::InvalidFleet(
                "vehicle capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// One vehicle's tour. `visits` holds the customer stops in order; the depot
/// at both ends is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    pub visits: Vec<usize>,
}

impl Route {
    pub fn new(visits: Vec<usize>) -> Self {
        Route { visits }
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Depot-anchored stop sequence: `0, visits.., 0`.
    pub fn sequence(&self) -> Vec<usize> {
        let mut sequence = Vec::with_capacity(self.visits.len() + 2);
        sequence.push(DEPOT);
        sequence.extend_from_slice(&self.visits);
        sequence.push(DEPOT);
        sequence
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub routes: Vec<Route>,
    pub cost: u64,
}

/// Everything the solver needs: costs, demands and the fleet.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    pub distance_matrix: DistanceMatrix,
    pub demands: Vec<u64>,
    pub fleet: Fleet,
}

impl ProblemInstance {
    /// Validates the instance. The depot demand is forced to zero.
    pub fn new(
        distance_matrix: DistanceMatrix,
        mut demands: Vec<u64>,
        fleet: Fleet,
    ) -> RoutingResult<Self> {
        if demands.len() < 2 {
            return Err(RoutingError::InsufficientStops {
                found: demands.len(),
            });
        }
        fleet.validate()?;
        if distance_matrix.size() != demands.len() {
            return Err(RoutingError::InvalidGraph(format!(
                "distance matrix is {0}x{0} but {1} demands were given",
                distance_matrix.size(),
                demands.len()
            )));
        }
        demands[DEPOT] = 0;
        if let Some((stop, &demand)) = demands
            .iter()
            .enumerate()
            .find(|(_, &demand)| demand > fleet.capacity)
        {
            return Err(RoutingError::InfeasibleCapacity {
                stop,
                demand,
                capacity: fleet.capacity,
            });
        }

        Ok(ProblemInstance {
            distance_matrix,
            demands,
            fleet,
        })
    }

    pub fn stop_count(&self) -> usize {
        self.demands.len()
    }

    pub fn customers(&self) -> impl Iterator<Item = usize> {
        1..self.demands.len()
    }

    pub fn cost(&self, from: usize, to: usize) -> u64 {
        self.distance_matrix.get(from, to)
    }

    /// An arc is usable unless it carries the unreachable sentinel.
    pub fn is_arc_usable(&self, from: usize, to: usize) -> bool {
        self.cost(from, to) < UNREACHABLE_COST
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(n: usize) -> DistanceMatrix {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0 } else { 1 }).collect())
            .collect();
        DistanceMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn route_sequence_is_depot_anchored() {
        assert_eq!(Route::new(vec![2, 1]).sequence(), vec![0, 2, 1, 0]);
    }

    #[test]
    fn instance_rejects_single_stop() {
        let err = ProblemInstance::new(matrix(1), vec![0], Fleet::new(1, 10)).unwrap_err();
        assert_eq!(err, RoutingError::InsufficientStops { found: 1 });
    }

    #[test]
    fn instance_rejects_oversized_demand() {
        let err = ProblemInstance::new(matrix(3), vec![0, 5, 11], Fleet::new(2, 10)).unwrap_err();
        assert_eq!(
            err,
            RoutingError::InfeasibleCapacity {
                stop: 2,
                demand: 11,
                capacity: 10
            }
        );
    }

    #[test]
    fn instance_forces_depot_demand_to_zero() {
        let instance = ProblemInstance::new(matrix(2), vec![40, 5], Fleet::new(1, 10)).unwrap();
        assert_eq!(instance.demands, vec![0, 5]);
    }

    #[test]
    fn fleet_needs_a_vehicle_and_capacity() {
        assert!(Fleet::new(0, 10).validate().is_err());
        assert!(Fleet::new(1, 0).validate().is_err());
        assert!(Fleet::new(1, 1).validate().is_ok());
    }
}
