use itertools::Itertools;

use crate::distance::matrix::DistanceMatrix;
use crate::domain::types::{Route, DEPOT};

/// Total distance over all routes.
pub fn find_distance(routes: &[Route], dm: &DistanceMatrix) -> u64 {
    routes.iter().map(|route| route_distance(route, dm)).sum()
}

pub fn route_distance(route: &Route, dm: &DistanceMatrix) -> u64 {
    visits_distance(&route.visits, dm)
}

/// Distance of `depot -> visits.. -> depot`; zero for an idle vehicle.
pub fn visits_distance(visits: &[usize], dm: &DistanceMatrix) -> u64 {
    if visits.is_empty() {
        return 0;
    }

    std::iter::once(DEPOT)
        .chain(visits.iter().copied())
        .chain(std::iter::once(DEPOT))
        .tuple_windows()
        .map(|(from, to)| dist_between(from, to, dm))
        .sum()
}

pub fn dist_between(from_loc: usize, to_loc: usize, dm: &DistanceMatrix) -> u64 {
    dm.get(from_loc, to_loc)
}
