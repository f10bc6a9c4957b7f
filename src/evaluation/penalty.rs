//! Arc penalties for guided local search.
//!
//! The search minimises the augmented cost `c(i, j) + lambda * p(i, j)`. At every
//! local optimum the arcs of the current solution with the highest utility
//! `c(i, j) / (1 + p(i, j))` get their penalty raised, which pushes the search
//! away from expensive arcs it keeps returning to.

use itertools::Itertools;

use crate::distance::matrix::DistanceMatrix;
use crate::domain::types::{Route, DEPOT};

#[derive(Debug, Clone)]
pub struct EdgePenalties {
    size: usize,
    counts: Vec<u32>,
    lambda: u64,
}

impl EdgePenalties {
    pub fn new(size: usize) -> Self {
        EdgePenalties {
            size,
            counts: vec![0; size * size],
            lambda: 0,
        }
    }

    pub fn penalty(&self, from: usize, to: usize) -> u32 {
        self.counts[from * self.size + to]
    }

    pub fn lambda(&self) -> u64 {
        self.lambda
    }

    pub fn is_calibrated(&self) -> bool {
        self.lambda > 0
    }

    /// Sets `lambda = alpha * cost / arcs` from the first local optimum, at least 1.
    pub fn calibrate(&mut self, local_optimum_cost: u64, arc_count: usize, alpha: f64) {
        let per_arc = local_optimum_cost as f64 / arc_count.max(1) as f64;
        self.lambda = ((alpha * per_arc).round() as u64).max(1);
    }

    pub fn augmented_arc(&self, from: usize, to: usize, dm: &DistanceMatrix) -> u64 {
        dm.get(from, to) + self.lambda * self.penalty(from, to) as u64
    }

    /// Augmented cost of `depot -> visits.. -> depot`.
    pub fn augmented_visits(&self, visits: &[usize], dm: &DistanceMatrix) -> u64 {
        if visits.is_empty() {
            return 0;
        }
        route_arcs(visits)
            .map(|(from, to)| self.augmented_arc(from, to, dm))
            .sum()
    }

    /// Raises the penalty of every max-utility arc used by `routes`.
    /// Returns the penalised arcs; empty when no arc has positive utility.
    pub fn penalise(&mut self, routes: &[Route], dm: &DistanceMatrix) -> Vec<(usize, usize)> {
        let mut best_utility = 0.0;
        let mut chosen: Vec<(usize, usize)> = vec![];

        for route in routes.iter().filter(|route| !route.is_empty()) {
            for (from, to) in route_arcs(&route.visits) {
                let utility = dm.get(from, to) as f64 / (1.0 + self.penalty(from, to) as f64);
                if utility <= 0.0 {
                    continue;
                }
                if utility > best_utility {
                    best_utility = utility;
                    chosen.clear();
                    chosen.push((from, to));
                } else if utility == best_utility && !chosen.contains(&(from, to)) {
                    chosen.push((from, to));
                }
            }
        }

        for &(from, to) in &chosen {
            self.counts[from * self.size + to] += 1;
        }
        chosen
    }
}

/// Arcs of `depot -> visits.. -> depot`.
pub fn route_arcs(visits: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    std::iter::once(DEPOT)
        .chain(visits.iter().copied())
        .chain(std::iter::once(DEPOT))
        .tuple_windows()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dm() -> DistanceMatrix {
        DistanceMatrix::from_rows(vec![vec![0, 10, 4], vec![10, 0, 3], vec![4, 3, 0]]).unwrap()
    }

    #[test]
    fn uncalibrated_penalties_do_not_change_cost() {
        let penalties = EdgePenalties::new(3);
        assert_eq!(penalties.augmented_visits(&[1, 2], &dm()), 10 + 3 + 4);
    }

    #[test]
    fn penalise_hits_the_costliest_arcs() {
        let dm = dm();
        let mut penalties = EdgePenalties::new(3);
        let routes = vec![Route::new(vec![1, 2])];

        let first = penalties.penalise(&routes, &dm);
        assert_eq!(first, vec![(0, 1)]);
        assert_eq!(penalties.penalty(0, 1), 1);

        // utility of 0 -> 1 is now 5, still the largest
        let second = penalties.penalise(&routes, &dm);
        assert_eq!(second, vec![(0, 1)]);

        // 10 / 3 < 4, so the return arc takes over
        let third = penalties.penalise(&routes, &dm);
        assert_eq!(third, vec![(2, 0)]);
    }

    #[test]
    fn calibrated_penalties_inflate_augmented_cost() {
        let dm = dm();
        let mut penalties = EdgePenalties::new(3);
        penalties.calibrate(17, 3, 0.5);
        assert_eq!(penalties.lambda(), 3);
        penalties.penalise(&[Route::new(vec![1, 2])], &dm);
        assert_eq!(penalties.augmented_visits(&[1, 2], &dm), 17 + 3);
    }

    #[test]
    fn zero_cost_arcs_are_never_penalised() {
        let dm = DistanceMatrix::from_rows(vec![vec![0, 0], vec![0, 0]]).unwrap();
        let mut penalties = EdgePenalties::new(2);
        assert!(penalties.penalise(&[Route::new(vec![1])], &dm).is_empty());
    }
}
