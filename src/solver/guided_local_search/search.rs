use tracing::{debug, info, span, trace, Level};

use crate::config::SolverSettings;
use crate::domain::types::{ProblemInstance, Route};
use crate::evaluation::fitness::find_distance;
use crate::evaluation::penalty::EdgePenalties;
use crate::solver::clock::Deadline;
use crate::solver::{ImprovementStrategy, SearchOutcome, SearchReport};

use super::neighbourhood::{arc_count, find_best_move, route_loads};

/// Best-improvement local search (2-opt, or-opt) that escapes local optima by
/// penalising high-utility arcs. Stops on the deadline, the iteration budget,
/// or after too many penalisation rounds without a new best.
pub struct GuidedLocalSearch {
    settings: SolverSettings,
}

impl GuidedLocalSearch {
    pub fn new(settings: SolverSettings) -> Self {
        GuidedLocalSearch { settings }
    }
}

struct SearchState {
    current: Vec<Route>,
    loads: Vec<u64>,
    best: Vec<Route>,
    best_cost: u64,
    best_iteration: usize,
    improved_since_penalisation: bool,
    stagnation: usize,
    report: SearchReport,
}

impl SearchState {
    fn new(initial: Vec<Route>, instance: &ProblemInstance) -> Self {
        let cost = find_distance(&initial, &instance.distance_matrix);
        SearchState {
            loads: route_loads(&initial, &instance.demands),
            best: initial.clone(),
            current: initial,
            best_cost: cost,
            best_iteration: 0,
            improved_since_penalisation: false,
            stagnation: 0,
            report: SearchReport {
                initial_cost: cost,
                best_cost: cost,
                best_so_far_updates: vec![(0, cost)],
                ..SearchReport::default()
            },
        }
    }

    fn record_if_best(&mut self, instance: &ProblemInstance, iteration: usize) {
        let cost = find_distance(&self.current, &instance.distance_matrix);
        if cost < self.best_cost {
            self.best = self.current.clone();
            self.best_cost = cost;
            self.best_iteration = iteration;
            self.improved_since_penalisation = true;
            self.report.best_so_far_updates.push((iteration, cost));
            debug!("New best at iteration {}: distance = {}", iteration, cost);
        }
    }
}

impl ImprovementStrategy for GuidedLocalSearch {
    fn name(&self) -> &'static str {
        "guided_local_search"
    }

    fn improve(
        &self,
        instance: &ProblemInstance,
        initial: Vec<Route>,
        deadline: &Deadline,
    ) -> SearchOutcome {
        let search_span = span!(Level::DEBUG, "guided_local_search");
        let _guard = search_span.enter();

        let max_stagnation = self.settings.stagnation_limit(instance.stop_count());
        let mut penalties = EdgePenalties::new(instance.stop_count());
        let mut state = SearchState::new(initial, instance);
        let mut iteration = 0;

        loop {
            if deadline.expired() {
                state.report.timed_out = true;
                debug!("Deadline reached after {} iterations", iteration);
                break;
            }
            if iteration >= self.settings.max_iterations {
                debug!("Iteration budget of {} exhausted", iteration);
                break;
            }

            if let Some((delta, mv)) =
                find_best_move(&state.current, &state.loads, instance, &penalties)
            {
                iteration += 1;
                mv.apply(&mut state.current, &mut state.loads, &instance.demands);
                trace!("Iteration {}: applied {:?} ({})", iteration, mv, delta);
                state.record_if_best(instance, iteration);
                continue;
            }

            // local optimum under the augmented cost
            if self.settings.gls_alpha <= 0.0 {
                debug!("Local optimum reached, penalties disabled");
                break;
            }
            if !penalties.is_calibrated() {
                let cost = find_distance(&state.current, &instance.distance_matrix);
                penalties.calibrate(cost, arc_count(&state.current), self.settings.gls_alpha);
                debug!("Calibrated lambda = {}", penalties.lambda());
            }

            let penalised = penalties.penalise(&state.current, &instance.distance_matrix);
            if penalised.is_empty() {
                debug!("No arc left to penalise");
                break;
            }
            state.report.penalisations += 1;
            trace!("Penalised arcs {:?}", penalised);

            if state.improved_since_penalisation {
                state.stagnation = 0;
                state.improved_since_penalisation = false;
            } else {
                state.stagnation += 1;
                if state.stagnation >= max_stagnation {
                    debug!(
                        "Stopping after {} penalisation rounds without improvement",
                        state.stagnation
                    );
                    break;
                }
            }
        }

        state.report.iterations = iteration;
        state.report.best_cost = state.best_cost;
        state.report.best_iteration = state.best_iteration;
        state.report.elapsed = deadline.elapsed();
        info!(
            "Search finished: distance {} -> {} in {} iterations ({} penalisations)",
            state.report.initial_cost,
            state.report.best_cost,
            state.report.iterations,
            state.report.penalisations
        );

        SearchOutcome {
            routes: state.best,
            report: state.report,
        }
    }
}
