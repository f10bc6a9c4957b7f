pub mod clock;
pub mod construction;
pub mod guided_local_search;
pub mod restarts;

use std::time::Duration;

use tracing::{error, info, span, warn, Level};

use crate::config::SolverSettings;
use crate::domain::solution::print_solution;
use crate::domain::types::{ProblemInstance, Route, Solution};
use crate::error::{RoutingError, RoutingResult};

use clock::{Clock, Deadline, SystemClock};
use construction::{DemandFirstFit, PackingSearch, PathCheapestArc};
use guided_local_search::GuidedLocalSearch;
use restarts::run_restarts;

/// Builds a first feasible assignment: one route per vehicle, idle vehicles empty.
/// Strategies that search may run until `deadline`.
pub trait ConstructionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn construct(
        &self,
        instance: &ProblemInstance,
        deadline: &Deadline,
    ) -> RoutingResult<Vec<Route>>;
}

/// Improves a feasible assignment without ever leaving feasibility.
pub trait ImprovementStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn improve(
        &self,
        instance: &ProblemInstance,
        initial: Vec<Route>,
        deadline: &Deadline,
    ) -> SearchOutcome;
}

#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub initial_cost: u64,
    pub best_cost: u64,
    pub iterations: usize,
    pub best_iteration: usize,
    pub penalisations: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
    /// (iteration, distance) each time the best solution improved.
    pub best_so_far_updates: Vec<(usize, u64)>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub routes: Vec<Route>,
    pub report: SearchReport,
}

pub struct CvrpSolver {
    constructions: Vec<Box<dyn ConstructionStrategy>>,
    improvement: Box<dyn ImprovementStrategy>,
    settings: SolverSettings,
}

impl CvrpSolver {
    /// Cheapest-arc construction, falling back to first-fit and then to a
    /// packing search bounded by the deadline; guided local search after.
    pub fn new(settings: SolverSettings) -> Self {
        CvrpSolver {
            constructions: vec![
                Box::new(PathCheapestArc),
                Box::new(DemandFirstFit),
                Box::new(PackingSearch),
            ],
            improvement: Box::new(GuidedLocalSearch::new(settings.clone())),
            settings,
        }
    }

    pub fn with_constructions(mut self, constructions: Vec<Box<dyn ConstructionStrategy>>) -> Self {
        self.constructions = constructions;
        self
    }

    pub fn with_improvement(mut self, improvement: Box<dyn ImprovementStrategy>) -> Self {
        self.improvement = improvement;
        self
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// First construction strategy that succeeds wins.
    pub fn construct(
        &self,
        instance: &ProblemInstance,
        deadline: &Deadline,
    ) -> RoutingResult<Vec<Route>> {
        let construction_span = span!(Level::INFO, "construction");
        let _guard = construction_span.enter();

        for strategy in &self.constructions {
            match strategy.construct(instance, deadline) {
                Ok(routes) if routes.len() <= instance.fleet.num_vehicles => {
                    info!("Initial solution built with {}", strategy.name());
                    return Ok(routes);
                }
                Ok(routes) => warn!(
                    "{} used {} routes for {} vehicles, discarding",
                    strategy.name(),
                    routes.len(),
                    instance.fleet.num_vehicles
                ),
                Err(e) => warn!("{} failed: {}", strategy.name(), e),
            }
        }
        Err(RoutingError::NoSolutionFound)
    }

    pub fn solve(&self, instance: &ProblemInstance) -> RoutingResult<(Solution, SearchReport)> {
        self.solve_with_clock(instance, &SystemClock::new())
    }

    /// Construct, improve until the deadline, and return the best feasible solution.
    pub fn solve_with_clock(
        &self,
        instance: &ProblemInstance,
        clock: &dyn Clock,
    ) -> RoutingResult<(Solution, SearchReport)> {
        info!(
            "Solving CVRP with {} stops, {} vehicles of capacity {} ({:?} budget)",
            instance.stop_count(),
            instance.fleet.num_vehicles,
            instance.fleet.capacity,
            self.settings.time_limit
        );

        let deadline = Deadline::new(clock, self.settings.time_limit);
        let initial = self.construct(instance, &deadline)?;
        let initial_solution = Solution::from_routes(initial.clone(), instance);
        if let Some(violation) = initial_solution.feasibility_violation(instance) {
            error!("Construction produced an infeasible solution: {}", violation);
            return Err(RoutingError::NoSolutionFound);
        }
        info!("INITIAL SOLUTION:");
        print_solution(&initial_solution, instance);

        let outcome = run_restarts(
            self.improvement.as_ref(),
            instance,
            &initial,
            &self.settings,
            &deadline,
        )
        .ok_or(RoutingError::NoSolutionFound)?;

        let solution = Solution::from_routes(outcome.routes, instance).into_non_empty();
        if let Some(violation) = solution.feasibility_violation(instance) {
            error!("{} returned an infeasible solution: {}", self.improvement.name(), violation);
            return Err(RoutingError::NoSolutionFound);
        }

        info!("FINAL SOLUTION:");
        print_solution(&solution, instance);
        Ok((solution, outcome.report))
    }
}

impl Default for CvrpSolver {
    fn default() -> Self {
        CvrpSolver::new(SolverSettings::default())
    }
}
