use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::SolverSettings;
use crate::domain::solution::fits_capacity;
use crate::domain::types::{ProblemInstance, Route};
use crate::solver::clock::Deadline;
use crate::solver::guided_local_search::neighbourhood::{is_path_usable, route_loads};
use crate::solver::{ImprovementStrategy, SearchOutcome};

/// Runs independent searches against the same deadline and keeps the cheapest.
/// Restart 0 starts from `initial`; restart k perturbs it with seed `seed + k`.
/// Ties go to the lowest restart.
pub fn run_restarts(
    improvement: &dyn ImprovementStrategy,
    instance: &ProblemInstance,
    initial: &[Route],
    settings: &SolverSettings,
    deadline: &Deadline,
) -> Option<SearchOutcome> {
    let restarts = settings.restarts.max(1);
    info!("Running {} search restart(s)", restarts);

    let outcomes: Vec<(usize, SearchOutcome)> = (0..restarts)
        .into_par_iter()
        .map(|restart| {
            let mut routes = initial.to_vec();
            if restart > 0 {
                let mut rng = ChaCha8Rng::seed_from_u64(settings.seed.wrapping_add(restart as u64));
                let moved = perturb(&mut routes, instance, &mut rng);
                debug!("Restart {} perturbed {} stops", restart, moved);
            }
            (restart, improvement.improve(instance, routes, deadline))
        })
        .collect();

    let (winner, outcome) = outcomes
        .into_iter()
        .min_by_key(|(restart, outcome)| (outcome.report.best_cost, *restart))?;
    info!(
        "Restart {} won with distance {}",
        winner, outcome.report.best_cost
    );
    Some(outcome)
}

/// Random feasible relocations of single stops; returns how many were applied.
pub fn perturb(routes: &mut [Route], instance: &ProblemInstance, rng: &mut ChaCha8Rng) -> usize {
    let mut loads = route_loads(routes, &instance.demands);
    let attempts = instance.stop_count();
    let mut moved = 0;

    for _ in 0..attempts {
        let source = rng.gen_range(0..routes.len());
        if routes[source].is_empty() {
            continue;
        }
        let from = rng.gen_range(0..routes[source].len());
        let target = rng.gen_range(0..routes.len());
        let stop = routes[source].visits[from];
        let demand = instance.demands[stop];
        if source != target && !fits_capacity(loads[target], demand, instance.fleet.capacity) {
            continue;
        }

        let mut new_source = routes[source].visits.clone();
        new_source.remove(from);
        let mut new_target = if source == target {
            new_source.clone()
        } else {
            routes[target].visits.clone()
        };
        let to = rng.gen_range(0..=new_target.len());
        new_target.insert(to, stop);

        let dm = &instance.distance_matrix;
        if !is_path_usable(&new_target, dm)
            || (source != target && !is_path_usable(&new_source, dm))
        {
            continue;
        }

        if source != target {
            routes[source].visits = new_source;
            loads[source] -= demand;
            loads[target] += demand;
        }
        routes[target].visits = new_target;
        moved += 1;
    }
    moved
}
