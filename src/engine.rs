use crate::{
    cache::{reconstruct_bounded, SolverCache},
    config::SolverConfig,
    error::{PuzzleError, Result},
    puzzle::{Move, State, GOAL},
    search::{SearchOutcome, Solver},
};
use log::{debug, warn};
use std::{
    sync::{atomic::AtomicBool, Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Reconstructed,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub path: Vec<Move>,
    pub expanded: u64,
    pub elapsed: Duration,
    pub source: Source,
}

impl Solution {
    fn from_outcome(outcome: SearchOutcome, source: Source) -> Self {
        Self {
            path: outcome.path,
            expanded: outcome.expanded,
            elapsed: outcome.elapsed,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceQuery {
    pub moves: u8,
    pub expanded: u64,
    pub source: Source,
}

/// Minimum move count as shown to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMoves {
    Exact(u8),
    /// Admissible lower bound; the search gave up before proving a distance.
    Estimate(u8),
    Unsolvable,
}

/// Goal-directed solver sitting behind a shared [`SolverCache`]. Clones share
/// the cache.
#[derive(Debug, Clone)]
pub struct Engine {
    solver: Solver,
    cache: Arc<Mutex<SolverCache>>,
}

impl Engine {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_cache(config, SolverCache::new())
    }

    pub fn with_cache(config: SolverConfig, cache: SolverCache) -> Self {
        Self {
            solver: Solver::new(config),
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// A handle on the same cache whose searches stop once `cancel` is set.
    #[must_use]
    pub fn with_cancel(&self, cancel: Arc<AtomicBool>) -> Self {
        Self {
            solver: self.solver.clone().with_cancel(cancel),
            cache: Arc::clone(&self.cache),
        }
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    pub fn cache(&self) -> MutexGuard<'_, SolverCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn distance(&self, state: &State) -> Result<DistanceQuery> {
        self.distance_if(state, || true)
    }

    pub fn distance_if(&self, state: &State, commit: impl Fn() -> bool) -> Result<DistanceQuery> {
        if let Some(moves) = self.cache().lookup_distance(state) {
            debug!("Cache hit: {moves} moves");
            return Ok(DistanceQuery {
                moves,
                expanded: 0,
                source: Source::Cache,
            });
        }
        let solution = self.solve_if(state, commit)?;
        Ok(DistanceQuery {
            moves: solution.path.len() as u8,
            expanded: solution.expanded,
            source: solution.source,
        })
    }

    pub fn min_moves(&self, state: &State) -> Result<MinMoves> {
        self.min_moves_if(state, || true)
    }

    /// Like [`Engine::distance_if`], but an unsolvable state or a search
    /// that gave up is an answer rather than an error.
    pub fn min_moves_if(&self, state: &State, commit: impl Fn() -> bool) -> Result<MinMoves> {
        match self.distance_if(state, commit) {
            Ok(query) => Ok(MinMoves::Exact(query.moves)),
            Err(PuzzleError::Unsolvable) => Ok(MinMoves::Unsolvable),
            Err(PuzzleError::SearchTimedOut { .. } | PuzzleError::BoundLimitExceeded { .. }) => {
                let estimate = self
                    .cache()
                    .entry(state)
                    .map(|entry| entry.distance)
                    .unwrap_or_else(|| self.solver.estimate(state) as u8);
                warn!("Reporting estimate of {estimate} moves, not a proven minimum");
                Ok(MinMoves::Estimate(estimate))
            }
            Err(err) => Err(err),
        }
    }

    pub fn solve(&self, state: &State) -> Result<Solution> {
        self.solve_if(state, || true)
    }

    /// Solves `state`, writing the result back only if `commit` still holds
    /// once the search is over. `commit` runs under the cache lock, so a
    /// session can drop results from searches it has moved on from.
    pub fn solve_if(&self, state: &State, commit: impl Fn() -> bool) -> Result<Solution> {
        if !state.is_solvable() {
            return Err(PuzzleError::Unsolvable);
        }

        let (cached, known) = {
            let cache = self.cache();
            (cache.cached_path(state), cache.lookup_distance(state))
        };
        if let Some(path) = cached {
            debug!("Answered {}-move solve from path cache", path.len());
            return Ok(Solution {
                path,
                expanded: 0,
                elapsed: Duration::ZERO,
                source: Source::Cache,
            });
        }

        let result = match known {
            Some(known) => match reconstruct_bounded(&self.solver, state, &GOAL, known) {
                Ok(outcome) => Ok(Solution::from_outcome(outcome, Source::Reconstructed)),
                Err(PuzzleError::NoSolution) => {
                    warn!("No path within cached distance {known}, searching from scratch");
                    self.solver
                        .solve(state)
                        .map(|outcome| Solution::from_outcome(outcome, Source::Search))
                }
                Err(err) => Err(err),
            },
            None => self
                .solver
                .solve(state)
                .map(|outcome| Solution::from_outcome(outcome, Source::Search)),
        };

        let mut cache = self.cache();
        match result {
            Ok(solution) => {
                if commit() {
                    cache.record_solution(*state, &solution.path)?;
                }
                Ok(solution)
            }
            Err(err @ PuzzleError::SearchTimedOut { .. }) => {
                if commit() {
                    cache.record_estimate(*state, self.solver.estimate(state) as u8);
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}
