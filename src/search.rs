use crate::{
    config::{Algorithm, SolverConfig},
    error::{PuzzleError, Result},
    heuristic::TargetLayout,
    puzzle::{Move, State},
    queue::{OpenSet, SearchNode},
};
use fxhash::{FxHashMap, FxHashSet};
use log::{debug, info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub path: Vec<Move>,
    pub expanded: u64,
    pub elapsed: Duration,
}

impl SearchOutcome {
    pub fn moves(&self) -> usize {
        self.path.len()
    }
}

/// The return type of one depth-first pass of IDA*. Running out of budget
/// is an error, not a pass result.
enum Descent {
    Found,
    /// Smallest `f` seen beyond the bound; `u32::MAX` if nothing was cut off.
    Exceeded(u32),
}

struct Budget<'a> {
    started: Instant,
    limit: Duration,
    interval: u64,
    cancel: Option<&'a AtomicBool>,
}

impl Budget<'_> {
    fn check(&self, expanded: u64) -> Result<()> {
        if expanded % self.interval != 0 {
            return Ok(());
        }
        if self
            .cancel
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(PuzzleError::Cancelled);
        }
        let elapsed = self.started.elapsed();
        if elapsed >= self.limit {
            return Err(PuzzleError::SearchTimedOut { elapsed, expanded });
        }
        Ok(())
    }
}

struct IdaFrame<'a> {
    path: Vec<Move>,
    on_path: FxHashSet<State>,
    expanded: u64,
    budget: Budget<'a>,
}

/// Optimal solver towards a fixed target, the goal unless told otherwise.
#[derive(Debug, Clone)]
pub struct Solver {
    config: SolverConfig,
    layout: TargetLayout,
    cancel: Option<Arc<AtomicBool>>,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            layout: TargetLayout::goal(),
            cancel: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: State) -> Self {
        self.layout = TargetLayout::new(target);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn target(&self) -> &State {
        self.layout.target()
    }

    pub fn estimate(&self, state: &State) -> u32 {
        self.config.heuristic.estimate(state, &self.layout)
    }

    /// Runs whichever strategy the configuration selects.
    pub fn solve(&self, start: &State) -> Result<SearchOutcome> {
        match self.config.algorithm {
            Algorithm::AStar => self.a_star(start),
            Algorithm::IdaStar => self.ida_star(start),
        }
    }

    /// Graph-search A*. Fails with [`PuzzleError::SearchTimedOut`] rather
    /// than return a path it has not proven shortest.
    pub fn a_star(&self, start: &State) -> Result<SearchOutcome> {
        self.check_reachable(start)?;
        let outcome = self.a_star_within(start, None)?;
        info!(
            "A* found {} moves in {:?} ({} nodes expanded)",
            outcome.moves(),
            outcome.elapsed,
            outcome.expanded
        );
        Ok(outcome)
    }

    /// A* that never extends a path beyond `bound` moves. Used to recover an
    /// explicit path for a state whose exact distance is already known.
    pub fn bounded_a_star(&self, start: &State, bound: u32) -> Result<SearchOutcome> {
        self.check_reachable(start)?;
        let outcome = self.a_star_within(start, Some(bound))?;
        debug!(
            "Rebuilt {}-move path in {:?} ({} nodes expanded)",
            outcome.moves(),
            outcome.elapsed,
            outcome.expanded
        );
        Ok(outcome)
    }

    /// Iterative deepening A*: depth-first passes under a cost bound that
    /// starts at the heuristic estimate and rises to the smallest `f` that
    /// was cut off. Duplicate detection only covers states on the current
    /// path, which keeps memory proportional to the solution length.
    pub fn ida_star(&self, start: &State) -> Result<SearchOutcome> {
        self.check_reachable(start)?;

        let mut frame = IdaFrame {
            path: Vec::new(),
            on_path: FxHashSet::default(),
            expanded: 0,
            budget: self.budget(),
        };
        frame.on_path.insert(*start);

        let mut bound = self.estimate(start);
        for iteration in 0..self.config.max_bound_iterations {
            debug!("IDA* iteration {iteration} with bound {bound}");
            let descent = match self.descend(&mut frame, start, 0, bound) {
                Ok(descent) => descent,
                Err(err) => {
                    warn!("IDA* stopped at bound {bound}: {err}");
                    return Err(err);
                }
            };
            match descent {
                Descent::Found => {
                    let outcome = SearchOutcome {
                        path: frame.path,
                        expanded: frame.expanded,
                        elapsed: frame.budget.started.elapsed(),
                    };
                    info!(
                        "IDA* found {} moves in {:?} ({} nodes expanded)",
                        outcome.moves(),
                        outcome.elapsed,
                        outcome.expanded
                    );
                    return Ok(outcome);
                }
                Descent::Exceeded(u32::MAX) => return Err(PuzzleError::NoSolution),
                Descent::Exceeded(next) => bound = next,
            }
        }

        Err(PuzzleError::BoundLimitExceeded {
            bound,
            iterations: self.config.max_bound_iterations,
        })
    }

    fn descend(
        &self,
        frame: &mut IdaFrame,
        state: &State,
        g: u32,
        bound: u32,
    ) -> Result<Descent> {
        frame.budget.check(frame.expanded)?;
        frame.expanded += 1;

        let f = g + self.estimate(state);
        if f > bound {
            return Ok(Descent::Exceeded(f));
        }
        if state == self.target() {
            return Ok(Descent::Found);
        }

        let mut min = u32::MAX;
        for (next, mv) in state.neighbors() {
            if !frame.on_path.insert(next) {
                continue;
            }
            frame.path.push(mv);

            match self.descend(frame, &next, g + 1, bound)? {
                Descent::Found => return Ok(Descent::Found),
                Descent::Exceeded(t) => min = min.min(t),
            }

            frame.path.pop();
            frame.on_path.remove(&next);
        }

        Ok(Descent::Exceeded(min))
    }

    fn a_star_within(&self, start: &State, bound: Option<u32>) -> Result<SearchOutcome> {
        let budget = self.budget();
        let within = |cost: u32| bound.map_or(true, |limit| cost <= limit);

        let mut open = OpenSet::new();
        let mut g_scores = FxHashMap::<State, u32>::default();
        let mut closed = FxHashSet::<State>::default();

        open.push(SearchNode::root(*start, self.estimate(start)));
        g_scores.insert(*start, 0);

        let mut popped = 0u64;
        let mut expanded = 0u64;
        while let Some(current) = open.pop() {
            if let Err(err) = budget.check(popped) {
                warn!("A* stopped after {expanded} expansions: {err}");
                return Err(err);
            }
            popped += 1;

            if current.state == *self.target() {
                return Ok(SearchOutcome {
                    path: current.path,
                    expanded,
                    elapsed: budget.started.elapsed(),
                });
            }
            if !closed.insert(current.state) {
                continue;
            }
            expanded += 1;

            for (next, mv) in current.state.neighbors() {
                let g = current.g + 1;
                if g_scores.get(&next).is_some_and(|&best| best <= g) {
                    continue;
                }
                let h = self.estimate(&next);
                if !within(g + h) {
                    continue;
                }
                g_scores.insert(next, g);
                open.push(current.child(next, mv, h));
            }
        }

        Err(PuzzleError::NoSolution)
    }

    fn check_reachable(&self, start: &State) -> Result<()> {
        if start.is_reachable_from(self.target()) {
            Ok(())
        } else {
            Err(PuzzleError::Unsolvable)
        }
    }

    fn budget(&self) -> Budget<'_> {
        Budget {
            started: Instant::now(),
            limit: self.config.time_budget(),
            interval: self.config.check_interval.max(1),
            cancel: self.cancel.as_deref(),
        }
    }
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{heuristic::Heuristic, puzzle::GOAL};

    fn state(tiles: [u8; 9]) -> State {
        State::new(tiles).unwrap()
    }

    fn solver(algorithm: Algorithm) -> Solver {
        Solver::new(SolverConfig {
            algorithm,
            ..SolverConfig::default()
        })
    }

    #[test_log::test]
    fn goal_needs_no_moves() {
        for algorithm in [Algorithm::AStar, Algorithm::IdaStar] {
            let outcome = solver(algorithm).solve(&GOAL).unwrap();
            assert!(outcome.path.is_empty());
        }
    }

    #[test_log::test]
    fn one_move_from_goal() {
        let start = state([1, 2, 3, 4, 5, 6, 7, 0, 8]);
        for algorithm in [Algorithm::AStar, Algorithm::IdaStar] {
            let outcome = solver(algorithm).solve(&start).unwrap();
            assert_eq!(outcome.path, vec![Move::new(8).unwrap()]);
        }
    }

    #[test_log::test]
    fn strategies_agree_on_length() {
        let starts = [
            state([0, 1, 2, 4, 5, 3, 7, 8, 6]),
            state([4, 1, 3, 7, 2, 6, 0, 5, 8]),
            state([8, 1, 3, 4, 0, 2, 7, 6, 5]),
            state([1, 2, 3, 0, 4, 6, 7, 5, 8]),
        ];
        for start in starts {
            let a = solver(Algorithm::AStar).a_star(&start).unwrap();
            let ida = solver(Algorithm::IdaStar).ida_star(&start).unwrap();
            assert_eq!(a.moves(), ida.moves(), "{start:?}");
            assert!(start.apply_path(&a.path).unwrap().is_goal());
            assert!(start.apply_path(&ida.path).unwrap().is_goal());
        }
    }

    #[test_log::test]
    fn heuristics_agree_on_length() {
        let start = state([8, 1, 3, 4, 0, 2, 7, 6, 5]);
        let manhattan = Solver::new(SolverConfig {
            heuristic: Heuristic::Manhattan,
            ..SolverConfig::default()
        });
        let conflict = Solver::default();
        assert_eq!(
            manhattan.ida_star(&start).unwrap().moves(),
            conflict.ida_star(&start).unwrap().moves()
        );
    }

    #[test_log::test]
    fn unsolvable_fails_fast() {
        let swapped = state([2, 1, 3, 4, 5, 6, 7, 8, 0]);
        for algorithm in [Algorithm::AStar, Algorithm::IdaStar] {
            assert!(matches!(
                solver(algorithm).solve(&swapped),
                Err(PuzzleError::Unsolvable)
            ));
        }
    }

    #[test_log::test]
    fn zero_budget_times_out() {
        let start = state([8, 6, 7, 2, 5, 4, 3, 0, 1]);
        for algorithm in [Algorithm::AStar, Algorithm::IdaStar] {
            let solver = Solver::new(SolverConfig {
                algorithm,
                time_budget_ms: 0,
                ..SolverConfig::default()
            });
            assert!(matches!(
                solver.solve(&start),
                Err(PuzzleError::SearchTimedOut { .. })
            ));
        }
    }

    #[test_log::test]
    fn raised_flag_cancels() {
        let start = state([8, 6, 7, 2, 5, 4, 3, 0, 1]);
        let flag = Arc::new(AtomicBool::new(true));
        for algorithm in [Algorithm::AStar, Algorithm::IdaStar] {
            let solver = solver(algorithm).with_cancel(flag.clone());
            assert!(matches!(solver.solve(&start), Err(PuzzleError::Cancelled)));
        }
    }

    #[test_log::test]
    fn bound_iterations_are_capped() {
        let start = state([8, 6, 7, 2, 5, 4, 3, 0, 1]);
        let solver = Solver::new(SolverConfig {
            heuristic: Heuristic::Manhattan,
            max_bound_iterations: 1,
            ..SolverConfig::default()
        });
        assert!(matches!(
            solver.ida_star(&start),
            Err(PuzzleError::BoundLimitExceeded { iterations: 1, .. })
        ));
    }

    #[test_log::test]
    fn bounded_search_respects_bound() {
        let start = state([4, 1, 3, 7, 2, 6, 0, 5, 8]);
        let exact = Solver::default().a_star(&start).unwrap().moves() as u32;

        let rebuilt = Solver::default().bounded_a_star(&start, exact).unwrap();
        assert_eq!(rebuilt.moves() as u32, exact);
        assert!(matches!(
            Solver::default().bounded_a_star(&start, exact - 1),
            Err(PuzzleError::NoSolution)
        ));
    }

    #[test_log::test]
    fn searches_toward_any_target() {
        let target = state([1, 2, 3, 4, 5, 6, 0, 7, 8]);
        let solver = Solver::default().with_target(target);
        let outcome = solver.ida_star(&GOAL).unwrap();
        assert_eq!(outcome.moves(), 2);
        assert_eq!(GOAL.apply_path(&outcome.path).unwrap(), target);
    }
}
