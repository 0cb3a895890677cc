//! One displayed puzzle, its cache, and the searches running for it.

use crate::{
    cache::{CacheStore, SolverCache},
    config::Config,
    engine::{Engine, MinMoves, Solution},
    error::{PuzzleError, Result},
    generator::{Difficulty, Generated, Generator, Origin},
    provider::ConfigProvider,
    puzzle::{Move, State, GOAL},
};
use log::{debug, info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

/// What a session tells its display after each query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub state: State,
    /// `None` while nothing is known yet.
    pub moves: Option<MinMoves>,
    /// Present for solve requests that produced a path.
    pub path: Option<Vec<Move>>,
}

pub trait ResultSink: Send + Sync {
    fn report(&self, report: Report);
}

impl<F> ResultSink for F
where
    F: Fn(Report) + Send + Sync,
{
    fn report(&self, report: Report) {
        self(report)
    }
}

/// A search running on its own thread.
#[derive(Debug)]
pub struct SearchTask<T> {
    handle: JoinHandle<Result<T>>,
    cancel: Arc<AtomicBool>,
}

impl<T> SearchTask<T> {
    /// Asks the search to stop at its next budget check. Nothing it finds
    /// afterwards is reported.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<T> {
        self.handle
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

pub struct Session {
    config: Config,
    engine: Engine,
    state: State,
    /// Bumped whenever the displayed puzzle is replaced; searches started
    /// under an older value no longer write to the cache.
    puzzle: Arc<AtomicU64>,
    in_flight: Option<Arc<AtomicBool>>,
    sink: Arc<dyn ResultSink>,
    store: Option<Box<dyn CacheStore>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let engine = Engine::new(config.solver.clone());
        Self::assemble(config, engine, None)
    }

    /// A session whose cache starts from whatever `store` holds. An empty or
    /// unreadable store gives a cold cache.
    pub fn with_store(config: Config, store: Box<dyn CacheStore>) -> Self {
        let cache = SolverCache::load_from(store.as_ref());
        let engine = Engine::with_cache(config.solver.clone(), cache);
        Self::assemble(config, engine, Some(store))
    }

    fn assemble(config: Config, engine: Engine, store: Option<Box<dyn CacheStore>>) -> Self {
        Self {
            config,
            engine,
            state: GOAL,
            puzzle: Arc::new(AtomicU64::new(0)),
            in_flight: None,
            sink: Arc::new(|_: Report| {}),
            store,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Replaces the puzzle. Distances and paths belong to the old puzzle and
    /// are dropped.
    pub fn set_state(&mut self, state: State) {
        self.forget_puzzle();
        self.state = state;
        debug!("New puzzle {state:?}");
    }

    fn forget_puzzle(&mut self) {
        self.stop();
        self.puzzle.fetch_add(1, Ordering::SeqCst);
        self.engine.cache().reset();
    }

    /// Plays one move on the current puzzle. The cache is kept, since every
    /// distance in it is still valid.
    pub fn apply_move(&mut self, mv: Move) -> Result<()> {
        let next = self.state.apply(mv).ok_or_else(|| {
            PuzzleError::InvalidState(format!("cell {mv} is not next to the blank"))
        })?;
        self.stop();
        self.state = next;
        Ok(())
    }

    /// Cancels the search in flight, if any.
    pub fn stop(&mut self) {
        if let Some(flag) = self.in_flight.take() {
            debug!("Cancelling search in flight");
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn min_moves(&mut self) -> Result<MinMoves> {
        self.stop();
        let moves = self.engine.min_moves(&self.state)?;
        self.sink.report(Report {
            state: self.state,
            moves: Some(moves),
            path: None,
        });
        Ok(moves)
    }

    pub fn solve(&mut self) -> Result<Vec<Move>> {
        self.stop();
        let result = self.engine.solve(&self.state);
        report_solution(self.sink.as_ref(), self.state, &result);
        result.map(|solution| solution.path)
    }

    pub fn spawn_min_moves(&mut self) -> SearchTask<MinMoves> {
        self.spawn(|engine, state, commit, sink| {
            let moves = engine.min_moves_if(&state, commit)?;
            sink.report(Report {
                state,
                moves: Some(moves),
                path: None,
            });
            Ok(moves)
        })
    }

    pub fn spawn_solve(&mut self) -> SearchTask<Vec<Move>> {
        self.spawn(|engine, state, commit, sink| {
            let result = engine.solve_if(&state, commit);
            report_solution(sink, state, &result);
            result.map(|solution| solution.path)
        })
    }

    /// Runs `search` on a new thread after cancelling the previous one. The
    /// search reports through a sink that goes quiet once it is cancelled.
    fn spawn<T, F>(&mut self, search: F) -> SearchTask<T>
    where
        T: Send + 'static,
        F: FnOnce(&Engine, State, &dyn Fn() -> bool, &dyn ResultSink) -> Result<T>
            + Send
            + 'static,
    {
        self.stop();
        let cancel = Arc::new(AtomicBool::new(false));
        self.in_flight = Some(Arc::clone(&cancel));

        let engine = self.engine.with_cancel(Arc::clone(&cancel));
        let state = self.state;
        let puzzle = Arc::clone(&self.puzzle);
        let started_under = puzzle.load(Ordering::SeqCst);
        let sink = Arc::clone(&self.sink);
        let flag = Arc::clone(&cancel);

        let handle = thread::spawn(move || {
            let commit = || puzzle.load(Ordering::SeqCst) == started_under;
            let quiet = |report: Report| {
                if !flag.load(Ordering::Relaxed) && commit() {
                    sink.report(report);
                }
            };
            search(&engine, state, &commit, &quiet)
        });
        SearchTask { handle, cancel }
    }

    /// Replaces the puzzle with a fresh one from `band`. On failure the
    /// current puzzle and its cache are left as they were.
    pub fn shuffle(
        &mut self,
        band: Difficulty,
        provider: Option<&dyn ConfigProvider>,
    ) -> Result<Generated> {
        self.stop();
        let mut generator = Generator::new(self.config.generator.clone(), &self.engine);
        if let Some(provider) = provider {
            generator = generator.with_provider(provider);
        }
        let generated = generator.generate(band)?;

        self.forget_puzzle();
        if let (Some(moves), Origin::Shuffled | Origin::PartiallySolved) =
            (generated.distance, generated.origin)
        {
            self.engine.cache().record_exact(generated.state, moves);
        }
        self.state = generated.state;
        info!(
            "Shuffled a {band} puzzle ({})",
            generated
                .distance
                .map_or_else(|| "distance unknown".to_string(), |d| format!("{d} moves"))
        );
        self.sink.report(Report {
            state: self.state,
            moves: generated.distance.map(MinMoves::Exact),
            path: None,
        });
        Ok(generated)
    }

    /// Merges the store's snapshot into the cache.
    pub fn load(&mut self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if let Some(snapshot) = store.load()? {
            self.engine.cache().restore(snapshot);
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        match &self.store {
            Some(store) => self.engine.cache().save_to(store.as_ref()),
            None => Ok(()),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
        if let Err(err) = self.save() {
            warn!("Could not save cache: {err}");
        }
    }
}

fn report_solution(sink: &dyn ResultSink, state: State, result: &Result<Solution>) {
    let (moves, path) = match result {
        Ok(solution) => (
            Some(MinMoves::Exact(solution.path.len() as u8)),
            Some(solution.path.clone()),
        ),
        Err(PuzzleError::Unsolvable) => (Some(MinMoves::Unsolvable), None),
        Err(PuzzleError::Cancelled) => return,
        Err(_) => (None, None),
    };
    sink.report(Report { state, moves, path });
}
