//! Memoized distances and solved paths for one puzzle session.

use crate::{
    error::{PuzzleError, Result},
    generator::Difficulty,
    heuristic::{manhattan_distance, TargetLayout},
    puzzle::{Move, State, GOAL, SIZE},
    search::{SearchOutcome, Solver},
};
use fxhash::FxHashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Exactness {
    /// Proven optimal by a completed search.
    Exact,
    /// Admissible lower bound recorded when a search ran out of time.
    Estimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub distance: u8,
    pub exactness: Exactness,
}

impl CacheEntry {
    pub fn is_exact(&self) -> bool {
        self.exactness == Exactness::Exact
    }
}

/// One realized optimal path and the remaining distance at every state on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRecord {
    pub start: State,
    pub path: Vec<Move>,
    pub remaining: FxHashMap<State, u8>,
}

impl PathRecord {
    pub fn contains(&self, state: &State) -> bool {
        self.remaining.contains_key(state)
    }

    /// The tail of the path from `state` on. A suffix of an optimal path is
    /// itself optimal.
    pub fn suffix_from(&self, state: &State) -> Option<&[Move]> {
        let remaining = *self.remaining.get(state)? as usize;
        Some(&self.path[self.path.len() - remaining..])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub state: State,
    pub moves: u8,
}

/// What survives a session: exact distances and one known configuration per
/// move count. Estimates are never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub configurations: BTreeMap<u8, State>,
    pub distances: Vec<DistanceRecord>,
}

#[derive(Debug, Default)]
pub struct SolverCache {
    distances: FxHashMap<State, CacheEntry>,
    paths: FxHashMap<State, Vec<PathRecord>>,
    configurations: BTreeMap<u8, State>,
    /// Exact distances restored from a store. They hold for any displayed
    /// puzzle, so a reset puts them back.
    persisted: FxHashMap<State, u8>,
}

impl SolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets distances and paths found for the old puzzle. Provider
    /// configurations and distances restored from a store stay.
    pub fn reset(&mut self) {
        debug!(
            "Resetting cache ({} distances, {} path records, {} persisted)",
            self.distances.len(),
            self.paths.values().map(Vec::len).sum::<usize>(),
            self.persisted.len()
        );
        self.distances.clear();
        self.paths.clear();
        for (&state, &moves) in &self.persisted {
            self.distances.insert(
                state,
                CacheEntry {
                    distance: moves,
                    exactness: Exactness::Exact,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn entry(&self, state: &State) -> Option<CacheEntry> {
        self.distances.get(state).copied()
    }

    /// Known optimal distance to the goal. Estimates never answer this.
    pub fn lookup_distance(&self, state: &State) -> Option<u8> {
        self.entry(state)
            .filter(CacheEntry::is_exact)
            .map(|entry| entry.distance)
    }

    pub fn record_exact(&mut self, state: State, distance: u8) {
        self.distances.insert(
            state,
            CacheEntry {
                distance,
                exactness: Exactness::Exact,
            },
        );
    }

    /// Stores a lower bound unless an exact distance is already known.
    pub fn record_estimate(&mut self, state: State, distance: u8) {
        if self.lookup_distance(&state).is_some() {
            return;
        }
        self.distances.insert(
            state,
            CacheEntry {
                distance,
                exactness: Exactness::Estimate,
            },
        );
    }

    /// Records an optimal `path` from `start` to the goal: every state along
    /// it gets its exact remaining distance, and the path is kept so later
    /// queries for any of those states can reuse it.
    pub fn record_solution(&mut self, start: State, path: &[Move]) -> Result<()> {
        let mut remaining = FxHashMap::default();
        let mut state = start;
        remaining.insert(state, path.len() as u8);
        for (index, &mv) in path.iter().enumerate() {
            state = state.apply(mv).ok_or_else(|| {
                PuzzleError::InvalidState(format!("move into cell {mv} is not legal"))
            })?;
            remaining.insert(state, (path.len() - index - 1) as u8);
        }
        if state != GOAL {
            return Err(PuzzleError::InvalidState(
                "recorded path does not end at the goal".to_string(),
            ));
        }

        for (&visited, &distance) in &remaining {
            self.record_exact(visited, distance);
        }
        if !path.is_empty() {
            self.paths.entry(GOAL).or_default().push(PathRecord {
                start,
                path: path.to_vec(),
                remaining,
            });
        }
        debug!("Recorded {}-move solution", path.len());
        Ok(())
    }

    pub fn path_records(&self, terminal: &State) -> &[PathRecord] {
        self.paths.get(terminal).map(Vec::as_slice).unwrap_or_default()
    }

    /// An optimal path to the goal if `state` lies on a recorded one.
    pub fn cached_path(&self, state: &State) -> Option<Vec<Move>> {
        if state.is_goal() {
            return Some(Vec::new());
        }
        self.path_records(&GOAL)
            .iter()
            .find_map(|record| record.suffix_from(state))
            .map(<[Move]>::to_vec)
    }

    pub fn configuration(&self, moves: u8) -> Option<State> {
        self.configurations.get(&moves).copied()
    }

    pub fn remember_configuration(&mut self, moves: u8, state: State) {
        self.configurations.insert(moves, state);
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let mut distances: Vec<DistanceRecord> = self
            .distances
            .iter()
            .filter(|(_, entry)| entry.is_exact())
            .map(|(&state, entry)| DistanceRecord {
                state,
                moves: entry.distance,
            })
            .collect();
        distances.sort_unstable_by_key(|record| (record.moves, record.state));
        CacheSnapshot {
            configurations: self.configurations.clone(),
            distances,
        }
    }

    /// Merges `snapshot` in, skipping entries that cannot be right. Restored
    /// distances survive later resets.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        let mut skipped = 0;
        for (moves, state) in snapshot.configurations {
            if moves > 0 && is_plausible(&state, moves) {
                self.configurations.insert(moves, state);
            } else {
                skipped += 1;
            }
        }
        for record in snapshot.distances {
            if is_plausible(&record.state, record.moves) {
                self.persisted.insert(record.state, record.moves);
                self.record_exact(record.state, record.moves);
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            warn!("Ignored {skipped} implausible snapshot entries");
        }
    }

    /// A cache warmed from `store`, or a cold one if the store is empty or
    /// unreadable.
    pub fn load_from(store: &dyn CacheStore) -> Self {
        let mut cache = Self::new();
        match store.load() {
            Ok(Some(snapshot)) => {
                debug!(
                    "Loaded {} configurations and {} distances",
                    snapshot.configurations.len(),
                    snapshot.distances.len()
                );
                cache.restore(snapshot);
            }
            Ok(None) => {}
            Err(err) => warn!("Starting with a cold cache: {err}"),
        }
        cache
    }

    pub fn save_to(&self, store: &dyn CacheStore) -> Result<()> {
        store.save(&self.snapshot())
    }
}

/// Cheap checks a true distance always passes: solvable, zero exactly at
/// the goal, at most the known maximum, at least the Manhattan distance, and
/// of the same parity as the blank's distance from its home cell, since
/// every move shifts the blank by one cell.
fn is_plausible(state: &State, moves: u8) -> bool {
    let blank = state.blank();
    let blank_steps = (SIZE - 1 - blank / SIZE) + (SIZE - 1 - blank % SIZE);
    state.is_solvable()
        && (moves == 0) == state.is_goal()
        && moves <= Difficulty::MAX_MOVES
        && manhattan_distance(state, &TargetLayout::goal()) <= moves as u32
        && blank_steps % 2 == moves as usize % 2
}

/// Re-derives an explicit path from `start` to `end` for a pair already known
/// to be exactly `known_distance` moves apart. The search never looks past
/// that length.
pub fn reconstruct_bounded(
    solver: &Solver,
    start: &State,
    end: &State,
    known_distance: u8,
) -> Result<SearchOutcome> {
    let outcome = solver
        .clone()
        .with_target(*end)
        .bounded_a_star(start, known_distance as u32)?;
    if outcome.moves() != known_distance as usize {
        warn!(
            "Cached distance {known_distance} disagrees with rebuilt path of {}",
            outcome.moves()
        );
    }
    Ok(outcome)
}

/// Persistence boundary for [`CacheSnapshot`]s. Nothing depends on a store
/// being present or consistent between sessions.
pub trait CacheStore {
    fn load(&self) -> Result<Option<CacheSnapshot>>;
    fn save(&self, snapshot: &CacheSnapshot) -> Result<()>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn load(&self) -> Result<Option<CacheSnapshot>> {
        (**self).load()
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        (**self).save(snapshot)
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CacheStore for JsonFileStore {
    fn load(&self) -> Result<Option<CacheSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec(snapshot)?)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<CacheSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn load(&self) -> Result<Option<CacheSnapshot>> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &CacheSnapshot) -> Result<()> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}
