//! Exact distances for every reachable configuration, by breadth-first
//! search outward from the goal.

use crate::{
    error::Result,
    puzzle::{State, GOAL},
};
use fxhash::FxHashMap;
use log::info;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, collections::VecDeque, fs, path::Path, time::Instant};

/// Contents of one `moves_<n>.json` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFile {
    pub moves: u8,
    pub count: usize,
    pub states: Vec<State>,
}

/// Contents of `index.json` next to the move files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIndex {
    pub total_files: usize,
    pub max_moves: u8,
    pub files: BTreeMap<String, String>,
    pub counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistributionRow {
    pub moves: u8,
    pub count: usize,
    pub percentage: f64,
    pub cumulative: f64,
}

pub fn move_file_name(moves: u8) -> String {
    format!("moves_{moves}.json")
}

#[derive(Debug, Clone)]
pub struct DistanceTable {
    distances: FxHashMap<State, u8>,
    max_distance: u8,
}

impl DistanceTable {
    pub fn build() -> Self {
        let started = Instant::now();
        let mut distances = FxHashMap::default();
        let mut queue = VecDeque::new();
        let mut max_distance = 0;

        distances.insert(GOAL, 0);
        queue.push_back((GOAL, 0u8));
        while let Some((state, moves)) = queue.pop_front() {
            max_distance = max_distance.max(moves);
            for (next, _) in state.neighbors() {
                distances.entry(next).or_insert_with(|| {
                    queue.push_back((next, moves + 1));
                    moves + 1
                });
            }
        }

        info!(
            "Distance table built in {:?}: {} states, deepest {} moves",
            started.elapsed(),
            distances.len(),
            max_distance
        );
        Self {
            distances,
            max_distance,
        }
    }

    /// `None` for states that cannot reach the goal.
    pub fn distance(&self, state: &State) -> Option<u8> {
        self.distances.get(state).copied()
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn max_distance(&self) -> u8 {
        self.max_distance
    }

    /// Every state exactly `moves` from the goal, in ascending tile order.
    pub fn states_at(&self, moves: u8) -> Vec<State> {
        let mut states: Vec<State> = self
            .distances
            .iter()
            .filter(|&(_, &d)| d == moves)
            .map(|(&state, _)| state)
            .collect();
        states.sort_unstable();
        states
    }

    pub fn distribution(&self) -> Vec<DistributionRow> {
        let mut counts = vec![0usize; self.max_distance as usize + 1];
        for &d in self.distances.values() {
            counts[d as usize] += 1;
        }

        let total = self.len() as f64;
        let mut running = 0;
        counts
            .into_iter()
            .enumerate()
            .map(|(moves, count)| {
                running += count;
                DistributionRow {
                    moves: moves as u8,
                    count,
                    percentage: count as f64 / total * 100.0,
                    cumulative: running as f64 / total * 100.0,
                }
            })
            .collect()
    }

    /// Writes one move file per distance plus `index.json` into `dir`.
    pub fn write_move_files(&self, dir: impl AsRef<Path>) -> Result<MoveIndex> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut files = BTreeMap::new();
        let mut counts = BTreeMap::new();
        for moves in 0..=self.max_distance {
            let states = self.states_at(moves);
            let name = move_file_name(moves);
            let file = MoveFile {
                moves,
                count: states.len(),
                states,
            };
            fs::write(dir.join(&name), serde_json::to_vec(&file)?)?;
            files.insert(moves.to_string(), name);
            counts.insert(moves.to_string(), file.count);
        }

        let index = MoveIndex {
            total_files: files.len(),
            max_moves: self.max_distance,
            files,
            counts,
        };
        fs::write(dir.join("index.json"), serde_json::to_vec(&index)?)?;
        info!("Wrote {} move files to {}", index.total_files, dir.display());
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn table() -> &'static DistanceTable {
        static TABLE: OnceLock<DistanceTable> = OnceLock::new();
        TABLE.get_or_init(DistanceTable::build)
    }

    #[test_log::test]
    fn covers_half_of_all_permutations() {
        assert_eq!(table().len(), 181_440);
        assert_eq!(table().max_distance(), 31);
        assert_eq!(table().distance(&GOAL), Some(0));
    }

    #[test_log::test]
    fn hardest_states_are_known() {
        let hardest = table().states_at(31);
        assert_eq!(
            hardest,
            vec![
                State::new([6, 4, 7, 8, 5, 0, 3, 2, 1]).unwrap(),
                State::new([8, 6, 7, 2, 5, 4, 3, 0, 1]).unwrap(),
            ]
        );
    }

    #[test_log::test]
    fn distribution_starts_by_doubling() {
        let rows = table().distribution();
        let counts: Vec<usize> = rows.iter().take(4).map(|row| row.count).collect();
        assert_eq!(counts, vec![1, 2, 4, 8]);
        assert_eq!(rows.len(), 32);
        assert_eq!(rows.iter().map(|row| row.count).sum::<usize>(), 181_440);
        let last = rows.last().unwrap();
        assert!((last.cumulative - 100.0).abs() < 1e-9);
    }

    #[test_log::test]
    fn unsolvable_states_are_absent() {
        let swapped = State::new([2, 1, 3, 4, 5, 6, 7, 8, 0]).unwrap();
        assert_eq!(table().distance(&swapped), None);
    }

    #[test_log::test]
    fn writes_move_files() {
        let dir = tempfile::tempdir().unwrap();
        let index = table().write_move_files(dir.path()).unwrap();
        assert_eq!(index.total_files, 32);
        assert_eq!(index.max_moves, 31);
        assert_eq!(index.counts["1"], 2);

        let one: MoveFile =
            serde_json::from_slice(&fs::read(dir.path().join("moves_1.json")).unwrap()).unwrap();
        assert_eq!(one.moves, 1);
        assert_eq!(one.count, 2);
        assert!(one.states.contains(&State::new([1, 2, 3, 4, 5, 6, 7, 0, 8]).unwrap()));

        let stored: MoveIndex =
            serde_json::from_slice(&fs::read(dir.path().join("index.json")).unwrap()).unwrap();
        assert_eq!(stored, index);
    }
}
