//! Sources of pre-generated configurations at a known distance from the goal.

use crate::{
    error::{PuzzleError, Result},
    puzzle::State,
    table::{move_file_name, DistanceTable, MoveFile},
};
use log::debug;
use rand::{seq::SliceRandom, thread_rng};
use std::{fs, io, path::PathBuf};

pub trait ConfigProvider: Send + Sync {
    /// A state exactly `moves` from the goal. `Ok(None)` means the provider
    /// has nothing at that distance, which callers treat as routine.
    fn fetch(&self, moves: u8) -> Result<Option<State>>;
}

/// Reads the `moves_<n>.json` layout written by
/// [`DistanceTable::write_move_files`].
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    dir: PathBuf,
}

impl DirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read(&self, moves: u8) -> Result<Option<MoveFile>> {
        let path = self.dir.join(move_file_name(moves));
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let file: MoveFile = serde_json::from_slice(&bytes)?;
        if file.moves != moves {
            return Err(PuzzleError::ProviderFailed(format!(
                "{} lists {}-move states",
                path.display(),
                file.moves
            )));
        }
        Ok(Some(file))
    }
}

impl ConfigProvider for DirectoryProvider {
    fn fetch(&self, moves: u8) -> Result<Option<State>> {
        let Some(file) = self.read(moves)? else {
            debug!("No move file for {moves} moves in {}", self.dir.display());
            return Ok(None);
        };
        Ok(file.states.choose(&mut thread_rng()).copied())
    }
}

/// Serves configurations from an in-memory [`DistanceTable`].
#[derive(Debug, Clone)]
pub struct TableProvider {
    by_distance: Vec<Vec<State>>,
}

impl TableProvider {
    pub fn new(table: &DistanceTable) -> Self {
        Self {
            by_distance: (0..=table.max_distance())
                .map(|moves| table.states_at(moves))
                .collect(),
        }
    }
}

impl ConfigProvider for TableProvider {
    fn fetch(&self, moves: u8) -> Result<Option<State>> {
        Ok(self
            .by_distance
            .get(moves as usize)
            .and_then(|states| states.choose(&mut thread_rng()))
            .copied())
    }
}
