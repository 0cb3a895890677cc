use crate::{generator::Difficulty, puzzle::State};
use std::{io, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PuzzleError {
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Puzzle is not solvable")]
    Unsolvable,
    #[error("Search timed out after {elapsed:?} ({expanded} nodes expanded)")]
    SearchTimedOut { elapsed: Duration, expanded: u64 },
    #[error("Bound still {bound} after {iterations} IDA* iterations")]
    BoundLimitExceeded { bound: u32, iterations: usize },
    /// Exhaustive search finished on a solvable input without reaching the
    /// target. Never expected at runtime.
    #[error("No solution found despite exhaustive search")]
    NoSolution,
    #[error("Search was cancelled")]
    Cancelled,
    #[error(
        "Could not generate a {band} puzzle; closest state is {distance} moves from the goal"
    )]
    GenerationExhausted {
        closest: State,
        distance: u8,
        band: Difficulty,
    },
    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(String),
    #[error("Configuration provider failed: {0}")]
    ProviderFailed(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PuzzleError>;
