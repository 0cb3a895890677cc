use crate::{error::Result, heuristic::Heuristic};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    AStar,
    #[default]
    IdaStar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub algorithm: Algorithm,
    pub heuristic: Heuristic,
    pub time_budget_ms: u64,
    /// Expansions between checks of the clock and the cancel flag.
    pub check_interval: u64,
    pub max_bound_iterations: usize,
}

impl SolverConfig {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            heuristic: Heuristic::default(),
            time_budget_ms: 30_000,
            check_interval: 1_000,
            max_bound_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Random walk length before measuring a banded puzzle.
    pub shuffle_moves: usize,
    /// Random walk length for the unbanded level.
    pub random_moves: usize,
    pub max_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            shuffle_moves: 100,
            random_moves: 200,
            max_attempts: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverConfig,
    pub generator: GeneratorConfig,
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}
