pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod heuristic;
pub mod provider;
pub mod puzzle;
pub mod queue;
pub mod search;
pub mod session;
pub mod table;

pub use cache::{CacheStore, Exactness, JsonFileStore, MemoryStore, SolverCache};
pub use config::{Algorithm, Config, GeneratorConfig, SolverConfig};
pub use engine::{Engine, MinMoves, Solution, Source};
pub use error::{PuzzleError, Result};
pub use generator::{Difficulty, Generated, Generator, Origin};
pub use heuristic::Heuristic;
pub use provider::{ConfigProvider, DirectoryProvider, TableProvider};
pub use puzzle::{Direction, Move, State, GOAL};
pub use search::{SearchOutcome, Solver};
pub use session::{Report, ResultSink, SearchTask, Session};
pub use table::DistanceTable;
