//! Puzzles at a requested difficulty.

use crate::{
    config::GeneratorConfig,
    engine::Engine,
    error::{PuzzleError, Result},
    provider::ConfigProvider,
    puzzle::{Direction, State, GOAL},
};
use log::{debug, info, warn};
use rand::{rngs::ThreadRng, seq::SliceRandom, thread_rng, Rng};
use std::{fmt, ops::RangeInclusive, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Difficulty {
    VeryEasy,
    Easy,
    #[default]
    Medium,
    Hard,
    VeryHard,
    Extreme,
    /// A long random walk with no difficulty check.
    Random,
    /// Exactly this many moves from the goal.
    Custom(u8),
}

impl Difficulty {
    /// The largest distance any 8-puzzle state has from the goal.
    pub const MAX_MOVES: u8 = 31;

    pub const BANDED: [Difficulty; 6] = [
        Difficulty::VeryEasy,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::VeryHard,
        Difficulty::Extreme,
    ];

    pub fn custom(moves: u8) -> Result<Self> {
        if (1..=Self::MAX_MOVES).contains(&moves) {
            Ok(Difficulty::Custom(moves))
        } else {
            Err(PuzzleError::InvalidDifficulty(format!(
                "custom move count must be between 1 and {}, got {moves}",
                Self::MAX_MOVES
            )))
        }
    }

    /// Accepted distances, `None` for [`Difficulty::Random`].
    pub fn range(&self) -> Option<RangeInclusive<u8>> {
        Some(match self {
            Difficulty::VeryEasy => 1..=4,
            Difficulty::Easy => 5..=9,
            Difficulty::Medium => 10..=14,
            Difficulty::Hard => 15..=19,
            Difficulty::VeryHard => 20..=24,
            Difficulty::Extreme => 25..=Self::MAX_MOVES,
            Difficulty::Random => return None,
            Difficulty::Custom(moves) => *moves..=*moves,
        })
    }

    pub fn contains(&self, moves: u8) -> bool {
        self.range().map_or(true, |range| range.contains(&moves))
    }

    /// Names the band a measured distance falls in.
    pub fn from_moves(moves: u8) -> Self {
        match moves {
            0..=4 => Difficulty::VeryEasy,
            5..=9 => Difficulty::Easy,
            10..=14 => Difficulty::Medium,
            15..=19 => Difficulty::Hard,
            20..=24 => Difficulty::VeryHard,
            _ => Difficulty::Extreme,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::VeryEasy => "very-easy",
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::VeryHard => "very-hard",
            Difficulty::Extreme => "extreme",
            Difficulty::Random => "random",
            Difficulty::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Custom(moves) => write!(f, "{moves}-move"),
            other => f.write_str(other.label()),
        }
    }
}

impl FromStr for Difficulty {
    type Err = PuzzleError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(moves) = s.parse::<u8>() {
            return Self::custom(moves);
        }
        Self::BANDED
            .into_iter()
            .chain([Difficulty::Random])
            .find(|level| level.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| PuzzleError::InvalidDifficulty(format!("unknown level {s:?}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Provider,
    /// A configuration remembered from an earlier provider answer.
    Remembered,
    Shuffled,
    /// A too-hard shuffle moved part of the way along its optimal solution.
    PartiallySolved,
    RandomMix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generated {
    pub state: State,
    /// Exact distance to the goal, unknown for random mixes.
    pub distance: Option<u8>,
    pub origin: Origin,
}

/// Produces puzzles using `engine` to measure them. Measured distances end
/// up in the engine's cache.
pub struct Generator<'a, R = ThreadRng> {
    config: GeneratorConfig,
    engine: &'a Engine,
    provider: Option<&'a dyn ConfigProvider>,
    rng: R,
}

impl<'a> Generator<'a> {
    pub fn new(config: GeneratorConfig, engine: &'a Engine) -> Self {
        Self {
            config,
            engine,
            provider: None,
            rng: thread_rng(),
        }
    }
}

impl<'a, R: Rng> Generator<'a, R> {
    #[must_use]
    pub fn with_provider(mut self, provider: &'a dyn ConfigProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn with_rng<S: Rng>(self, rng: S) -> Generator<'a, S> {
        Generator {
            config: self.config,
            engine: self.engine,
            provider: self.provider,
            rng,
        }
    }

    pub fn generate(&mut self, band: Difficulty) -> Result<Generated> {
        let Some(range) = band.range() else {
            return Ok(self.random_mix());
        };

        if let Some(generated) = self.from_provider(range.clone()) {
            info!("Serving {band} puzzle {} moves out", generated.distance.unwrap_or_default());
            return Ok(generated);
        }

        let mut closest: Option<(State, u8)> = None;
        let mut last_failure = None;
        for attempt in 1..=self.config.max_attempts {
            let state = self.random_walk(self.config.shuffle_moves);
            if state.is_goal() {
                continue;
            }

            let solution = match self.engine.solve(&state) {
                Ok(solution) => solution,
                Err(
                    err @ (PuzzleError::SearchTimedOut { .. }
                    | PuzzleError::BoundLimitExceeded { .. }),
                ) => {
                    debug!("Attempt {attempt}: could not measure shuffle: {err}");
                    last_failure = Some(err);
                    continue;
                }
                Err(err) => return Err(err),
            };
            let distance = solution.path.len() as u8;
            debug!("Attempt {attempt}: shuffle is {distance} moves out");

            if range.contains(&distance) {
                return Ok(Generated {
                    state,
                    distance: Some(distance),
                    origin: Origin::Shuffled,
                });
            }

            if distance > *range.end() {
                let target = (range.start() + range.end()).div_ceil(2);
                let advance = (distance - target) as usize;
                let easier = state.apply_path(&solution.path[..advance])?;
                debug!("Walked {advance} moves along the solution to reach {target}");
                return Ok(Generated {
                    state: easier,
                    distance: Some(target),
                    origin: Origin::PartiallySolved,
                });
            }

            if closest.map_or(true, |(_, best)| distance > best) {
                closest = Some((state, distance));
            }
        }

        match (closest, last_failure) {
            (Some((closest, distance)), _) => {
                warn!(
                    "No {band} puzzle after {} attempts, closest is {distance} moves",
                    self.config.max_attempts
                );
                Err(PuzzleError::GenerationExhausted {
                    closest,
                    distance,
                    band,
                })
            }
            (None, Some(err)) => Err(err),
            (None, None) => {
                // Nothing was measured, so report a measured random mix instead.
                let state = self.random_mix().state;
                let distance = self.engine.solve(&state)?.path.len() as u8;
                if range.contains(&distance) {
                    return Ok(Generated {
                        state,
                        distance: Some(distance),
                        origin: Origin::Shuffled,
                    });
                }
                warn!("No {band} shuffle was measured, closest is {distance} moves");
                Err(PuzzleError::GenerationExhausted {
                    closest: state,
                    distance,
                    band,
                })
            }
        }
    }

    /// Asks the provider for each distance in `range`, in random order. A
    /// failing provider is handled like one that has nothing to offer, in
    /// which case a remembered configuration may still be used.
    fn from_provider(&mut self, range: RangeInclusive<u8>) -> Option<Generated> {
        let mut counts: Vec<u8> = range.collect();
        counts.shuffle(&mut self.rng);

        for moves in counts {
            let fetched = match self.provider.map(|provider| provider.fetch(moves)) {
                Some(Ok(fetched)) => fetched,
                Some(Err(err)) => {
                    warn!("Provider failed for {moves} moves: {err}");
                    None
                }
                None => None,
            };

            let (state, origin) = match fetched {
                Some(state) => (state, Origin::Provider),
                None => match self.engine.cache().configuration(moves) {
                    Some(state) => (state, Origin::Remembered),
                    None => continue,
                },
            };

            if state.is_goal() || !state.is_solvable() {
                warn!("Discarding provided configuration {state:?} for {moves} moves");
                continue;
            }
            if origin == Origin::Provider {
                self.engine.cache().remember_configuration(moves, state);
            }
            return Some(Generated {
                state,
                distance: Some(moves),
                origin,
            });
        }
        None
    }

    fn random_mix(&mut self) -> Generated {
        let mut state = self.random_walk(self.config.random_moves);
        while state.is_goal() {
            state = self.random_walk(1);
        }
        Generated {
            state,
            distance: self.engine.cache().lookup_distance(&state),
            origin: Origin::RandomMix,
        }
    }

    /// Walks `moves` legal moves away from the goal, never stepping straight
    /// back to the previous cell.
    fn random_walk(&mut self, moves: usize) -> State {
        let mut state = GOAL;
        let mut last: Option<Direction> = None;
        for _ in 0..moves {
            let options: Vec<(State, Direction)> = Direction::ALL
                .into_iter()
                .filter(|&dir| last != Some(dir.opposite()))
                .filter_map(|dir| state.try_move(dir).map(|(next, _)| (next, dir)))
                .collect();
            if let Some(&(next, dir)) = options.choose(&mut self.rng) {
                state = next;
                last = Some(dir);
            }
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SolverConfig, provider::TableProvider, table::DistanceTable};
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::OnceLock;

    fn table() -> &'static DistanceTable {
        static TABLE: OnceLock<DistanceTable> = OnceLock::new();
        TABLE.get_or_init(DistanceTable::build)
    }

    fn generator(engine: &Engine, seed: u64) -> Generator<'_, StdRng> {
        Generator::new(GeneratorConfig::default(), engine).with_rng(StdRng::seed_from_u64(seed))
    }

    struct Failing;

    impl ConfigProvider for Failing {
        fn fetch(&self, _moves: u8) -> Result<Option<State>> {
            Err(PuzzleError::ProviderFailed("offline".to_string()))
        }
    }

    #[test]
    fn parses_levels() {
        assert_eq!("very-hard".parse::<Difficulty>().unwrap(), Difficulty::VeryHard);
        assert_eq!("Extreme".parse::<Difficulty>().unwrap(), Difficulty::Extreme);
        assert_eq!("12".parse::<Difficulty>().unwrap(), Difficulty::Custom(12));
        assert!("0".parse::<Difficulty>().is_err());
        assert!("32".parse::<Difficulty>().is_err());
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn classifies_distances() {
        assert_eq!(Difficulty::from_moves(4), Difficulty::VeryEasy);
        assert_eq!(Difficulty::from_moves(5), Difficulty::Easy);
        assert_eq!(Difficulty::from_moves(14), Difficulty::Medium);
        assert_eq!(Difficulty::from_moves(19), Difficulty::Hard);
        assert_eq!(Difficulty::from_moves(24), Difficulty::VeryHard);
        assert_eq!(Difficulty::from_moves(31), Difficulty::Extreme);
        for level in Difficulty::BANDED {
            let range = level.range().unwrap();
            assert_eq!(Difficulty::from_moves(*range.start()), level);
            assert_eq!(Difficulty::from_moves(*range.end()), level);
        }
        assert!(Difficulty::Random.contains(0));
    }

    #[test_log::test]
    fn shuffles_land_in_band() {
        let engine = Engine::default();
        let mut generator = generator(&engine, 7);
        for band in [Difficulty::VeryEasy, Difficulty::Easy, Difficulty::Hard] {
            let generated = generator.generate(band).unwrap();
            let distance = generated.distance.unwrap();
            assert!(band.contains(distance), "{band}: {distance}");
            assert_eq!(table().distance(&generated.state), Some(distance));
        }
    }

    #[test_log::test]
    fn custom_distance_is_exact() {
        let engine = Engine::default();
        let generated = generator(&engine, 11).generate(Difficulty::Custom(8)).unwrap();
        assert_eq!(generated.distance, Some(8));
        assert_eq!(table().distance(&generated.state), Some(8));
        assert_eq!(engine.cache().lookup_distance(&generated.state), Some(8));
    }

    #[test_log::test]
    fn provider_is_preferred() {
        let engine = Engine::default();
        let provider = TableProvider::new(table());
        let generated = generator(&engine, 3)
            .with_provider(&provider)
            .generate(Difficulty::Medium)
            .unwrap();

        assert_eq!(generated.origin, Origin::Provider);
        let distance = generated.distance.unwrap();
        assert!((10..=14).contains(&distance));
        assert_eq!(table().distance(&generated.state), Some(distance));
        assert_eq!(engine.cache().configuration(distance), Some(generated.state));
    }

    #[test_log::test]
    fn failing_provider_falls_back() {
        let engine = Engine::default();
        let generated = generator(&engine, 5)
            .with_provider(&Failing)
            .generate(Difficulty::Easy)
            .unwrap();
        assert_ne!(generated.origin, Origin::Provider);
        assert!(Difficulty::Easy.contains(generated.distance.unwrap()));
    }

    #[test_log::test]
    fn remembered_configurations_survive_provider_outage() {
        let engine = Engine::default();
        let near = State::new([1, 2, 3, 4, 5, 6, 7, 0, 8]).unwrap();
        engine.cache().remember_configuration(1, near);

        let generated = generator(&engine, 1)
            .with_provider(&Failing)
            .generate(Difficulty::Custom(1))
            .unwrap();
        assert_eq!(generated.state, near);
        assert_eq!(generated.origin, Origin::Remembered);
    }

    #[test_log::test]
    fn random_mix_is_never_goal_or_unsolvable() {
        let engine = Engine::default();
        let mut generator = generator(&engine, 13);
        let swapped = State::new([2, 1, 3, 4, 5, 6, 7, 8, 0]).unwrap();
        for _ in 0..50 {
            let generated = generator.generate(Difficulty::Random).unwrap();
            assert_eq!(generated.origin, Origin::RandomMix);
            assert!(!generated.state.is_goal());
            assert!(generated.state.is_solvable());
            assert_ne!(generated.state, swapped);
        }
    }

    #[test_log::test]
    fn exhaustion_reports_closest_exact_distance() {
        let engine = Engine::default();
        let mut generator = Generator::new(
            GeneratorConfig {
                shuffle_moves: 2,
                max_attempts: 3,
                ..GeneratorConfig::default()
            },
            &engine,
        )
        .with_rng(StdRng::seed_from_u64(2));

        match generator.generate(Difficulty::Medium) {
            Err(PuzzleError::GenerationExhausted {
                closest,
                distance,
                band,
            }) => {
                assert_eq!(band, Difficulty::Medium);
                assert_eq!(table().distance(&closest), Some(distance));
                assert!(distance <= 2);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test_log::test]
    fn no_measured_attempt_never_reports_the_goal() {
        let engine = Engine::default();
        let configs = [
            GeneratorConfig {
                max_attempts: 0,
                ..GeneratorConfig::default()
            },
            GeneratorConfig {
                shuffle_moves: 0,
                random_moves: 0,
                max_attempts: 5,
            },
        ];
        for config in configs {
            let mut generator =
                Generator::new(config, &engine).with_rng(StdRng::seed_from_u64(4));
            let (state, distance) = match generator.generate(Difficulty::Custom(31)) {
                Ok(generated) => (generated.state, generated.distance.unwrap()),
                Err(PuzzleError::GenerationExhausted {
                    closest, distance, ..
                }) => (closest, distance),
                Err(err) => panic!("unexpected error {err}"),
            };
            assert!(!state.is_goal());
            assert!(distance > 0);
            assert_eq!(table().distance(&state), Some(distance));
        }
    }

    #[test_log::test]
    fn cancellation_stops_generation() {
        use std::sync::{atomic::AtomicBool, Arc};

        let engine = Engine::new(SolverConfig {
            check_interval: 1,
            ..SolverConfig::default()
        })
        .with_cancel(Arc::new(AtomicBool::new(true)));
        assert!(matches!(
            generator(&engine, 9).generate(Difficulty::Hard),
            Err(PuzzleError::Cancelled)
        ));
    }
}
