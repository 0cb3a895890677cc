use eight_puzzle::{
    Config, ConfigProvider, Difficulty, DirectoryProvider, DistanceTable, Engine, Generator,
    JsonFileStore, MinMoves, Move, PuzzleError, Report, Session, SolverConfig, State, GOAL,
};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::{Arc, Mutex, OnceLock};

fn table() -> &'static DistanceTable {
    static TABLE: OnceLock<DistanceTable> = OnceLock::new();
    TABLE.get_or_init(DistanceTable::build)
}

fn state(tiles: [u8; 9]) -> State {
    State::new(tiles).unwrap()
}

#[test_log::test]
fn one_slide_from_goal() {
    let start = state([1, 2, 3, 4, 5, 6, 7, 0, 8]);
    assert!(start.is_solvable());

    let engine = Engine::default();
    let solution = engine.solve(&start).unwrap();
    assert_eq!(solution.path, vec![Move::new(8).unwrap()]);
    assert_eq!(engine.distance(&start).unwrap().moves, 1);
}

#[test_log::test]
fn goal_is_zero_moves() {
    let engine = Engine::default();
    assert_eq!(engine.distance(&GOAL).unwrap().moves, 0);
    assert!(engine.solve(&GOAL).unwrap().path.is_empty());
}

#[test_log::test]
fn blank_in_the_top_left_corner() {
    let start = state([0, 1, 2, 4, 5, 3, 7, 8, 6]);
    let truth = table().distance(&start);
    assert_eq!(start.is_solvable(), truth.is_some());

    let solution = Engine::default().solve(&start).unwrap();
    assert_eq!(Some(solution.path.len() as u8), truth);
}

#[test_log::test]
fn swapped_pair_is_unsolvable_and_never_generated() {
    let swapped = state([2, 1, 3, 4, 5, 6, 7, 8, 0]);
    assert!(!swapped.is_solvable());
    assert!(matches!(
        Engine::default().solve(&swapped),
        Err(PuzzleError::Unsolvable)
    ));

    let engine = Engine::default();
    let mut generator = Generator::new(Config::default().generator, &engine)
        .with_rng(StdRng::seed_from_u64(42));
    for band in [Difficulty::VeryEasy, Difficulty::Random, Difficulty::Custom(3)] {
        for _ in 0..10 {
            let generated = generator.generate(band).unwrap();
            assert_ne!(generated.state, swapped);
            assert_ne!(generated.state, GOAL);
            assert!(table().distance(&generated.state).is_some());
        }
    }
}

#[test]
fn malformed_tiles_are_rejected() {
    assert!(matches!(
        "1,2,3,4,5,6,7,8".parse::<State>(),
        Err(PuzzleError::InvalidState(_))
    ));
    assert!(matches!(
        "1,2,3,4,5,6,7,8,8".parse::<State>(),
        Err(PuzzleError::InvalidState(_))
    ));
    assert_eq!("123456708".parse::<State>().unwrap(), state([1, 2, 3, 4, 5, 6, 7, 0, 8]));
}

#[test_log::test]
fn exported_move_files_feed_the_generator() {
    let dir = tempfile::tempdir().unwrap();
    table().write_move_files(dir.path()).unwrap();
    let provider = DirectoryProvider::new(dir.path());

    let engine = Engine::default();
    let mut generator = Generator::new(Config::default().generator, &engine)
        .with_provider(&provider as &dyn ConfigProvider)
        .with_rng(StdRng::seed_from_u64(1));
    for band in Difficulty::BANDED {
        let generated = generator.generate(band).unwrap();
        let distance = generated.distance.unwrap();
        assert!(band.contains(distance), "{band}: {distance}");
        assert_eq!(table().distance(&generated.state), Some(distance));
    }
}

#[test_log::test]
fn session_plays_a_puzzle_to_the_end() {
    let reports = Arc::new(Mutex::new(Vec::<Report>::new()));
    let sink = {
        let reports = Arc::clone(&reports);
        move |report: Report| reports.lock().unwrap().push(report)
    };
    let mut session = Session::new(Config::default()).with_sink(sink);
    let generated = session.shuffle(Difficulty::Medium, None).unwrap();
    let distance = generated.distance.unwrap();

    let path = session.spawn_solve().join().unwrap();
    assert_eq!(path.len(), distance as usize);
    for (index, &mv) in path.iter().enumerate() {
        session.apply_move(mv).unwrap();
        assert_eq!(
            session.min_moves().unwrap(),
            MinMoves::Exact((path.len() - index - 1) as u8)
        );
    }
    assert!(session.state().is_goal());

    let reports = reports.lock().unwrap();
    assert_eq!(reports.first().unwrap().moves, Some(MinMoves::Exact(distance)));
    assert_eq!(reports.last().unwrap().moves, Some(MinMoves::Exact(0)));
}

#[test_log::test]
fn timed_out_session_shows_labelled_estimate() {
    let config = Config {
        solver: SolverConfig {
            time_budget_ms: 0,
            ..SolverConfig::default()
        },
        ..Config::default()
    };
    let mut session = Session::new(config);
    let hardest = state([6, 4, 7, 8, 5, 0, 3, 2, 1]);
    session.set_state(hardest);

    match session.min_moves().unwrap() {
        MinMoves::Estimate(moves) => assert!(moves <= 31),
        other => panic!("expected an estimate, got {other:?}"),
    }
    assert_eq!(session.engine().cache().lookup_distance(&hardest), None);
}

#[test_log::test]
fn persisted_cache_warms_the_next_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let start = state([4, 1, 3, 7, 2, 6, 0, 5, 8]);

    let moves = {
        let mut session = Session::with_store(Config::default(), Box::new(JsonFileStore::new(&path)));
        session.set_state(start);
        let moves = session.solve().unwrap().len();
        session.save().unwrap();
        moves
    };

    {
        let mut session =
            Session::with_store(Config::default(), Box::new(JsonFileStore::new(&path)));
        session.set_state(state([1, 2, 3, 4, 5, 6, 7, 0, 8]));
        let query = session.engine().distance(&start).unwrap();
        assert_eq!(query.moves as usize, moves);
        assert_eq!(query.expanded, 0);
    }

    let session = Session::with_store(Config::default(), Box::new(JsonFileStore::new(&path)));
    assert_eq!(
        session.engine().cache().lookup_distance(&start),
        Some(moves as u8)
    );
}
