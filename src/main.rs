use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use eight_puzzle::{
    puzzle::SIZE, Config, ConfigProvider, Difficulty, DirectoryProvider, DistanceTable,
    JsonFileStore, MinMoves, PuzzleError, Result, Session, State,
};
use env_logger::TimestampPrecision;
use log::{LevelFilter, warn};
use std::{path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Solver and generator settings, in TOML format.
    #[arg(long, short = 'c', value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// JSON file that keeps solved distances between runs.
    #[arg(long, value_name = "CACHE")]
    cache: Option<PathBuf>,

    /// Increase logging verbosity (can be repeated)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    log_level: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an optimal solution and the board after every move.
    Solve {
        /// Tiles in row-major order, 0 for the blank, e.g. "1,2,3,4,5,6,7,0,8".
        tiles: State,
    },
    /// Print the minimum number of moves to the goal.
    Distance {
        /// Tiles in row-major order, 0 for the blank.
        tiles: State,
    },
    /// Generate a puzzle.
    Shuffle {
        /// very-easy, easy, medium, hard, very-hard, extreme, random, or an
        /// exact move count.
        #[arg(short, long, default_value = "medium")]
        difficulty: Difficulty,
        /// Directory of moves_<n>.json files to draw puzzles from.
        #[arg(long, value_name = "DIR")]
        moves_dir: Option<PathBuf>,
    },
    /// Print how many states lie at each distance from the goal.
    Stats,
    /// Write one moves_<n>.json file per distance plus index.json.
    Export { dir: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.log_level {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let mut session = match cli.cache {
        Some(path) => Session::with_store(config, Box::new(JsonFileStore::new(path))),
        None => Session::new(config),
    };

    match cli.command {
        Commands::Solve { tiles } => run_solve(&mut session, tiles),
        Commands::Distance { tiles } => run_distance(&mut session, tiles),
        Commands::Shuffle {
            difficulty,
            moves_dir,
        } => run_shuffle(&mut session, difficulty, moves_dir),
        Commands::Stats => {
            run_stats();
            Ok(())
        }
        Commands::Export { dir } => {
            let index = DistanceTable::build().write_move_files(&dir)?;
            println!(
                "Wrote {} move files (up to {} moves) to {}",
                index.total_files,
                index.max_moves,
                dir.display()
            );
            Ok(())
        }
    }
}

fn run_solve(session: &mut Session, start: State) -> Result<()> {
    session.set_state(start);
    println!("Start:\n{}\n", board(&start));

    let path = session.solve()?;
    println!("Optimal solution: {} moves\n", path.len());

    let mut state = start;
    for (step, mv) in path.into_iter().enumerate() {
        let (Some(direction), Some(next)) = (state.direction_of(mv), state.apply(mv)) else {
            return Err(PuzzleError::InvalidState(format!(
                "cell {mv} is not next to the blank"
            )));
        };
        state = next;
        println!("{}. {direction}\n{}\n", step + 1, board(&state));
    }
    Ok(())
}

fn run_distance(session: &mut Session, start: State) -> Result<()> {
    session.set_state(start);
    match session.min_moves()? {
        MinMoves::Exact(moves) => println!("{moves} moves ({})", Difficulty::from_moves(moves)),
        MinMoves::Estimate(moves) => {
            println!("at least {moves} moves {}", "(estimate, search gave up)".yellow());
        }
        MinMoves::Unsolvable => println!("{}", "unsolvable".red()),
    }
    Ok(())
}

fn run_shuffle(
    session: &mut Session,
    difficulty: Difficulty,
    moves_dir: Option<PathBuf>,
) -> Result<()> {
    let provider = moves_dir.map(DirectoryProvider::new);
    let provider = provider
        .as_ref()
        .map(|provider| provider as &dyn ConfigProvider);

    match session.shuffle(difficulty, provider) {
        Ok(generated) => {
            println!("{}\n", board(&generated.state));
            match generated.distance {
                Some(moves) => println!("{moves} moves ({difficulty})"),
                None => println!("{difficulty} puzzle, distance not measured"),
            }
            println!("{}", compact(&generated.state));
            Ok(())
        }
        Err(PuzzleError::GenerationExhausted {
            closest, distance, ..
        }) => {
            warn!("Falling back to the closest puzzle found");
            println!("{}\n", board(&closest));
            println!(
                "{distance} moves {}",
                format!("(approximately {}, not {difficulty})", Difficulty::from_moves(distance))
                    .yellow()
            );
            println!("{}", compact(&closest));
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn run_stats() {
    let table = DistanceTable::build();
    println!("{}", "Moves      Count   Percent  Cumulative".bold());
    for row in table.distribution() {
        println!(
            "{:>5} {:>10} {:>8.3}% {:>10.3}%",
            row.moves, row.count, row.percentage, row.cumulative
        );
    }
    println!(
        "\n{} solvable states, at most {} moves from the goal",
        table.len(),
        table.max_distance()
    );
}

fn board(state: &State) -> String {
    state
        .tiles()
        .chunks(SIZE)
        .map(|row| {
            row.iter()
                .map(|&tile| match tile {
                    0 => " . ".dim().to_string(),
                    tile => format!("{tile:2} ").bold().to_string(),
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn compact(state: &State) -> String {
    state.tiles().iter().map(u8::to_string).collect()
}
