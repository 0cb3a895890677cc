use crate::error::{PuzzleError, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const SIZE: usize = 3;
pub const CELLS: usize = SIZE * SIZE;

/// The solved configuration, blank in the bottom-right corner.
pub const GOAL: State = State {
    tiles: [1, 2, 3, 4, 5, 6, 7, 8, 0],
};

/// Direction the blank travels in. Neighbor generation always walks these in
/// `ALL` order so that ties between optimal paths resolve reproducibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_offset(&self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Direction::Up => "Up",
            Direction::Down => "Down",
            Direction::Left => "Left",
            Direction::Right => "Right",
        };
        write!(f, "{}", s)
    }
}

/// A move, identified by the cell index the blank moves into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Move(u8);

impl Move {
    pub fn new(target: usize) -> Result<Self> {
        if target >= CELLS {
            return Err(PuzzleError::InvalidState(format!(
                "move target {target} is outside the grid"
            )));
        }
        Ok(Move(target as u8))
    }

    pub fn target(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 3x3 configuration stored row-major, `0` for the blank. Always a
/// permutation of `0..=8`; every constructor checks this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct State {
    tiles: [u8; CELLS],
}

impl State {
    pub fn new(tiles: [u8; CELLS]) -> Result<Self> {
        let mut seen = [false; CELLS];
        for &tile in &tiles {
            let slot = seen.get_mut(tile as usize).ok_or_else(|| {
                PuzzleError::InvalidState(format!("tile {tile} is out of range 0..=8"))
            })?;
            if *slot {
                return Err(PuzzleError::InvalidState(format!(
                    "tile {tile} appears more than once"
                )));
            }
            *slot = true;
        }
        Ok(State { tiles })
    }

    pub fn from_slice(tiles: &[u8]) -> Result<Self> {
        let tiles: [u8; CELLS] = tiles.try_into().map_err(|_| {
            PuzzleError::InvalidState(format!("expected {CELLS} tiles, got {}", tiles.len()))
        })?;
        Self::new(tiles)
    }

    pub fn tiles(&self) -> &[u8; CELLS] {
        &self.tiles
    }

    pub fn blank(&self) -> usize {
        self.position_of(0)
    }

    /// Index of `tile`. Every tile is present, so this always finds one.
    pub fn position_of(&self, tile: u8) -> usize {
        self.tiles
            .iter()
            .position(|&t| t == tile)
            .unwrap_or(CELLS)
    }

    pub fn is_goal(&self) -> bool {
        *self == GOAL
    }

    pub fn try_move(&self, dir: Direction) -> Option<(State, Move)> {
        let blank = self.blank();
        let (dr, dc) = dir.as_offset();

        let row = (blank / SIZE) as isize + dr;
        let col = (blank % SIZE) as isize + dc;
        if row < 0 || row >= SIZE as isize || col < 0 || col >= SIZE as isize {
            return None;
        }

        let target = row as usize * SIZE + col as usize;
        let mut next = *self;
        next.tiles.swap(blank, target);
        Some((next, Move(target as u8)))
    }

    /// Successor states in `Direction::ALL` order, never re-sorted.
    pub fn neighbors(&self) -> impl Iterator<Item = (State, Move)> {
        let state = *self;
        Direction::ALL
            .into_iter()
            .filter_map(move |dir| state.try_move(dir))
    }

    pub fn direction_of(&self, mv: Move) -> Option<Direction> {
        let blank = self.blank();
        let target = mv.target();
        let (br, bc) = (blank / SIZE, blank % SIZE);
        let (tr, tc) = (target / SIZE, target % SIZE);

        match (tr as isize - br as isize, tc as isize - bc as isize) {
            (-1, 0) => Some(Direction::Up),
            (1, 0) => Some(Direction::Down),
            (0, -1) => Some(Direction::Left),
            (0, 1) => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn is_legal(&self, mv: Move) -> bool {
        self.direction_of(mv).is_some()
    }

    /// The state after `mv`, or `None` when the target is not orthogonally
    /// adjacent to the blank.
    pub fn apply(&self, mv: Move) -> Option<State> {
        self.direction_of(mv)
            .and_then(|dir| self.try_move(dir))
            .map(|(next, _)| next)
    }

    pub fn apply_move(&mut self, mv: Move) -> bool {
        match self.apply(mv) {
            Some(next) => {
                *self = next;
                true
            }
            None => false,
        }
    }

    /// Applies `path` in order, failing on the first illegal move.
    pub fn apply_path(&self, path: &[Move]) -> Result<State> {
        path.iter().try_fold(*self, |state, &mv| {
            state.apply(mv).ok_or_else(|| {
                PuzzleError::InvalidState(format!("move into cell {mv} is not legal"))
            })
        })
    }

    /// Pairs of non-blank tiles in reverse relative order.
    pub fn inversions(&self) -> usize {
        self.tiles
            .iter()
            .enumerate()
            .filter(|&(_, &val)| val != 0)
            .map(|(i, &val)| {
                self.tiles[i + 1..]
                    .iter()
                    .filter(|&&next| next != 0 && next < val)
                    .count()
            })
            .sum()
    }

    /// On an odd-width board a blank move shifts a tile by zero or two places
    /// in the non-blank order, so inversion parity is invariant and the blank's
    /// position plays no part. The goal has zero inversions.
    pub fn is_solvable(&self) -> bool {
        self.inversions() % 2 == 0
    }

    pub fn is_reachable_from(&self, other: &State) -> bool {
        self.inversions() % 2 == other.inversions() % 2
    }
}

impl Default for State {
    fn default() -> Self {
        GOAL
    }
}

impl TryFrom<Vec<u8>> for State {
    type Error = PuzzleError;

    fn try_from(tiles: Vec<u8>) -> Result<Self> {
        State::from_slice(&tiles)
    }
}

impl From<State> for Vec<u8> {
    fn from(state: State) -> Self {
        state.tiles.to_vec()
    }
}

/// Accepts `1,2,3,4,5,6,7,0,8`, whitespace separated tiles or the compact
/// `123456708`.
impl FromStr for State {
    type Err = PuzzleError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let tiles = if s.contains(|c: char| c == ',' || c.is_whitespace()) {
            s.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<u8>().map_err(|_| {
                        PuzzleError::InvalidState(format!("`{part}` is not a tile number"))
                    })
                })
                .collect::<Result<Vec<u8>>>()?
        } else {
            s.chars()
                .map(|c| {
                    c.to_digit(10).map(|d| d as u8).ok_or_else(|| {
                        PuzzleError::InvalidState(format!("`{c}` is not a tile number"))
                    })
                })
                .collect::<Result<Vec<u8>>>()?
        };
        State::from_slice(&tiles)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({:?})", self.tiles)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.tiles.chunks(SIZE) {
            for &val in row {
                if val == 0 {
                    write!(f, " . ")?;
                } else {
                    write!(f, "{:2} ", val)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
