//! Admissible lower bounds on the number of moves between two states.

use crate::puzzle::{State, CELLS, GOAL, SIZE};
use serde::{Deserialize, Serialize};

/// Where every tile sits in a target configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLayout {
    target: State,
    rows: [u8; CELLS],
    cols: [u8; CELLS],
}

impl TargetLayout {
    pub fn new(target: State) -> Self {
        let mut rows = [0; CELLS];
        let mut cols = [0; CELLS];
        for (index, &tile) in target.tiles().iter().enumerate() {
            rows[tile as usize] = (index / SIZE) as u8;
            cols[tile as usize] = (index % SIZE) as u8;
        }
        Self { target, rows, cols }
    }

    pub fn goal() -> Self {
        Self::new(GOAL)
    }

    pub fn target(&self) -> &State {
        &self.target
    }

    pub fn row_of(&self, tile: u8) -> usize {
        self.rows[tile as usize] as usize
    }

    pub fn col_of(&self, tile: u8) -> usize {
        self.cols[tile as usize] as usize
    }
}

impl Default for TargetLayout {
    fn default() -> Self {
        Self::goal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Heuristic {
    Manhattan,
    #[default]
    LinearConflict,
}

impl Heuristic {
    pub fn estimate(&self, state: &State, layout: &TargetLayout) -> u32 {
        match self {
            Heuristic::Manhattan => manhattan_distance(state, layout),
            Heuristic::LinearConflict => {
                manhattan_distance(state, layout) + 2 * linear_conflicts(state, layout)
            }
        }
    }
}

/// Sum of row and column displacement over the non-blank tiles. A move
/// changes exactly one tile's displacement by one, so this is consistent.
pub fn manhattan_distance(state: &State, layout: &TargetLayout) -> u32 {
    state
        .tiles()
        .iter()
        .enumerate()
        .filter(|&(_, &tile)| tile != 0)
        .map(|(index, &tile)| {
            let (row, col) = (index / SIZE, index % SIZE);
            (row.abs_diff(layout.row_of(tile)) + col.abs_diff(layout.col_of(tile))) as u32
        })
        .sum()
}

/// Number of tiles that must step off their own row or column so the rest of
/// that line can pass each other. Each one costs two moves Manhattan distance
/// does not see.
///
/// Per line this is the count of tiles belonging to the line minus the
/// longest run already in goal order. With one conflicting pair that is one
/// tile; a fully reversed line of three needs two, not three.
pub fn linear_conflicts(state: &State, layout: &TargetLayout) -> u32 {
    let tiles = state.tiles();
    let mut conflicts = 0;

    for line in 0..SIZE {
        let mut in_row = [0; SIZE];
        let mut in_col = [0; SIZE];
        let (mut rows, mut cols) = (0, 0);
        for offset in 0..SIZE {
            let tile = tiles[line * SIZE + offset];
            if tile != 0 && layout.row_of(tile) == line {
                in_row[rows] = layout.col_of(tile);
                rows += 1;
            }

            let tile = tiles[offset * SIZE + line];
            if tile != 0 && layout.col_of(tile) == line {
                in_col[cols] = layout.row_of(tile);
                cols += 1;
            }
        }
        conflicts += (rows - longest_increasing_run(&in_row[..rows])) as u32;
        conflicts += (cols - longest_increasing_run(&in_col[..cols])) as u32;
    }

    conflicts
}

fn longest_increasing_run(goal_order: &[usize]) -> usize {
    let mut best = [1; SIZE];
    let mut longest = 0;
    for i in 0..goal_order.len() {
        for j in 0..i {
            if goal_order[j] < goal_order[i] {
                best[i] = best[i].max(best[j] + 1);
            }
        }
        longest = longest.max(best[i]);
    }
    longest
}
