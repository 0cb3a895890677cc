use crate::puzzle::{Move, State};
use std::{cmp::Ordering, collections::BinaryHeap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchNode {
    pub state: State,
    pub path: Vec<Move>,
    pub g: u32,
    pub h: u32,
}

impl SearchNode {
    pub fn root(state: State, h: u32) -> Self {
        Self {
            state,
            path: Vec::new(),
            g: 0,
            h,
        }
    }

    pub fn f(&self) -> u32 {
        self.g + self.h
    }

    pub fn child(&self, state: State, mv: Move, h: u32) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(mv);
        Self {
            state,
            path,
            g: self.g + 1,
            h,
        }
    }
}

#[derive(Debug)]
struct Entry {
    f: u32,
    h: u32,
    seq: u64,
    node: SearchNode,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on every key: `BinaryHeap` is a max-heap.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of search nodes keyed on `f`, then `h`, then insertion order.
/// Entries are never updated in place; a better path to a state is pushed as
/// a new node and the stale one is skipped when it surfaces.
#[derive(Debug, Default)]
pub struct OpenSet {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl OpenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: SearchNode) {
        let entry = Entry {
            f: node.f(),
            h: node.h,
            seq: self.next_seq,
            node,
        };
        self.next_seq += 1;
        self.heap.push(entry);
    }

    pub fn pop(&mut self) -> Option<SearchNode> {
        self.heap.pop().map(|entry| entry.node)
    }

    pub fn peek(&self) -> Option<&SearchNode> {
        self.heap.peek().map(|entry| &entry.node)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
