use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell on the grid. Column `x` grows to the right, row `y` grows downwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A proposed transition from one cell to another.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Move {
    pub from: Position,
    pub to: Position,
}

impl Move {
    /// Builds a move by applying independent transforms to each axis of `from`.
    pub fn new(from: Position, f_x: impl Fn(i32) -> i32, f_y: impl Fn(i32) -> i32) -> Self {
        Self {
            from,
            to: Position::new(f_x(from.x), f_y(from.y)),
        }
    }

    /// One step from `from`, or `None` when the step would leave the `i32` range.
    pub fn towards(from: Position, direction: Direction) -> Option<Self> {
        let (dx, dy) = direction.delta();
        let to = Position::new(from.x.checked_add(dx)?, from.y.checked_add(dy)?);
        Some(Self { from, to })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// The four single-step commands the robot understands.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Left, Direction::Right, Direction::Up, Direction::Down];

    // Up is towards row 0
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
        }
    }

    /// The keyword used for this direction in program text.
    pub fn keyword(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|direction| direction.keyword() == word)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}
