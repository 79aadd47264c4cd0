use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::position::{Move, Position};
use crate::robot::Robot;

pub const DEFAULT_WALL_SPRITE: &str = "img/Wall.png";

/// Inclusive range along one axis.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl AxisRange {
    pub fn contains(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn len(&self) -> usize {
        if self.max < self.min {
            0
        } else {
            (i64::from(self.max) - i64::from(self.min) + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rectangular playing field. Rejects any move that would leave it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct GridBoundary {
    pub x: AxisRange,
    pub y: AxisRange,
}

impl GridBoundary {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            x: AxisRange { min: min_x, max: max_x },
            y: AxisRange { min: min_y, max: max_y },
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.x.contains(pos.x) && self.y.contains(pos.y)
    }

    pub fn accept_within_bounds(&self, mv: &Move) -> bool {
        self.contains(mv.to)
    }

    pub fn width(&self) -> usize {
        self.x.len()
    }

    pub fn height(&self) -> usize {
        self.y.len()
    }

    /// All cells, row by row from the top-left corner.
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (self.y.min..=self.y.max)
            .flat_map(move |y| (self.x.min..=self.x.max).map(move |x| Position::new(x, y)))
    }

    pub fn subscribe(&self, robot: &mut Robot) {
        let bounds = *self;
        robot.subscribe_acceptor(move |mv, _| bounds.accept_within_bounds(mv));
    }
}

/// Callback invoked with the rejected move whenever a wall blocks the robot.
pub type BlockedNotifier = Arc<dyn Fn(&Move) + Send + Sync>;

/// An impassable cell.
#[derive(Clone)]
pub struct Wall {
    pos: Position,
    sprite: String,
    on_blocked: Option<BlockedNotifier>,
}

impl Wall {
    pub fn new(x: i32, y: i32) -> Self {
        Self::at(Position::new(x, y))
    }

    pub fn at(pos: Position) -> Self {
        Self {
            pos,
            sprite: DEFAULT_WALL_SPRITE.to_string(),
            on_blocked: None,
        }
    }

    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = sprite.into();
        self
    }

    /// Replaces the default warning log with a custom notification.
    pub fn with_notifier(mut self, notifier: BlockedNotifier) -> Self {
        self.on_blocked = Some(notifier);
        self
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn sprite(&self) -> &str {
        &self.sprite
    }

    /// Rejects a move landing exactly on the wall and tells the player about it.
    pub fn block(&self, mv: &Move) -> bool {
        if mv.to != self.pos {
            return true;
        }

        match &self.on_blocked {
            Some(notify) => notify(mv),
            None => log::warn!("The robot cannot pass through the wall at {}", self.pos),
        }
        false
    }

    pub fn subscribe(&self, robot: &mut Robot) {
        let wall = self.clone();
        robot.subscribe_acceptor(move |mv, _| wall.block(mv));
    }
}

impl fmt::Debug for Wall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wall")
            .field("pos", &self.pos)
            .field("sprite", &self.sprite)
            .field("on_blocked", &self.on_blocked.is_some())
            .finish()
    }
}
