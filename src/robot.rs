use std::fmt;
use std::sync::{Arc, Mutex};

use crate::position::{Direction, Move, Position};

pub const DEFAULT_ROBOT_SPRITE: &str = "img/Robot_37500.png";

/// Veto policy consulted before a move commits. Returning `false` rejects the move.
pub type MoveAcceptor = Box<dyn Fn(&Move, &Robot) -> bool + Send + Sync>;

/// Notification fired after a move has committed.
pub type MoveObserver = Box<dyn Fn(&Move, &Robot) + Send + Sync>;

/// A robot shared between the scene, compiled commands and running programs.
pub type SharedRobot = Arc<Mutex<Robot>>;

pub struct Robot {
    pos: Position,
    initial_pos: Position,
    sprite: String,
    move_acceptors: Vec<MoveAcceptor>,
    move_observers: Vec<MoveObserver>,
}

impl Robot {
    pub fn new(x: i32, y: i32) -> Self {
        Self::at(Position::new(x, y))
    }

    pub fn at(pos: Position) -> Self {
        Self {
            pos,
            initial_pos: pos,
            sprite: DEFAULT_ROBOT_SPRITE.to_string(),
            move_acceptors: Vec::new(),
            move_observers: Vec::new(),
        }
    }

    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = sprite.into();
        self
    }

    pub fn into_shared(self) -> SharedRobot {
        Arc::new(Mutex::new(self))
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn initial_pos(&self) -> Position {
        self.initial_pos
    }

    pub fn sprite(&self) -> &str {
        &self.sprite
    }

    /// Appends an acceptor. Acceptors are consulted in subscription order.
    pub fn subscribe_acceptor<F>(&mut self, acceptor: F)
    where
        F: Fn(&Move, &Robot) -> bool + Send + Sync + 'static,
    {
        self.move_acceptors.push(Box::new(acceptor));
    }

    /// Appends an observer. Observers are notified in subscription order.
    pub fn subscribe_observer<F>(&mut self, observer: F)
    where
        F: Fn(&Move, &Robot) + Send + Sync + 'static,
    {
        self.move_observers.push(Box::new(observer));
    }

    pub fn acceptor_count(&self) -> usize {
        self.move_acceptors.len()
    }

    pub fn observer_count(&self) -> usize {
        self.move_observers.len()
    }

    pub fn go_left(&mut self) -> bool {
        self.step(Direction::Left)
    }

    pub fn go_right(&mut self) -> bool {
        self.step(Direction::Right)
    }

    pub fn go_up(&mut self) -> bool {
        self.step(Direction::Up)
    }

    pub fn go_down(&mut self) -> bool {
        self.step(Direction::Down)
    }

    /// Attempts a single step. Returns `true` when the move committed.
    pub fn step(&mut self, direction: Direction) -> bool {
        match Move::towards(self.pos, direction) {
            Some(mv) => self.do_move(mv),
            None => {
                log::debug!("Step {} from {} leaves the coordinate range", direction, self.pos);
                false
            }
        }
    }

    /// Puts the robot back on its starting cell without consulting acceptors
    /// or notifying observers. Used when a level restarts.
    pub fn reset_to_initial_position(&mut self) {
        self.pos = self.initial_pos;
    }

    fn do_move(&mut self, mv: Move) -> bool {
        let approved = {
            let robot: &Robot = self;
            robot.move_acceptors.iter().all(|accept| accept(&mv, robot))
        };
        if !approved {
            log::debug!("Move {} vetoed", mv);
            return false;
        }

        self.pos = mv.to;
        log::debug!("Move {} committed", mv);
        let robot: &Robot = self;
        for observer in &robot.move_observers {
            observer(&mv, robot);
        }
        true
    }
}

impl fmt::Debug for Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Robot")
            .field("pos", &self.pos)
            .field("initial_pos", &self.initial_pos)
            .field("sprite", &self.sprite)
            .field("move_acceptors", &self.move_acceptors.len())
            .field("move_observers", &self.move_observers.len())
            .finish()
    }
}
