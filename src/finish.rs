use std::sync::Weak;

use crate::position::{Move, Position};
use crate::robot::Robot;

pub const DEFAULT_FINISH_SPRITE: &str = "img/Sports-Finish-Flag-icon.png";

/// Whatever owns the level a finish belongs to. Told when the robot arrives.
pub trait LevelHost: Send + Sync {
    /// Stops the running program and signals that the level is complete.
    fn finish_reached(&self, finish: Position);
}

/// Goal cell of a level.
#[derive(Clone, Debug)]
pub struct Finish {
    pos: Position,
    sprite: String,
}

impl Finish {
    pub fn new(x: i32, y: i32) -> Self {
        Self::at(Position::new(x, y))
    }

    pub fn at(pos: Position) -> Self {
        Self {
            pos,
            sprite: DEFAULT_FINISH_SPRITE.to_string(),
        }
    }

    pub fn with_sprite(mut self, sprite: impl Into<String>) -> Self {
        self.sprite = sprite.into();
        self
    }

    pub fn pos(&self) -> Position {
        self.pos
    }

    pub fn sprite(&self) -> &str {
        &self.sprite
    }

    pub fn is_reached_by(&self, mv: &Move) -> bool {
        mv.to == self.pos
    }

    /// Hands a committed move that lands on the finish over to the host.
    /// Returns whether the finish was reached.
    pub fn finish_when_reached(&self, mv: &Move, host: &Weak<dyn LevelHost>) -> bool {
        if !self.is_reached_by(mv) {
            return false;
        }

        match host.upgrade() {
            Some(host) => host.finish_reached(self.pos),
            None => log::debug!("Finish at {} reached after its level was dropped", self.pos),
        }
        true
    }

    /// Observes `robot`. The host is held weakly so the robot never keeps its level alive.
    pub fn subscribe(&self, robot: &mut Robot, host: Weak<dyn LevelHost>) {
        let finish = self.clone();
        robot.subscribe_observer(move |mv, _| {
            finish.finish_when_reached(mv, &host);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Direction;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingHost {
        reached: Mutex<Vec<Position>>,
    }

    impl LevelHost for RecordingHost {
        fn finish_reached(&self, finish: Position) {
            self.reached.lock().unwrap().push(finish);
        }
    }

    #[test]
    fn host_is_told_only_when_robot_lands_on_finish() {
        let host = Arc::new(RecordingHost::default());
        let weak: Weak<dyn LevelHost> = Arc::downgrade(&host) as Weak<dyn LevelHost>;
        let mut robot = Robot::new(4, 2);
        Finish::new(2, 2).subscribe(&mut robot, weak);

        robot.go_up();
        robot.go_down();
        assert!(host.reached.lock().unwrap().is_empty());

        robot.go_left();
        robot.go_left();
        assert_eq!(*host.reached.lock().unwrap(), vec![Position::new(2, 2)]);
    }

    #[test]
    fn dropped_host_is_ignored() {
        let host = Arc::new(RecordingHost::default());
        let weak: Weak<dyn LevelHost> = Arc::downgrade(&host) as Weak<dyn LevelHost>;
        drop(host);

        let finish = Finish::new(0, 1);
        let mv = Move::towards(Position::new(0, 0), Direction::Down).unwrap();
        assert!(finish.finish_when_reached(&mv, &weak));
    }
}
