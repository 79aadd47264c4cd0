//! # robogrid
//!
//! Core of a grid robot puzzle. Players write programs such as `left(2)up(1)`,
//! which are compiled into single-step commands for a robot and played back one
//! step at a time. Every step goes through the robot's move pipeline, where the
//! grid boundary and walls may veto it and the finish reacts once the robot
//! arrives.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod compiler;
pub mod finish;
pub mod grid;
pub mod level;
pub mod position;
pub mod program;
pub mod robot;
pub mod scene;

pub use compiler::{tokenize, Command, Compiler, Token};
pub use finish::{Finish, LevelHost};
pub use grid::{AxisRange, BlockedNotifier, GridBoundary, Wall};
pub use level::{LevelDefinition, LevelError};
pub use position::{Direction, Move, Position};
pub use program::{Action, Program, ProgramStatus, StatusObserver};
pub use robot::{MoveAcceptor, MoveObserver, Robot, SharedRobot};
pub use scene::{EntityKind, EntityView, Scene, SceneError};

// Recovers the guard from a poisoned mutex
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
