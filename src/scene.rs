use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::compiler::Compiler;
use crate::finish::{Finish, LevelHost};
use crate::grid::{GridBoundary, Wall};
use crate::level::{LevelDefinition, LevelError};
use crate::lock;
use crate::position::{Move, Position};
use crate::program::{Program, ProgramStatus, StatusObserver};
use crate::robot::{MoveObserver, Robot, SharedRobot};

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Please wait, the program is still running")]
    ProgramRunning,
    #[error("Programs can only be played inside a tokio runtime")]
    NoRuntime,
    #[error("Invalid level: {0}")]
    LevelError(#[from] LevelError),
}

pub type Result<T> = std::result::Result<T, SceneError>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntityKind {
    Robot,
    Finish,
    Wall,
}

/// What a renderer needs to draw an entity before any move happens.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EntityView {
    pub kind: EntityKind,
    pub position: Position,
    pub sprite: String,
}

pub type CompletionObserver = Arc<dyn Fn(Position) + Send + Sync>;
pub type WallHitObserver = Arc<dyn Fn(&Move) + Send + Sync>;

/// A loaded level: the robot, the policies subscribed to it, and the program
/// currently playing on it.
///
/// Completion, wall-hit and status observers may be called from inside the
/// robot's move pipeline while the robot is locked, so they must not lock the
/// robot themselves.
pub struct Scene {
    robot: SharedRobot,
    bounds: GridBoundary,
    walls: Vec<Wall>,
    finish: Finish,
    step_delay: Duration,
    program: Mutex<Option<Program>>,
    level_complete: AtomicBool,
    completion_observers: Mutex<Vec<CompletionObserver>>,
    wall_hit_observers: Mutex<Vec<WallHitObserver>>,
    status_observers: Mutex<Vec<StatusObserver>>,
}

impl Scene {
    pub fn new(level: &LevelDefinition) -> Result<Arc<Self>> {
        Self::with_move_observers(level, Vec::new())
    }

    /// Builds the scene with `observers` subscribed ahead of the finish, so a
    /// renderer sees the final move before the level completes.
    pub fn with_move_observers(level: &LevelDefinition, observers: Vec<MoveObserver>) -> Result<Arc<Self>> {
        level.validate()?;

        let scene = Arc::new_cyclic(|weak: &Weak<Scene>| {
            let mut robot = Robot::at(level.robot).with_sprite(level.sprites.robot.clone());
            for observer in observers {
                robot.subscribe_observer(observer);
            }

            let bounds = level.bounds;
            bounds.subscribe(&mut robot);

            let walls: Vec<Wall> = level
                .walls
                .iter()
                .map(|pos| {
                    let weak = weak.clone();
                    Wall::at(*pos)
                        .with_sprite(level.sprites.wall.clone())
                        .with_notifier(Arc::new(move |mv: &Move| {
                            if let Some(scene) = weak.upgrade() {
                                scene.wall_hit(mv);
                            }
                        }))
                })
                .collect();
            for wall in &walls {
                wall.subscribe(&mut robot);
            }

            let finish = Finish::at(level.finish).with_sprite(level.sprites.finish.clone());
            let host: Weak<dyn LevelHost> = weak.clone();
            finish.subscribe(&mut robot, host);

            Scene {
                robot: robot.into_shared(),
                bounds,
                walls,
                finish,
                step_delay: level.step_delay(),
                program: Mutex::new(None),
                level_complete: AtomicBool::new(false),
                completion_observers: Mutex::new(Vec::new()),
                wall_hit_observers: Mutex::new(Vec::new()),
                status_observers: Mutex::new(Vec::new()),
            }
        });

        log::info!(
            "Scene ready: {}x{} grid, robot at {}, finish at {}, {} walls",
            scene.bounds.width(),
            scene.bounds.height(),
            level.robot,
            level.finish,
            scene.walls.len()
        );
        Ok(scene)
    }

    pub fn robot(&self) -> &SharedRobot {
        &self.robot
    }

    pub fn robot_position(&self) -> Position {
        lock(&self.robot).pos()
    }

    pub fn bounds(&self) -> &GridBoundary {
        &self.bounds
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn finish(&self) -> &Finish {
        &self.finish
    }

    pub fn step_delay(&self) -> Duration {
        self.step_delay
    }

    pub fn current_program(&self) -> Option<Program> {
        lock(&self.program).clone()
    }

    pub fn has_running_program(&self) -> bool {
        lock(&self.program).as_ref().is_some_and(Program::is_running)
    }

    pub fn is_level_complete(&self) -> bool {
        self.level_complete.load(Ordering::SeqCst)
    }

    /// Every displayable entity with its sprite, robot first.
    pub fn entities(&self) -> Vec<EntityView> {
        let robot = lock(&self.robot);
        let mut entities = vec![
            EntityView {
                kind: EntityKind::Robot,
                position: robot.pos(),
                sprite: robot.sprite().to_string(),
            },
            EntityView {
                kind: EntityKind::Finish,
                position: self.finish.pos(),
                sprite: self.finish.sprite().to_string(),
            },
        ];
        entities.extend(self.walls.iter().map(|wall| EntityView {
            kind: EntityKind::Wall,
            position: wall.pos(),
            sprite: wall.sprite().to_string(),
        }));
        entities
    }

    /// Appends a move observer, notified after the finish has been checked.
    pub fn subscribe_move_observer<F>(&self, observer: F)
    where
        F: Fn(&Move, &Robot) + Send + Sync + 'static,
    {
        lock(&self.robot).subscribe_observer(observer);
    }

    /// Registers an observer that is attached to every program this scene runs from now on.
    pub fn on_status_change<F>(&self, observer: F)
    where
        F: Fn(&Program, ProgramStatus, ProgramStatus) + Send + Sync + 'static,
    {
        lock(&self.status_observers).push(Arc::new(observer));
    }

    pub fn on_level_complete<F>(&self, observer: F)
    where
        F: Fn(Position) + Send + Sync + 'static,
    {
        lock(&self.completion_observers).push(Arc::new(observer));
    }

    pub fn on_wall_hit<F>(&self, observer: F)
    where
        F: Fn(&Move) + Send + Sync + 'static,
    {
        lock(&self.wall_hit_observers).push(Arc::new(observer));
    }

    /// Compiles `source`, puts the robot back on its start cell and plays the program.
    ///
    /// Fails while another program is still running, or when called outside a
    /// tokio runtime. Returns `None` when the source holds no commands; the
    /// robot is still reset in that case.
    pub fn run_program(&self, source: &str) -> Result<Option<JoinHandle<ProgramStatus>>> {
        let runtime = Handle::try_current().map_err(|_| SceneError::NoRuntime)?;

        // The new program is claimed before the slot is released, so a
        // concurrent caller sees it as running.
        let (program, claimed) = {
            let mut current = lock(&self.program);
            if current.as_ref().is_some_and(Program::is_running) {
                log::warn!("Rejected new program while another one is running");
                return Err(SceneError::ProgramRunning);
            }

            let commands = Compiler::new(self.robot.clone()).compile(source);
            let program = Program::new(source, commands, self.step_delay);
            for observer in lock(&self.status_observers).iter() {
                let observer = observer.clone();
                program.subscribe(move |program, new_status, old_status| {
                    observer(program, new_status, old_status)
                });
            }
            let claimed = program.claim();
            *current = Some(program.clone());
            (program, claimed)
        };

        self.level_complete.store(false, Ordering::SeqCst);
        self.reset_entities_to_initial_position();
        if !claimed {
            return Ok(None);
        }
        log::info!("Running program with {} steps", program.len());
        Ok(Some(program.start_claimed(&runtime)))
    }

    pub fn stop_program(&self) {
        if let Some(program) = self.current_program() {
            program.stop();
        }
    }

    pub fn reset_entities_to_initial_position(&self) {
        lock(&self.robot).reset_to_initial_position();
    }

    fn wall_hit(&self, mv: &Move) {
        log::warn!("The robot bumped into the wall at {}", mv.to);
        let observers = lock(&self.wall_hit_observers).clone();
        for observer in observers {
            observer(mv);
        }
    }
}

impl LevelHost for Scene {
    fn finish_reached(&self, finish: Position) {
        self.stop_program();

        if self.level_complete.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Level complete: the robot reached the finish at {}", finish);
        let observers = lock(&self.completion_observers).clone();
        for observer in observers {
            observer(finish);
        }
    }
}
