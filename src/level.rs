use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finish::DEFAULT_FINISH_SPRITE;
use crate::grid::{GridBoundary, DEFAULT_WALL_SPRITE};
use crate::position::Position;
use crate::program::DEFAULT_STEP_DELAY;
use crate::robot::DEFAULT_ROBOT_SPRITE;

#[derive(Error, Debug)]
pub enum LevelError {
    #[error("Failed to read level file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse level: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Grid bounds are empty: x {x_min}..={x_max}, y {y_min}..={y_max}")]
    EmptyBounds { x_min: i32, x_max: i32, y_min: i32, y_max: i32 },
    #[error("The {entity} at {pos} lies outside the grid")]
    OutsideBounds { entity: &'static str, pos: Position },
    #[error("The {entity} at {pos} shares its cell with a wall")]
    WallOverlap { entity: &'static str, pos: Position },
    #[error("The robot already starts on the finish at {0}")]
    StartsOnFinish(Position),
}

pub type Result<T> = std::result::Result<T, LevelError>;

/// Sprite identifiers handed to the renderer for each kind of entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpriteSet {
    pub robot: String,
    pub finish: String,
    pub wall: String,
}

impl Default for SpriteSet {
    fn default() -> Self {
        Self {
            robot: DEFAULT_ROBOT_SPRITE.to_string(),
            finish: DEFAULT_FINISH_SPRITE.to_string(),
            wall: DEFAULT_WALL_SPRITE.to_string(),
        }
    }
}

fn default_step_delay_ms() -> u64 {
    DEFAULT_STEP_DELAY.as_millis() as u64
}

/// Everything needed to set up a scene, as stored in a level file:
///
/// ```json
/// {
///     "name": "first steps",
///     "robot": { "x": 4, "y": 4 },
///     "bounds": { "x": { "min": 0, "max": 4 }, "y": { "min": 0, "max": 4 } },
///     "walls": [ { "x": 2, "y": 3 } ],
///     "finish": { "x": 2, "y": 2 },
///     "step_delay_ms": 500
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelDefinition {
    #[serde(default)]
    pub name: String,
    pub robot: Position,
    pub bounds: GridBoundary,
    #[serde(default)]
    pub walls: Vec<Position>,
    pub finish: Position,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default)]
    pub sprites: SpriteSet,
}

impl Default for LevelDefinition {
    /// A 5x5 field with the robot in the bottom-right corner and the finish in the middle.
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            robot: Position::new(4, 4),
            bounds: GridBoundary::new(0, 0, 4, 4),
            walls: Vec::new(),
            finish: Position::new(2, 2),
            step_delay_ms: default_step_delay_ms(),
            sprites: SpriteSet::default(),
        }
    }
}

impl LevelDefinition {
    pub fn from_json(json: &str) -> Result<Self> {
        let level: LevelDefinition = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading level from {}", path.display());
        let content = fs::read_to_string(path)?;
        let level = Self::from_json(&content)?;
        log::info!("Loaded level '{}' from {}", level.name, path.display());
        Ok(level)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    /// Checks that the level can actually be played.
    pub fn validate(&self) -> Result<()> {
        let bounds = &self.bounds;
        if bounds.x.is_empty() || bounds.y.is_empty() {
            return Err(LevelError::EmptyBounds {
                x_min: bounds.x.min,
                x_max: bounds.x.max,
                y_min: bounds.y.min,
                y_max: bounds.y.max,
            });
        }

        let entities = std::iter::once(("robot", self.robot))
            .chain(std::iter::once(("finish", self.finish)))
            .chain(self.walls.iter().map(|wall| ("wall", *wall)));
        for (entity, pos) in entities {
            if !bounds.contains(pos) {
                return Err(LevelError::OutsideBounds { entity, pos });
            }
        }

        for (entity, pos) in [("robot", self.robot), ("finish", self.finish)] {
            if self.walls.contains(&pos) {
                return Err(LevelError::WallOverlap { entity, pos });
            }
        }

        if self.robot == self.finish {
            return Err(LevelError::StartsOnFinish(self.finish));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_level_is_playable() {
        let level = LevelDefinition::default();
        assert!(level.validate().is_ok());
        assert_eq!(level.step_delay(), Duration::from_millis(500));
    }

    #[test]
    fn minimal_json_fills_in_defaults() {
        let level = LevelDefinition::from_json(
            r#"{
                "robot": { "x": 0, "y": 0 },
                "bounds": { "x": { "min": 0, "max": 2 }, "y": { "min": 0, "max": 1 } },
                "finish": { "x": 2, "y": 1 }
            }"#,
        )
        .unwrap();

        assert_eq!(level.name, "");
        assert!(level.walls.is_empty());
        assert_eq!(level.step_delay_ms, 500);
        assert_eq!(level.sprites, SpriteSet::default());
        assert_eq!(level.bounds.width(), 3);
        assert_eq!(level.bounds.height(), 2);
    }

    #[test]
    fn serialized_level_loads_back() {
        let mut level = LevelDefinition::default();
        level.walls.push(Position::new(2, 3));
        level.step_delay_ms = 20;

        let json = level.to_json_pretty().unwrap();
        assert_eq!(LevelDefinition::from_json(&json).unwrap(), level);
    }

    #[test]
    fn load_reads_level_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", LevelDefinition::default().to_json_pretty().unwrap()).unwrap();

        let level = LevelDefinition::load(file.path()).unwrap();
        assert_eq!(level.robot, Position::new(4, 4));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LevelDefinition::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, LevelError::IoError(_)));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = LevelDefinition::from_json(
            r#"{
                "robot": { "x": 0, "y": 0 },
                "bounds": { "x": { "min": 0, "max": 2 }, "y": { "min": 0, "max": 2 } },
                "finish": { "x": 2, "y": 2 },
                "teleporters": []
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, LevelError::ParseError(_)));
    }

    #[test]
    fn bounds_spanning_every_coordinate_validate() {
        let level = LevelDefinition::from_json(
            r#"{
                "robot": { "x": 2147483647, "y": 0 },
                "bounds": {
                    "x": { "min": -2147483648, "max": 2147483647 },
                    "y": { "min": -2147483648, "max": 2147483647 }
                },
                "finish": { "x": -2147483648, "y": 0 }
            }"#,
        )
        .unwrap();
        assert!(level.validate().is_ok());
    }

    #[test]
    fn broken_geometry_is_reported() {
        let mut level = LevelDefinition::default();
        level.bounds = GridBoundary::new(0, 0, -1, 4);
        assert!(matches!(level.validate(), Err(LevelError::EmptyBounds { .. })));

        let mut level = LevelDefinition::default();
        level.finish = Position::new(5, 2);
        assert!(matches!(
            level.validate(),
            Err(LevelError::OutsideBounds { entity: "finish", .. })
        ));

        let mut level = LevelDefinition::default();
        level.walls.push(Position::new(2, 2));
        assert!(matches!(
            level.validate(),
            Err(LevelError::WallOverlap { entity: "finish", .. })
        ));

        let mut level = LevelDefinition::default();
        level.finish = level.robot;
        assert!(matches!(level.validate(), Err(LevelError::StartsOnFinish(_))));
    }
}
