use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::lock;
use crate::position::Direction;
use crate::robot::SharedRobot;

/// One `direction(count)` unit found in program text.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Token {
    pub direction: Direction,
    pub count: u32,
    /// Byte range of the whole match, trailing word characters included.
    pub span: Range<usize>,
}

/// Finds every `left(n)`, `right(n)`, `up(n)` and `down(n)` in `text`, in order.
///
/// Word characters directly after the closing parenthesis belong to the token and
/// are dropped, unless they start the next token. Everything else that does not
/// form a token is skipped.
pub fn tokenize(text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match match_token(bytes, i) {
            Some(TokenMatch { direction, digits, end }) => {
                // Counts that don't fit are treated like any other malformed text
                match text[digits].parse::<u32>() {
                    Ok(count) => tokens.push(Token { direction, count, span: i..end }),
                    Err(_) => log::debug!("Ignoring oversized count at byte {}", i),
                }
                i = end;
            }
            None => i += 1,
        }
    }

    tokens
}

struct TokenMatch {
    direction: Direction,
    digits: Range<usize>,
    end: usize,
}

fn match_token(bytes: &[u8], start: usize) -> Option<TokenMatch> {
    let (direction, digits) = match_head(bytes, start)?;
    let mut i = digits.end + 1;

    // A token glued straight onto the previous one still counts as a token
    while bytes.get(i).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        && match_head(bytes, i).is_none()
    {
        i += 1;
    }

    Some(TokenMatch { direction, digits, end: i })
}

/// Recognises `keyword(digits)` at `start`, returning the direction and the digit range.
fn match_head(bytes: &[u8], start: usize) -> Option<(Direction, Range<usize>)> {
    let rest = &bytes[start..];
    let direction = Direction::ALL
        .into_iter()
        .find(|direction| rest.starts_with(direction.keyword().as_bytes()))?;

    let mut i = start + direction.keyword().len();
    if bytes.get(i) != Some(&b'(') {
        return None;
    }
    i += 1;

    let digits_start = i;
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    if i == digits_start || bytes.get(i) != Some(&b')') {
        return None;
    }

    Some((direction, digits_start..i))
}

/// A single step of a compiled program, bound to the robot it moves.
#[derive(Clone)]
pub struct Command {
    direction: Direction,
    robot: SharedRobot,
}

impl Command {
    pub fn new(direction: Direction, robot: SharedRobot) -> Self {
        Self { direction, robot }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn robot(&self) -> &SharedRobot {
        &self.robot
    }

    /// Runs the step through the robot's move pipeline. Returns whether the move committed.
    pub fn invoke(&self) -> bool {
        lock(&self.robot).step(self.direction)
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.direction == other.direction && Arc::ptr_eq(&self.robot, &other.robot)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({})", self.direction)
    }
}

/// Turns program text into commands for one robot.
pub struct Compiler {
    robot: SharedRobot,
}

impl Compiler {
    pub fn new(robot: SharedRobot) -> Self {
        Self { robot }
    }

    /// Expands every token into `count` single-step commands, preserving source order.
    /// Nothing moves until the returned commands are invoked.
    pub fn compile(&self, program_text: &str) -> Vec<Command> {
        let tokens = tokenize(program_text);
        let commands: Vec<Command> = tokens
            .iter()
            .flat_map(|token| std::iter::repeat(token.direction).take(token.count as usize))
            .map(|direction| Command::new(direction, self.robot.clone()))
            .collect();

        log::debug!("Compiled {} tokens into {} commands", tokens.len(), commands.len());
        commands
    }
}
