/// Entities: the player, move directions, and per-move input.
/// The player is not a block; it never occupies a board cell.

use serde::{Deserialize, Serialize};

/// Movement direction, one grid step. `Up` is toward y = 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum MoveDir {
    Up,
    Down,
    Left,
    Right,
}

impl MoveDir {
    pub const ALL: [MoveDir; 4] = [MoveDir::Up, MoveDir::Down, MoveDir::Left, MoveDir::Right];

    /// Unit vector `(dx, dy)`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            MoveDir::Up => (0, -1),
            MoveDir::Down => (0, 1),
            MoveDir::Left => (-1, 0),
            MoveDir::Right => (1, 0),
        }
    }

    /// Inverse of `delta`. Anything but a unit vector is `None`.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (0, -1) => Some(MoveDir::Up),
            (0, 1) => Some(MoveDir::Down),
            (-1, 0) => Some(MoveDir::Left),
            (1, 0) => Some(MoveDir::Right),
            _ => None,
        }
    }

    /// Edit-time rotation: Down → Left → Up → Right → Down.
    pub fn rotated(self) -> Self {
        match self {
            MoveDir::Down => MoveDir::Left,
            MoveDir::Left => MoveDir::Up,
            MoveDir::Up => MoveDir::Right,
            MoveDir::Right => MoveDir::Down,
        }
    }

    pub fn arrow(self) -> char {
        match self {
            MoveDir::Up => '^',
            MoveDir::Down => 'v',
            MoveDir::Left => '<',
            MoveDir::Right => '>',
        }
    }
}

/// One player action: a step, optionally pulling the block behind.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MoveInput {
    pub dir: MoveDir,
    pub pull: bool,
}

impl MoveInput {
    pub fn push(dir: MoveDir) -> Self {
        MoveInput { dir, pull: false }
    }

    pub fn pull(dir: MoveDir) -> Self {
        MoveInput { dir, pull: true }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    pub x: i32,
    pub y: i32,
    pub moves_taken: u32,
    pub objects_moved: u32,
}

impl Player {
    pub fn new(x: i32, y: i32) -> Self {
        Player { x, y, moves_taken: 0, objects_moved: 0 }
    }

    pub fn pos(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Teleport without touching the counters.
    pub fn place(&mut self, (x, y): (i32, i32)) {
        self.x = x;
        self.y = y;
    }

    pub fn reset_stats(&mut self) {
        self.moves_taken = 0;
        self.objects_moved = 0;
    }
}
