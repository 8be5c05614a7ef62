/// Block kinds and their properties.
///
/// Properties are queried via methods, not stored as flags, so block
/// semantics are centralized here. A block never stores its own position:
/// the board key is the position. Nothing here refers to presentation.

use std::collections::BTreeMap;

use super::entity::MoveDir;

/// Grid bounds: x and y both live in `GRID_MIN..=GRID_MAX`.
pub const GRID_MIN: i32 = 0;
pub const GRID_MAX: i32 = 11;
/// Interior (non-ring) bounds used by the editor.
pub const INTERIOR_MIN: i32 = GRID_MIN + 1;
pub const INTERIOR_MAX: i32 = GRID_MAX - 1;
/// Highest level a block may be raised to in the editor.
pub const MAX_EDIT_LEVEL: u32 = 6;

/// Board coordinate. `level` 0 is the floor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub level: u32,
}

impl Cell {
    pub const fn new(x: i32, y: i32, level: u32) -> Self {
        Cell { x, y, level }
    }

    pub const fn floor(x: i32, y: i32) -> Self {
        Cell { x, y, level: 0 }
    }

    pub fn column(self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn above(self) -> Cell {
        Cell { level: self.level + 1, ..self }
    }

    /// Neighbouring floor cell one step along `dir`.
    pub fn step(self, dir: MoveDir) -> Cell {
        let (dx, dy) = dir.delta();
        Cell::floor(self.x + dx, self.y + dy)
    }

    pub fn in_grid(self) -> bool {
        in_grid(self.x, self.y)
    }
}

pub fn in_grid(x: i32, y: i32) -> bool {
    (GRID_MIN..=GRID_MAX).contains(&x) && (GRID_MIN..=GRID_MAX).contains(&y)
}

pub fn on_ring(x: i32, y: i32) -> bool {
    x == GRID_MIN || x == GRID_MAX || y == GRID_MIN || y == GRID_MAX
}

/// Which way a movable block may be displaced.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Constraint {
    Any,
    Fixed(MoveDir),
}

impl Constraint {
    /// Exact vector equality; a fixed block never moves sideways or backwards.
    pub fn allows(self, dir: MoveDir) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Fixed(d) => d == dir,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum PortalRole {
    Start,
    End,
    /// Menu-only doorway into the editor. Never persisted.
    Mapping,
}

impl PortalRole {
    pub fn key(self) -> &'static str {
        match self {
            PortalRole::Start => "start",
            PortalRole::End => "end",
            PortalRole::Mapping => "mapping",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Portal {
    /// The slot this portal belongs to.
    pub role: PortalRole,
    /// Set once the portal has been torn down; nothing should draw it after.
    pub removed: bool,
}

impl Portal {
    pub fn new(role: PortalRole) -> Self {
        Portal { role, removed: false }
    }

    pub fn mark_removed(&mut self) {
        self.removed = true;
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CustomBlock {
    pub name: String,
    pub constraint: Constraint,
    pub attrs: BTreeMap<String, String>,
}

impl CustomBlock {
    pub fn new(name: &str) -> Self {
        CustomBlock {
            name: name.to_string(),
            constraint: Constraint::Any,
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Block {
    /// "Nothing here" marker at level 0.
    Empty,
    /// `default` walls form the generated border ring.
    Wall { default: bool },
    Crate,
    Direction(MoveDir),
    Portal(Portal),
    Custom(CustomBlock),
}

/// Minimal persisted form, in map-file field order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Persisted {
    Wall([i32; 2]),
    Crate([i32; 3]),
    Direction(i32, i32, i32, [i32; 2]),
}

impl Block {
    pub fn wall() -> Self {
        Block::Wall { default: false }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Block::Empty)
    }

    pub fn movable(&self) -> bool {
        !matches!(self, Block::Wall { .. })
    }

    /// Direction constraint. Walls report `Any` but are never movable.
    pub fn constraint(&self) -> Constraint {
        match self {
            Block::Direction(d) => Constraint::Fixed(*d),
            Block::Custom(c) => c.constraint,
            _ => Constraint::Any,
        }
    }

    pub fn is_default_wall(&self) -> bool {
        matches!(self, Block::Wall { default: true })
    }

    /// Walls and portals only ever sit on the floor.
    pub fn floor_only(&self) -> bool {
        matches!(self, Block::Wall { .. } | Block::Portal(_))
    }

    /// Turn a direction block 90°. Other blocks are unchanged.
    pub fn rotate(&mut self) -> bool {
        match self {
            Block::Direction(d) => {
                *d = d.rotated();
                true
            }
            _ => false,
        }
    }

    /// What a map file needs to rebuild this block at `at`.
    /// Empty, portals and custom blocks are not stored as cells.
    pub fn persisted(&self, at: Cell) -> Option<Persisted> {
        let level = at.level as i32;
        match self {
            Block::Wall { .. } => Some(Persisted::Wall([at.x, at.y])),
            Block::Crate => Some(Persisted::Crate([at.x, at.y, level])),
            Block::Direction(d) => {
                let (dx, dy) = d.delta();
                Some(Persisted::Direction(at.x, at.y, level, [dx, dy]))
            }
            Block::Empty | Block::Portal(_) | Block::Custom(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movability_table() {
        assert!(Block::Empty.movable());
        assert!(!Block::wall().movable());
        assert!(!Block::Wall { default: true }.movable());
        assert!(Block::Crate.movable());
        assert!(Block::Direction(MoveDir::Up).movable());
        assert!(Block::Portal(Portal::new(PortalRole::Start)).movable());
        assert!(Block::Custom(CustomBlock::new("map_block")).movable());
    }

    #[test]
    fn constraint_is_exact_vector_equality() {
        let c = Block::Direction(MoveDir::Right).constraint();
        assert!(c.allows(MoveDir::Right));
        assert!(!c.allows(MoveDir::Left));
        assert!(!c.allows(MoveDir::Up));
        assert!(!c.allows(MoveDir::Down));
        for dir in MoveDir::ALL {
            assert!(Block::Crate.constraint().allows(dir));
        }
    }

    #[test]
    fn rotate_only_turns_direction_blocks() {
        let mut b = Block::Direction(MoveDir::Down);
        assert!(b.rotate());
        assert_eq!(b, Block::Direction(MoveDir::Left));
        let mut c = Block::Crate;
        assert!(!c.rotate());
        assert_eq!(c, Block::Crate);
    }

    #[test]
    fn persisted_forms() {
        assert_eq!(
            Block::wall().persisted(Cell::floor(3, 4)),
            Some(Persisted::Wall([3, 4]))
        );
        assert_eq!(
            Block::Crate.persisted(Cell::new(3, 4, 2)),
            Some(Persisted::Crate([3, 4, 2]))
        );
        assert_eq!(
            Block::Direction(MoveDir::Left).persisted(Cell::new(1, 2, 1)),
            Some(Persisted::Direction(1, 2, 1, [-1, 0]))
        );
        assert_eq!(Block::Empty.persisted(Cell::floor(1, 1)), None);
        assert_eq!(
            Block::Custom(CustomBlock::new("x")).persisted(Cell::floor(1, 1)),
            None
        );
    }

    #[test]
    fn cell_neighbours() {
        let c = Cell::new(5, 5, 2);
        assert_eq!(c.above(), Cell::new(5, 5, 3));
        assert_eq!(c.step(MoveDir::Up), Cell::floor(5, 4));
        assert!(Cell::floor(0, 11).in_grid());
        assert!(!Cell::floor(12, 3).in_grid());
        assert!(on_ring(0, 4) && on_ring(4, 11) && !on_ring(4, 4));
    }
}
