/// Board: the complete logical state of one map.
///
/// ## Layout
///
/// Two stores, never mixed:
///   - `cells`: sparse `(x, y, level) → Block` map.
///   - `portals`: named slots, each a column `(x, y)` plus its portal.
///     A portal's column holds an `Empty` marker in `cells`; the
///     portal itself is looked up by role.
///
/// Map metadata (`max_moves`, `max_moved`, `map_name`) are plain fields.
///
/// ## Occupancy invariants
///
///   - every `(x, y)` inside the grid has a level-0 entry (Empty, Wall, or
///     a movable block);
///   - a level above 0 exists only on top of a non-Empty block;
///   - vacating level 0 leaves an `Empty` marker, vacating anything higher
///     deletes the entry.
///
/// All displacement goes through `move_block()` which keeps these true.

use std::collections::BTreeMap;

use super::block::{in_grid, on_ring, Block, Cell, Portal, PortalRole, GRID_MAX, GRID_MIN};

pub const DEFAULT_MAX_MOVES: u32 = 1000;
pub const DEFAULT_MAX_MOVED: u32 = 1000;
pub const DEFAULT_MAP_NAME: &str = "Untitled Map";

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PortalSlot {
    pub at: (i32, i32),
    pub portal: Portal,
}

impl PortalSlot {
    pub fn cell(&self) -> Cell {
        Cell::floor(self.at.0, self.at.1)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Board {
    cells: BTreeMap<Cell, Block>,
    portals: BTreeMap<PortalRole, PortalSlot>,
    pub max_moves: u32,
    pub max_moved: u32,
    pub map_name: String,
}

// ── Construction ──

impl Board {
    /// Border ring of default walls, Empty everywhere else on the floor.
    pub fn blank() -> Self {
        let mut cells = BTreeMap::new();
        for x in GRID_MIN..=GRID_MAX {
            for y in GRID_MIN..=GRID_MAX {
                let block = if on_ring(x, y) {
                    Block::Wall { default: true }
                } else {
                    Block::Empty
                };
                cells.insert(Cell::floor(x, y), block);
            }
        }
        Board {
            cells,
            portals: BTreeMap::new(),
            max_moves: DEFAULT_MAX_MOVES,
            max_moved: DEFAULT_MAX_MOVED,
            map_name: DEFAULT_MAP_NAME.to_string(),
        }
    }

    /// Reset to a blank board.
    pub fn clear(&mut self) {
        *self = Board::blank();
    }
}

// ── Cell query / mutation API ──

impl Board {
    /// `None` means unoccupied, which is different from `Some(Block::Empty)`.
    #[inline]
    pub fn get(&self, cell: Cell) -> Option<&Block> {
        self.cells.get(&cell)
    }

    #[inline]
    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut Block> {
        self.cells.get_mut(&cell)
    }

    #[inline]
    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Unoccupied or holding the Empty marker.
    #[inline]
    pub fn is_vacant(&self, cell: Cell) -> bool {
        self.get(cell).map_or(true, Block::is_empty)
    }

    /// Overwrite a cell. Out-of-grid writes are ignored.
    pub fn set(&mut self, cell: Cell, block: Block) {
        if cell.in_grid() {
            self.cells.insert(cell, block);
        }
    }

    /// Clear a cell and hand back what was there. Level 0 regains an Empty
    /// marker instead of going unoccupied.
    pub fn remove(&mut self, cell: Cell) -> Option<Block> {
        if cell.level == 0 {
            if !cell.in_grid() {
                return None;
            }
            self.cells.insert(cell, Block::Empty)
        } else {
            self.cells.remove(&cell)
        }
    }

    /// Displace the block at `from` onto `to`, overwriting whatever `to`
    /// held. Returns false (and changes nothing) if `from` is unoccupied.
    pub fn move_block(&mut self, from: Cell, to: Cell) -> bool {
        let Some(block) = self.remove(from) else {
            return false;
        };
        self.set(to, block);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cell, &Block)> {
        self.cells.iter().map(|(c, b)| (*c, b))
    }

    /// Topmost occupied cell of a column, if any.
    pub fn column_top(&self, x: i32, y: i32) -> Option<(Cell, &Block)> {
        let mut top = None;
        let mut cell = Cell::floor(x, y);
        while let Some(block) = self.get(cell) {
            top = Some((cell, block));
            cell = cell.above();
        }
        top
    }

    /// Number of stacked blocks in a column, not counting the Empty marker.
    pub fn column_height(&self, x: i32, y: i32) -> u32 {
        match self.column_top(x, y) {
            Some((_, b)) if b.is_empty() => 0,
            Some((cell, _)) => cell.level + 1,
            None => 0,
        }
    }
}

// ── Portal slots ──

impl Board {
    pub fn portal(&self, role: PortalRole) -> Option<&PortalSlot> {
        self.portals.get(&role)
    }

    pub fn portal_cell(&self, role: PortalRole) -> Option<Cell> {
        self.portal(role).map(PortalSlot::cell)
    }

    pub fn has_portal(&self, role: PortalRole) -> bool {
        self.portals.contains_key(&role)
    }

    /// Place (or move) the portal for `role`.
    pub fn set_portal(&mut self, role: PortalRole, at: (i32, i32)) {
        if in_grid(at.0, at.1) {
            self.portals.insert(role, PortalSlot { at, portal: Portal::new(role) });
        }
    }

    /// Take a portal out of its slot. The returned portal is marked removed.
    pub fn take_portal(&mut self, role: PortalRole) -> Option<PortalSlot> {
        let mut slot = self.portals.remove(&role)?;
        slot.portal.mark_removed();
        Some(slot)
    }

    /// Which portal, if any, sits on column `(x, y)`.
    pub fn portal_role_at(&self, x: i32, y: i32) -> Option<PortalRole> {
        self.portals
            .iter()
            .find(|(_, slot)| slot.at == (x, y))
            .map(|(role, _)| *role)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::entity::MoveDir;

    /// Build a board from a diagram of the interior rows (y = 1..).
    /// Legend: '.'=Empty  '#'=Wall  'C'=Crate  '^' 'v' '<' '>'=Direction
    ///         'S'=start portal  'E'=end portal  'M'=mapping portal
    /// Column 0 of each row string is x = 1. Stacks are added with `stack()`.
    pub(crate) fn board_from(rows: &[&str]) -> Board {
        let mut board = Board::blank();
        for (row, line) in rows.iter().enumerate() {
            let y = row as i32 + 1;
            for (col, ch) in line.chars().enumerate() {
                let x = col as i32 + 1;
                let cell = Cell::floor(x, y);
                match ch {
                    '#' => board.set(cell, Block::wall()),
                    'C' => board.set(cell, Block::Crate),
                    '^' => board.set(cell, Block::Direction(MoveDir::Up)),
                    'v' => board.set(cell, Block::Direction(MoveDir::Down)),
                    '<' => board.set(cell, Block::Direction(MoveDir::Left)),
                    '>' => board.set(cell, Block::Direction(MoveDir::Right)),
                    'S' => board.set_portal(PortalRole::Start, (x, y)),
                    'E' => board.set_portal(PortalRole::End, (x, y)),
                    'M' => board.set_portal(PortalRole::Mapping, (x, y)),
                    _ => {}
                }
            }
        }
        board
    }

    /// Stack `blocks` on top of column `(x, y)`, starting at level 1.
    pub(crate) fn stack(board: &mut Board, x: i32, y: i32, blocks: &[Block]) {
        for (i, block) in blocks.iter().enumerate() {
            board.set(Cell::new(x, y, i as u32 + 1), block.clone());
        }
    }

    #[test]
    fn blank_board_fills_every_floor_cell() {
        let b = Board::blank();
        for x in GRID_MIN..=GRID_MAX {
            for y in GRID_MIN..=GRID_MAX {
                let block = b.get(Cell::floor(x, y)).expect("floor cell occupied");
                if on_ring(x, y) {
                    assert!(block.is_default_wall());
                } else {
                    assert!(block.is_empty());
                }
                assert!(!b.is_occupied(Cell::new(x, y, 1)));
            }
        }
        assert_eq!(b.max_moves, DEFAULT_MAX_MOVES);
        assert_eq!(b.max_moved, DEFAULT_MAX_MOVED);
        assert_eq!(b.map_name, DEFAULT_MAP_NAME);
    }

    #[test]
    fn remove_keeps_floor_marker() {
        let mut b = board_from(&["C"]);
        stack(&mut b, 1, 1, &[Block::Crate]);
        assert_eq!(b.remove(Cell::new(1, 1, 1)), Some(Block::Crate));
        assert!(!b.is_occupied(Cell::new(1, 1, 1)));
        assert_eq!(b.remove(Cell::floor(1, 1)), Some(Block::Crate));
        assert_eq!(b.get(Cell::floor(1, 1)), Some(&Block::Empty));
    }

    #[test]
    fn move_block_vacates_by_level() {
        let mut b = board_from(&["C."]);
        stack(&mut b, 1, 1, &[Block::Crate]);

        assert!(b.move_block(Cell::floor(1, 1), Cell::floor(2, 1)));
        assert_eq!(b.get(Cell::floor(1, 1)), Some(&Block::Empty));
        assert_eq!(b.get(Cell::floor(2, 1)), Some(&Block::Crate));

        assert!(b.move_block(Cell::new(1, 1, 1), Cell::floor(1, 1)));
        assert!(!b.is_occupied(Cell::new(1, 1, 1)));
        assert_eq!(b.get(Cell::floor(1, 1)), Some(&Block::Crate));

        assert!(!b.move_block(Cell::new(4, 4, 3), Cell::floor(4, 4)));
    }

    #[test]
    fn column_queries() {
        let mut b = board_from(&["C."]);
        stack(&mut b, 1, 1, &[Block::Crate, Block::Direction(MoveDir::Up)]);
        assert_eq!(b.column_height(1, 1), 3);
        assert_eq!(b.column_height(2, 1), 0);
        let (top, block) = b.column_top(1, 1).unwrap();
        assert_eq!(top, Cell::new(1, 1, 2));
        assert_eq!(block, &Block::Direction(MoveDir::Up));
    }

    #[test]
    fn portal_slots() {
        let mut b = board_from(&["S.E"]);
        assert_eq!(b.portal_cell(PortalRole::Start), Some(Cell::floor(1, 1)));
        assert_eq!(b.portal_role_at(3, 1), Some(PortalRole::End));
        assert_eq!(b.portal_role_at(2, 1), None);
        assert!(b.get(Cell::floor(1, 1)).unwrap().is_empty());

        let slot = b.take_portal(PortalRole::Start).unwrap();
        assert!(slot.portal.removed);
        assert!(!b.has_portal(PortalRole::Start));
    }

    #[test]
    fn clear_resets_everything() {
        let mut b = board_from(&["SCE"]);
        b.max_moves = 3;
        b.map_name = "x".into();
        b.clear();
        assert_eq!(b, Board::blank());
        assert!(b.portal_role_at(1, 1).is_none() && b.portal_role_at(3, 1).is_none());
    }

    #[test]
    fn board_holds_only_live_portals() {
        let mut b = board_from(&["S.E"]);
        let taken = b.take_portal(PortalRole::End).unwrap();
        assert!(taken.portal.removed);
        assert_eq!(taken.at, (3, 1));

        b.set_portal(PortalRole::End, taken.at);
        let slot = b.portal(PortalRole::End).unwrap();
        assert!(!slot.portal.removed);
        assert!(b.portal(PortalRole::Start).map_or(false, |s| !s.portal.removed));
    }
}
