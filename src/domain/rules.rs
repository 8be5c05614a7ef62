/// Push rules and placement rules, truth-table driven.
///
/// Pure functions over the board, no side effects.
/// These encode "what is legal" without performing the action.
///
/// ## Push Truth Table
///
/// One cell of a push chain, classified against the player's move vector:
/// ┌───────────────────────────────┬──────────────┬──────────────────┐
/// │ Cell content                  │ Result       │ Notes            │
/// ├───────────────────────────────┼──────────────┼──────────────────┤
/// │ Empty marker                  │ Open         │ chain ends here  │
/// │ unoccupied / off grid         │ Immovable    │ no floor to use  │
/// │ Wall                          │ Immovable    │                  │
/// │ Fixed direction ≠ move vector │ WrongDir     │ exact equality   │
/// │ Otherwise                     │ Movable      │ joins the chain  │
/// └───────────────────────────────┴──────────────┴──────────────────┘
///
/// Portal slots are not cells, so the portal checks live in the resolver.
///
/// ## Placement Truth Table (editor)
/// ┌────────────────────────────────────────┬──────────┐
/// │ Condition                              │ Allow?   │
/// ├────────────────────────────────────────┼──────────┤
/// │ target off grid                        │ DENY     │
/// │ wall or portal above level 0           │ DENY     │
/// │ target holds a non-Empty block         │ DENY     │
/// │ any level below is unoccupied or Empty │ DENY     │  floating
/// │ target is the start or end portal cell │ DENY     │
/// │ Otherwise                              │ ALLOW    │
/// └────────────────────────────────────────┴──────────┘

use super::block::{Block, Cell, Constraint, PortalRole};
use super::board::Board;
use super::entity::MoveDir;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Push {
    Open,
    Movable,
    Immovable,
    /// The block only moves along the carried direction.
    WrongDir(MoveDir),
}

/// Classify one cell for a push along `dir`. See truth table above.
pub fn classify_push(block: Option<&Block>, dir: MoveDir) -> Push {
    let Some(block) = block else {
        return Push::Immovable;
    };
    if block.is_empty() {
        return Push::Open;
    }
    if !block.movable() {
        return Push::Immovable;
    }
    match block.constraint() {
        Constraint::Fixed(required) if required != dir => Push::WrongDir(required),
        _ => Push::Movable,
    }
}

/// Can `block` be committed at `at`? See truth table above.
pub fn can_place(board: &Board, block: &Block, at: Cell) -> bool {
    if !at.in_grid() {
        return false;
    }
    if block.floor_only() && at.level != 0 {
        return false;
    }
    if !board.is_vacant(at) {
        return false;
    }
    let floating = (0..at.level).any(|level| board.is_vacant(Cell::new(at.x, at.y, level)));
    if floating {
        return false;
    }
    ![PortalRole::Start, PortalRole::End]
        .iter()
        .any(|role| board.portal_cell(*role) == Some(at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::tests::{board_from, stack};

    // ── Push classification ──

    #[test]
    fn push_open_on_empty() {
        assert_eq!(classify_push(Some(&Block::Empty), MoveDir::Up), Push::Open);
    }

    #[test]
    fn push_blocked_by_wall_and_void() {
        assert_eq!(classify_push(Some(&Block::wall()), MoveDir::Up), Push::Immovable);
        assert_eq!(
            classify_push(Some(&Block::Wall { default: true }), MoveDir::Left),
            Push::Immovable
        );
        assert_eq!(classify_push(None, MoveDir::Up), Push::Immovable);
    }

    #[test]
    fn push_direction_block() {
        let b = Block::Direction(MoveDir::Right);
        assert_eq!(classify_push(Some(&b), MoveDir::Right), Push::Movable);
        assert_eq!(classify_push(Some(&b), MoveDir::Left), Push::WrongDir(MoveDir::Right));
        assert_eq!(classify_push(Some(&b), MoveDir::Up), Push::WrongDir(MoveDir::Right));
    }

    #[test]
    fn push_crate_any_direction() {
        for dir in MoveDir::ALL {
            assert_eq!(classify_push(Some(&Block::Crate), dir), Push::Movable);
        }
    }

    // ── Placement ──

    #[test]
    fn place_on_empty_floor() {
        let b = board_from(&["..."]);
        assert!(can_place(&b, &Block::Crate, Cell::floor(2, 1)));
    }

    #[test]
    fn place_denied_on_overlap() {
        let b = board_from(&[".C."]);
        assert!(!can_place(&b, &Block::Crate, Cell::floor(2, 1)));
        assert!(!can_place(&b, &Block::wall(), Cell::floor(0, 0)));
    }

    #[test]
    fn place_stacked_on_block() {
        let b = board_from(&[".C."]);
        assert!(can_place(&b, &Block::Crate, Cell::new(2, 1, 1)));
    }

    #[test]
    fn place_denied_floating_over_empty_level() {
        let b = board_from(&[".C."]);
        // Level 1 absent under a level-2 direction block.
        assert!(!can_place(&b, &Block::Direction(MoveDir::Up), Cell::new(2, 1, 2)));
        // Level 0 is only the Empty marker.
        assert!(!can_place(&b, &Block::Crate, Cell::new(1, 1, 1)));
    }

    #[test]
    fn place_denied_when_level_one_is_empty_marker() {
        let mut b = board_from(&[".C."]);
        // A stray Empty marker above the floor still counts as a gap.
        b.set(Cell::new(2, 1, 1), Block::Empty);
        assert!(!can_place(&b, &Block::Direction(MoveDir::Down), Cell::new(2, 1, 2)));
    }

    #[test]
    fn place_on_top_of_stack() {
        let mut b = board_from(&[".C."]);
        stack(&mut b, 2, 1, &[Block::Crate]);
        assert!(can_place(&b, &Block::Direction(MoveDir::Down), Cell::new(2, 1, 2)));
    }

    #[test]
    fn place_denied_on_portals() {
        let b = board_from(&["S.E.M"]);
        assert!(!can_place(&b, &Block::Crate, Cell::floor(1, 1)));
        assert!(!can_place(&b, &Block::Crate, Cell::floor(3, 1)));
        assert!(can_place(&b, &Block::Crate, Cell::floor(2, 1)));
        // The menu doorway is not a placement obstacle.
        assert!(can_place(&b, &Block::Crate, Cell::floor(5, 1)));
    }

    #[test]
    fn place_denied_wall_above_floor() {
        let b = board_from(&[".C."]);
        assert!(!can_place(&b, &Block::wall(), Cell::new(2, 1, 1)));
    }

    #[test]
    fn place_denied_off_grid() {
        let b = Board::blank();
        assert!(!can_place(&b, &Block::Crate, Cell::floor(12, 3)));
        assert!(!can_place(&b, &Block::Crate, Cell::floor(-1, 3)));
    }
}
