/// Level editor: one floating selection over a live board.
///
/// ## Selection lifecycle
///
///   pick_new / select_at ──► nudge / rotate ──► confirm  (commit if legal)
///                                         ├──► cancel   (back to origin)
///                                         └──► delete   (gone)
///
/// A lifted piece leaves the board immediately; its `origin` remembers where
/// it came from so `cancel` can put it back. Fresh pieces have no origin.
/// Portals are lifted out of their slot the same way.
///
/// Legality is `rules::can_place`; the editor never commits without it.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::EditorConfig;
use crate::domain::block::{
    Block, Cell, Portal, PortalRole, INTERIOR_MAX, INTERIOR_MIN, MAX_EDIT_LEVEL,
};
use crate::domain::board::Board;
use crate::domain::entity::MoveDir;
use crate::domain::rules;
use crate::sim::map::{self, MapError, MAX_NAME_LEN};
use crate::sim::save::{Highscores, StoreError};

/// Where fresh pieces appear before anything has been placed.
pub const EDITOR_HOME: (i32, i32) = (5, 5);

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("no block selected")]
    NothingSelected,

    #[error("nothing to select there")]
    NothingToSelect,

    #[error("border walls cannot be moved")]
    DefaultWall,

    #[error("{} portal already placed", .0.key())]
    PortalAlreadyPlaced(PortalRole),

    #[error("unable to place block there")]
    CannotPlace,

    #[error("{field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("block at ({}, {}) level {} has nothing under it", .0.x, .0.y, .0.level)]
    Floating(Cell),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pieces offered by the editor palette.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NewBlock {
    Crate,
    Direction,
    Wall,
    StartPortal,
    EndPortal,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Piece {
    Block(Block),
    Portal(PortalRole),
}

impl Piece {
    /// The block `can_place` judges this piece as.
    fn as_block(&self) -> Block {
        match self {
            Piece::Block(b) => b.clone(),
            Piece::Portal(role) => Block::Portal(Portal::new(*role)),
        }
    }

    fn floor_only(&self) -> bool {
        self.as_block().floor_only()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Selection {
    pub piece: Piece,
    pub at: Cell,
    pub origin: Option<Cell>,
}

/// One editor keypress acting on the selection.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Nudge {
    Step(MoveDir),
    Raise,
    Lower,
}

// ── Form ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FormField {
    Name,
    MaxMoves,
    MaxMoved,
}

impl FormField {
    pub fn next(self) -> Self {
        match self {
            FormField::Name => FormField::MaxMoves,
            FormField::MaxMoves => FormField::MaxMoved,
            FormField::MaxMoved => FormField::Name,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FormField::Name => "name",
            FormField::MaxMoves => "max moves",
            FormField::MaxMoved => "max moved",
        }
    }
}

/// Text typed into the editor's side panel.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct EditorForm {
    pub name: String,
    pub max_moves: String,
    pub max_moved: String,
}

/// Validated form contents.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MapMeta {
    pub name: String,
    pub max_moves: u32,
    pub max_moved: u32,
}

impl EditorForm {
    pub fn from_board(board: &Board) -> Self {
        EditorForm {
            name: board.map_name.clone(),
            max_moves: board.max_moves.to_string(),
            max_moved: board.max_moved.to_string(),
        }
    }

    pub fn field(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::MaxMoves => &self.max_moves,
            FormField::MaxMoved => &self.max_moved,
        }
    }

    /// Append `c` if the field accepts it; returns whether it did.
    pub fn push_char(&mut self, field: FormField, c: char) -> bool {
        let (text, ok) = match field {
            FormField::Name => {
                let ok = self.name.chars().count() < MAX_NAME_LEN
                    && map::is_valid_name(&format!("x{c}"));
                (&mut self.name, ok)
            }
            FormField::MaxMoves => (&mut self.max_moves, c.is_ascii_digit()),
            FormField::MaxMoved => (&mut self.max_moved, c.is_ascii_digit()),
        };
        if ok {
            text.push(c);
        }
        ok
    }

    pub fn pop_char(&mut self, field: FormField) {
        match field {
            FormField::Name => self.name.pop(),
            FormField::MaxMoves => self.max_moves.pop(),
            FormField::MaxMoved => self.max_moved.pop(),
        };
    }

    /// Empty budgets fall back to the configured defaults.
    pub fn validate(&self, defaults: &EditorConfig) -> Result<MapMeta, EditorError> {
        if !map::is_valid_name(&self.name) {
            return Err(EditorError::InvalidField {
                field: FormField::Name.label(),
                reason: format!("up to {MAX_NAME_LEN} letters, digits or !,().[]}}{{ and spaces"),
            });
        }
        Ok(MapMeta {
            name: self.name.clone(),
            max_moves: parse_budget(FormField::MaxMoves, &self.max_moves, defaults.default_max_moves)?,
            max_moved: parse_budget(FormField::MaxMoved, &self.max_moved, defaults.default_max_moved)?,
        })
    }
}

fn parse_budget(field: FormField, text: &str, default: u32) -> Result<u32, EditorError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(default);
    }
    let invalid = |reason: &str| EditorError::InvalidField {
        field: field.label(),
        reason: reason.to_string(),
    };
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("digits only"));
    }
    match text.parse::<u32>() {
        Ok(0) => Err(invalid("must be at least 1")),
        Ok(v) => Ok(v),
        Err(_) => Err(invalid("too large")),
    }
}

// ── Editor ──

#[derive(Clone, Debug)]
pub struct Editor {
    pub selected: Option<Selection>,
    /// Column of the last committed piece; fresh pieces spawn here.
    pub last_saved: (i32, i32),
    /// Keyboard pointer used to pick existing pieces.
    pub cursor: (i32, i32),
    /// Name the map had when loaded or last saved.
    pub previous_name: Option<String>,
    pub form: EditorForm,
    pub focus: FormField,
}

impl Editor {
    pub fn new(board: &Board) -> Self {
        Editor {
            selected: None,
            last_saved: EDITOR_HOME,
            cursor: EDITOR_HOME,
            previous_name: None,
            form: EditorForm::from_board(board),
            focus: FormField::Name,
        }
    }

    /// Put a fresh piece at `last_saved`, dropping any current selection first.
    pub fn pick_new(&mut self, board: &mut Board, kind: NewBlock) -> Result<(), EditorError> {
        let piece = match kind {
            NewBlock::Crate => Piece::Block(Block::Crate),
            NewBlock::Direction => Piece::Block(Block::Direction(MoveDir::Down)),
            NewBlock::Wall => Piece::Block(Block::wall()),
            NewBlock::StartPortal => Piece::Portal(PortalRole::Start),
            NewBlock::EndPortal => Piece::Portal(PortalRole::End),
        };
        if let Piece::Portal(role) = piece {
            if board.has_portal(role) {
                return Err(EditorError::PortalAlreadyPlaced(role));
            }
        }
        self.restore(board);
        let (x, y) = self.last_saved;
        self.selected = Some(Selection { piece, at: Cell::floor(x, y), origin: None });
        Ok(())
    }

    /// Lift what sits at `cell`. An Empty floor cell yields its portal, if any.
    pub fn select_at(&mut self, board: &mut Board, cell: Cell) -> Result<(), EditorError> {
        if self.selected.as_ref().map_or(false, |s| s.at == cell) {
            return Ok(());
        }
        let piece = match board.get(cell) {
            Some(b) if b.is_default_wall() => return Err(EditorError::DefaultWall),
            Some(b) if !b.is_empty() => Piece::Block(b.clone()),
            _ => match board.portal_role_at(cell.x, cell.y) {
                Some(role @ (PortalRole::Start | PortalRole::End)) if cell.level == 0 => Piece::Portal(role),
                _ => return Err(EditorError::NothingToSelect),
            },
        };

        self.restore(board);
        match &piece {
            Piece::Block(_) => {
                board.remove(cell);
            }
            Piece::Portal(role) => {
                board.take_portal(*role);
            }
        }
        self.cursor = cell.column();
        self.selected = Some(Selection { piece, at: cell, origin: Some(cell) });
        Ok(())
    }

    /// Lift the topmost piece of column `(x, y)`.
    pub fn select_top(&mut self, board: &mut Board, (x, y): (i32, i32)) -> Result<(), EditorError> {
        let cell = board.column_top(x, y).map_or(Cell::floor(x, y), |(cell, _)| cell);
        self.select_at(board, cell)
    }

    /// Shift the selection one step, staying inside the ring and below
    /// `MAX_EDIT_LEVEL`. Walls and portals never leave the floor.
    pub fn nudge(&mut self, nudge: Nudge) -> Result<(), EditorError> {
        let sel = self.selected.as_mut().ok_or(EditorError::NothingSelected)?;
        let at = &mut sel.at;
        match nudge {
            Nudge::Step(dir) => {
                let (x, y) = step_inside((at.x, at.y), dir);
                at.x = x;
                at.y = y;
            }
            Nudge::Raise if !sel.piece.floor_only() && at.level < MAX_EDIT_LEVEL => at.level += 1,
            Nudge::Lower if at.level > 0 => at.level -= 1,
            Nudge::Raise | Nudge::Lower => {}
        }
        Ok(())
    }

    pub fn move_cursor(&mut self, dir: MoveDir) {
        self.cursor = step_inside(self.cursor, dir);
    }

    /// Carry the selection one step if a piece is held, otherwise move the cursor.
    pub fn step(&mut self, dir: MoveDir) -> Result<(), EditorError> {
        if self.selected.is_some() {
            self.nudge(Nudge::Step(dir))
        } else {
            self.move_cursor(dir);
            Ok(())
        }
    }

    pub fn rotate_selected(&mut self) -> bool {
        match &mut self.selected {
            Some(Selection { piece: Piece::Block(block), .. }) => block.rotate(),
            _ => false,
        }
    }

    /// Rotate a direction block sitting on the board.
    pub fn rotate_at(&self, board: &mut Board, cell: Cell) -> bool {
        board.get_mut(cell).map_or(false, Block::rotate)
    }

    /// Would the selection be accepted where it is now?
    pub fn placement_ok(&self, board: &Board) -> Option<bool> {
        self.selected
            .as_ref()
            .map(|s| rules::can_place(board, &s.piece.as_block(), s.at))
    }

    /// Commit the selection if `can_place` allows it.
    pub fn confirm(&mut self, board: &mut Board) -> Result<(), EditorError> {
        let sel = self.selected.as_ref().ok_or(EditorError::NothingSelected)?;
        if !rules::can_place(board, &sel.piece.as_block(), sel.at) {
            return Err(EditorError::CannotPlace);
        }
        if let Some(sel) = self.selected.take() {
            commit(board, sel.piece, sel.at);
            self.last_saved = sel.at.column();
            self.cursor = self.last_saved;
        }
        Ok(())
    }

    /// Put a lifted piece back where it came from; drop a fresh one.
    pub fn cancel(&mut self, board: &mut Board) -> Result<(), EditorError> {
        if self.selected.is_none() {
            return Err(EditorError::NothingSelected);
        }
        self.restore(board);
        Ok(())
    }

    /// Drop the selection. A lifted piece has already left the board.
    pub fn delete(&mut self) -> Result<(), EditorError> {
        self.selected.take().map(|_| ()).ok_or(EditorError::NothingSelected)
    }

    /// Blank the board and start over. The file name to replace is kept.
    pub fn clear(&mut self, board: &mut Board) {
        board.clear();
        self.selected = None;
        self.last_saved = EDITOR_HOME;
        self.cursor = EDITOR_HOME;
    }

    /// Replace the board with a stored map.
    pub fn load(&mut self, board: &mut Board, maps_dir: &Path, name: &str) -> Result<(), EditorError> {
        *board = map::load_map(maps_dir, name)?;
        self.selected = None;
        self.previous_name = Some(name.to_string());
        self.form = EditorForm::from_board(board);
        Ok(())
    }

    /// Write the board as a map file and forget the map's old highscore.
    /// A pending selection is cancelled first.
    pub fn save(
        &mut self,
        board: &mut Board,
        maps_dir: &Path,
        highscores: &mut Highscores,
        defaults: &EditorConfig,
    ) -> Result<PathBuf, EditorError> {
        self.restore(board);
        for role in [PortalRole::Start, PortalRole::End] {
            if !board.has_portal(role) {
                return Err(MapError::MissingPortal(role).into());
            }
        }
        let meta = self.form.validate(defaults)?;
        // Lifting a block out of a stack can strand the ones above it.
        if let Some(cell) = map::first_floating(board) {
            return Err(EditorError::Floating(cell));
        }

        board.map_name = meta.name.clone();
        board.max_moves = meta.max_moves;
        board.max_moved = meta.max_moved;

        let path = map::save_map(maps_dir, board, self.previous_name.as_deref())?;
        self.previous_name = Some(meta.name.clone());
        highscores.reset(&meta.name)?;
        info!(map = %meta.name, "editor saved map");
        Ok(path)
    }

    fn restore(&mut self, board: &mut Board) {
        if let Some(sel) = self.selected.take() {
            if let Some(origin) = sel.origin {
                commit(board, sel.piece, origin);
            }
        }
    }
}

fn commit(board: &mut Board, piece: Piece, at: Cell) {
    match piece {
        Piece::Block(block) => board.set(at, block),
        Piece::Portal(role) => board.set_portal(role, at.column()),
    }
}

fn step_inside((x, y): (i32, i32), dir: MoveDir) -> (i32, i32) {
    let (dx, dy) = dir.delta();
    let inside = |v: i32| (INTERIOR_MIN..=INTERIOR_MAX).contains(&v);
    if inside(x + dx) && inside(y + dy) {
        (x + dx, y + dy)
    } else {
        (x, y)
    }
}
