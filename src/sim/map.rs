/// Map files: one JSON document per level, stored as `<maps_dir>/<map_name>.json`.
///
/// ## Format
///   ```
///   {
///     "WallBlock":      [[x, y], …],
///     "CrateBlock":     [[x, y, level], …],
///     "DirectionBlock": [[x, y, level, [dx, dy]], …],
///     "max_moves": 40, "max_moved": 3,
///     "start": [x, y], "end": [x, y],
///     "map_name": "…"
///   }
///   ```
///
/// Decoding starts from a blank board (ring of default walls, Empty floor)
/// and overlays the stored blocks. The ring is never written back.
/// The menu's mapping portal and custom blocks never reach a file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::block::{in_grid, Block, Cell, Persisted, PortalRole};
use crate::domain::board::Board;
use crate::domain::entity::MoveDir;

pub const MAP_EXT: &str = "json";
pub const MAX_NAME_LEN: usize = 23;
const NAME_PUNCTUATION: &str = "!,().[]}{ ";

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("malformed map: {0}")]
    Malformed(String),

    #[error("map has no {} portal", .0.key())]
    MissingPortal(PortalRole),

    #[error("map \"{0}\" not found")]
    NotFound(String),

    #[error("map file: {0}")]
    Io(#[from] std::io::Error),
}

fn malformed(msg: impl Into<String>) -> MapError {
    MapError::Malformed(msg.into())
}

#[derive(Serialize, Deserialize, Debug)]
struct MapFile {
    #[serde(rename = "WallBlock")]
    walls: Vec<[i32; 2]>,
    #[serde(rename = "CrateBlock")]
    crates: Vec<[i32; 3]>,
    #[serde(rename = "DirectionBlock")]
    directions: Vec<(i32, i32, i32, [i32; 2])>,
    max_moves: i64,
    max_moved: i64,
    start: [i32; 2],
    end: [i32; 2],
    map_name: String,
}

// ══════════════════════════════════════════════════════════════
// Codec
// ══════════════════════════════════════════════════════════════

pub fn decode(text: &str) -> Result<Board, MapError> {
    let file: MapFile = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
    let mut board = Board::blank();

    for [x, y] in file.walls {
        board.set(cell_at(x, y, 0)?, Block::wall());
    }
    for [x, y, level] in file.crates {
        board.set(cell_at(x, y, level)?, Block::Crate);
    }
    for (x, y, level, [dx, dy]) in file.directions {
        let dir = MoveDir::from_delta(dx, dy)
            .ok_or_else(|| malformed(format!("direction [{dx},{dy}] at ({x},{y}) is not a unit step")))?;
        board.set(cell_at(x, y, level)?, Block::Direction(dir));
    }

    board.max_moves = budget("max_moves", file.max_moves)?;
    board.max_moved = budget("max_moved", file.max_moved)?;

    let [sx, sy] = file.start;
    let [ex, ey] = file.end;
    if (sx, sy) == (ex, ey) {
        return Err(malformed(format!("start and end share ({sx},{sy})")));
    }
    for (role, x, y) in [(PortalRole::Start, sx, sy), (PortalRole::End, ex, ey)] {
        let cell = cell_at(x, y, 0)?;
        if !board.get(cell).map_or(false, Block::is_empty) {
            return Err(malformed(format!("{} portal at ({x},{y}) is covered", role.key())));
        }
        board.set_portal(role, cell.column());
    }
    board.map_name = file.map_name;

    if let Some(cell) = first_floating(&board) {
        return Err(malformed(format!(
            "block at ({},{}) level {} has nothing under it",
            cell.x, cell.y, cell.level
        )));
    }
    Ok(board)
}

pub fn encode(board: &Board) -> Result<String, MapError> {
    let start = board.portal(PortalRole::Start).ok_or(MapError::MissingPortal(PortalRole::Start))?;
    let end = board.portal(PortalRole::End).ok_or(MapError::MissingPortal(PortalRole::End))?;

    let mut file = MapFile {
        walls: Vec::new(),
        crates: Vec::new(),
        directions: Vec::new(),
        max_moves: board.max_moves.into(),
        max_moved: board.max_moved.into(),
        start: [start.at.0, start.at.1],
        end: [end.at.0, end.at.1],
        map_name: board.map_name.clone(),
    };

    for (cell, block) in board.iter() {
        if block.is_default_wall() {
            continue;
        }
        match block.persisted(cell) {
            Some(Persisted::Wall(p)) => file.walls.push(p),
            Some(Persisted::Crate(p)) => file.crates.push(p),
            Some(Persisted::Direction(x, y, level, d)) => file.directions.push((x, y, level, d)),
            None => {}
        }
    }

    serde_json::to_string(&file).map_err(|e| malformed(e.to_string()))
}

fn cell_at(x: i32, y: i32, level: i32) -> Result<Cell, MapError> {
    if !in_grid(x, y) {
        return Err(malformed(format!("({x},{y}) is outside the board")));
    }
    let level = u32::try_from(level).map_err(|_| malformed(format!("negative level at ({x},{y})")))?;
    Ok(Cell::new(x, y, level))
}

fn budget(field: &str, value: i64) -> Result<u32, MapError> {
    match u32::try_from(value) {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(malformed(format!("{field} must be a positive count, got {value}"))),
    }
}

/// An occupied level resting on a vacant one.
pub fn first_floating(board: &Board) -> Option<Cell> {
    board
        .iter()
        .filter(|(cell, block)| cell.level > 0 && !block.is_empty())
        .map(|(cell, _)| cell)
        .find(|cell| (0..cell.level).any(|level| board.is_vacant(Cell { level, ..*cell })))
}

// ══════════════════════════════════════════════════════════════
// Names
// ══════════════════════════════════════════════════════════════

/// Letters, digits and `!,().[]}{ `, at most 23 characters, not blank.
pub fn is_valid_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || NAME_PUNCTUATION.contains(c))
}

// ══════════════════════════════════════════════════════════════
// Files
// ══════════════════════════════════════════════════════════════

pub fn map_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{MAP_EXT}"))
}

/// Sorted map names (file stems) in `dir`. A missing directory lists nothing.
pub fn list_maps(dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list maps");
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |e| e == MAP_EXT))
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}

pub fn load_map(dir: &Path, name: &str) -> Result<Board, MapError> {
    let path = map_path(dir, name);
    if !path.is_file() {
        return Err(MapError::NotFound(name.to_string()));
    }
    let text = std::fs::read_to_string(&path)?;
    let board = decode(&text)?;
    info!(map = name, path = %path.display(), "map loaded");
    Ok(board)
}

/// Write `<map_name>.json`. If the map was loaded under another name, the old
/// file goes away.
pub fn save_map(dir: &Path, board: &Board, previous_name: Option<&str>) -> Result<PathBuf, MapError> {
    if !is_valid_name(&board.map_name) {
        return Err(malformed(format!("\"{}\" is not a usable map name", board.map_name)));
    }
    let text = encode(board)?;

    std::fs::create_dir_all(dir)?;
    let path = map_path(dir, &board.map_name);
    std::fs::write(&path, text)?;
    info!(map = %board.map_name, path = %path.display(), "map saved");

    if let Some(old) = previous_name.filter(|old| *old != board.map_name) {
        let old_path = map_path(dir, old);
        if old_path.is_file() {
            std::fs::remove_file(&old_path)?;
            info!(old, "renamed map, removed previous file");
        }
    }
    Ok(path)
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
