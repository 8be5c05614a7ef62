/// The move resolver: turns one player action into block displacements.
///
/// Two phases, kept apart:
///   1. `plan()`: pure. Walks the push chain, queues gravity collapses,
///      handles the pull, checks the budget. Any rejection happens here,
///      before a single cell changes.
///   2. `apply()`: commits a plan:
///        a. primary queue drained back-to-front (farthest block first, so
///           no block lands on a cell that has not been vacated yet);
///        b. gravity queue drained front-to-back, each move re-checked: it
///           lands only if its target is still vacant.
///
/// Counters and terminal checks belong to the caller (see `Session`).

use tracing::debug;

use crate::domain::block::{Cell, PortalRole};
use crate::domain::board::Board;
use crate::domain::entity::{MoveDir, MoveInput};
use crate::domain::rules::{self, Push};
use super::session::Phase;

/// One block moving from one cell to another.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Displacement {
    pub from: Cell,
    pub to: Cell,
}

/// What the resolver needs to know about the surrounding session.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MoveContext {
    pub phase: Phase,
    /// Menu only: the map marker has been given a map to open.
    pub marker_ready: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum MoveRejected {
    #[error("cell {0:?} cannot be pushed")]
    Blocked(Cell),

    #[error("block at {at:?} only moves {required:?}")]
    WrongDirection { at: Cell, required: MoveDir },

    #[error("start portal at {0:?} is locked")]
    StartPortalLocked(Cell),

    #[error("nothing can be pushed into the end portal at {0:?}")]
    EndPortal(Cell),

    #[error("cannot pull while blocks are falling")]
    PullWhileFalling,

    #[error("{queued} blocks would move, limit is {limit}")]
    BudgetExceeded { queued: usize, limit: u32 },
}

impl MoveRejected {
    pub fn is_budget(&self) -> bool {
        matches!(self, MoveRejected::BudgetExceeded { .. })
    }
}

/// A legal move, not yet applied.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MovePlan {
    /// Discovery order: push chain nearest-first, then the pulled block.
    pub primary: Vec<Displacement>,
    /// Discovery order: bottom-up per column.
    pub gravity: Vec<Displacement>,
    /// Where the player ends up if not held back.
    pub dest: (i32, i32),
    pub player_moves: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MoveOutcome {
    /// Displacements actually committed, in the order they were applied.
    pub applied: Vec<Displacement>,
    pub player: (i32, i32),
    pub player_moved: bool,
}

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

/// Plan and apply. On rejection the board is untouched.
pub fn resolve(
    board: &mut Board,
    player: (i32, i32),
    input: MoveInput,
    ctx: MoveContext,
) -> Result<MoveOutcome, MoveRejected> {
    let plan = plan(board, player, input, ctx).inspect_err(|reason| {
        debug!(?input, %reason, "move rejected");
    })?;
    let outcome = apply(board, player, &plan);
    debug!(
        ?input,
        applied = outcome.applied.len(),
        moved = outcome.player_moved,
        "move resolved"
    );
    Ok(outcome)
}

// ══════════════════════════════════════════════════════════════
// Planning
// ══════════════════════════════════════════════════════════════

pub fn plan(
    board: &Board,
    player: (i32, i32),
    input: MoveInput,
    ctx: MoveContext,
) -> Result<MovePlan, MoveRejected> {
    let dir = input.dir;
    let here = Cell::floor(player.0, player.1);
    let first = here.step(dir);

    let mut primary: Vec<Displacement> = Vec::new();
    let mut gravity: Vec<Displacement> = Vec::new();

    // ── Push chain ──
    let mut cell = first;
    loop {
        // Portal gates only apply to cells a block would be pushed into.
        if !primary.is_empty() {
            if board.portal_cell(PortalRole::Start) == Some(cell) && start_locked(ctx) {
                return Err(MoveRejected::StartPortalLocked(cell));
            }
            if board.portal_cell(PortalRole::End) == Some(cell) {
                return Err(MoveRejected::EndPortal(cell));
            }
        }

        match rules::classify_push(board.get(cell), dir) {
            Push::Open => break,
            Push::Immovable => return Err(MoveRejected::Blocked(cell)),
            Push::WrongDir(required) => {
                return Err(MoveRejected::WrongDirection { at: cell, required });
            }
            Push::Movable => {}
        }

        let next = cell.step(dir);
        primary.push(Displacement { from: cell, to: next });
        queue_collapse(board, cell, &mut gravity);
        cell = next;
    }

    // ── Pull ──
    if input.pull {
        let (dx, dy) = dir.delta();
        let behind = Cell::floor(player.0 - dx, player.1 - dy);
        let pulled = board.get(behind).filter(|b| !b.is_empty());
        if pulled.is_some() {
            if board.portal_cell(PortalRole::End) == Some(behind) {
                return Err(MoveRejected::EndPortal(behind));
            }
            match rules::classify_push(pulled, dir) {
                Push::Immovable => return Err(MoveRejected::Blocked(behind)),
                Push::WrongDir(required) => {
                    return Err(MoveRejected::WrongDirection { at: behind, required });
                }
                Push::Open | Push::Movable => {}
            }
            // Anything falling means the player may be held back; no pulling then.
            if !gravity.is_empty() {
                return Err(MoveRejected::PullWhileFalling);
            }
            primary.push(Displacement { from: behind, to: here });
            queue_collapse(board, behind, &mut gravity);
        }
    }

    // ── Budget ──
    if ctx.phase == Phase::Game && primary.len() > board.max_moved as usize {
        return Err(MoveRejected::BudgetExceeded {
            queued: primary.len(),
            limit: board.max_moved,
        });
    }

    let dest = first.column();
    let blocked_above = first.above();
    let player_moves = !gravity.iter().any(|g| g.from == blocked_above);

    Ok(MovePlan { primary, gravity, dest, player_moves })
}

/// In game the start portal is closed; in the menu it opens once the
/// marker has a map to open.
fn start_locked(ctx: MoveContext) -> bool {
    match ctx.phase {
        Phase::Game => true,
        Phase::Menu => !ctx.marker_ready,
        Phase::Mapping => false,
    }
}

/// Every consecutive occupied level above `base` drops by one.
fn queue_collapse(board: &Board, base: Cell, gravity: &mut Vec<Displacement>) {
    let mut above = base.above();
    while board.is_occupied(above) {
        gravity.push(Displacement { from: above, to: Cell { level: above.level - 1, ..above } });
        above = above.above();
    }
}

// ══════════════════════════════════════════════════════════════
// Applying
// ══════════════════════════════════════════════════════════════

pub fn apply(board: &mut Board, player: (i32, i32), plan: &MovePlan) -> MoveOutcome {
    let mut applied = Vec::with_capacity(plan.primary.len() + plan.gravity.len());

    for d in plan.primary.iter().rev() {
        if board.move_block(d.from, d.to) {
            applied.push(*d);
        }
    }

    // A primary move may already have filled the landing cell; then the
    // block stays where it is, resting on the newcomer.
    for g in &plan.gravity {
        if board.is_vacant(g.to) && board.move_block(g.from, g.to) {
            applied.push(*g);
        }
    }

    let player = if plan.player_moves { plan.dest } else { player };
    MoveOutcome { applied, player, player_moved: plan.player_moves }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
