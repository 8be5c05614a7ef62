/// Session: everything one running game owns.
///
/// ## Phases
///
///   Menu ──(marker on start portal)──► Game ──(exit / budget spent)──► Menu
///     │                                                                 ▲
///     └──(player on mapping portal)──► Mapping ──(leave editor)─────────┘
///
/// The menu is itself a small board: the player pushes the map marker into
/// the start portal to play, walks out through the end portal to quit, or
/// steps onto the mapping portal to open the editor.
///
/// The board is replaced wholesale on every phase change.

use std::path::Path;

use tracing::{info, warn};

use crate::domain::block::{Block, Cell, CustomBlock, PortalRole};
use crate::domain::board::Board;
use crate::domain::entity::{MoveInput, Player};
use crate::sim::editor::Editor;
use crate::sim::event::GameEvent;
use crate::sim::map::{self, MapError};
use crate::sim::resolver::{self, MoveContext, MoveRejected};
use crate::sim::save::{HighscoreOutcome, Highscores};

pub const MENU_SPAWN: (i32, i32) = (5, 5);
pub const MENU_START: (i32, i32) = (10, 5);
pub const MENU_EXIT: (i32, i32) = (1, 5);
pub const MENU_MAPPING: (i32, i32) = (5, 1);
pub const MARKER_HOME: (i32, i32) = (6, 5);
pub const MARKER_NAME: &str = "map_block";
pub const MARKER_ATTR: &str = "selected";

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Menu,
    Game,
    Mapping,
}

/// How the last game went, shown on the menu afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub map: String,
    pub moves_taken: u32,
    pub objects_moved: u32,
    pub moves_exceeded: bool,
    pub reached_exit: bool,
    /// `None` when the run did not qualify or the table could not be written.
    pub highscore: Option<HighscoreOutcome>,
}

pub struct Session {
    pub board: Board,
    pub player: Player,
    pub phase: Phase,
    pub editor: Editor,

    // ── Game tracking ──
    pub last_run: Option<RunSummary>,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
}

/// The menu scene.
pub fn menu_board() -> Board {
    let mut board = Board::blank();
    board.set_portal(PortalRole::Start, MENU_START);
    board.set_portal(PortalRole::End, MENU_EXIT);
    board.set_portal(PortalRole::Mapping, MENU_MAPPING);
    let marker = CustomBlock::new(MARKER_NAME).with_attr(MARKER_ATTR, "");
    board.set(Cell::floor(MARKER_HOME.0, MARKER_HOME.1), Block::Custom(marker));
    board
}

// ── Construction / transitions ──

impl Session {
    pub fn new() -> Self {
        let board = menu_board();
        Session {
            editor: Editor::new(&board),
            board,
            player: Player::new(MENU_SPAWN.0, MENU_SPAWN.1),
            phase: Phase::Menu,
            last_run: None,
            message: String::new(),
            message_timer: 0,
        }
    }

    pub fn return_to_menu(&mut self) {
        self.board.clear();
        self.board = menu_board();
        self.player.place(MENU_SPAWN);
        self.phase = Phase::Menu;
        info!("entered menu");
    }

    /// Start playing `board`. The player appears on the start portal.
    pub fn begin_game(&mut self, board: Board) -> Result<(), MapError> {
        let start = board
            .portal(PortalRole::Start)
            .ok_or(MapError::MissingPortal(PortalRole::Start))?
            .at;
        self.board.clear();
        self.board = board;
        self.player.place(start);
        self.player.reset_stats();
        self.phase = Phase::Game;
        info!(map = %self.board.map_name, max_moves = self.board.max_moves, "game started");
        Ok(())
    }

    /// Load the map named on the marker and play it.
    pub fn start_selected_game(&mut self, maps_dir: &Path) -> Result<(), MapError> {
        let name = self
            .selected_map()
            .ok_or_else(|| MapError::NotFound(String::new()))?
            .to_string();
        let board = map::load_map(maps_dir, &name)?;
        self.begin_game(board)
    }

    pub fn enter_editor(&mut self) {
        self.board.clear();
        self.board = Board::blank();
        self.editor = Editor::new(&self.board);
        self.phase = Phase::Mapping;
        info!("entered editor");
    }

    /// Close a finished game: record the score when the player stands on the
    /// exit (the last allowed move still counts), then go back to the menu.
    pub fn finish_game(&mut self, highscores: &mut Highscores, moves_exceeded: bool) -> RunSummary {
        let map = self.board.map_name.clone();
        let moves_taken = self.player.moves_taken;
        let reached_exit = self.on_portal(PortalRole::End);

        let highscore = if !reached_exit {
            None
        } else {
            match highscores.record(&map, moves_taken) {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(map = %map, error = %e, "could not record highscore");
                    None
                }
            }
        };

        let summary = RunSummary {
            map,
            moves_taken,
            objects_moved: self.player.objects_moved,
            moves_exceeded,
            reached_exit,
            highscore,
        };
        info!(?summary, "game finished");
        self.last_run = Some(summary.clone());
        self.return_to_menu();
        summary
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

// ── Map marker ──

impl Session {
    /// The menu's marker block and where it currently sits.
    pub fn marker(&self) -> Option<(Cell, &CustomBlock)> {
        self.board.iter().find_map(|(cell, block)| match block {
            Block::Custom(c) if c.name == MARKER_NAME => Some((cell, c)),
            _ => None,
        })
    }

    pub fn selected_map(&self) -> Option<&str> {
        self.marker()
            .and_then(|(_, c)| c.attr(MARKER_ATTR))
            .filter(|name| !name.is_empty())
    }

    /// Write `name` onto the marker. False outside the menu.
    pub fn select_map(&mut self, name: &str) -> bool {
        let Some((cell, _)) = self.marker() else {
            return false;
        };
        if let Some(Block::Custom(c)) = self.board.get_mut(cell) {
            c.attrs.insert(MARKER_ATTR.to_string(), name.to_string());
            info!(map = name, "map selected");
            return true;
        }
        false
    }
}

// ── Moving ──

impl Session {
    pub fn moves_left(&self) -> u32 {
        self.board.max_moves.saturating_sub(self.player.moves_taken)
    }

    /// One player action. Counters and scene triggers are updated here; the
    /// resulting events tell the front end what to do next.
    pub fn move_player(&mut self, input: MoveInput) -> Result<Vec<GameEvent>, MoveRejected> {
        if self.phase == Phase::Mapping {
            return Ok(Vec::new());
        }

        let ctx = MoveContext { phase: self.phase, marker_ready: self.selected_map().is_some() };
        let outcome = resolver::resolve(&mut self.board, self.player.pos(), input, ctx)?;

        let mut events = Vec::new();
        self.player.objects_moved += outcome.applied.len() as u32;
        if !outcome.applied.is_empty() {
            events.push(GameEvent::BlocksMoved { count: outcome.applied.len() });
        }
        if outcome.player_moved {
            self.player.place(outcome.player);
            self.player.moves_taken += 1;
        } else {
            events.push(GameEvent::PlayerHeld);
        }

        events.extend(self.triggers());
        Ok(events)
    }

    fn triggers(&self) -> Option<GameEvent> {
        let on = |role| self.on_portal(role);

        match self.phase {
            Phase::Game => {
                let moves_exceeded = self.player.moves_taken >= self.board.max_moves;
                let reached_exit = on(PortalRole::End);
                (reached_exit || moves_exceeded).then(|| GameEvent::LevelComplete {
                    map: self.board.map_name.clone(),
                    moves_taken: self.player.moves_taken,
                    objects_moved: self.player.objects_moved,
                    moves_exceeded,
                    reached_exit,
                })
            }
            Phase::Menu => {
                if on(PortalRole::End) {
                    return Some(GameEvent::Quit);
                }
                let start = self.board.portal(PortalRole::Start).map(|s| s.at);
                if let (Some((cell, _)), Some(map)) = (self.marker(), self.selected_map()) {
                    if Some(cell.column()) == start {
                        return Some(GameEvent::StartGame { map: map.to_string() });
                    }
                }
                on(PortalRole::Mapping).then_some(GameEvent::EnterEditor)
            }
            Phase::Mapping => None,
        }
    }

    fn on_portal(&self, role: PortalRole) -> bool {
        self.board.portal(role).map_or(false, |slot| slot.at == self.player.pos())
    }

    // ── Messages ──

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    pub fn tick_message(&mut self) {
        if self.message_timer > 0 {
            self.message_timer -= 1;
            if self.message_timer == 0 {
                self.message.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::tests::board_from;
    use crate::domain::entity::MoveDir;

    fn step(s: &mut Session, dir: MoveDir) -> Vec<GameEvent> {
        s.move_player(MoveInput::push(dir)).unwrap()
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("gravkoban-sess-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    /// Open board with the start portal under (5, 5) and the exit far away.
    fn open_game(max_moves: u32) -> Session {
        let mut b = Board::blank();
        b.set_portal(PortalRole::Start, (5, 5));
        b.set_portal(PortalRole::End, (1, 1));
        b.max_moves = max_moves;
        let mut s = Session::new();
        s.begin_game(b).unwrap();
        s
    }

    // ── Game ──

    #[test]
    fn begin_game_places_player_on_start() {
        let s = open_game(10);
        assert_eq!(s.phase, Phase::Game);
        assert_eq!(s.player.pos(), (5, 5));
        assert_eq!(s.moves_left(), 10);
    }

    #[test]
    fn begin_game_needs_start_portal() {
        let mut s = Session::new();
        assert!(matches!(
            s.begin_game(Board::blank()),
            Err(MapError::MissingPortal(PortalRole::Start))
        ));
        assert_eq!(s.phase, Phase::Menu);
    }

    #[test]
    fn budget_of_five_ends_on_fifth_move() {
        let mut s = open_game(5);
        for left in (1..5).rev() {
            let events = step(&mut s, MoveDir::Down);
            assert!(events.is_empty(), "{events:?}");
            assert_eq!(s.moves_left(), left);
        }
        let events = step(&mut s, MoveDir::Down);
        assert_eq!(s.player.pos(), (5, 10));
        assert_eq!(
            events,
            vec![GameEvent::LevelComplete {
                map: "Untitled Map".into(),
                moves_taken: 5,
                objects_moved: 0,
                moves_exceeded: true,
                reached_exit: false,
            }]
        );
    }

    #[test]
    fn rejected_moves_cost_nothing() {
        let mut s = open_game(5);
        s.board.set(Cell::floor(5, 6), Block::wall());
        assert!(s.move_player(MoveInput::push(MoveDir::Down)).is_err());
        assert_eq!(s.moves_left(), 5);
        assert_eq!(s.player.pos(), (5, 5));
    }

    #[test]
    fn reaching_exit_completes_level() {
        let mut b = board_from(&["S.C.E"]);
        b.max_moves = 100;
        let mut s = Session::new();
        s.begin_game(b).unwrap();

        // Walk around the crate via row 2.
        step(&mut s, MoveDir::Down);
        step(&mut s, MoveDir::Right);
        step(&mut s, MoveDir::Right);
        step(&mut s, MoveDir::Right);
        step(&mut s, MoveDir::Right);
        let events = step(&mut s, MoveDir::Up);
        assert_eq!(s.player.pos(), (5, 1));
        assert!(matches!(
            events.as_slice(),
            [GameEvent::LevelComplete { moves_taken: 6, moves_exceeded: false, reached_exit: true, .. }]
        ));
    }

    #[test]
    fn held_player_does_not_spend_a_move() {
        let mut b = board_from(&["S", "C"]);
        crate::domain::board::tests::stack(&mut b, 1, 2, &[Block::Crate]);
        let mut s = Session::new();
        s.begin_game(b).unwrap();

        let events = step(&mut s, MoveDir::Down);
        assert_eq!(events[0], GameEvent::BlocksMoved { count: 2 });
        assert_eq!(events[1], GameEvent::PlayerHeld);
        assert_eq!(s.player.pos(), (1, 1));
        assert_eq!(s.player.moves_taken, 0);
        assert_eq!(s.player.objects_moved, 2);
    }

    #[test]
    fn finish_game_records_only_completed_runs() {
        let path = temp_path("finish").join("hs.json");
        let mut hs = Highscores::load(&path).unwrap();

        let mut s = open_game(5);
        s.player.moves_taken = 5;
        let summary = s.finish_game(&mut hs, true);
        assert_eq!(summary.highscore, None);
        assert_eq!(hs.best("Untitled Map"), None);
        assert_eq!(s.phase, Phase::Menu);
        assert_eq!(s.player.pos(), MENU_SPAWN);

        let mut s = open_game(50);
        s.player.moves_taken = 7;
        s.player.place((1, 1));
        let summary = s.finish_game(&mut hs, false);
        assert!(summary.reached_exit);
        assert_eq!(summary.highscore, Some(HighscoreOutcome::NewBest(7)));
        assert_eq!(s.last_run.as_ref().map(|r| r.moves_taken), Some(7));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn exit_on_last_allowed_move_is_recorded() {
        let path = temp_path("last-move").join("hs.json");
        let mut hs = Highscores::load(&path).unwrap();

        let mut b = board_from(&["SE"]);
        b.max_moves = 1;
        let mut s = Session::new();
        s.begin_game(b).unwrap();

        let events = step(&mut s, MoveDir::Right);
        let [GameEvent::LevelComplete { moves_exceeded, reached_exit, .. }] = events.as_slice() else {
            panic!("expected LevelComplete, got {events:?}");
        };
        assert!(*moves_exceeded && *reached_exit);

        let summary = s.finish_game(&mut hs, *moves_exceeded);
        assert_eq!(summary.highscore, Some(HighscoreOutcome::NewBest(1)));
        assert_eq!(hs.best("Untitled Map"), Some(1));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    // ── Menu ──

    #[test]
    fn menu_layout() {
        let s = Session::new();
        assert_eq!(s.player.pos(), MENU_SPAWN);
        assert_eq!(s.marker().map(|(c, _)| c), Some(Cell::floor(6, 5)));
        assert_eq!(s.selected_map(), None);
        assert_eq!(s.board.portal_role_at(10, 5), Some(PortalRole::Start));
        assert_eq!(s.board.portal_role_at(1, 5), Some(PortalRole::End));
        assert_eq!(s.board.portal_role_at(5, 1), Some(PortalRole::Mapping));
    }

    #[test]
    fn marker_into_start_portal_starts_game() {
        let mut s = Session::new();
        assert!(s.select_map("Tower"));
        assert_eq!(s.selected_map(), Some("Tower"));

        for _ in 0..3 {
            let events = step(&mut s, MoveDir::Right);
            assert_eq!(events, vec![GameEvent::BlocksMoved { count: 1 }]);
        }
        let events = step(&mut s, MoveDir::Right);
        assert_eq!(
            events,
            vec![
                GameEvent::BlocksMoved { count: 1 },
                GameEvent::StartGame { map: "Tower".into() },
            ]
        );
    }

    #[test]
    fn marker_without_map_is_stopped_at_start_portal() {
        let mut s = Session::new();
        for _ in 0..3 {
            step(&mut s, MoveDir::Right);
        }
        assert_eq!(
            s.move_player(MoveInput::push(MoveDir::Right)),
            Err(MoveRejected::StartPortalLocked(Cell::floor(10, 5)))
        );
        assert_eq!(s.marker().map(|(c, _)| c), Some(Cell::floor(9, 5)));
    }

    #[test]
    fn walking_out_the_exit_quits() {
        let mut s = Session::new();
        for _ in 0..3 {
            assert!(step(&mut s, MoveDir::Left).is_empty());
        }
        assert_eq!(step(&mut s, MoveDir::Left), vec![GameEvent::Quit]);
    }

    #[test]
    fn mapping_portal_opens_editor() {
        let mut s = Session::new();
        for _ in 0..3 {
            step(&mut s, MoveDir::Up);
        }
        assert_eq!(step(&mut s, MoveDir::Up), vec![GameEvent::EnterEditor]);

        s.enter_editor();
        assert_eq!(s.phase, Phase::Mapping);
        assert_eq!(s.board, Board::blank());
        assert_eq!(s.move_player(MoveInput::push(MoveDir::Up)), Ok(Vec::new()));
    }

    #[test]
    fn menu_ignores_move_budget() {
        let mut s = Session::new();
        s.board.max_moves = 1;
        step(&mut s, MoveDir::Down);
        assert!(step(&mut s, MoveDir::Down).is_empty());
    }

    #[test]
    fn start_selected_game_loads_from_disk() {
        let dir = temp_path("start");
        let mut b = board_from(&["S...E"]);
        b.map_name = "Short".into();
        map::save_map(&dir, &b, None).unwrap();

        let mut s = Session::new();
        assert!(s.start_selected_game(&dir).is_err());
        s.select_map("Short");
        s.start_selected_game(&dir).unwrap();
        assert_eq!(s.phase, Phase::Game);
        assert_eq!(s.player.pos(), (1, 1));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn messages_expire() {
        let mut s = Session::new();
        s.set_message("hello", 2);
        s.tick_message();
        assert_eq!(s.message, "hello");
        s.tick_message();
        assert!(s.message.is_empty());
    }
}
