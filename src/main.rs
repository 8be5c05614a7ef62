/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use config::{GameConfig, LogConfig};
use domain::entity::MoveDir;
use sim::editor::{NewBlock, Nudge};
use sim::event::GameEvent;
use sim::map;
use sim::save::{HighscoreOutcome, Highscores};
use sim::session::{Phase, Session};
use ui::input::{self, InputState};
use ui::renderer::{EditorMode, Hud, Renderer};

const FRAME_SLEEP: Duration = Duration::from_millis(5);
/// One message tick.
const MESSAGE_TICK: Duration = Duration::from_millis(16);
const MESSAGE_TICKS: u32 = 150;

fn main() {
    let config = GameConfig::load();
    if let Err(e) = init_tracing(&config.log) {
        eprintln!("Logging disabled: {e:#}");
    }
    info!(maps = %config.maps_dir.display(), "starting");

    let mut highscores = Highscores::load_or_empty(&config.highscores_file);
    let mut app = App::new();

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&mut app, &mut highscores, &mut renderer, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e:#}");
    }

    println!();
    println!("Thanks for playing Gravkoban!");
}

/// Logs go to a file; the terminal belongs to the renderer.
/// `RUST_LOG` overrides the configured level.
fn init_tracing(log: &LogConfig) -> anyhow::Result<()> {
    let Some(path) = &log.file else {
        return Ok(());
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}

// ── Front-end state ──

struct App {
    session: Session,
    /// Map names as last listed from disk.
    maps: Vec<String>,
    map_cursor: Option<usize>,
    editor_mode: EditorMode,
    last_move: Option<Instant>,
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

impl App {
    fn new() -> Self {
        App {
            session: Session::new(),
            maps: Vec::new(),
            map_cursor: None,
            editor_mode: EditorMode::Board,
            last_move: None,
        }
    }

    fn hud(&self, highscores: &Highscores) -> Hud<'_> {
        let best = match self.session.phase {
            Phase::Menu => self.session.selected_map().and_then(|m| highscores.best(m)),
            Phase::Game => highscores.best(&self.session.board.map_name),
            Phase::Mapping => None,
        };
        Hud { maps: &self.maps, map_cursor: self.map_cursor, best, editor_mode: self.editor_mode }
    }

    fn refresh_maps(&mut self, config: &GameConfig) {
        self.maps = map::list_maps(&config.maps_dir);
        self.map_cursor = None;
    }

    fn back_to_menu(&mut self, config: &GameConfig) {
        self.session.return_to_menu();
        self.editor_mode = EditorMode::Board;
        self.refresh_maps(config);
    }

    fn say(&mut self, msg: &str) {
        self.session.set_message(msg, MESSAGE_TICKS);
    }
}

fn game_loop(
    app: &mut App,
    highscores: &mut Highscores,
    renderer: &mut Renderer,
    config: &GameConfig,
) -> anyhow::Result<()> {
    let mut kb = InputState::new();
    let cooldown = Duration::from_millis(config.play.move_cooldown_ms);
    let mut last_tick = Instant::now();

    app.refresh_maps(config);

    'frames: loop {
        kb.drain_events();
        if kb.ctrl_c_pressed() {
            break;
        }

        for key in kb.presses() {
            let flow = match app.session.phase {
                Phase::Menu | Phase::Game => handle_play_key(app, highscores, config, key, cooldown),
                Phase::Mapping => {
                    handle_editor_key(app, highscores, config, key);
                    Flow::Continue
                }
            };
            if flow == Flow::Quit {
                break 'frames;
            }
        }

        if last_tick.elapsed() >= MESSAGE_TICK {
            app.session.tick_message();
            last_tick = Instant::now();
        }

        renderer.render(&app.session, &app.hud(highscores))?;
        std::thread::sleep(FRAME_SLEEP);
    }

    info!("quitting");
    Ok(())
}

// ── Menu and game ──

fn handle_play_key(
    app: &mut App,
    highscores: &mut Highscores,
    config: &GameConfig,
    key: &KeyEvent,
    cooldown: Duration,
) -> Flow {
    match (app.session.phase, key.code) {
        (Phase::Menu, KeyCode::Esc) => return Flow::Quit,
        (Phase::Menu, KeyCode::Tab) => {
            cycle_map(app, 1);
            return Flow::Continue;
        }
        (Phase::Menu, KeyCode::BackTab) => {
            cycle_map(app, -1);
            return Flow::Continue;
        }
        (Phase::Game, KeyCode::Esc) => {
            info!(map = %app.session.board.map_name, "run abandoned");
            app.back_to_menu(config);
            app.say("Run abandoned");
            return Flow::Continue;
        }
        _ => {}
    }

    let Some(input) = input::move_input(key) else {
        return Flow::Continue;
    };
    if app.last_move.map_or(false, |t| t.elapsed() < cooldown) {
        return Flow::Continue;
    }
    app.last_move = Some(Instant::now());

    match app.session.move_player(input) {
        Ok(events) => {
            for event in events {
                if handle_event(app, highscores, config, event) == Flow::Quit {
                    return Flow::Quit;
                }
            }
        }
        Err(e) => {
            debug!(?input, reason = %e, "move rejected");
            if e.is_budget() {
                app.say(&e.to_string());
            }
        }
    }
    Flow::Continue
}

fn handle_event(app: &mut App, highscores: &mut Highscores, config: &GameConfig, event: GameEvent) -> Flow {
    match event {
        GameEvent::StartGame { map } => {
            if let Err(e) = app.session.start_selected_game(&config.maps_dir) {
                warn!(map = %map, error = %e, "could not start map");
                app.say(&format!("Cannot open {map}: {e}"));
            } else {
                app.say(&format!("Playing {map}"));
            }
        }
        GameEvent::LevelComplete { moves_exceeded, .. } => {
            let summary = app.session.finish_game(highscores, moves_exceeded);
            app.refresh_maps(config);
            let msg = match summary.highscore {
                Some(HighscoreOutcome::NewBest(n)) => format!("New highscore on {}: {n} moves", summary.map),
                None if !summary.reached_exit => format!("Out of moves on {}", summary.map),
                _ => format!("{} cleared in {} moves", summary.map, summary.moves_taken),
            };
            app.say(&msg);
        }
        GameEvent::EnterEditor => {
            app.session.enter_editor();
            app.editor_mode = EditorMode::Board;
        }
        GameEvent::Quit => return Flow::Quit,
        GameEvent::BlocksMoved { .. } | GameEvent::PlayerHeld => {}
    }
    Flow::Continue
}

/// Step the menu's map selection through the list on disk.
fn cycle_map(app: &mut App, step: isize) {
    if app.maps.is_empty() {
        app.say("No maps found");
        return;
    }
    let idx = cycle(app.map_cursor, app.maps.len(), step);
    app.map_cursor = Some(idx);
    let name = app.maps[idx].clone();
    app.session.select_map(&name);
}

fn cycle(cursor: Option<usize>, len: usize, step: isize) -> usize {
    match cursor {
        None if step < 0 => len - 1,
        None => 0,
        Some(i) => (i as isize + step).rem_euclid(len as isize) as usize,
    }
}

// ── Editor ──

fn handle_editor_key(app: &mut App, highscores: &mut Highscores, config: &GameConfig, key: &KeyEvent) {
    if key.code == KeyCode::F(2) {
        save_map(app, highscores, config);
        return;
    }
    match app.editor_mode {
        EditorMode::Board => editor_board_key(app, config, key),
        EditorMode::Form => editor_form_key(app, key),
        EditorMode::LoadPicker => editor_picker_key(app, config, key),
    }
}

fn editor_board_key(app: &mut App, config: &GameConfig, key: &KeyEvent) {
    let Session { board, editor, .. } = &mut app.session;

    let step = match key.code {
        KeyCode::Char(c) => input::wasd(c),
        KeyCode::Up => Some(MoveDir::Up),
        KeyCode::Down => Some(MoveDir::Down),
        KeyCode::Left => Some(MoveDir::Left),
        KeyCode::Right => Some(MoveDir::Right),
        _ => None,
    };
    let result = match step {
        Some(dir) => editor.step(dir),
        None => match key.code {
            KeyCode::Char(c @ '1'..='5') => {
                let kind = match c {
                    '1' => NewBlock::Crate,
                    '2' => NewBlock::Direction,
                    '3' => NewBlock::Wall,
                    '4' => NewBlock::StartPortal,
                    _ => NewBlock::EndPortal,
                };
                editor.pick_new(board, kind)
            }
            KeyCode::Char('q') => editor.nudge(Nudge::Lower),
            KeyCode::Char('e') => editor.nudge(Nudge::Raise),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if editor.selected.is_some() {
                    editor.confirm(board)
                } else {
                    editor.select_top(board, editor.cursor)
                }
            }
            KeyCode::Char('r') => {
                if editor.selected.is_some() {
                    editor.rotate_selected();
                } else {
                    let (x, y) = editor.cursor;
                    if let Some(cell) = board.column_top(x, y).map(|(cell, _)| cell) {
                        editor.rotate_at(board, cell);
                    }
                }
                Ok(())
            }
            KeyCode::Char('x') | KeyCode::Delete | KeyCode::Backspace => editor.delete(),
            KeyCode::Char('c') => {
                editor.clear(board);
                Ok(())
            }
            KeyCode::Tab => {
                app.editor_mode = EditorMode::Form;
                Ok(())
            }
            KeyCode::Char('l') => {
                app.maps = map::list_maps(&config.maps_dir);
                if app.maps.is_empty() {
                    app.say("No maps found");
                } else {
                    app.map_cursor = Some(0);
                    app.editor_mode = EditorMode::LoadPicker;
                }
                Ok(())
            }
            KeyCode::Esc => {
                if editor.selected.is_some() {
                    editor.cancel(board)
                } else {
                    app.back_to_menu(config);
                    Ok(())
                }
            }
            _ => Ok(()),
        },
    };

    if let Err(e) = result {
        debug!(error = %e, "editor action refused");
        app.say(&e.to_string());
    }
}

fn editor_form_key(app: &mut App, key: &KeyEvent) {
    let editor = &mut app.session.editor;
    match key.code {
        KeyCode::Tab => editor.focus = editor.focus.next(),
        KeyCode::Enter | KeyCode::Esc => app.editor_mode = EditorMode::Board,
        KeyCode::Backspace => editor.form.pop_char(editor.focus),
        KeyCode::Char(c) => {
            editor.form.push_char(editor.focus, c);
        }
        _ => {}
    }
}

fn editor_picker_key(app: &mut App, config: &GameConfig, key: &KeyEvent) {
    let len = app.maps.len();
    match key.code {
        KeyCode::Up | KeyCode::Char('w') if len > 0 => app.map_cursor = Some(cycle(app.map_cursor, len, -1)),
        KeyCode::Down | KeyCode::Char('s') if len > 0 => app.map_cursor = Some(cycle(app.map_cursor, len, 1)),
        KeyCode::Esc => app.editor_mode = EditorMode::Board,
        KeyCode::Enter => {
            app.editor_mode = EditorMode::Board;
            let Some(name) = app.map_cursor.and_then(|i| app.maps.get(i)).cloned() else {
                return;
            };
            let Session { board, editor, .. } = &mut app.session;
            match editor.load(board, &config.maps_dir, &name) {
                Ok(()) => app.say(&format!("Loaded {name}")),
                Err(e) => {
                    warn!(map = %name, error = %e, "editor could not load map");
                    app.say(&e.to_string());
                }
            }
        }
        _ => {}
    }
}

fn save_map(app: &mut App, highscores: &mut Highscores, config: &GameConfig) {
    let Session { board, editor, .. } = &mut app.session;
    match editor.save(board, &config.maps_dir, highscores, &config.editor) {
        Ok(path) => {
            let msg = format!("Saved {}", path.display());
            app.editor_mode = EditorMode::Board;
            app.say(&msg);
        }
        Err(e) => {
            warn!(error = %e, "save failed");
            app.say(&format!("Save failed: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_starts_at_either_end() {
        assert_eq!(cycle(None, 3, 1), 0);
        assert_eq!(cycle(None, 3, -1), 2);
    }

    #[test]
    fn cycle_wraps() {
        assert_eq!(cycle(Some(2), 3, 1), 0);
        assert_eq!(cycle(Some(0), 3, -1), 2);
        assert_eq!(cycle(Some(1), 3, 1), 2);
    }
}
