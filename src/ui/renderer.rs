/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Glyph)
///   2. Compare each glyph with `back` buffer (previous frame)
///   3. Only emit terminal commands for glyphs that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The board is drawn top-down. Each board column takes `CELL_W` terminal
/// columns: a two-character picture of the topmost block, then the stack
/// height when more than one block is stacked there.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::block::{Block, PortalRole, GRID_MAX, GRID_MIN};
use crate::sim::editor::{FormField, Piece, Selection};
use crate::sim::session::{Phase, RunSummary, Session, MARKER_ATTR};
use crate::sim::save::HighscoreOutcome;

// ── Glyph: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Glyph {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Glyph {
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Glyph = Glyph { ch: ' ', fg: Color::White, bg: Glyph::BASE_BG };

    /// Differs from every real glyph, so the next flush repaints everything.
    const INVALID: Glyph = Glyph { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Glyph { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Glyphs ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Glyph>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Glyph::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Glyph::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Glyph::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, g: Glyph) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = g;
        }
    }

    fn get(&self, x: usize, y: usize) -> Glyph {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Glyph::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, Glyph::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Glyph::new(' ', Color::White, bg));
        }
    }
}

// ── Front-end state the session does not own ──

/// Which part of the editor the keyboard is driving.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EditorMode {
    Board,
    Form,
    LoadPicker,
}

pub struct Hud<'a> {
    pub maps: &'a [String],
    pub map_cursor: Option<usize>,
    /// Best score for the selected (menu) or current (game) map.
    pub best: Option<u32>,
    pub editor_mode: EditorMode,
}

// ── Renderer ──

const CELL_W: usize = 3;
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
const BOARD_CELLS: usize = (GRID_MAX - GRID_MIN + 1) as usize;
const PANEL_COL: usize = BOARD_CELLS * CELL_W + 3;
const LIST_ROWS: usize = 8;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const HI: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const WARN: Color = Color::Rgb { r: 255, g: 90, b: 90 };
const GOLD: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const DIM: Color = Color::DarkGrey;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Glyph::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Glyph::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, session: &Session, hud: &Hud) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Glyph::INVALID);
            queue!(self.writer, SetBackgroundColor(Glyph::BASE_BG), Clear(ClearType::All))?;
        }

        // Phase change → clear for a clean transition
        if self.last_phase != Some(session.phase) {
            self.back.cells.fill(Glyph::INVALID);
            queue!(self.writer, SetBackgroundColor(Glyph::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(session.phase);
        }

        self.front.clear();
        self.compose_hud(session);
        self.compose_board(session);
        match session.phase {
            Phase::Menu => self.compose_menu_panel(session, hud),
            Phase::Game => self.compose_game_panel(session, hud),
            Phase::Mapping => self.compose_editor_panel(session, hud),
        }
        self.compose_footer(session, hud);

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed glyphs ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Glyph::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(Glyph::BASE_BG))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let g = self.front.get(x, y);
                if g == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if g.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(g.fg))?;
                    last_fg = g.fg;
                }
                if g.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(g.bg))?;
                    last_bg = g.bg;
                }
                queue!(self.writer, Print(g.ch))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_hud(&mut self, s: &Session) {
        let text = match s.phase {
            Phase::Menu => " GRAVKOBAN  push the marker into the green portal to play".to_string(),
            Phase::Game => format!(
                " {}   Moves left: {}   Pushed: {}",
                s.board.map_name,
                s.moves_left(),
                s.player.objects_moved
            ),
            Phase::Mapping => format!(" EDITOR  {}", s.editor.form.name),
        };
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &text, Color::White, HUD_BG);
    }

    fn compose_board(&mut self, s: &Session) {
        for y in GRID_MIN..=GRID_MAX {
            for x in GRID_MIN..=GRID_MAX {
                let (pic, fg, bg) = column_picture(s, x, y);
                let height = s.board.column_height(x, y);
                let col = (x - GRID_MIN) as usize * CELL_W;
                let row = MAP_ROW + (y - GRID_MIN) as usize;
                let mut chars = pic.chars();
                self.front.set(col, row, Glyph::new(chars.next().unwrap_or(' '), fg, bg));
                self.front.set(col + 1, row, Glyph::new(chars.next().unwrap_or(' '), fg, bg));
                let h = if height > 1 { char::from_digit(height.min(9), 10).unwrap_or('+') } else { ' ' };
                self.front.set(col + 2, row, Glyph::new(h, DIM, Color::Reset));
            }
        }

        if s.phase == Phase::Mapping {
            match &s.editor.selected {
                Some(sel) => self.compose_selection(s, sel),
                None => {
                    let (x, y) = s.editor.cursor;
                    let col = (x - GRID_MIN) as usize * CELL_W;
                    let row = MAP_ROW + (y - GRID_MIN) as usize;
                    for dx in 0..2 {
                        let g = self.front.get(col + dx, row);
                        self.front.set(col + dx, row, Glyph::new(g.ch, Color::White, Color::Rgb { r: 40, g: 70, b: 140 }));
                    }
                }
            }
        }
    }

    /// Floating selection: its picture on a green (placeable) or red background,
    /// with the level it would land on.
    fn compose_selection(&mut self, s: &Session, sel: &Selection) {
        let ok = s.editor.placement_ok(&s.board).unwrap_or(false);
        let bg = if ok { Color::Rgb { r: 30, g: 110, b: 40 } } else { Color::Rgb { r: 130, g: 30, b: 30 } };
        let (pic, fg) = match &sel.piece {
            Piece::Block(b) => {
                let (p, fg, _) = block_picture(b);
                (p, fg)
            }
            Piece::Portal(role) => {
                let (p, _, _) = portal_picture(*role);
                (p, Color::White)
            }
        };
        let col = (sel.at.x - GRID_MIN) as usize * CELL_W;
        let row = MAP_ROW + (sel.at.y - GRID_MIN) as usize;
        let mut chars = pic.chars();
        self.front.set(col, row, Glyph::new(chars.next().unwrap_or(' '), fg, bg));
        self.front.set(col + 1, row, Glyph::new(chars.next().unwrap_or(' '), fg, bg));
        let level = char::from_digit(sel.at.level.min(9), 10).unwrap_or('+');
        self.front.set(col + 2, row, Glyph::new(level, Color::White, bg));
    }

    fn compose_menu_panel(&mut self, s: &Session, hud: &Hud) {
        let mut row = MAP_ROW;
        self.front.put_str(PANEL_COL, row, "Maps  (Tab / Shift+Tab)", GOLD, Color::Reset);
        row += 1;
        if hud.maps.is_empty() {
            self.front.put_str(PANEL_COL, row + 1, "no maps yet: build one in the editor", DIM, Color::Reset);
        }
        let selected = s.selected_map();
        let first = list_start(hud.map_cursor);
        for (i, name) in hud.maps.iter().enumerate().skip(first).take(LIST_ROWS) {
            let is_sel = Some(name.as_str()) == selected;
            let fg = if is_sel { HI } else { Color::White };
            let mark = if Some(i) == hud.map_cursor { '>' } else { ' ' };
            self.front.put_str(PANEL_COL, row + 1 + i - first, &format!("{mark} {name}"), fg, Color::Reset);
        }
        row += LIST_ROWS + 2;

        if let Some(best) = hud.best {
            self.front.put_str(PANEL_COL, row, &format!("Highscore: {best} moves"), Color::White, Color::Reset);
        }
        row += 2;

        if let Some(run) = &s.last_run {
            self.compose_run_summary(run, row);
        }
    }

    fn compose_run_summary(&mut self, run: &RunSummary, row: usize) {
        self.front.put_str(PANEL_COL, row, &format!("Last run: {}", run.map), GOLD, Color::Reset);
        let taken_fg = if !run.reached_exit { WARN } else { Color::White };
        self.front.put_str(PANEL_COL, row + 1, &format!("Moves taken: {}", run.moves_taken), taken_fg, Color::Reset);
        self.front.put_str(PANEL_COL, row + 2, &format!("Objects pushed: {}", run.objects_moved), Color::White, Color::Reset);
        let (line, fg) = match run.highscore {
            Some(HighscoreOutcome::NewBest(n)) => (format!("New Highscore: {n} moves taken"), GOLD),
            Some(HighscoreOutcome::Kept(n)) => (format!("Highscore: {n} moves taken"), Color::White),
            None if !run.reached_exit => ("Out of moves".to_string(), WARN),
            None => (String::new(), Color::White),
        };
        self.front.put_str(PANEL_COL, row + 3, &line, fg, Color::Reset);
    }

    fn compose_game_panel(&mut self, s: &Session, hud: &Hud) {
        let lines = [
            (format!("Moves left:   {}", s.moves_left()), Color::White),
            (format!("Max pushed:   {}", s.board.max_moved), Color::White),
            (format!("Moves taken:  {}", s.player.moves_taken), Color::White),
            (format!("Pushed:       {}", s.player.objects_moved), Color::White),
            (
                hud.best.map_or("Highscore:    -".to_string(), |b| format!("Highscore:    {b}")),
                GOLD,
            ),
        ];
        for (i, (text, fg)) in lines.iter().enumerate() {
            self.front.put_str(PANEL_COL, MAP_ROW + i, text, *fg, Color::Reset);
        }
    }

    fn compose_editor_panel(&mut self, s: &Session, hud: &Hud) {
        let ed = &s.editor;
        let mut row = MAP_ROW;

        for field in [FormField::Name, FormField::MaxMoves, FormField::MaxMoved] {
            let focused = hud.editor_mode == EditorMode::Form && ed.focus == field;
            let fg = if focused { HI } else { Color::White };
            let caret = if focused { "_" } else { "" };
            let text = format!("{:<10} {}{}", field.label(), ed.form.field(field), caret);
            self.front.put_str(PANEL_COL, row, &text, fg, Color::Reset);
            row += 1;
        }
        row += 1;

        if let Some(sel) = &ed.selected {
            let what = match &sel.piece {
                Piece::Block(Block::Crate) => "crate".to_string(),
                Piece::Block(Block::Direction(d)) => format!("direction {}", d.arrow()),
                Piece::Block(Block::Wall { .. }) => "wall".to_string(),
                Piece::Block(_) => "block".to_string(),
                Piece::Portal(role) => format!("{} portal", role.key()),
            };
            let text = format!("{what} at ({}, {}) level {}", sel.at.x, sel.at.y, sel.at.level);
            self.front.put_str(PANEL_COL, row, &text, GOLD, Color::Reset);
        }
        row += 2;

        if hud.editor_mode == EditorMode::LoadPicker {
            self.front.put_str(PANEL_COL, row, "Load map (Enter / Esc)", GOLD, Color::Reset);
            let first = list_start(hud.map_cursor);
            for (i, name) in hud.maps.iter().enumerate().skip(first).take(LIST_ROWS) {
                let fg = if Some(i) == hud.map_cursor { HI } else { Color::White };
                let mark = if Some(i) == hud.map_cursor { '>' } else { ' ' };
                self.front.put_str(PANEL_COL, row + 1 + i - first, &format!("{mark} {name}"), fg, Color::Reset);
            }
            return;
        }

        let help = [
            "1 crate  2 direction  3 wall",
            "4 start portal  5 end portal",
            "wasd move  q/e lower/raise",
            "Enter pick/place  r rotate",
            "x delete  Esc cancel/leave",
            "Tab form  F2 save  l load",
            "c clear board",
        ];
        for (i, line) in help.iter().enumerate() {
            self.front.put_str(PANEL_COL, row + i, line, DIM, Color::Reset);
        }
    }

    fn compose_footer(&mut self, s: &Session, _hud: &Hud) {
        let msg_row = MAP_ROW + BOARD_CELLS + 1;
        if !s.message.is_empty() && msg_row < self.front.height {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &format!(" ◈ {} ", s.message), Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + BOARD_CELLS + 3;
        if help_row < self.front.height {
            let help = match s.phase {
                Phase::Menu => " WASD/arrows move  Shift pulls  Esc quit",
                Phase::Game => " WASD/arrows move  Shift pulls  Esc give up",
                Phase::Mapping => " Esc with nothing selected returns to the menu",
            };
            self.front.put_str(0, help_row, help, DIM, Color::Reset);
        }
    }
}

/// First visible entry of a map list, scrolled so the cursor stays on screen.
fn list_start(cursor: Option<usize>) -> usize {
    cursor.map_or(0, |c| c.saturating_sub(LIST_ROWS - 1))
}

// ── Pictures ──

fn column_picture(s: &Session, x: i32, y: i32) -> (String, Color, Color) {
    if s.phase != Phase::Mapping && s.player.pos() == (x, y) {
        return ("@@".into(), Color::Rgb { r: 255, g: 150, b: 40 }, Color::Reset);
    }
    match s.board.column_top(x, y) {
        Some((_, block)) if !block.is_empty() => block_picture(block),
        _ => match s.board.portal_role_at(x, y) {
            Some(role) => portal_picture(role),
            None => (" .".into(), DIM, Color::Reset),
        },
    }
}

fn block_picture(block: &Block) -> (String, Color, Color) {
    match block {
        Block::Empty => (" .".into(), DIM, Color::Reset),
        Block::Wall { default: true } => ("██".into(), Color::Rgb { r: 90, g: 90, b: 90 }, Color::Reset),
        Block::Wall { default: false } => ("▓▓".into(), Color::Rgb { r: 150, g: 150, b: 150 }, Color::Reset),
        Block::Crate => ("[]".into(), Color::Rgb { r: 220, g: 160, b: 90 }, Color::Rgb { r: 90, g: 60, b: 30 }),
        Block::Direction(d) => {
            let a = d.arrow();
            (format!("{a}{a}"), Color::Rgb { r: 120, g: 200, b: 255 }, Color::Rgb { r: 30, g: 50, b: 90 })
        }
        Block::Portal(p) => portal_picture(p.role),
        Block::Custom(c) => {
            let selected = !c.attr(MARKER_ATTR).unwrap_or("").is_empty();
            let fg = if selected { HI } else { GOLD };
            ("{}".into(), fg, Color::Rgb { r: 60, g: 50, b: 20 })
        }
    }
}

fn portal_picture(role: PortalRole) -> (String, Color, Color) {
    match role {
        PortalRole::Start => ("()".into(), Color::Black, Color::Rgb { r: 60, g: 200, b: 80 }),
        PortalRole::End => ("()".into(), Color::Black, Color::Rgb { r: 220, g: 60, b: 60 }),
        PortalRole::Mapping => ("()".into(), Color::Black, Color::Rgb { r: 230, g: 210, b: 60 }),
    }
}
