/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD, or the
/// per-user / system data directories).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "gravkoban";

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub maps_dir: PathBuf,
    pub highscores_file: PathBuf,
    pub play: PlayConfig,
    pub editor: EditorConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug)]
pub struct PlayConfig {
    /// Minimum gap between two accepted moves.
    pub move_cooldown_ms: u64,
}

/// Budgets written into a saved map when the editor fields are left blank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditorConfig {
    pub default_max_moves: u32,
    pub default_max_moved: u32,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    /// `None` turns logging off.
    pub file: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    play: TomlPlay,
    #[serde(default)]
    editor: TomlEditor,
    #[serde(default)]
    log: TomlLog,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_maps_dir")]
    maps_dir: String,
    #[serde(default = "default_highscores_file")]
    highscores_file: String,
}

#[derive(Deserialize, Debug)]
struct TomlPlay {
    #[serde(default = "default_move_cooldown")]
    move_cooldown_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlEditor {
    #[serde(default = "default_budget")]
    default_max_moves: u32,
    #[serde(default = "default_budget")]
    default_max_moved: u32,
}

#[derive(Deserialize, Debug)]
struct TomlLog {
    #[serde(default = "default_log_file")]
    file: String,
    #[serde(default = "default_log_level")]
    level: String,
}

// ── Defaults ──

fn default_maps_dir() -> String { "maps".into() }
fn default_highscores_file() -> String { "highscores/highscores.json".into() }
fn default_move_cooldown() -> u64 { 300 }
fn default_budget() -> u32 { 1000 }
fn default_log_file() -> String { "gravkoban.log".into() }
fn default_log_level() -> String { "info".into() }

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            maps_dir: default_maps_dir(),
            highscores_file: default_highscores_file(),
        }
    }
}

impl Default for TomlPlay {
    fn default() -> Self {
        TomlPlay { move_cooldown_ms: default_move_cooldown() }
    }
}

impl Default for TomlEditor {
    fn default() -> Self {
        TomlEditor {
            default_max_moves: default_budget(),
            default_max_moved: default_budget(),
        }
    }
}

impl Default for TomlLog {
    fn default() -> Self {
        TomlLog { file: default_log_file(), level: default_log_level() }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, CWD, ~/.local/share/gravkoban, /usr/share/gravkoban.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        GameConfig::resolve(toml_cfg, &search_dirs)
    }

    /// Parse config text directly; relative paths stay relative.
    #[cfg(test)]
    fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        Ok(GameConfig::resolve(toml::from_str(text)?, &[]))
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let maps_dir = locate(&toml_cfg.general.maps_dir, search_dirs, Path::is_dir);
        let highscores_file = locate(&toml_cfg.general.highscores_file, search_dirs, Path::is_file);

        let log_file = toml_cfg.log.file.trim();

        GameConfig {
            maps_dir,
            highscores_file,
            play: PlayConfig { move_cooldown_ms: toml_cfg.play.move_cooldown_ms },
            editor: EditorConfig {
                // A zero budget would make every saved map unloadable.
                default_max_moves: toml_cfg.editor.default_max_moves.max(1),
                default_max_moved: toml_cfg.editor.default_max_moved.max(1),
            },
            log: LogConfig {
                file: (!log_file.is_empty()).then(|| PathBuf::from(log_file)),
                level: toml_cfg.log.level,
            },
        }
    }
}

/// Absolute paths are taken as-is; relative ones resolve against the first
/// candidate directory where `exists` holds, else stay relative to CWD.
fn locate(raw: &str, search_dirs: &[PathBuf], exists: fn(&Path) -> bool) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return path;
    }
    search_dirs
        .iter()
        .map(|d| d.join(&path))
        .find(|p| exists(p))
        .unwrap_or(path)
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share").join(APP_DIR);
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory
    let sys = PathBuf::from("/usr/share").join(APP_DIR);
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
/// The log subscriber does not exist yet, so problems go to stderr.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}
