/// Highscores: fewest moves per map, kept in one JSON object.
///
/// ## File format:
///   `{ "<map_name>": <moves_taken>, … }`
///
/// A missing file is an empty table. The file is rewritten only when a
/// score improves or an entry is reset.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("highscore file: {0}")]
    Io(#[from] std::io::Error),

    #[error("highscore file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// What recording a finished run did to the table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HighscoreOutcome {
    /// First score for the map, or strictly fewer moves than before.
    NewBest(u32),
    /// The existing best stands.
    Kept(u32),
}

#[derive(Clone, Debug)]
pub struct Highscores {
    path: PathBuf,
    scores: BTreeMap<String, u32>,
}

impl Highscores {
    /// Read the table at `path`. Missing file → empty table.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let scores = match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Highscores { path: path.to_path_buf(), scores })
    }

    /// Like `load`, but a broken file only costs a warning.
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "starting with an empty highscore table");
            Highscores { path: path.to_path_buf(), scores: BTreeMap::new() }
        })
    }

    pub fn best(&self, map: &str) -> Option<u32> {
        self.scores.get(map).copied()
    }

    /// Keep `moves` if the map has no score yet or `moves` is strictly lower.
    pub fn record(&mut self, map: &str, moves: u32) -> Result<HighscoreOutcome, StoreError> {
        match self.best(map) {
            Some(best) if best <= moves => Ok(HighscoreOutcome::Kept(best)),
            _ => {
                self.scores.insert(map.to_string(), moves);
                self.write()?;
                info!(map, moves, "new highscore");
                Ok(HighscoreOutcome::NewBest(moves))
            }
        }
    }

    /// Forget a map's score (its layout changed).
    pub fn reset(&mut self, map: &str) -> Result<(), StoreError> {
        if self.scores.remove(map).is_some() {
            self.write()?;
            info!(map, "highscore reset");
        }
        Ok(())
    }

    fn write(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string(&self.scores)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gravkoban-hs-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir.join("highscores").join("highscores.json")
    }

    #[test]
    fn missing_file_is_empty() {
        let path = temp_file("missing");
        let hs = Highscores::load(&path).unwrap();
        assert_eq!(hs.best("anything"), None);
        assert!(!path.exists());
    }

    #[test]
    fn record_keeps_strictly_lower() {
        let path = temp_file("record");
        let mut hs = Highscores::load(&path).unwrap();

        assert_eq!(hs.record("A", 12).unwrap(), HighscoreOutcome::NewBest(12));
        assert_eq!(hs.record("A", 12).unwrap(), HighscoreOutcome::Kept(12));
        assert_eq!(hs.record("A", 15).unwrap(), HighscoreOutcome::Kept(12));
        assert_eq!(hs.record("A", 9).unwrap(), HighscoreOutcome::NewBest(9));

        let reread = Highscores::load(&path).unwrap();
        assert_eq!(reread.best("A"), Some(9));

        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }

    #[test]
    fn reset_removes_entry() {
        let path = temp_file("reset");
        let mut hs = Highscores::load(&path).unwrap();
        hs.record("A", 3).unwrap();
        hs.record("B", 4).unwrap();
        hs.reset("A").unwrap();
        hs.reset("never-played").unwrap();

        let reread = Highscores::load(&path).unwrap();
        assert_eq!(reread.best("A"), None);
        assert_eq!(reread.best("B"), Some(4));

        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }

    #[test]
    fn reads_existing_table() {
        let path = temp_file("existing");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"Tower": 17, "Maze": 230}"#).unwrap();
        let hs = Highscores::load(&path).unwrap();
        assert_eq!(hs.best("Tower"), Some(17));
        assert_eq!(hs.best("Maze"), Some(230));

        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }

    #[test]
    fn garbage_file_is_an_error_but_recoverable() {
        let path = temp_file("garbage");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Highscores::load(&path), Err(StoreError::Json(_))));
        assert_eq!(Highscores::load_or_empty(&path).best("x"), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap().parent().unwrap());
    }
}
