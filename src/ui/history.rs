//! Persistent infobar input history.
//!
//! Committed search and filter inputs append to `$DLOG_DIR/history`
//! (default `~/.dlog/history`), newline-delimited. When the ring reaches
//! capacity it is rewritten to its most recent 80% through a temp file and
//! an atomic rename. IO failures are logged and ignored; the in-memory ring
//! stays authoritative for the session.

use log::debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const HISTORY_SIZE: usize = 1000;

/// Navigable ring of past inputs backed by a history file.
pub struct History {
    path: PathBuf,
    entries: Vec<String>,
    /// Position from the end: 0 is the live edit buffer, 1 the most recent
    /// entry.
    pos: usize,
    /// The live input stashed when navigation leaves position zero.
    current_input: String,
    loaded: bool,
}

impl History {
    /// History at the conventional location: `$DLOG_DIR/history` or
    /// `~/.dlog/history`.
    pub fn open_default() -> Self {
        let dir = std::env::var_os("DLOG_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".dlog")))
            .unwrap_or_else(std::env::temp_dir);
        Self::with_path(dir.join("history"))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            pos: 0,
            current_input: String::new(),
            loaded: false,
        }
    }

    fn load(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                self.entries = contents.lines().map(str::to_string).collect();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!("could not load history: {}", e),
        }
    }

    /// Record a committed input: append to the ring and the file, trimming
    /// when the ring reaches capacity.
    pub fn add(&mut self, entry: &str) {
        if entry.is_empty() {
            return;
        }
        self.load();
        self.entries.push(entry.to_string());
        self.pos = 0;

        if let Err(e) = self.append_to_file(entry) {
            debug!("could not append history: {}", e);
        }
        if self.entries.len() >= HISTORY_SIZE {
            self.trim();
        }
    }

    fn append_to_file(&self, entry: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry)
    }

    /// Rewrite the file with the newest 80% of entries via temp file +
    /// atomic rename.
    fn trim(&mut self) {
        let keep_from = self.entries.len() - HISTORY_SIZE / 100 * 80;
        let kept: Vec<String> = self.entries[keep_from..].to_vec();

        let tmp_path = tmp_sibling(&self.path);
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            for entry in &kept {
                writeln!(file, "{}", entry)?;
            }
            file.flush()?;
            fs::rename(&tmp_path, &self.path)
        };
        match write() {
            Ok(()) => self.entries = kept,
            Err(e) => debug!("could not trim history: {}", e),
        }
    }

    /// Step through history. Positive delta moves to older entries, negative
    /// back towards the live input. Returns the buffer contents for the new
    /// position, or `None` when nothing changes.
    pub fn navigate(&mut self, delta: i64, current: &str) -> Option<String> {
        self.load();
        let mut target = self.pos as i64 + delta;
        target = target.clamp(0, self.entries.len() as i64);
        let target = target as usize;

        if target == self.pos {
            return None;
        }
        if target == 0 {
            self.pos = 0;
            return Some(self.current_input.clone());
        }
        if self.pos == 0 {
            // Leaving the live buffer: stash it for the way back.
            self.current_input = current.to_string();
        }
        self.pos = target;
        Some(self.entries[self.entries.len() - target].clone())
    }

    /// Forget the navigation position (called when an edit session ends).
    pub fn reset_cursor(&mut self) {
        self.pos = 0;
        self.current_input.clear();
    }

    #[cfg(test)]
    fn len(&mut self) -> usize {
        self.load();
        self.entries.len()
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push("_tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn history_in(dir: &TempDir) -> History {
        History::with_path(dir.path().join("history"))
    }

    #[test]
    fn add_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let mut history = history_in(&dir);
        history.add("&error");
        history.add("/warn");

        let mut reloaded = history_in(&dir);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.navigate(1, "").unwrap(), "/warn");
        assert_eq!(reloaded.navigate(1, "").unwrap(), "&error");
    }

    #[test]
    fn empty_entries_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut history = history_in(&dir);
        history.add("");
        assert_eq!(history.len(), 0);
    }

    #[test]
    fn navigation_stashes_and_restores_live_input() {
        let dir = TempDir::new().unwrap();
        let mut history = history_in(&dir);
        history.add("old one");
        history.add("old two");

        assert_eq!(history.navigate(1, "draft").unwrap(), "old two");
        assert_eq!(history.navigate(1, "old two").unwrap(), "old one");
        // Past the oldest entry: pinned.
        assert!(history.navigate(1, "old one").is_none());

        assert_eq!(history.navigate(-1, "old one").unwrap(), "old two");
        assert_eq!(history.navigate(-1, "old two").unwrap(), "draft");
        assert!(history.navigate(-1, "draft").is_none());
    }

    #[test]
    fn trim_keeps_the_newest_eighty_percent() {
        let dir = TempDir::new().unwrap();
        let mut history = history_in(&dir);
        for i in 0..HISTORY_SIZE {
            history.add(&format!("entry {}", i));
        }
        assert_eq!(history.len(), HISTORY_SIZE / 100 * 80);

        // The file matches the trimmed ring and starts at the cut point.
        let mut reloaded = history_in(&dir);
        assert_eq!(reloaded.len(), HISTORY_SIZE / 100 * 80);
        assert_eq!(reloaded.navigate(1, "").unwrap(), "entry 999");
    }

    #[test]
    fn io_failures_leave_memory_authoritative() {
        // A directory that cannot exist as a file parent.
        let mut history = History::with_path("/dev/null/nope/history");
        history.add("survives in memory");
        assert_eq!(history.len(), 1);
        assert_eq!(history.navigate(1, "").unwrap(), "survives in memory");
    }
}
