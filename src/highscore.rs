//! Module for handling highscores in the game.
//!
//! The table keeps the five best runs, best first. It lives in a plain text
//! file with one `score,INITIALS` line per entry and is rewritten in full on
//! every save.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const MAX_ENTRIES: usize = 5;
pub const INITIALS_LEN: usize = 3;

#[derive(Debug, Error)]
pub enum HighScoreError {
    #[error("couldn't read highscore file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't write highscore file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HighScoreEntry {
    pub score: u32,
    pub initials: String,
}

impl HighScoreEntry {
    pub fn new(score: u32, initials: &str) -> Self {
        Self {
            score,
            initials: initials.to_uppercase(),
        }
    }

    fn to_line(&self) -> String {
        format!("{},{}", self.score, self.initials)
    }

    fn from_line(line: &str) -> Option<Self> {
        let mut parts = line.split(',');
        let (score, initials) = match (parts.next(), parts.next(), parts.next()) {
            (Some(score), Some(initials), None) => (score.trim(), initials.trim()),
            _ => return None,
        };
        if initials.is_empty() {
            return None;
        }
        let score = score.parse::<u32>().ok()?;
        Some(Self::new(score, initials))
    }
}

/// The top entries, sorted descending by score and never longer than
/// [`MAX_ENTRIES`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HighScoreTable {
    entries: Vec<HighScoreEntry>,
}

impl HighScoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from entries in any order. Ties keep their input order.
    pub fn from_entries(mut entries: Vec<HighScoreEntry>) -> Self {
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        entries.truncate(MAX_ENTRIES);
        Self { entries }
    }

    pub fn entries(&self) -> &[HighScoreEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Score of the last-place entry.
    pub fn lowest(&self) -> Option<u32> {
        self.entries.last().map(|entry| entry.score)
    }

    /// A score makes the table when there is a free slot or it strictly beats
    /// last place. Tying last place on a full table is not enough.
    pub fn qualifies(&self, score: u32) -> bool {
        match self.lowest() {
            Some(lowest) if self.entries.len() >= MAX_ENTRIES => score > lowest,
            _ => true,
        }
    }

    /// Inserts the entry behind any existing entries with the same score and
    /// returns its zero-based rank, or `None` when it fell off the end.
    pub fn insert(&mut self, entry: HighScoreEntry) -> Option<usize> {
        let rank = self
            .entries
            .iter()
            .position(|existing| existing.score < entry.score)
            .unwrap_or(self.entries.len());
        if rank >= MAX_ENTRIES {
            return None;
        }
        self.entries.insert(rank, entry);
        self.entries.truncate(MAX_ENTRIES);
        Some(rank)
    }

    fn parse(content: &str) -> Self {
        let mut entries = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match HighScoreEntry::from_line(line) {
                Some(entry) => entries.push(entry),
                None => tracing::warn!(
                    line_number = number + 1,
                    "skipping malformed highscore line: {line:?}"
                ),
            }
        }
        Self::from_entries(entries)
    }

    fn serialize(&self) -> String {
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&entry.to_line());
            content.push('\n');
        }
        content
    }
}

/// The on-disk location of the table.
#[derive(Clone, Debug)]
pub struct HighScoreFile {
    path: PathBuf,
}

impl HighScoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty table, not an error.
    pub fn load(&self) -> Result<HighScoreTable, HighScoreError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(HighScoreTable::parse(&content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no highscore file yet");
                Ok(HighScoreTable::new())
            }
            Err(source) => Err(HighScoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, table: &HighScoreTable) -> Result<(), HighScoreError> {
        fs::write(&self.path, table.serialize()).map_err(|source| HighScoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(
            path = %self.path.display(),
            entries = table.len(),
            "highscores saved"
        );
        Ok(())
    }
}

/// Ranked lines for the game over screen and `--show-highscore`.
pub fn render_table(table: &HighScoreTable) -> Vec<String> {
    table
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("#{}: {}: {}", i + 1, entry.initials, entry.score))
        .collect()
}

/// Prints the table to stdout, used by `--show-highscore`.
pub fn show_highscore(file: &HighScoreFile) -> Result<(), HighScoreError> {
    let table = file.load()?;
    println!("HIGH SCORES ({})", file.path().display());
    println!("{}", "-".repeat(24));
    if table.is_empty() {
        println!("No highscores yet.");
    }
    for line in render_table(&table) {
        println!("{}", line);
    }
    Ok(())
}
