use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

/// Default cap on the number of remembered entries.
pub const MAX_HISTORY_SIZE: usize = 1000;

/// Command history plus the bookkeeping needed by `history -a`.
///
/// One instance lives for the whole session and is handed to every
/// operation that reads or changes history.
#[derive(Debug)]
pub struct History {
    entries: Vec<String>,
    /// 1-based number of `entries[0]`; grows as old entries are dropped.
    base: usize,
    /// Backing file used by `load`, `save` and `history -c`.
    file: Option<PathBuf>,
    /// How many of `entries` are already recorded in a file.
    last_recorded: usize,
    limit: usize,
}

impl History {
    pub fn new(file: Option<PathBuf>, limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            base: 1,
            file,
            last_recorded: 0,
            limit: limit.max(1),
        }
    }

    /// Load entries from the backing file. A missing file is not an error.
    pub fn load(&mut self) {
        if let Some(path) = self.file.clone() {
            match read_lines(&path) {
                Ok(lines) => {
                    debug!("loaded {} history entries from {}", lines.len(), path.display());
                    self.entries.extend(lines);
                    self.stifle();
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!("could not load history from {}: {e}", path.display()),
            }
        }
        self.last_recorded = self.entries.len();
    }

    /// Overwrite the backing file with the current entries.
    pub fn save(&self) -> io::Result<()> {
        match &self.file {
            Some(path) => {
                write_lines(File::create(path)?, &self.entries)?;
                debug!("saved {} history entries to {}", self.entries.len(), path.display());
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Record a submitted line. Blank lines are skipped.
    pub fn add(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        self.entries.push(line.to_string());
        self.stifle();
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn last_recorded(&self) -> usize {
        self.last_recorded
    }

    /// Forget every entry and truncate the backing file.
    pub fn clear(&mut self) -> io::Result<()> {
        self.entries.clear();
        self.last_recorded = 0;
        if let Some(path) = &self.file {
            File::create(path)?;
        }
        Ok(())
    }

    /// Append the lines of `path` to the in-memory list.
    pub fn read_from(&mut self, path: &Path) -> io::Result<()> {
        let lines = read_lines(path)?;
        self.entries.extend(lines);
        self.stifle();
        Ok(())
    }

    /// Overwrite `path` with every entry and mark them all as recorded.
    pub fn write_to(&mut self, path: &Path) -> io::Result<()> {
        write_lines(File::create(path)?, &self.entries)?;
        self.last_recorded = self.entries.len();
        Ok(())
    }

    /// Append entries added since the last recording to `path`.
    /// Returns how many lines were written.
    pub fn append_new_to(&mut self, path: &Path) -> io::Result<usize> {
        let fresh = &self.entries[self.last_recorded.min(self.entries.len())..];
        if fresh.is_empty() {
            return Ok(0);
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        write_lines(file, fresh)?;
        let written = fresh.len();
        self.last_recorded = self.entries.len();
        Ok(written)
    }

    /// Drop the oldest entries beyond the size limit.
    fn stifle(&mut self) {
        if self.entries.len() <= self.limit {
            return;
        }
        let excess = self.entries.len() - self.limit;
        self.entries.drain(..excess);
        self.base += excess;
        self.last_recorded = self.last_recorded.saturating_sub(excess);
    }
}

fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    Ok(std::fs::read_to_string(path)?
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_lines(file: File, lines: &[String]) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()
}
