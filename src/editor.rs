use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, ClearType},
    tty::IsTty,
};

use crate::completion;
use crate::history::History;

// ── Raw-mode sentinel ─────────────────────────────────────────────────────────

/// `true` while the line editor holds the terminal in raw mode.
///
/// The `ctrlc` handler in `main.rs` reads this flag so it doesn't print a
/// stray newline while the editor owns the screen.
pub static EDITOR_ACTIVE: AtomicBool = AtomicBool::new(false);

/// RAII guard: enables terminal raw mode on construction and restores it on
/// drop, even on panic.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        EDITOR_ACTIVE.store(true, Ordering::Relaxed);
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        EDITOR_ACTIVE.store(false, Ordering::Relaxed);
    }
}

// ── Line editor ───────────────────────────────────────────────────────────────

/// Reads input lines with cursor movement, Emacs keybindings, history
/// navigation and command-name completion.
///
/// History itself belongs to the caller and is only borrowed per line.
#[derive(Default)]
pub struct LineEditor {
    /// Current line content, stored as `char`s for Unicode-safe cursor indexing.
    buffer: Vec<char>,
    /// Cursor position within `buffer` (0 = before the first char).
    cursor: usize,
    /// Index into the history during navigation; equals its length otherwise.
    history_idx: usize,
    /// Line in progress when the user first pressed Up.
    saved_buffer: String,
    /// The previous key was an unresolved Tab.
    tab_pending: bool,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one line of input, displaying `prompt` to the left.
    ///
    /// Returns:
    /// - `Ok(Some(line))`: the user submitted a line (may be empty)
    /// - `Ok(None)`: EOF (Ctrl-D on an empty buffer, or stdin was closed)
    /// - `Err(_)`: I/O error
    ///
    /// When stdin is not a TTY (scripts, integration tests) this falls back
    /// to a plain buffered `read_line()`.
    pub fn read_line(&mut self, prompt: &str, history: &History) -> io::Result<Option<String>> {
        if !io::stdin().is_tty() {
            return read_line_fallback(prompt);
        }

        self.reset_state(history.len());
        let _guard = RawModeGuard::enter()?;

        // Raw mode disables echo; we must display the prompt ourselves.
        print!("{prompt}");
        io::stdout().flush()?;

        loop {
            let ev = match event::read() {
                Ok(ev) => ev,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let Event::Key(key) = ev else {
                continue;
            };
            if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
                continue;
            }

            match self.handle_key(key, prompt, history.entries())? {
                KeyAction::Submit(line) => return Ok(Some(line)),
                KeyAction::Eof => return Ok(None),
                KeyAction::Continue => {}
            }
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn reset_state(&mut self, history_len: usize) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_idx = history_len;
        self.saved_buffer.clear();
        self.tab_pending = false;
    }

    fn line(&self) -> String {
        self.buffer.iter().collect()
    }

    fn handle_key(
        &mut self,
        key: crossterm::event::KeyEvent,
        prompt: &str,
        history: &[String],
    ) -> io::Result<KeyAction> {
        use KeyCode::*;
        use KeyModifiers as Mod;

        let second_tab = std::mem::take(&mut self.tab_pending);

        match (key.code, key.modifiers) {
            (Enter, _) => {
                // Raw mode suppresses the terminal's automatic newline on Enter.
                print!("\r\n");
                io::stdout().flush()?;
                return Ok(KeyAction::Submit(self.line()));
            }

            (Tab, _) => self.complete(prompt, second_tab)?,

            // Ctrl-D: EOF on an empty line, otherwise delete-at-cursor
            (Char('d'), Mod::CONTROL) => {
                if self.buffer.is_empty() {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(KeyAction::Eof);
                }
                self.delete_at_cursor();
                self.redraw(prompt)?;
            }

            // Ctrl-C: in raw mode this arrives as a key, not SIGINT
            (Char('c'), Mod::CONTROL) => {
                print!("^C\r\n{prompt}");
                io::stdout().flush()?;
                self.reset_state(history.len());
            }

            (Char('l'), Mod::CONTROL) => {
                execute!(
                    io::stdout(),
                    terminal::Clear(ClearType::All),
                    cursor::MoveTo(0, 0),
                )?;
                self.redraw(prompt)?;
            }

            (Char('a'), Mod::CONTROL) | (Home, _) => {
                self.cursor = 0;
                self.sync_cursor(prompt)?;
            }
            (Char('e'), Mod::CONTROL) | (End, _) => {
                self.cursor = self.buffer.len();
                self.sync_cursor(prompt)?;
            }

            (Char('k'), Mod::CONTROL) => {
                self.buffer.truncate(self.cursor);
                self.redraw(prompt)?;
            }
            (Char('u'), Mod::CONTROL) => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                self.redraw(prompt)?;
            }
            (Char('w'), Mod::CONTROL) => {
                self.delete_word_before_cursor();
                self.redraw(prompt)?;
            }

            (Left, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.sync_cursor(prompt)?;
                }
            }
            (Right, _) => {
                if self.cursor < self.buffer.len() {
                    self.cursor += 1;
                    self.sync_cursor(prompt)?;
                }
            }

            (Up, _) => {
                self.history_prev(history);
                self.redraw(prompt)?;
            }
            (Down, _) => {
                self.history_next(history);
                self.redraw(prompt)?;
            }

            (Backspace, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                    self.redraw(prompt)?;
                }
            }
            (Delete, _) => {
                self.delete_at_cursor();
                self.redraw(prompt)?;
            }

            (Char(c), Mod::NONE) | (Char(c), Mod::SHIFT) => {
                self.insert_str(&c.to_string());
                self.redraw(prompt)?;
            }

            _ => {}
        }

        Ok(KeyAction::Continue)
    }

    /// Complete the command word under the cursor.
    ///
    /// Only the first word is completed. A unique match is inserted with a
    /// trailing space; several matches are narrowed to their common prefix,
    /// and a second Tab with nothing left to narrow lists them.
    fn complete(&mut self, prompt: &str, second_tab: bool) -> io::Result<()> {
        let prefix: String = self.buffer[..self.cursor].iter().collect();
        if prefix.chars().any(char::is_whitespace) {
            return ring_bell();
        }

        let candidates = completion::command_candidates(&prefix);
        match candidates.as_slice() {
            [] => ring_bell(),
            [only] => {
                self.insert_str(&only[prefix.len()..]);
                self.insert_str(" ");
                self.redraw(prompt)
            }
            many => {
                let common = completion::longest_common_prefix(many);
                if common.len() > prefix.len() {
                    self.insert_str(&common[prefix.len()..]);
                    self.redraw(prompt)
                } else if second_tab {
                    print!("\r\n{}\r\n", many.join("  "));
                    self.redraw(prompt)
                } else {
                    self.tab_pending = true;
                    ring_bell()
                }
            }
        }
    }

    fn insert_str(&mut self, text: &str) {
        for c in text.chars() {
            self.buffer.insert(self.cursor, c);
            self.cursor += 1;
        }
    }

    /// Erase the current line and redraw prompt + buffer, then reposition cursor.
    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
        )?;
        print!("{prompt}{}", self.line());
        io::stdout().flush()?;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    /// Move the terminal cursor to match `self.cursor` without redrawing text.
    fn sync_cursor(&self, prompt: &str) -> io::Result<()> {
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    fn delete_at_cursor(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    fn delete_word_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        // Skip spaces immediately before the cursor, then the non-space word.
        let mut end = self.cursor;
        while end > 0 && self.buffer[end - 1] == ' ' {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && self.buffer[start - 1] != ' ' {
            start -= 1;
        }
        self.buffer.drain(start..self.cursor);
        self.cursor = start;
    }

    fn history_prev(&mut self, history: &[String]) {
        if history.is_empty() {
            return;
        }
        if self.history_idx >= history.len() {
            self.history_idx = history.len();
            self.saved_buffer = self.line();
        }
        if self.history_idx > 0 {
            self.history_idx -= 1;
            self.buffer = history[self.history_idx].chars().collect();
            self.cursor = self.buffer.len();
        }
    }

    fn history_next(&mut self, history: &[String]) {
        if self.history_idx >= history.len() {
            return;
        }
        self.history_idx += 1;
        if self.history_idx == history.len() {
            self.buffer = self.saved_buffer.chars().collect();
        } else {
            self.buffer = history[self.history_idx].chars().collect();
        }
        self.cursor = self.buffer.len();
    }
}

enum KeyAction {
    Continue,
    Submit(String),
    Eof,
}

fn ring_bell() -> io::Result<()> {
    print!("\x07");
    io::stdout().flush()
}

/// Non-TTY path: print prompt and delegate to `BufRead::read_line`.
fn read_line_fallback(prompt: &str) -> io::Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line.trim_end_matches(['\n', '\r']).to_string())),
    }
}
