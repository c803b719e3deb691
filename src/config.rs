use std::path::PathBuf;

use crate::history::MAX_HISTORY_SIZE;

pub const DEFAULT_PROMPT: &str = "$ ";

/// History file created under `HOME` when `HISTFILE` is not set.
pub const HISTORY_FILE_NAME: &str = ".myshell_history";

/// Session settings read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    pub prompt: String,
    /// `None` keeps history in memory only.
    pub history_file: Option<PathBuf>,
    pub history_limit: usize,
    /// Destination for diagnostic logs; `None` disables logging.
    pub log_file: Option<PathBuf>,
}

impl ShellConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any variable source.
    ///
    /// Reads: HISTFILE, HOME, HISTSIZE, MYSHELL_PROMPT, MYSHELL_LOG
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let history_file = non_empty("HISTFILE")
            .map(PathBuf::from)
            .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE_NAME)));

        let history_limit = non_empty("HISTSIZE")
            .and_then(|size| size.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(MAX_HISTORY_SIZE);

        ShellConfig {
            prompt: lookup("MYSHELL_PROMPT").unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            history_file,
            history_limit,
            log_file: non_empty("MYSHELL_LOG").map(PathBuf::from),
        }
    }
}
