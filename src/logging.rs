use std::fs::OpenOptions;
use std::path::Path;

use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

/// Send `log` output to `log_file`, appending.
///
/// Best-effort: with no file, or one that can't be opened, the shell runs
/// without a logger. Logs never share stdout/stderr with commands.
pub fn init(log_file: Option<&Path>) {
    let Some(path) = log_file else {
        return;
    };

    let file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("myshell: log file {}: {e}", path.display());
            return;
        }
    };

    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Err(e) = WriteLogger::init(LevelFilter::Debug, config, file) {
        eprintln!("myshell: cannot install logger: {e}");
    }
}
