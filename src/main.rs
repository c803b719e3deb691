#[cfg(not(unix))]
compile_error!("myshell drives fork/exec directly and only builds on Unix");

mod builtins;
mod completion;
mod config;
mod editor;
mod executor;
mod history;
mod logging;
mod parser;
mod redirect;
mod search;

use std::io::{self, Write};
use std::sync::atomic::Ordering;

use config::ShellConfig;
use editor::LineEditor;
use executor::Flow;
use history::History;

fn main() {
    ctrlc::set_handler(|| {
        // In raw mode the editor handles Ctrl-C itself.
        if !editor::EDITOR_ACTIVE.load(Ordering::Relaxed) {
            println!();
            let _ = io::stdout().flush();
        }
    })
    .expect("Failed to set Ctrl-C handler");

    let config = ShellConfig::from_env();
    logging::init(config.log_file.as_deref());
    log::debug!("starting with {config:?}");

    let mut history = History::new(config.history_file.clone(), config.history_limit);
    history.load();

    let mut editor = LineEditor::new();

    loop {
        match editor.read_line(&config.prompt, &history) {
            Ok(Some(line)) => {
                history.add(&line);
                if let Flow::Exit(code) = executor::execute(&line, &mut history) {
                    std::process::exit(code);
                }
            }
            Ok(None) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => {
                eprintln!("myshell: error reading input: {error}");
                break;
            }
        }
    }

    if let Err(e) = history.save() {
        log::warn!("could not save history: {e}");
    }
    println!();
}
