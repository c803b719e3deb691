use std::io::Write;
use std::path::Path;

use log::debug;

use crate::history::History;
use crate::search;

/// Commands run inside the shell process instead of being spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Cd,
    Pwd,
    Echo,
    Exit,
    Type,
    History,
}

/// Uniform builtin signature: arguments (without the name) in, status out.
type Handler = fn(&[String], &mut History, &mut dyn Write, &mut dyn Write) -> i32;

/// Name table for every builtin.
const BUILTINS: &[(&str, Builtin)] = &[
    ("cd", Builtin::Cd),
    ("pwd", Builtin::Pwd),
    ("echo", Builtin::Echo),
    ("exit", Builtin::Exit),
    ("type", Builtin::Type),
    ("history", Builtin::History),
];

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        BUILTINS
            .iter()
            .find(|(builtin_name, _)| *builtin_name == name)
            .map(|(_, builtin)| *builtin)
    }

    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, builtin)| *builtin == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    fn handler(self) -> Handler {
        match self {
            Builtin::Cd => builtin_cd,
            Builtin::Pwd => builtin_pwd,
            Builtin::Echo => builtin_echo,
            Builtin::Exit => builtin_exit,
            Builtin::Type => builtin_type,
            Builtin::History => builtin_history,
        }
    }

    /// Run the builtin and return its own status.
    pub fn run(
        self,
        args: &[String],
        history: &mut History,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> i32 {
        (self.handler())(args, history, stdout, stderr)
    }
}

/// All builtin names, in table order.
pub fn names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    Builtin::from_name(name).is_some()
}

/// Dispatch a whole command (name first) to its builtin.
///
/// Returns 0 whenever the name is a builtin, whatever the builtin itself
/// reported, and 1 when it isn't one.
pub fn execute(
    command: &[String],
    history: &mut History,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    let Some((name, args)) = command.split_first() else {
        return 1;
    };
    let Some(builtin) = Builtin::from_name(name) else {
        return 1;
    };

    let status = builtin.run(args, history, stdout, stderr);
    debug!("builtin {name} finished with {status}");
    0
}

/// Parse the optional status argument of `exit`.
/// No argument means 0; a non-numeric one is reported and becomes 1.
pub fn parse_exit_code(args: &[String], stderr: &mut dyn Write) -> i32 {
    match args.first() {
        None => 0,
        Some(s) => match s.parse::<i32>() {
            Ok(code) => code,
            Err(_) => {
                let _ = writeln!(stderr, "exit: numeric argument required");
                1
            }
        },
    }
}

fn builtin_cd(
    args: &[String],
    _history: &mut History,
    _stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    let target = match args.first() {
        Some(dir) => search::expand_tilde(dir),
        None => std::env::var("HOME").ok(),
    };
    let Some(target) = target else {
        let _ = writeln!(stderr, "cd: HOME not set");
        return 1;
    };

    if let Err(e) = std::env::set_current_dir(&target) {
        let _ = writeln!(stderr, "cd: {target}: {e}");
        return 1;
    }

    0
}

fn builtin_pwd(
    _args: &[String],
    _history: &mut History,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    match std::env::current_dir() {
        Ok(path) => {
            let _ = writeln!(stdout, "{}", path.display());
            0
        }
        Err(e) => {
            let _ = writeln!(stderr, "pwd: {e}");
            1
        }
    }
}

fn builtin_echo(
    args: &[String],
    _history: &mut History,
    stdout: &mut dyn Write,
    _stderr: &mut dyn Write,
) -> i32 {
    let (newline, words) = match args.split_first() {
        Some((flag, rest)) if flag == "-n" => (false, rest),
        _ => (true, args),
    };

    let _ = write!(stdout, "{}", words.join(" "));
    if newline {
        let _ = writeln!(stdout);
    }
    0
}

/// Terminating the shell happens in the executor; inside a pipeline stage
/// `exit` only validates its argument.
fn builtin_exit(
    args: &[String],
    _history: &mut History,
    _stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    parse_exit_code(args, stderr)
}

fn builtin_type(
    args: &[String],
    _history: &mut History,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    if args.is_empty() {
        let _ = writeln!(stderr, "type: missing operand");
        return 1;
    }

    let mut exit_code = 0;
    for arg in args {
        if is_builtin(arg) {
            let _ = writeln!(stdout, "{arg} is a shell builtin");
        } else if let Some(path) = search::resolve_executable(arg) {
            let _ = writeln!(stdout, "{arg} is {}", path.display());
        } else {
            let _ = writeln!(stdout, "{arg}: not found");
            exit_code = 1;
        }
    }
    exit_code
}

// ── history ──

fn builtin_history(
    args: &[String],
    history: &mut History,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    let Some((first, rest)) = args.split_first() else {
        return list_history(history, None, stdout);
    };

    match first.as_str() {
        "-c" => match history.clear() {
            Ok(()) => 0,
            Err(e) => {
                let _ = writeln!(stderr, "history: {e}");
                1
            }
        },
        flag @ ("-r" | "-w" | "-a") => {
            let Some(file) = rest.first() else {
                let _ = writeln!(stderr, "history: {flag}: option requires an argument");
                return 1;
            };
            let Some(path) = search::expand_tilde(file) else {
                let _ = writeln!(stderr, "history: HOME not set");
                return 1;
            };

            let result = match flag {
                "-r" => history.read_from(Path::new(&path)),
                "-w" => history.write_to(Path::new(&path)),
                _ => history.append_new_to(Path::new(&path)).map(|written| {
                    debug!("appended {written} entries, {} recorded", history.last_recorded());
                }),
            };
            if let Err(e) = result {
                let _ = writeln!(stderr, "history: {path}: {e}");
                return 1;
            }
            0
        }
        // Zero or a negative count lists everything.
        count => match count.parse::<i64>() {
            Ok(n) => list_history(history, usize::try_from(n).ok(), stdout),
            Err(_) => {
                let _ = writeln!(stderr, "history: {count}: numeric argument required");
                1
            }
        },
    }
}

/// Print entries with their 1-based numbers; `last` limits output to the
/// newest entries when it is positive and smaller than the total.
fn list_history(history: &History, last: Option<usize>, stdout: &mut dyn Write) -> i32 {
    let entries = history.entries();
    let start = match last {
        Some(n) if n > 0 && n < entries.len() => entries.len() - n,
        _ => 0,
    };

    for (offset, entry) in entries.iter().enumerate().skip(start) {
        let _ = writeln!(stdout, "  {}  {entry}", history.base() + offset);
    }
    0
}
