use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::ptr;

use log::{debug, warn};

use crate::builtins::{self, Builtin};
use crate::history::History;
use crate::parser::{self, Command};
use crate::redirect::{self, CREATE_MODE, OutputTarget, RedirectionSpec, ScopedRedirect};
use crate::search;

/// What the read loop should do after a line has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Terminate the shell with this status.
    Exit(i32),
}

/// Run one input line: tokenize, split, strip redirections from the last
/// command, then run the pipeline.
///
/// `exit` on its own is handled here rather than as a pipeline stage because
/// it must end the shell itself. History is saved before `Flow::Exit` is
/// returned; the caller terminates the process.
pub fn execute(line: &str, history: &mut History) -> Flow {
    let tokens = match parser::tokenize(line) {
        Ok(tokens) => tokens,
        Err(e) => {
            eprintln!("myshell: {e}");
            return Flow::Continue;
        }
    };
    if tokens.is_empty() {
        return Flow::Continue;
    }

    let Some(mut pipeline) = parser::split_pipeline(&tokens) else {
        debug!("ignoring malformed pipeline: {line}");
        return Flow::Continue;
    };

    if let [command] = pipeline.as_slice() {
        if command[0] == "exit" {
            let code = builtins::parse_exit_code(&command[1..], &mut io::stderr());
            if let Err(e) = history.save() {
                warn!("could not save history: {e}");
            }
            return Flow::Exit(code);
        }
    }

    let redirects = match pipeline.last_mut() {
        Some(last) => redirect::extract_redirections(last),
        None => RedirectionSpec::default(),
    };

    if !redirects.is_empty() {
        debug!("last stage redirected: {redirects:?}");
    }

    let status = run_pipeline(&pipeline, &redirects, history);
    debug!("pipeline `{line}` finished with {status}");
    Flow::Continue
}

/// Run `pipeline`, sending the last stage's output where `redirects` says.
///
/// A lone builtin runs in-process. Anything else forks one child per stage
/// connected by pipes. A single stage reports its real exit status; a
/// multi-stage pipeline always reports 0.
pub fn run_pipeline(pipeline: &[Command], redirects: &RedirectionSpec, history: &mut History) -> i32 {
    if let [command] = pipeline {
        if let Some(builtin) = command.first().and_then(|name| Builtin::from_name(name)) {
            debug!("running builtin {} in-process", builtin.name());
            return run_builtin_in_process(command, redirects, history);
        }
    }

    if pipeline.is_empty() {
        return 0;
    }
    spawn_pipeline(pipeline, redirects, history)
}

fn run_builtin_in_process(command: &Command, redirects: &RedirectionSpec, history: &mut History) -> i32 {
    let stdout_guard = ScopedRedirect::new(libc::STDOUT_FILENO, redirects.stdout.as_ref());
    let stderr_guard = ScopedRedirect::new(libc::STDERR_FILENO, redirects.stderr.as_ref());
    if !stdout_guard.is_valid() || !stderr_guard.is_valid() {
        debug!("running {} without the failed redirection", command[0]);
    }

    // The locks drop before the guards, which flush and restore.
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    builtins::execute(command, history, &mut stdout, &mut stderr)
}

// ── Forked stages ──

/// How a child finishes once its descriptors are wired.
enum Launch {
    Builtin,
    Exec { path: CString, argv: Vec<CString> },
    /// Pre-rendered diagnostic written to stderr before exiting 127.
    NotFound(Vec<u8>),
    /// Nothing left to run, e.g. a bare `> file`.
    Empty,
}

/// Work out how to launch `command` before forking, so the child of an
/// external command only makes async-signal-safe calls.
fn prepare_launch(command: &Command) -> Launch {
    let Some(name) = command.first() else {
        return Launch::Empty;
    };
    if builtins::is_builtin(name) {
        return Launch::Builtin;
    }

    let Some(path) = search::resolve_executable(name) else {
        debug!("`{name}` not found");
        return Launch::NotFound(format!("{name}: not found\n").into_bytes());
    };

    let path = CString::new(path.into_os_string().into_encoded_bytes());
    let argv: Result<Vec<CString>, _> = command.iter().map(|arg| CString::new(arg.as_bytes())).collect();
    match (path, argv) {
        (Ok(path), Ok(argv)) => Launch::Exec { path, argv },
        _ => Launch::NotFound(format!("{name}: argument contains a NUL byte\n").into_bytes()),
    }
}

/// A redirection target ready to hand to `open(2)` in the child.
struct ChildRedirect {
    fd: RawFd,
    path: CString,
    flags: libc::c_int,
}

impl ChildRedirect {
    fn new(fd: RawFd, target: Option<&OutputTarget>) -> Option<Self> {
        let target = target?;
        let path = match CString::new(target.path.as_bytes()) {
            Ok(path) => path,
            Err(_) => {
                eprintln!("myshell: {}: invalid file name", target.path);
                return None;
            }
        };
        let mode = if target.append { libc::O_APPEND } else { libc::O_TRUNC };
        Some(Self {
            fd,
            path,
            flags: libc::O_WRONLY | libc::O_CREAT | mode,
        })
    }

    /// Point `self.fd` at the target. On failure the stream stays as it was.
    fn apply(&self) {
        unsafe {
            let opened = libc::open(self.path.as_ptr(), self.flags, CREATE_MODE as libc::c_uint);
            if opened < 0 {
                libc::perror(c"open".as_ptr());
                return;
            }
            libc::dup2(opened, self.fd);
            libc::close(opened);
        }
    }
}

/// Descriptors one stage reads from and writes to, when not the terminal.
#[derive(Clone, Copy)]
struct StageIo {
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
}

fn spawn_pipeline(pipeline: &[Command], redirects: &RedirectionSpec, history: &mut History) -> i32 {
    let stage_count = pipeline.len();

    let mut pipes = Vec::with_capacity(stage_count - 1);
    for _ in 1..stage_count {
        match os_pipe::pipe() {
            Ok(pipe) => pipes.push(pipe),
            Err(e) => {
                eprintln!("myshell: pipe: {e}");
                return 1;
            }
        }
    }
    let pipe_fds: Vec<RawFd> = pipes
        .iter()
        .flat_map(|(reader, writer)| [reader.as_raw_fd(), writer.as_raw_fd()])
        .collect();

    let final_redirects: Vec<ChildRedirect> = [
        ChildRedirect::new(libc::STDOUT_FILENO, redirects.stdout.as_ref()),
        ChildRedirect::new(libc::STDERR_FILENO, redirects.stderr.as_ref()),
    ]
    .into_iter()
    .flatten()
    .collect();

    // Anything still buffered would otherwise be written once per child.
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    let mut pids = Vec::with_capacity(stage_count);
    for (i, command) in pipeline.iter().enumerate() {
        let stage_io = StageIo {
            stdin: (i > 0).then(|| pipes[i - 1].0.as_raw_fd()),
            stdout: (i + 1 < stage_count).then(|| pipes[i].1.as_raw_fd()),
        };
        let redirects: &[ChildRedirect] = if i + 1 == stage_count { &final_redirects } else { &[] };

        // Owned snapshot of this stage's launch data, built just before fork.
        let launch = prepare_launch(command);
        let argv_ptrs: Vec<*const libc::c_char> = match &launch {
            Launch::Exec { argv, .. } => argv
                .iter()
                .map(|arg| arg.as_ptr())
                .chain(std::iter::once(ptr::null()))
                .collect(),
            _ => Vec::new(),
        };

        match unsafe { libc::fork() } {
            -1 => {
                eprintln!("myshell: fork: {}", io::Error::last_os_error());
                break;
            }
            0 => run_child(command, &launch, &argv_ptrs, stage_io, redirects, &pipe_fds, history),
            pid => {
                debug!("spawned pid {pid} for stage {i}: {}", command.first().map_or("", String::as_str));
                pids.push(pid);
            }
        }
    }

    // Every stray write end must be gone before the readers can see EOF.
    drop(pipes);

    let mut last_status = 1;
    for pid in &pids {
        match wait_for_pid(*pid) {
            Ok(status) => last_status = status,
            Err(e) => {
                eprintln!("myshell: waitpid: {e}");
                last_status = 1;
            }
        }
    }

    if stage_count == 1 && pids.len() == 1 {
        last_status
    } else if pids.len() == stage_count {
        0
    } else {
        1
    }
}

/// Body of a forked stage. Never returns.
fn run_child(
    command: &Command,
    launch: &Launch,
    argv_ptrs: &[*const libc::c_char],
    stage_io: StageIo,
    redirects: &[ChildRedirect],
    pipe_fds: &[RawFd],
    history: &mut History,
) -> ! {
    reset_child_signals();
    unsafe {
        if let Some(fd) = stage_io.stdin {
            libc::dup2(fd, libc::STDIN_FILENO);
        }
        if let Some(fd) = stage_io.stdout {
            libc::dup2(fd, libc::STDOUT_FILENO);
        }
    }
    for redirect in redirects {
        redirect.apply();
    }
    for &fd in pipe_fds {
        unsafe {
            libc::close(fd);
        }
    }

    match launch {
        Launch::Builtin => {
            {
                let mut stdout = io::stdout().lock();
                let mut stderr = io::stderr().lock();
                builtins::execute(command, history, &mut stdout, &mut stderr);
                let _ = stdout.flush();
                let _ = stderr.flush();
            }
            unsafe { libc::_exit(0) }
        }
        Launch::NotFound(message) => unsafe {
            libc::write(libc::STDERR_FILENO, message.as_ptr().cast(), message.len());
            libc::_exit(127)
        },
        Launch::Exec { path, .. } => unsafe {
            libc::execv(path.as_ptr(), argv_ptrs.as_ptr());
            libc::perror(c"execv".as_ptr());
            libc::_exit(1)
        },
        Launch::Empty => unsafe { libc::_exit(0) },
    }
}

/// Give a forked stage default SIGPIPE and SIGINT handling. The parent
/// ignores SIGPIPE and routes SIGINT through the Ctrl-C handler, whose
/// thread does not exist in the child.
fn reset_child_signals() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

fn wait_for_pid(pid: libc::pid_t) -> io::Result<i32> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        return Ok(exit_code_from_wait_status(raw_status));
    }
}

/// Shell-style status: the exit code, or 128 + signal for a killed child.
fn exit_code_from_wait_status(raw_status: libc::c_int) -> i32 {
    if unsafe { libc::WIFEXITED(raw_status) } {
        return unsafe { libc::WEXITSTATUS(raw_status) };
    }
    if unsafe { libc::WIFSIGNALED(raw_status) } {
        return 128 + unsafe { libc::WTERMSIG(raw_status) };
    }
    1
}
