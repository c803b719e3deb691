use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use log::debug;

use crate::parser::Command;

/// Permission bits for files created by a redirection.
pub const CREATE_MODE: u32 = 0o644;

/// A file an output stream is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: String,
    /// Append instead of truncating.
    pub append: bool,
}

/// Where the last command of a pipeline sends stdout and stderr.
/// `None` leaves the stream untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectionSpec {
    pub stdout: Option<OutputTarget>,
    pub stderr: Option<OutputTarget>,
}

impl RedirectionSpec {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_none() && self.stderr.is_none()
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Map an operator token to the stream it redirects and whether it appends.
fn operator(token: &str) -> Option<(Stream, bool)> {
    match token {
        ">" | "1>" => Some((Stream::Stdout, false)),
        ">>" | "1>>" => Some((Stream::Stdout, true)),
        "2>" => Some((Stream::Stderr, false)),
        "2>>" => Some((Stream::Stderr, true)),
        _ => None,
    }
}

/// Pull redirection operators and their targets out of `command`.
///
/// Handles: >, 1>, >>, 1>>, 2>, 2>>
/// An operator with nothing after it stays in the command as a plain
/// argument. A later operator for the same stream replaces an earlier one.
pub fn extract_redirections(command: &mut Command) -> RedirectionSpec {
    let tokens = std::mem::take(command);
    let mut spec = RedirectionSpec::default();
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        match operator(token) {
            Some((stream, append)) if i + 1 < tokens.len() => {
                let target = OutputTarget {
                    path: tokens[i + 1].clone(),
                    append,
                };
                match stream {
                    Stream::Stdout => spec.stdout = Some(target),
                    Stream::Stderr => spec.stderr = Some(target),
                }
                i += 1;
            }
            _ => command.push(token.clone()),
        }

        i += 1;
    }

    spec
}

/// Open a redirection target for writing, creating it with [`CREATE_MODE`].
pub fn open_target(target: &OutputTarget) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(CREATE_MODE);
    if target.append {
        options.append(true);
    } else {
        options.truncate(true);
    }
    options.open(&target.path)
}

fn flush_std_streams() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

/// RAII guard: points `fd` at a file on construction and puts the original
/// descriptor back on drop.
///
/// With no target the guard does nothing and is always valid. If the file
/// can't be opened the error is reported, the guard is invalid, and `fd` is
/// left as it was.
pub struct ScopedRedirect {
    fd: RawFd,
    saved: Option<OwnedFd>,
    valid: bool,
}

impl ScopedRedirect {
    pub fn new(fd: RawFd, target: Option<&OutputTarget>) -> Self {
        let Some(target) = target else {
            return Self { fd, saved: None, valid: true };
        };

        match Self::retarget(fd, target) {
            Ok(saved) => {
                debug!("fd {fd} redirected to {} (append: {})", target.path, target.append);
                Self { fd, saved: Some(saved), valid: true }
            }
            Err(e) => {
                eprintln!("myshell: {}: {e}", target.path);
                Self { fd, saved: None, valid: false }
            }
        }
    }

    fn retarget(fd: RawFd, target: &OutputTarget) -> io::Result<OwnedFd> {
        flush_std_streams();

        // SAFETY: `fd` is a descriptor the caller owns for the guard's lifetime;
        // the borrow only lives long enough to duplicate it.
        let saved = unsafe { BorrowedFd::borrow_raw(fd) }.try_clone_to_owned()?;
        let file = open_target(target)?;

        if unsafe { libc::dup2(file.as_raw_fd(), fd) } < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(saved)
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Drop for ScopedRedirect {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            flush_std_streams();
            unsafe {
                libc::dup2(saved.as_raw_fd(), self.fd);
            }
            // `saved` closes here.
        }
    }
}
