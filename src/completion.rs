use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glob::Pattern;

use crate::builtins;
use crate::search;

/// Names a command word starting with `prefix` could complete to:
/// builtins, executables on `PATH`, and entries of the current directory.
/// Sorted and de-duplicated.
pub fn command_candidates(prefix: &str) -> Vec<String> {
    candidates_in(prefix, &search::path_dirs(), Some(Path::new(".")))
}

fn candidates_in(prefix: &str, path_dirs: &[PathBuf], cwd: Option<&Path>) -> Vec<String> {
    let mut unique: BTreeSet<String> = builtins::names()
        .filter(|name| name.starts_with(prefix))
        .map(str::to_string)
        .collect();

    for dir in path_dirs {
        unique.extend(matching_names(dir, prefix, true));
    }
    if let Some(cwd) = cwd {
        unique.extend(matching_names(cwd, prefix, false));
    }

    unique.into_iter().collect()
}

/// File names in `dir` starting with `prefix`.
fn matching_names(dir: &Path, prefix: &str, executables_only: bool) -> Vec<String> {
    let pattern = format!(
        "{}/{}*",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(prefix)
    );
    let Ok(paths) = glob::glob(&pattern) else {
        return Vec::new();
    };

    paths
        .filter_map(Result::ok)
        .filter(|path| !executables_only || search::is_executable(path))
        .filter_map(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .collect()
}

/// Longest prefix shared by every candidate.
pub fn longest_common_prefix(candidates: &[String]) -> String {
    let Some((first, rest)) = candidates.split_first() else {
        return String::new();
    };

    let mut len = first.len();
    for other in rest {
        len = first
            .char_indices()
            .zip(other.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(len);
    }
    first[..len].to_string()
}
