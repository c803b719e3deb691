use std::path::{Path, PathBuf};

/// Check if a path points to an executable file.
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let Ok(meta) = path.metadata() else {
        return false;
    };
    meta.is_file() && meta.permissions().mode() & 0o111 != 0
}

/// Locate the executable a command name refers to.
///
/// A name containing `/` is checked as given. Otherwise `./name` is tried
/// first, then each directory of `PATH` in order.
pub fn resolve_executable(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var("PATH").ok();
    resolve_in(name, path_var.as_deref())
}

fn resolve_in(name: &str, path_var: Option<&str>) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains('/') {
        let direct = PathBuf::from(name);
        return is_executable(&direct).then_some(direct);
    }

    let local = PathBuf::from(format!("./{name}"));
    if is_executable(&local) {
        return Some(local);
    }

    path_var?
        .split(':')
        .map(|dir| if dir.is_empty() { Path::new(".") } else { Path::new(dir) })
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// The directories listed in `PATH`, in order.
pub fn path_dirs() -> Vec<PathBuf> {
    std::env::var("PATH")
        .map(|var| {
            var.split(':')
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Replace a leading `~` with `HOME`.
///
/// Returns `None` when the path starts with `~` and `HOME` is unset.
pub fn expand_tilde(path: &str) -> Option<String> {
    let home = std::env::var("HOME").ok();
    expand_tilde_with(path, home.as_deref())
}

fn expand_tilde_with(path: &str, home: Option<&str>) -> Option<String> {
    match path.strip_prefix('~') {
        Some(rest) => home.map(|home| format!("{home}{rest}")),
        None => Some(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "myshell_search_{label}_{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(path: &Path, mode: u32) {
        std::fs::write(path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn executable_bit_required() {
        let dir = scratch_dir("bits");
        let exe = dir.join("tool");
        let plain = dir.join("notes");
        write_file(&exe, 0o755);
        write_file(&plain, 0o644);

        assert!(is_executable(&exe));
        assert!(!is_executable(&plain));
        assert!(!is_executable(&dir));
        assert!(!is_executable(&dir.join("missing")));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn name_with_slash_checked_directly() {
        assert_eq!(resolve_in("/bin/sh", None), Some(PathBuf::from("/bin/sh")));
        assert_eq!(resolve_in("/no/such/binary", Some("/bin")), None);
    }

    #[test]
    fn path_searched_in_order() {
        let first = scratch_dir("order_first");
        let second = scratch_dir("order_second");
        write_file(&first.join("mysh-tool"), 0o755);
        write_file(&second.join("mysh-tool"), 0o755);

        let path_var = format!("{}:{}", first.display(), second.display());
        assert_eq!(
            resolve_in("mysh-tool", Some(&path_var)),
            Some(first.join("mysh-tool"))
        );

        let _ = std::fs::remove_dir_all(&first);
        let _ = std::fs::remove_dir_all(&second);
    }

    #[test]
    fn non_executable_path_entries_skipped() {
        let first = scratch_dir("skip_first");
        let second = scratch_dir("skip_second");
        write_file(&first.join("mysh-skip"), 0o644);
        write_file(&second.join("mysh-skip"), 0o755);

        let path_var = format!("{}:{}", first.display(), second.display());
        assert_eq!(
            resolve_in("mysh-skip", Some(&path_var)),
            Some(second.join("mysh-skip"))
        );

        let _ = std::fs::remove_dir_all(&first);
        let _ = std::fs::remove_dir_all(&second);
    }

    #[test]
    fn unknown_name_not_found() {
        assert_eq!(resolve_in("definitely_not_a_command_xyz", Some("/bin:/usr/bin")), None);
        assert_eq!(resolve_in("definitely_not_a_command_xyz", None), None);
        assert_eq!(resolve_in("", Some("/bin")), None);
    }

    #[test]
    fn tilde_alone_and_with_path() {
        assert_eq!(expand_tilde_with("~", Some("/home/u")), Some("/home/u".into()));
        assert_eq!(
            expand_tilde_with("~/projects", Some("/home/u")),
            Some("/home/u/projects".into())
        );
    }

    #[test]
    fn tilde_needs_home() {
        assert_eq!(expand_tilde_with("~/x", None), None);
        assert_eq!(expand_tilde_with("~foo", None), None);
        assert_eq!(expand_tilde_with("/abs/x", None), Some("/abs/x".into()));
    }

    #[test]
    fn any_leading_tilde_is_replaced() {
        assert_eq!(expand_tilde_with("~x", Some("/h")), Some("/hx".into()));
        assert_eq!(expand_tilde_with("~user/x", Some("/h")), Some("/huser/x".into()));
    }

    #[test]
    fn tilde_elsewhere_untouched() {
        assert_eq!(expand_tilde_with("foo~bar", Some("/h")), Some("foo~bar".into()));
        assert_eq!(expand_tilde_with("a/~", None), Some("a/~".into()));
    }
}
