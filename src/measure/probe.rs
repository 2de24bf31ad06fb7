//! Runtime probing of the session environment: which display protocol is
//! active and which helper programs are installed.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayProtocol {
    Wayland,
    X11,
    Unknown,
}

impl DisplayProtocol {
    pub fn detect() -> Self {
        Self::detect_with(|key| std::env::var(key).ok())
    }

    /// `XDG_SESSION_TYPE` wins; otherwise the presence of `WAYLAND_DISPLAY`
    /// or `DISPLAY` decides.
    pub fn detect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("XDG_SESSION_TYPE").as_deref().map(str::trim) {
            Some(t) if t.eq_ignore_ascii_case("wayland") => return DisplayProtocol::Wayland,
            Some(t) if t.eq_ignore_ascii_case("x11") => return DisplayProtocol::X11,
            _ => {}
        }
        let set = |key: &str| lookup(key).is_some_and(|v| !v.is_empty());
        if set("WAYLAND_DISPLAY") {
            DisplayProtocol::Wayland
        } else if set("DISPLAY") {
            DisplayProtocol::X11
        } else {
            DisplayProtocol::Unknown
        }
    }
}

/// Locate `program` on `PATH`.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    find_in_dirs(program, std::env::split_paths(&path))
}

fn find_in_dirs<I>(program: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    if program.contains(std::path::MAIN_SEPARATOR) {
        let p = Path::new(program);
        return is_executable(p).then(|| p.to_path_buf());
    }
    dirs.into_iter()
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn session_type_takes_priority() {
        let lookup = env(&[("XDG_SESSION_TYPE", "x11"), ("WAYLAND_DISPLAY", "wayland-0")]);
        assert_eq!(DisplayProtocol::detect_with(lookup), DisplayProtocol::X11);
    }

    #[test]
    fn falls_back_to_display_variables() {
        assert_eq!(
            DisplayProtocol::detect_with(env(&[("WAYLAND_DISPLAY", "wayland-1")])),
            DisplayProtocol::Wayland
        );
        assert_eq!(
            DisplayProtocol::detect_with(env(&[("DISPLAY", ":0")])),
            DisplayProtocol::X11
        );
        assert_eq!(
            DisplayProtocol::detect_with(env(&[("XDG_SESSION_TYPE", "tty"), ("DISPLAY", "")])),
            DisplayProtocol::Unknown
        );
    }

    #[cfg(unix)]
    #[test]
    fn finds_only_executables() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("grim");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        let plain = dir.path().join("scrot");
        std::fs::write(&plain, "not executable").unwrap();

        let dirs = || vec![dir.path().to_path_buf()];
        assert_eq!(find_in_dirs("grim", dirs()), Some(tool));
        assert_eq!(find_in_dirs("scrot", dirs()), None);
        assert_eq!(find_in_dirs("missing", dirs()), None);
    }
}
