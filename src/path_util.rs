//! Lexical path helpers. Nothing here touches the filesystem.

use std::path::{Component, Path, PathBuf};

/// Normalizes `path` lexically: drops `.` components and folds `..` into
/// the preceding component. Leading `..` on relative paths is kept. An empty
/// result is `.`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}

/// Renders `path` relative to `base` with forward slashes, `.` when equal.
///
/// Returns `None` when `path` does not lie under `base`.
pub fn relative_to(path: &Path, base: &Path) -> Option<String> {
    let path = normalize(path);
    let base = normalize(base);

    let rel = if base == Path::new(".") && path.is_relative() {
        path
    } else {
        path.strip_prefix(&base).ok()?.to_path_buf()
    };
    Some(to_slash(&rel))
}

/// Forward-slash rendering of `path`, `.` when empty.
pub fn to_slash(path: &Path) -> String {
    let parts: Vec<_> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else if path.has_root() {
        format!("/{}", parts[1..].join("/"))
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("./.")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("")), PathBuf::from("."));
        assert_eq!(normalize(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize(Path::new("/x/../..")), PathBuf::from("/"));
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to(Path::new("./foss"), Path::new(".")).as_deref(), Some("foss"));
        assert_eq!(relative_to(Path::new("app/foss/x"), Path::new("app")).as_deref(), Some("foss/x"));
        assert_eq!(relative_to(Path::new("app/."), Path::new("app")).as_deref(), Some("."));
        assert_eq!(relative_to(Path::new("/tmp/a/b"), Path::new("/tmp/a")).as_deref(), Some("b"));
        assert_eq!(relative_to(Path::new("/tmp/b"), Path::new("/tmp/a")), None);
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("a/b")), "a/b");
        assert_eq!(to_slash(Path::new("/a/b")), "/a/b");
        assert_eq!(to_slash(Path::new("")), ".");
    }
}
