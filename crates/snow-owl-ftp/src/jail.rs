//! Path resolution and jailing against a configured root directory
//!
//! String operations alone are not sufficient (a symlink can point
//! anywhere), so resolution canonicalizes the longest already-existing
//! ancestor of a candidate path and only then checks ancestry against the
//! canonical root.

use std::path::{Component, Path, PathBuf};

/// Jails client-supplied pathnames to a root directory.
#[derive(Debug, Clone)]
pub struct PathJail {
    root: PathBuf,
}

impl PathJail {
    /// Build a jail rooted at `root`, which must already be an absolute,
    /// canonical path (the caller — `Config::validate` — is responsible for
    /// canonicalizing it once at startup).
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The canonical root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `input` against `cwd` (or re-anchor to root if it starts with
    /// `/`), returning the canonical absolute path iff it lies within or
    /// equals `root`.
    ///
    /// Existence of the resolved path is the caller's concern: MKD requires
    /// the parent to exist and the target not to; CWD requires the target
    /// to exist and be a directory; this function only answers "is this
    /// pathname even reachable inside the jail".
    pub fn resolve(&self, cwd: &Path, input: &str) -> crate::Result<PathBuf> {
        let candidate = if let Some(stripped) = input.strip_prefix('/') {
            self.root.join(stripped)
        } else {
            cwd.join(input)
        };

        let normalized = lexically_normalize(&candidate);
        let canonical = canonicalize_existing_prefix(&normalized)?;

        if canonical == self.root || canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(crate::Error::InvalidPath(format!(
                "{input} escapes the jail root"
            )))
        }
    }
}

/// Resolve `.` and `..` components purely lexically, without touching the
/// filesystem. `path` must already be absolute.
fn lexically_normalize(path: &Path) -> PathBuf {
    let mut stack: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(stack.last(), Some(Component::Normal(_))) {
                    stack.pop();
                } else if !matches!(stack.last(), Some(Component::RootDir)) {
                    stack.push(component);
                }
            }
            other => stack.push(other),
        }
    }
    stack.into_iter().collect()
}

/// Canonicalize the longest already-existing ancestor of `normalized` (which
/// resolves any symlinks along the way) and re-append the remaining,
/// possibly-nonexistent suffix literally.
fn canonicalize_existing_prefix(normalized: &Path) -> crate::Result<PathBuf> {
    let mut existing = normalized;
    let mut suffix: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        if existing.exists() {
            break;
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                suffix.push(name);
                existing = parent;
            }
            _ => break,
        }
    }

    let mut canonical = existing
        .canonicalize()
        .map_err(|e| crate::Error::InvalidPath(format!("cannot resolve path: {e}")))?;

    for name in suffix.into_iter().rev() {
        canonical.push(name);
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_input_resolves_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let jail = PathJail::new(root.clone());

        let resolved = jail.resolve(&root, "").unwrap();
        assert_eq!(resolved, root);
    }

    #[test]
    fn leading_slash_reanchors_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        let jail = PathJail::new(root.clone());

        let resolved = jail.resolve(&root.join("sub"), "/sub").unwrap();
        assert_eq!(resolved, root.join("sub"));
    }

    #[test]
    fn parent_traversal_outside_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let jail = PathJail::new(root.clone());

        assert!(jail.resolve(&root, "../../etc").is_err());
        assert!(jail.resolve(&root, "/../etc/passwd").is_err());
    }

    #[test]
    fn nonexistent_target_with_existing_parent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let jail = PathJail::new(root.clone());

        let resolved = jail.resolve(&root, "new_dir").unwrap();
        assert_eq!(resolved, root.join("new_dir"));
    }

    #[test]
    fn nested_dotdot_within_root_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("a")).unwrap();
        fs::create_dir(root.join("a/b")).unwrap();
        let jail = PathJail::new(root.clone());

        let resolved = jail.resolve(&root.join("a/b"), "..").unwrap();
        assert_eq!(resolved, root.join("a"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir(&root).unwrap();
        let root = root.canonicalize().unwrap();

        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), b"nope").unwrap();

        symlink(&outside, root.join("escape")).unwrap();

        let jail = PathJail::new(root.clone());
        assert!(jail.resolve(&root, "escape/secret.txt").is_err());
        assert!(jail.resolve(&root, "escape").is_err());
    }
}
