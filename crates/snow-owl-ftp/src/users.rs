//! Flat-file user database
//!
//! Format: a text file whose first line is a header (ignored), and each
//! subsequent line is `login<TAB>password`. Credentials are compared as
//! plain strings — there is no hashing in scope for this server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// In-memory login/password table, optionally backed by a file.
#[derive(Debug, Clone, Default)]
pub struct UserDatabase {
    path: Option<PathBuf>,
    credentials: HashMap<String, String>,
}

impl UserDatabase {
    /// An empty database — every password check fails, every anonymous
    /// login still succeeds via the USER handler's anonymous bypass.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load a tab-separated login/password file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("failed to read users file: {e}")))?;

        let mut credentials = HashMap::new();
        for (line_number, line) in contents.lines().enumerate().skip(1) {
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            match line.split_once('\t') {
                Some((login, password)) => {
                    credentials.insert(login.to_string(), password.to_string());
                }
                None => {
                    warn!(
                        line = line_number + 1,
                        "skipping malformed line in users file (expected login<TAB>password)"
                    );
                }
            }
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            credentials,
        })
    }

    /// Reload from the original file path, if this database was file-backed.
    pub fn reload(&mut self) -> crate::Result<()> {
        let Some(path) = self.path.clone() else {
            return Err(crate::Error::Config(
                "user database has no backing file to reload from".to_string(),
            ));
        };
        *self = Self::load(&path)?;
        Ok(())
    }

    /// Check a login/password pair against the stored credentials.
    pub fn check(&self, login: &str, password: &str) -> bool {
        self.credentials
            .get(login)
            .is_some_and(|expected| expected == password)
    }

    /// Number of loaded credential entries.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Whether the database has no entries.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_tab_separated_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "login\tpassword").unwrap();
        writeln!(file, "alice\thunter2").unwrap();
        writeln!(file, "bob\tswordfish").unwrap();

        let db = UserDatabase::load(file.path()).unwrap();
        assert_eq!(db.len(), 2);
        assert!(db.check("alice", "hunter2"));
        assert!(!db.check("alice", "wrong"));
        assert!(!db.check("nobody", ""));
    }

    #[test]
    fn skips_malformed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header").unwrap();
        writeln!(file, "no-tab-here").unwrap();
        writeln!(file, "alice\thunter2").unwrap();

        let db = UserDatabase::load(file.path()).unwrap();
        assert_eq!(db.len(), 1);
        assert!(db.check("alice", "hunter2"));
    }

    #[test]
    fn empty_database_rejects_everyone() {
        let db = UserDatabase::empty();
        assert!(!db.check("anyone", ""));
        assert!(db.is_empty());
    }
}
