//! Environment file (.env) access.
//!
//! Reading uses dotenvy, so quoting and comments follow the usual `.env`
//! rules. Writing edits the file line by line: unrelated lines and comments
//! are preserved, the key's first assignment is replaced in place (later
//! duplicates are dropped), and new keys are appended. Every write goes
//! through a temp file in the same directory followed by a rename.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All variables in the file. A missing file reads as empty.
    ///
    /// Files dotenvy rejects (for example an unquoted value with spaces, as
    /// older installs wrote `COMPOSE_PROJECT_NAME=my brewery`) are read line
    /// by line instead, so a single odd value cannot hide the stored version.
    pub fn read_all(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        match self.read_strict() {
            Ok(vars) => Ok(vars),
            Err(e) => {
                tracing::warn!("{}; reading assignments line by line", e);
                let content = std::fs::read_to_string(&self.path)?;
                Ok(parse_lenient(&content))
            }
        }
    }

    fn read_strict(&self) -> Result<HashMap<String, String>> {
        let iter = dotenvy::from_path_iter(&self.path).map_err(|e| {
            Error::EnvFile(format!(
                "Failed to read environment file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut vars = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                Error::EnvFile(format!(
                    "Failed to parse environment file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
            vars.insert(key, value);
        }
        Ok(vars)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_many(&[(key, value)])
    }

    /// Set several keys in a single write.
    pub fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        for (key, value) in entries {
            validate_env_name(key)?;
            if value.contains('\n') || value.contains('\r') {
                return Err(Error::EnvFile(format!(
                    "Value for '{}' must be a single line",
                    key
                )));
            }
        }

        let content = if self.path.exists() {
            std::fs::read_to_string(&self.path)?
        } else {
            String::new()
        };

        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        for (key, value) in entries {
            upsert_line(&mut lines, key, value);
        }

        let mut rendered = lines.join("\n");
        rendered.push('\n');
        self.write_atomic(&rendered)
    }

    fn write_atomic(&self, content: &str) -> Result<()> {
        write_atomic(&self.path, content).map_err(|e| {
            Error::EnvFile(format!(
                "Failed to write environment file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Replace `path` with `content` through a temp file in the same directory,
/// so readers see either the old file or the new one.
pub fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Line-based reading of `KEY=value` assignments.
///
/// Matching outer quotes are stripped. Unquoted values keep inner spaces and
/// lose a trailing ` #` comment. Lines that assign nothing are skipped.
fn parse_lenient(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if validate_env_name(key).is_err() {
            continue;
        }
        vars.insert(key.to_string(), unquote(value.trim()));
    }
    vars
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    match value.find(" #") {
        Some(pos) => value[..pos].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Whether `line` assigns `key` (optionally prefixed with `export`).
fn assigns_key(line: &str, key: &str) -> bool {
    let trimmed = line.trim_start();
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    match trimmed.strip_prefix(key) {
        Some(rest) => rest.trim_start().starts_with('='),
        None => false,
    }
}

fn upsert_line(lines: &mut Vec<String>, key: &str, value: &str) {
    let assignment = format!("{}={}", key, value);
    let mut replaced = false;
    lines.retain_mut(|line| {
        if !assigns_key(line, key) {
            return true;
        }
        if replaced {
            return false;
        }
        *line = assignment.clone();
        replaced = true;
        true
    });
    if !replaced {
        lines.push(assignment);
    }
}

/// Validate an environment variable name.
///
/// Names must start with a letter or underscore and contain only ASCII
/// alphanumerics and underscores.
pub fn validate_env_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::EnvFile(
            "Environment variable name cannot be empty".to_string(),
        ));
    };

    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::EnvFile(format!(
            "Invalid environment variable name '{}': must start with a letter or underscore",
            name
        )));
    }

    for (i, c) in name.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(Error::EnvFile(format!(
                "Invalid environment variable name '{}': character '{}' at position {} is not allowed (must be alphanumeric or underscore)",
                name, c, i
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env_in(dir: &TempDir, content: &str) -> EnvFile {
        let path = dir.path().join(".env");
        std::fs::write(&path, content).unwrap();
        EnvFile::new(path)
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));
        assert!(env.read_all().unwrap().is_empty());
        assert_eq!(env.get("ANY").unwrap(), None);
    }

    #[test]
    fn test_get_handles_quotes_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(
            &dir,
            "# comment\nBREWBLOX_CFG_VERSION=\"0.3.0\"\nBREWBLOX_RELEASE=edge\n",
        );
        assert_eq!(
            env.get("BREWBLOX_CFG_VERSION").unwrap().as_deref(),
            Some("0.3.0")
        );
        assert_eq!(env.get("BREWBLOX_RELEASE").unwrap().as_deref(), Some("edge"));
    }

    #[test]
    fn test_set_replaces_in_place_and_preserves_other_lines() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(
            &dir,
            "# header\nA=1\nBREWBLOX_CFG_VERSION=0.2.0\nB=2\nBREWBLOX_CFG_VERSION=0.1.0\n",
        );

        env.set("BREWBLOX_CFG_VERSION", "0.6.1").unwrap();

        let content = std::fs::read_to_string(env.path()).unwrap();
        assert_eq!(content, "# header\nA=1\nBREWBLOX_CFG_VERSION=0.6.1\nB=2\n");
    }

    #[test]
    fn test_set_appends_and_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));

        env.set_many(&[("A", "1"), ("B", "two")]).unwrap();
        env.set("A", "3").unwrap();

        let content = std::fs::read_to_string(env.path()).unwrap();
        assert_eq!(content, "A=3\nB=two\n");
    }

    #[test]
    fn test_export_prefix_and_similar_keys() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(&dir, "export KEY = old\nKEY_SUFFIX=keep\n");
        env.set("KEY", "new").unwrap();
        let content = std::fs::read_to_string(env.path()).unwrap();
        assert_eq!(content, "KEY=new\nKEY_SUFFIX=keep\n");
    }

    #[test]
    fn test_set_rejects_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let env = EnvFile::new(dir.path().join(".env"));
        assert!(env.set("1BAD", "x").is_err());
        assert!(env.set("BAD-NAME", "x").is_err());
        assert!(env.set("", "x").is_err());
        assert!(env.set("GOOD", "multi\nline").is_err());
        assert!(!env.path().exists());
    }

    #[test]
    fn test_unquoted_value_with_spaces_does_not_hide_version() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_in(
            &dir,
            "COMPOSE_PROJECT_NAME=my brewery\nBREWBLOX_CFG_VERSION=0.3.0 # stored\nQUOTED='a b'\n",
        );

        assert_eq!(
            env.get("BREWBLOX_CFG_VERSION").unwrap().as_deref(),
            Some("0.3.0")
        );
        assert_eq!(
            env.get("COMPOSE_PROJECT_NAME").unwrap().as_deref(),
            Some("my brewery")
        );
        assert_eq!(env.get("QUOTED").unwrap().as_deref(), Some("a b"));

        env.set("BREWBLOX_CFG_VERSION", "0.6.1").unwrap();
        let content = std::fs::read_to_string(env.path()).unwrap();
        assert!(content.starts_with("COMPOSE_PROJECT_NAME=my brewery\n"));
        assert_eq!(
            env.get("BREWBLOX_CFG_VERSION").unwrap().as_deref(),
            Some("0.6.1")
        );
    }

    #[test]
    fn test_write_atomic_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, "new").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("docker-compose.yml")]);
    }
}
