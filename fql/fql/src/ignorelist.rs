//! The ignore list: shell-glob patterns naming plugin files that must not be
//! loaded.

use std::path::{Path, PathBuf};

/// Expanded ignore-list entries. Patterns are resolved to real paths when
/// they are added; matching is by exact path.
#[derive(Debug, Default, Clone)]
pub struct IgnoreList {
    files: Vec<String>,
}

impl IgnoreList {
    pub fn new() -> Self {
        IgnoreList::default()
    }

    /// Expand one glob pattern (with `~` substitution) and record the
    /// matches. Returns the number of matched paths.
    pub fn add_pattern(&mut self, pattern: &str) -> usize {
        let pattern = expand_tilde(pattern);

        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(e) => {
                log::warn!("invalid ignore-list pattern `{pattern}`: {e}");
                return 0;
            }
        };

        let mut count = 0;

        for path in paths.flatten() {
            let path = path.to_string_lossy().into_owned();

            count += 1;

            if !self.files.contains(&path) {
                self.files.push(path);
            }
        }

        count
    }

    /// Read patterns from a file: one per line, blanks and `#` comments
    /// skipped. Returns the number of matched paths.
    pub fn load(&mut self, path: &Path) -> std::io::Result<usize> {
        let text = std::fs::read_to_string(path)?;
        let mut count = 0;

        for line in text.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            count += self.add_pattern(line);
        }

        Ok(count)
    }

    pub fn load_default(&mut self) -> usize {
        let Some(path) = default_ignore_list_path() else {
            return 0;
        };

        if !path.is_file() {
            return 0;
        }

        self.load(&path).unwrap_or_else(|e| {
            log::warn!("couldn't read ignore list {}: {e}", path.display());
            0
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.files.iter().any(|file| file == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub fn default_ignore_list_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;

    Some(Path::new(&home).join(".fql").join("ignore-list"))
}

fn expand_tilde(pattern: &str) -> String {
    if let Some(rest) = pattern.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }

    pattern.to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn populated_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();

        for name in ["a.so", "b.so", "c.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        dir
    }

    #[test]
    fn expands_globs() {
        let dir = populated_dir();
        let mut list = IgnoreList::new();

        let pattern = format!("{}/*.so", dir.path().display());
        assert_eq!(list.add_pattern(&pattern), 2);
        assert_eq!(list.len(), 2);

        // Re-adding doesn't duplicate.
        list.add_pattern(&pattern);
        assert_eq!(list.len(), 2);

        let a = dir.path().join("a.so").to_string_lossy().into_owned();
        let c = dir.path().join("c.txt").to_string_lossy().into_owned();
        assert!(list.matches(&a));
        assert!(!list.matches(&c));
    }

    #[test]
    fn loads_pattern_files() {
        let dir = populated_dir();
        let list_file = dir.path().join("ignore-list");

        let contents = format!(
            "# blocked extensions\n\n{}/a.so\n{}/missing.so\n",
            dir.path().display(),
            dir.path().display()
        );
        std::fs::write(&list_file, contents).unwrap();

        let mut list = IgnoreList::new();
        assert_eq!(list.load(&list_file).unwrap(), 1);
        assert_eq!(list.len(), 1);
    }
}
