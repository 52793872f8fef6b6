//! Process-lifetime dedup set
//!
//! Grows monotonically; there is no eviction. `mark_seen` is the single
//! dedup gate for the whole pipeline and uses double-checked insertion so
//! the common already-seen case stays on the read lock.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::RwLock;

const HOSTNAME_PREFIX: &str = "hostname:";

#[derive(Debug, Default)]
pub struct SeenSet {
    inner: RwLock<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `domain` as seen. Returns `true` the first time a given
    /// normalized name is observed and `false` thereafter.
    pub fn mark_seen(&self, domain: &str) -> bool {
        {
            let set = self.inner.read().unwrap();
            if set.contains(domain) {
                return false;
            }
        }
        let mut set = self.inner.write().unwrap();
        set.insert(domain.to_string())
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Reads back every regular file in a prior output directory and marks
    /// the recorded hostnames as already seen. Returns the number of
    /// domains added. A missing directory hydrates nothing.
    pub fn hydrate(&self, dir: &Path) -> io::Result<usize> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut count = 0;
        let mut set = self.inner.write().unwrap();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let contents = fs::read_to_string(entry.path())?;
            for line in contents.lines() {
                let mut line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if line
                    .get(..HOSTNAME_PREFIX.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(HOSTNAME_PREFIX))
                {
                    line = line[HOSTNAME_PREFIX.len()..].trim();
                }
                if line.is_empty() {
                    continue;
                }
                if set.insert(line.to_lowercase()) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn first_observation_is_fresh_second_is_not() {
        let seen = SeenSet::new();
        assert!(seen.mark_seen("example.com"));
        assert!(!seen.mark_seen("example.com"));
        assert!(seen.mark_seen("other.com"));
    }

    #[test]
    fn concurrent_markers_agree_on_a_single_winner() {
        let seen = Arc::new(SeenSet::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let seen = seen.clone();
            handles.push(std::thread::spawn(move || seen.mark_seen("example.com")));
        }
        let wins: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();
        assert_eq!(wins, 1);
    }

    #[test]
    fn hydrate_reads_hostname_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("example.com.txt"),
            "Hostname: a.example.com\nHOSTNAME: B.Example.Com\n# comment\n\nbare.example.com\n",
        )
        .unwrap();

        let seen = SeenSet::new();
        let count = seen.hydrate(dir.path()).unwrap();
        assert_eq!(count, 3);
        assert!(!seen.mark_seen("a.example.com"));
        assert!(!seen.mark_seen("b.example.com"));
        assert!(!seen.mark_seen("bare.example.com"));
        assert!(seen.mark_seen("new.example.com"));
    }

    #[test]
    fn hydrate_skips_directories_and_dedups_across_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.txt"), "Hostname: dup.example.com\n").unwrap();
        fs::write(dir.path().join("b.txt"), "Hostname: dup.example.com\n").unwrap();

        let seen = SeenSet::new();
        assert_eq!(seen.hydrate(dir.path()).unwrap(), 1);
    }

    #[test]
    fn hydrate_missing_directory_is_empty() {
        let seen = SeenSet::new();
        let count = seen.hydrate(Path::new("/nonexistent/outputs")).unwrap();
        assert_eq!(count, 0);
        assert!(seen.is_empty());
    }
}
