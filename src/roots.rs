//! Root-domain filter set
//!
//! A hot-swappable set of lowercased apex domains. Reloads replace the set
//! atomically; lookups run under the shared lock so they may proceed
//! concurrently with emission but never during a swap.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct RootSet {
    inner: RwLock<HashSet<String>>,
}

impl RootSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set with the file's contents: one domain per line,
    /// trimmed and lowercased, blank and `#`-prefixed lines ignored. On
    /// read failure the previous set is kept.
    pub fn load(&self, path: &Path) -> io::Result<usize> {
        let contents = fs::read_to_string(path)?;
        let mut next = HashSet::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            next.insert(line.to_lowercase());
        }
        let count = next.len();
        *self.inner.write().unwrap() = next;
        Ok(count)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Returns the longest registered label-aligned suffix of `domain`, or
    /// `None` when the set is non-empty and nothing matches. An empty set
    /// means "no filter": every name matches with an empty root.
    ///
    /// `domain` is expected to be lowercased already.
    pub fn matching_root(&self, domain: &str) -> Option<String> {
        let set = self.inner.read().unwrap();
        if set.is_empty() {
            return Some(String::new());
        }
        if set.contains(domain) {
            return Some(domain.to_string());
        }
        let mut rest = domain;
        while let Some(dot) = rest.find('.') {
            rest = &rest[dot + 1..];
            if set.contains(rest) {
                return Some(rest.to_string());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn set_of(domains: &[&str]) -> RootSet {
        let set = RootSet::new();
        let mut inner = set.inner.write().unwrap();
        for domain in domains {
            inner.insert(domain.to_string());
        }
        drop(inner);
        set
    }

    #[test]
    fn load_trims_lowercases_and_skips_comments() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "# roots\n\n  Example.COM  \nexample.org\n# trailing comment\n"
        )
        .unwrap();
        file.flush().unwrap();

        let set = RootSet::new();
        let count = set.load(file.path()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            set.matching_root("example.com"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn load_replaces_previous_contents() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a.com\n").unwrap();
        file.flush().unwrap();

        let set = RootSet::new();
        set.load(file.path()).unwrap();
        fs::write(file.path(), "b.com\n").unwrap();
        set.load(file.path()).unwrap();

        assert!(set.matching_root("a.com").is_none());
        assert!(set.matching_root("b.com").is_some());
    }

    #[test]
    fn load_failure_keeps_previous_set() {
        let set = set_of(&["example.com"]);
        assert!(set.load(Path::new("/nonexistent/roots.txt")).is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn exact_match_returns_itself() {
        let set = set_of(&["example.com"]);
        assert_eq!(
            set.matching_root("example.com"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn subdomain_matches_label_aligned_suffix() {
        let set = set_of(&["example.com"]);
        assert_eq!(
            set.matching_root("foo.example.com"),
            Some("example.com".to_string())
        );
        assert_eq!(
            set.matching_root("a.b.example.com"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn suffix_must_be_label_aligned() {
        let set = set_of(&["example.com"]);
        assert_eq!(set.matching_root("fooexample.com"), None);
        assert_eq!(set.matching_root("evil-example.com"), None);
    }

    #[test]
    fn longest_registered_suffix_wins() {
        let set = set_of(&["example.com", "sub.example.com"]);
        assert_eq!(
            set.matching_root("a.sub.example.com"),
            Some("sub.example.com".to_string())
        );
    }

    #[test]
    fn empty_set_matches_everything_with_empty_root() {
        let set = RootSet::new();
        assert_eq!(set.matching_root("anything.at.all"), Some(String::new()));
    }

    #[test]
    fn unrelated_domain_does_not_match() {
        let set = set_of(&["example.com"]);
        assert_eq!(set.matching_root("example.net"), None);
    }
}
