//! Cross-file accumulation of registration entries.

use crate::scanner::MarkerMatch;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// One class to register with the factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationEntry {
    /// Name of the class to register
    pub class_name: String,
    /// Registration id, quotes already stripped
    pub argument: String,
    /// Resolved path of the file declaring the class
    pub source_file: PathBuf,
}

impl From<&MarkerMatch> for RegistrationEntry {
    fn from(m: &MarkerMatch) -> Self {
        Self {
            class_name: m.class_name.clone(),
            argument: m.argument().to_string(),
            source_file: m.owning_file.clone(),
        }
    }
}

/// Ordered list of registrations for a whole run.
///
/// Entries keep the order files were supplied in and, within a file, the
/// order matches were discovered. Nothing is dropped for sharing a class
/// name or a file.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistrationEntry>,
}

impl Registry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one entry per match
    pub fn extend_from_matches(&mut self, matches: &[MarkerMatch]) {
        self.entries
            .extend(matches.iter().map(RegistrationEntry::from));
    }

    /// Appends a single entry
    pub fn push(&mut self, entry: RegistrationEntry) {
        self.entries.push(entry);
    }

    /// All entries in accumulation order
    pub fn entries(&self) -> &[RegistrationEntry] {
        &self.entries
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct source files in first-seen order.
    ///
    /// Paths are compared after resolving them on disk, so two spellings of
    /// one file count once. Paths that cannot be resolved are kept as given.
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|e| fs::canonicalize(&e.source_file).unwrap_or_else(|_| e.source_file.clone()))
            .filter(|path| seen.insert(path.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn marker(class_name: &str, raw_argument: &str, file: &str) -> MarkerMatch {
        MarkerMatch {
            line_index: 0,
            raw_argument: raw_argument.to_string(),
            class_name: class_name.to_string(),
            marker_text: format!("ServerImpl({raw_argument})"),
            class_line: format!("class {class_name} : public IServer"),
            already_neutralized: false,
            owning_file: PathBuf::from(file),
        }
    }

    #[test]
    fn test_entry_strips_quotes() {
        let entry = RegistrationEntry::from(&marker("Echo", " \"echo\" ", "/lib/Echo.h"));
        assert_eq!(entry.argument, "echo");
        assert_eq!(entry.class_name, "Echo");
        assert_eq!(entry.source_file, PathBuf::from("/lib/Echo.h"));
    }

    #[test]
    fn test_keeps_order_and_duplicates() {
        let mut registry = Registry::new();
        registry.extend_from_matches(&[marker("A", "a", "/x.h"), marker("B", "b", "/x.h")]);
        registry.extend_from_matches(&[marker("A", "a2", "/y.h")]);

        let names: Vec<_> = registry
            .entries()
            .iter()
            .map(|e| (e.class_name.as_str(), e.argument.as_str()))
            .collect();
        assert_eq!(names, vec![("A", "a"), ("B", "b"), ("A", "a2")]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_source_files_deduplicated() {
        let mut registry = Registry::new();
        registry.extend_from_matches(&[
            marker("A", "a", "/y.h"),
            marker("B", "b", "/x.h"),
            marker("C", "c", "/y.h"),
        ]);
        assert_eq!(
            registry.source_files(),
            vec![PathBuf::from("/y.h"), PathBuf::from("/x.h")]
        );
    }

    #[test]
    fn test_source_files_compare_resolved_paths() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let header = temp_dir.path().join("Servers.h");
        fs::write(&header, "").unwrap();
        let dotted = temp_dir.path().join(".").join("Servers.h");

        let mut registry = Registry::new();
        registry.extend_from_matches(&[
            marker("A", "a", header.to_str().unwrap()),
            marker("B", "b", dotted.to_str().unwrap()),
        ]);
        assert_eq!(
            registry.source_files(),
            vec![fs::canonicalize(&header).unwrap()]
        );
    }

    #[test]
    fn test_empty() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.source_files().is_empty());
    }
}
