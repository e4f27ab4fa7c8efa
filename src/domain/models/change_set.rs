use serde::{Deserialize, Serialize};

/// Hash-diff classification of discovered files against the stored
/// (path, hash) pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub unchanged: Vec<String>,
    /// Stored paths no longer present on disk.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Paths whose chunks and symbols must be deleted before re-insert.
    pub fn stale_paths(&self) -> Vec<&str> {
        self.modified
            .iter()
            .chain(self.deleted.iter())
            .map(String::as_str)
            .collect()
    }

    /// Files that need (re-)processing: added ∪ modified.
    pub fn to_process(&self) -> Vec<&str> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .map(String::as_str)
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} added, {} modified, {} deleted, {} unchanged",
            self.added.len(),
            self.modified.len(),
            self.deleted.len(),
            self.unchanged.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_detection() {
        let mut cs = ChangeSet::default();
        cs.unchanged.push("a.ts".into());
        assert!(cs.is_noop());
        cs.modified.push("b.ts".into());
        assert!(!cs.is_noop());
    }

    #[test]
    fn test_stale_and_process_sets() {
        let cs = ChangeSet {
            added: vec!["new.ts".into()],
            modified: vec!["mod.ts".into()],
            unchanged: vec!["same.ts".into()],
            deleted: vec!["gone.ts".into()],
        };
        assert_eq!(cs.stale_paths(), vec!["mod.ts", "gone.ts"]);
        assert_eq!(cs.to_process(), vec!["new.ts", "mod.ts"]);
    }
}
