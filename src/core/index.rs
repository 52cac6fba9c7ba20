use crate::core::tree::{FileEntry, FileMap, FILE_MODE};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub hash: String,
    pub mode: String,
    /// 0 for a normal entry, 2 while the path carries unresolved merge
    /// conflict markers.
    pub stage: u8,
}

/// The staging area of one repository.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Index {
    pub entries: BTreeMap<String, IndexEntry>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files(files: &FileMap) -> Self {
        let entries = files
            .iter()
            .map(|(path, f)| {
                (
                    path.clone(),
                    IndexEntry {
                        hash: f.hash.clone(),
                        mode: f.mode.clone(),
                        stage: 0,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn add_entry(&mut self, path: String, hash: String) {
        let mode = self
            .entries
            .get(&path)
            .map(|e| e.mode.clone())
            .unwrap_or_else(|| FILE_MODE.to_string());
        self.entries.insert(path, IndexEntry { hash, mode, stage: 0 });
    }

    pub fn mark_conflicted(&mut self, path: String, hash: String) {
        self.entries.insert(
            path,
            IndexEntry {
                hash,
                mode: FILE_MODE.to_string(),
                stage: 2,
            },
        );
    }

    pub fn remove_entry(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.values().any(|entry| entry.stage != 0)
    }

    pub fn conflicted_files(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.stage != 0)
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn to_files(&self) -> FileMap {
        self.entries
            .iter()
            .map(|(path, e)| {
                (
                    path.clone(),
                    FileEntry {
                        hash: e.hash.clone(),
                        mode: e.mode.clone(),
                    },
                )
            })
            .collect()
    }
}
