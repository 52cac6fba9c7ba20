use crate::core::object::{Object, ObjectType};
use crate::core::store::{get_object, Store};
use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FILE_MODE: &str = "100644";
pub const DIR_MODE: &str = "040000";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: String,
    pub name: String,
    pub hash: String,
    pub entry_type: ObjectType,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

/// Flattened view of a tree: repository-relative path to blob id and mode.
pub type FileMap = BTreeMap<String, FileEntry>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub hash: String,
    pub mode: String,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(&mut self, mode: String, name: String, hash: String, entry_type: ObjectType) {
        self.entries.push(TreeEntry {
            mode,
            name,
            hash,
            entry_type,
        });
        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
    }

    pub fn get_entry(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn from_object(obj: &Object) -> StoreResult<Self> {
        Ok(serde_json::from_slice(&obj.data)?)
    }

    pub fn to_object(&self) -> StoreResult<Object> {
        Ok(Object::new(ObjectType::Tree, serde_json::to_vec(self)?))
    }

    pub fn read(store: &dyn Store, id: &str) -> StoreResult<Self> {
        Self::from_object(&get_object(store, id)?)
    }

    /// Writes nested trees for `files` bottom-up and returns the root tree id.
    pub fn write_from_files(store: &dyn Store, files: &FileMap) -> StoreResult<String> {
        let mut tree = Tree::new();
        let mut directories: BTreeMap<&str, FileMap> = BTreeMap::new();

        for (path, entry) in files {
            match path.split_once('/') {
                None => tree.add_entry(
                    entry.mode.clone(),
                    path.clone(),
                    entry.hash.clone(),
                    ObjectType::Blob,
                ),
                Some((dir, rest)) => {
                    directories
                        .entry(dir)
                        .or_default()
                        .insert(rest.to_string(), entry.clone());
                }
            }
        }

        for (dir_name, sub_files) in directories {
            let subtree_hash = Self::write_from_files(store, &sub_files)?;
            tree.add_entry(
                DIR_MODE.to_string(),
                dir_name.to_string(),
                subtree_hash,
                ObjectType::Tree,
            );
        }

        store.write_object(&tree.to_object()?)
    }

    /// Recursively lists every blob reachable from tree `id`.
    pub fn flatten(store: &dyn Store, id: &str) -> StoreResult<FileMap> {
        let mut files = FileMap::new();
        Self::collect(store, id, "", &mut files)?;
        Ok(files)
    }

    fn collect(store: &dyn Store, id: &str, prefix: &str, files: &mut FileMap) -> StoreResult<()> {
        let tree = Self::read(store, id)?;
        for entry in &tree.entries {
            let full_path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", prefix, entry.name)
            };
            match entry.entry_type {
                ObjectType::Tree => Self::collect(store, &entry.hash, &full_path, files)?,
                _ => {
                    files.insert(
                        full_path,
                        FileEntry {
                            hash: entry.hash.clone(),
                            mode: entry.mode.clone(),
                        },
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;

    fn file(store: &MemoryStore, content: &str) -> FileEntry {
        FileEntry {
            hash: store.write_object(&Object::blob(content)).unwrap(),
            mode: FILE_MODE.to_string(),
        }
    }

    #[test]
    fn nested_directories_flatten_back_to_the_same_paths() {
        let store = MemoryStore::new();
        let mut files = FileMap::new();
        files.insert("README.md".into(), file(&store, "readme"));
        files.insert("src/lib.rs".into(), file(&store, "lib"));
        files.insert("src/core/mod.rs".into(), file(&store, "mod"));

        let root = Tree::write_from_files(&store, &files).unwrap();
        assert_eq!(Tree::flatten(&store, &root).unwrap(), files);

        let top = Tree::read(&store, &root).unwrap();
        assert_eq!(top.get_entry("src").unwrap().entry_type, ObjectType::Tree);
    }

    #[test]
    fn empty_tree_is_stable() {
        let store = MemoryStore::new();
        let a = Tree::write_from_files(&store, &FileMap::new()).unwrap();
        let b = Tree::write_from_files(&store, &FileMap::new()).unwrap();
        assert_eq!(a, b);
        assert!(Tree::flatten(&store, &a).unwrap().is_empty());
    }
}
