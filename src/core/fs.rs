//! In-memory filesystem backing one session's working trees.

use crate::error::FsError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Node {
    File(Vec<u8>),
    Dir,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemFs {
    nodes: BTreeMap<PathBuf, Node>,
}

impl Default for MemFs {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self { nodes }
    }
}

/// Joins `input` onto `cwd` and normalizes `.`/`..` lexically. The result is
/// always absolute; `..` at the root stays at the root.
pub fn resolve_path(cwd: &Path, input: &str) -> PathBuf {
    let start = if input.starts_with('/') {
        PathBuf::from("/")
    } else {
        cwd.to_path_buf()
    };
    let mut out = PathBuf::from("/");
    for component in start.join(input).components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}

/// `path` relative to `root` with `/` separators, or `None` when it lies outside.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        matches!(self.nodes.get(path), Some(Node::Dir))
    }

    pub fn is_file(&self, path: &Path) -> bool {
        matches!(self.nodes.get(path), Some(Node::File(_)))
    }

    pub fn read(&self, path: &Path) -> Result<&[u8], FsError> {
        match self.nodes.get(path) {
            Some(Node::File(data)) => Ok(data),
            Some(Node::Dir) => Err(FsError::IsADirectory(path.to_path_buf())),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    /// Writes a file, creating missing parent directories.
    pub fn write(&mut self, path: &Path, data: impl Into<Vec<u8>>) -> Result<(), FsError> {
        if self.is_dir(path) {
            return Err(FsError::IsADirectory(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }
        self.nodes.insert(path.to_path_buf(), Node::File(data.into()));
        Ok(())
    }

    pub fn append(&mut self, path: &Path, data: &[u8]) -> Result<(), FsError> {
        let mut content = match self.nodes.get(path) {
            Some(Node::File(existing)) => existing.clone(),
            Some(Node::Dir) => return Err(FsError::IsADirectory(path.to_path_buf())),
            None => Vec::new(),
        };
        content.extend_from_slice(data);
        self.write(path, content)
    }

    pub fn create_dir(&mut self, path: &Path) -> Result<(), FsError> {
        if self.exists(path) {
            return Err(FsError::AlreadyExists(path.to_path_buf()));
        }
        match path.parent() {
            Some(parent) if self.is_dir(parent) => {
                self.nodes.insert(path.to_path_buf(), Node::Dir);
                Ok(())
            }
            Some(parent) if self.is_file(parent) => Err(FsError::NotADirectory(parent.to_path_buf())),
            Some(parent) => Err(FsError::NotFound(parent.to_path_buf())),
            None => Err(FsError::AlreadyExists(path.to_path_buf())),
        }
    }

    pub fn create_dir_all(&mut self, path: &Path) -> Result<(), FsError> {
        let mut current = PathBuf::from("/");
        for component in path.components() {
            if let Component::Normal(part) = component {
                current.push(part);
                match self.nodes.get(&current) {
                    Some(Node::Dir) => {}
                    Some(Node::File(_)) => return Err(FsError::NotADirectory(current)),
                    None => {
                        self.nodes.insert(current.clone(), Node::Dir);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn remove_file(&mut self, path: &Path) -> Result<(), FsError> {
        match self.nodes.get(path) {
            Some(Node::File(_)) => {
                self.nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(FsError::IsADirectory(path.to_path_buf())),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    /// Removes `path` and everything below it. Removing `/` empties the
    /// filesystem but keeps the root.
    pub fn remove_all(&mut self, path: &Path) -> Result<(), FsError> {
        if !self.exists(path) {
            return Err(FsError::NotFound(path.to_path_buf()));
        }
        self.nodes.retain(|p, _| !p.starts_with(path));
        self.nodes.entry(PathBuf::from("/")).or_insert(Node::Dir);
        Ok(())
    }

    /// Removes empty directories from `start` upwards, stopping at `stop`.
    pub fn prune_empty_dirs(&mut self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            let has_children = self.nodes.keys().any(|p| p.parent() == Some(current.as_path()));
            if has_children || !self.is_dir(&current) {
                break;
            }
            self.nodes.remove(&current);
            if !current.pop() {
                break;
            }
        }
    }

    /// Immediate children of a directory, sorted by name.
    pub fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>, FsError> {
        match self.nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(FsError::NotADirectory(path.to_path_buf())),
            None => return Err(FsError::NotFound(path.to_path_buf())),
        }
        Ok(self
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                Some(DirEntry {
                    name,
                    is_dir: matches!(node, Node::Dir),
                })
            })
            .collect())
    }

    /// Every file below `root`, recursively.
    pub fn files_under(&self, root: &Path) -> Vec<PathBuf> {
        self.nodes
            .iter()
            .filter(|(p, node)| matches!(node, Node::File(_)) && p.starts_with(root))
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_handles_dots_and_absolute_paths() {
        let cwd = Path::new("/project/src");
        assert_eq!(resolve_path(cwd, "../README.md"), PathBuf::from("/project/README.md"));
        assert_eq!(resolve_path(cwd, "./a/./b"), PathBuf::from("/project/src/a/b"));
        assert_eq!(resolve_path(cwd, "/etc"), PathBuf::from("/etc"));
        assert_eq!(resolve_path(Path::new("/"), "../.."), PathBuf::from("/"));
    }

    #[test]
    fn write_creates_parents_and_read_dir_is_shallow() {
        let mut fs = MemFs::new();
        fs.write(Path::new("/p/src/main.rs"), "fn main() {}").unwrap();
        fs.write(Path::new("/p/README.md"), "hi").unwrap();

        let entries = fs.read_dir(Path::new("/p")).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry { name: "README.md".into(), is_dir: false },
                DirEntry { name: "src".into(), is_dir: true },
            ]
        );
        assert_eq!(fs.files_under(Path::new("/p")).len(), 2);
    }

    #[test]
    fn cannot_write_through_a_file() {
        let mut fs = MemFs::new();
        fs.write(Path::new("/a"), "x").unwrap();
        assert_eq!(
            fs.write(Path::new("/a/b"), "y"),
            Err(FsError::NotADirectory(PathBuf::from("/a")))
        );
    }

    #[test]
    fn remove_all_on_root_keeps_root() {
        let mut fs = MemFs::new();
        fs.write(Path::new("/a/b"), "x").unwrap();
        fs.remove_all(Path::new("/")).unwrap();
        assert!(fs.is_dir(Path::new("/")));
        assert!(fs.read_dir(Path::new("/")).unwrap().is_empty());
    }

    #[test]
    fn prune_stops_at_repository_root() {
        let mut fs = MemFs::new();
        fs.write(Path::new("/p/a/b/f"), "x").unwrap();
        fs.remove_file(Path::new("/p/a/b/f")).unwrap();
        fs.prune_empty_dirs(Path::new("/p/a/b"), Path::new("/p"));
        assert!(!fs.exists(Path::new("/p/a")));
        assert!(fs.is_dir(Path::new("/p")));
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        assert_eq!(
            relative_to(Path::new("/p"), Path::new("/p/src/lib.rs")).as_deref(),
            Some("src/lib.rs")
        );
        assert_eq!(relative_to(Path::new("/p"), Path::new("/q/x")), None);
    }
}
