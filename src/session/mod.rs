//! Per-user sandbox state.
//!
//! A [`Session`] owns one [`Workspace`]: an in-memory filesystem, the
//! repositories rooted in it, the shell's current directory and the reflog.
//! All mutation goes through the session's write lock; graph and status
//! reads take the read lock.

pub mod manager;

pub use manager::SessionManager;

use crate::core::fs::MemFs;
use crate::core::repository::Repository;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReflogEntry {
    pub commit: String,
    pub description: String,
}

pub struct Workspace {
    pub fs: MemFs,
    pub repos: BTreeMap<PathBuf, Repository>,
    pub cwd: PathBuf,
    /// Newest first.
    pub reflog: Vec<ReflogEntry>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            fs: MemFs::new(),
            repos: BTreeMap::new(),
            cwd: PathBuf::from("/"),
            reflog: Vec::new(),
        }
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root of the repository containing `path`, preferring the innermost.
    pub fn repo_root_for(&self, path: &Path) -> Option<PathBuf> {
        self.repos
            .keys()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .cloned()
    }

    pub fn current_repo_root(&self) -> Option<PathBuf> {
        self.repo_root_for(&self.cwd)
    }

    pub fn current_repo(&self) -> Option<&Repository> {
        let root = self.current_repo_root()?;
        self.repos.get(&root)
    }

    pub fn current_repo_mut(&mut self) -> Option<&mut Repository> {
        let root = self.current_repo_root()?;
        self.repos.get_mut(&root)
    }

    /// The repository at `root` together with the filesystem, for operations
    /// that touch both the store and the working tree.
    pub fn repo_and_fs_mut(&mut self, root: &Path) -> Option<(&mut Repository, &mut MemFs)> {
        let repo = self.repos.get_mut(root)?;
        Some((repo, &mut self.fs))
    }

    /// Records a reflog entry for wherever HEAD of the current repository
    /// now points. Nothing is recorded on an unborn branch.
    pub fn record_reflog(&mut self, description: impl Into<String>) {
        let commit = match self.current_repo().map(|repo| repo.head_commit()) {
            Some(Ok(Some(id))) => id,
            _ => return,
        };
        self.reflog.insert(
            0,
            ReflogEntry {
                commit,
                description: description.into(),
            },
        );
    }

    /// Drops every repository, file and reflog entry and returns to `/`.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: RwLock<Workspace>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: RwLock::new(Workspace::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> &RwLock<Workspace> {
        &self.state
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Workspace> {
        self.state.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, Workspace> {
        self.state.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{MemoryStore, Store};
    use std::sync::Arc;

    #[test]
    fn innermost_repository_wins() {
        let mut ws = Workspace::new();
        for root in ["/outer", "/outer/inner"] {
            let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
            let repo = Repository::init(PathBuf::from(root), store, "main").unwrap();
            ws.repos.insert(PathBuf::from(root), repo);
        }
        ws.cwd = PathBuf::from("/outer/inner/src");
        assert_eq!(ws.current_repo_root(), Some(PathBuf::from("/outer/inner")));
        ws.cwd = PathBuf::from("/outer/other");
        assert_eq!(ws.current_repo_root(), Some(PathBuf::from("/outer")));
        ws.cwd = PathBuf::from("/outsider");
        assert!(ws.current_repo().is_none());
    }

    #[test]
    fn reflog_skips_unborn_head() {
        let mut ws = Workspace::new();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        ws.repos.insert(
            PathBuf::from("/r"),
            Repository::init(PathBuf::from("/r"), store, "main").unwrap(),
        );
        ws.cwd = PathBuf::from("/r");
        ws.record_reflog("commit: nothing");
        assert!(ws.reflog.is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut ws = Workspace::new();
        ws.fs.write(Path::new("/f"), "x").unwrap();
        ws.cwd = PathBuf::from("/tmp");
        ws.reset();
        assert!(!ws.fs.exists(Path::new("/f")));
        assert_eq!(ws.cwd, PathBuf::from("/"));
    }
}
