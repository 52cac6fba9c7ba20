//! The simulated shared remote.
//!
//! At most one [`SharedRemote`] is live at a time. It is a bare
//! [`DiskStore`] plus the simulated pull requests opened against it.
//! Installing a new remote swaps the whole entry, so its pull requests go
//! with it.

pub mod ingest;
pub mod sync;

use crate::core::disk::DiskStore;
use crate::core::refs::DEFAULT_BRANCH;
use crate::core::store::Store;
use crate::error::RemoteError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const PSEUDO_HOST: &str = "https://remote.vizgit.local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub number: u32,
    pub title: String,
    pub head: String,
    pub base: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

pub struct SharedRemote {
    pub name: String,
    pub url: String,
    /// Real URL the history was imported from, if any.
    pub upstream: Option<String>,
    pub path: PathBuf,
    pub store: Arc<dyn Store>,
    pull_requests: Mutex<Vec<PullRequest>>,
}

impl SharedRemote {
    pub fn new(name: &str, path: PathBuf, store: Arc<dyn Store>, upstream: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            url: pseudo_url(name),
            upstream,
            path,
            store,
            pull_requests: Mutex::new(Vec::new()),
        }
    }

    /// Whether `key` names this remote by name, pseudo-URL, path or upstream URL.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim_end_matches('/');
        key == self.name
            || key == self.url
            || Path::new(key) == self.path
            || self.upstream.as_deref().map(|u| u.trim_end_matches('/')) == Some(key)
    }

    pub fn open_pull_request(&self, title: &str, head: &str, base: &str, author: &str) -> PullRequest {
        let mut prs = self.pull_requests.lock();
        let pr = PullRequest {
            number: prs.len() as u32 + 1,
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
            author: author.to_string(),
            created_at: Utc::now(),
        };
        prs.push(pr.clone());
        pr
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().clone()
    }
}

/// `https://host/org/project.git` -> `project`.
pub fn slug(url: &str) -> String {
    let last = url
        .trim_end_matches('/')
        .rsplit(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or(url);
    let name = last.strip_suffix(".git").unwrap_or(last);
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "remote".to_string()
    } else {
        cleaned
    }
}

/// A directory under `remotes_dir` no other store uses: `<name>-<uuid>`.
pub fn store_path(remotes_dir: &Path, name: &str) -> PathBuf {
    remotes_dir.join(format!("{}-{}", name, Uuid::new_v4().simple()))
}

pub fn pseudo_url(name: &str) -> String {
    format!("{}/{}.git", PSEUDO_HOST, name)
}

/// Holds the live shared remote. Passed explicitly to whoever needs it.
pub struct RemoteRegistry {
    current: RwLock<Option<Arc<SharedRemote>>>,
    data_dir: PathBuf,
}

impl RemoteRegistry {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            current: RwLock::new(None),
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn remotes_dir(&self) -> PathBuf {
        self.data_dir.join("remotes")
    }

    pub fn current(&self) -> Option<Arc<SharedRemote>> {
        self.current.read().clone()
    }

    /// The live remote if `key` refers to it.
    pub fn lookup(&self, key: &str) -> Option<Arc<SharedRemote>> {
        self.current().filter(|remote| remote.matches(key))
    }

    /// Replaces the live remote. The previous entry and its pull requests
    /// stop being reachable through the registry.
    pub fn install(&self, remote: SharedRemote) -> Arc<SharedRemote> {
        let remote = Arc::new(remote);
        info!(name = %remote.name, path = %remote.path.display(), "installed shared remote");
        *self.current.write() = Some(remote.clone());
        remote
    }

    /// Creates an empty bare store under `<data_dir>/remotes` and installs
    /// it. Each call gets its own directory, so clones of a replaced remote
    /// keep reading the pool they were made from.
    pub fn create_empty(&self, name: &str) -> Result<Arc<SharedRemote>, RemoteError> {
        let name = slug(name);
        let path = store_path(&self.remotes_dir(), &name);
        let store = DiskStore::create(&path, DEFAULT_BRANCH)?;
        Ok(self.install(SharedRemote::new(&name, path, Arc::new(store), None)))
    }

    /// Imports `url` (or reuses an earlier import) and installs it. The
    /// network clone runs before the registry lock is taken.
    pub fn ingest(&self, url: &str) -> Result<Arc<SharedRemote>, RemoteError> {
        let remote = ingest::ingest(&self.remotes_dir(), url)?;
        Ok(self.install(remote))
    }
}
