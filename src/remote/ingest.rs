//! One-time import of a real repository's history into a bare store.
//!
//! The network clone is delegated to the `git` executable (`clone --mirror`
//! into a scratch directory). The mirror is then read with `git2` and every
//! branch, tag and HEAD is rewritten as native objects in a [`DiskStore`].

use super::{slug, store_path, SharedRemote};
use crate::core::commit::{Author, Commit};
use crate::core::disk::DiskStore;
use crate::core::object::{Object, ObjectType};
use crate::core::refs::{branch_ref, DEFAULT_BRANCH, HEADS_PREFIX, TAGS_PREFIX};
use crate::core::store::{RefTarget, Store, HEAD};
use crate::core::tree::{Tree, DIR_MODE, FILE_MODE};
use crate::error::{RemoteError, StoreError};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub commits: usize,
    pub branches: usize,
    pub tags: usize,
}

/// File inside an imported store holding the URL it was cloned from.
pub const UPSTREAM_FILE: &str = "UPSTREAM";

/// Builds the shared remote for `url` under `remotes_dir`. A store left
/// there by an earlier import of the same URL is reused; anything else is
/// cloned into a directory of its own.
pub fn ingest(remotes_dir: &Path, url: &str) -> Result<SharedRemote, RemoteError> {
    let name = slug(url);

    if let Some(path) = find_import(remotes_dir, url) {
        info!(url, path = %path.display(), "reusing previously imported remote");
        let store = DiskStore::open(&path)?;
        return Ok(SharedRemote::new(&name, path, Arc::new(store), Some(url.to_string())));
    }

    let path = store_path(remotes_dir, &name);
    let mirror = std::env::temp_dir().join(format!("vizgit-mirror-{}", Uuid::new_v4()));
    let imported = mirror_clone(url, &mirror).and_then(|()| {
        let store = DiskStore::create(&path, DEFAULT_BRANCH)?;
        let summary = import_repository(&mirror, &store)?;
        // Written last: a store without it is never picked up for reuse.
        fs::write(path.join(UPSTREAM_FILE), url).map_err(StoreError::from)?;
        Ok((store, summary))
    });
    if let Err(e) = fs::remove_dir_all(&mirror) {
        debug!(error = %e, "mirror cleanup skipped");
    }

    match imported {
        Ok((store, summary)) => {
            info!(
                url,
                commits = summary.commits,
                branches = summary.branches,
                tags = summary.tags,
                "imported upstream history"
            );
            Ok(SharedRemote::new(&name, path, Arc::new(store), Some(url.to_string())))
        }
        Err(e) => {
            if path.exists() {
                if let Err(cleanup) = fs::remove_dir_all(&path) {
                    debug!(error = %cleanup, "partial store cleanup skipped");
                }
            }
            warn!(url, error = %e, "ingest failed");
            Err(e)
        }
    }
}

/// The URL recorded by the import that built the store at `path`.
pub fn recorded_upstream(path: &Path) -> Option<String> {
    fs::read_to_string(path.join(UPSTREAM_FILE))
        .ok()
        .map(|url| url.trim().to_string())
}

/// A complete earlier import of exactly `url`, if one is on disk.
fn find_import(remotes_dir: &Path, url: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(remotes_dir).ok()?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| DiskStore::is_valid(path) && recorded_upstream(path).as_deref() == Some(url))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn mirror_clone(url: &str, dest: &Path) -> Result<(), RemoteError> {
    let output = Command::new("git")
        .args(["clone", "--mirror", "--quiet", url])
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| RemoteError::Unreachable {
            url: url.to_string(),
            reason: format!("failed to run git: {}", e),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(RemoteError::Unreachable {
            url: url.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn git_err(e: git2::Error) -> RemoteError {
    RemoteError::Import(e.message().to_string())
}

fn to_utc(time: git2::Time) -> DateTime<Utc> {
    Utc.timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now)
}

fn signature(sig: &git2::Signature<'_>) -> Author {
    Author::at(
        sig.name().unwrap_or("unknown"),
        sig.email().unwrap_or(""),
        to_utc(sig.when()),
    )
}

/// Rewrites the history of the git repository at `git_dir` into `store`.
/// Commits are imported parents-first so every parent id is known by the
/// time its children are written.
pub fn import_repository(git_dir: &Path, store: &dyn Store) -> Result<ImportSummary, RemoteError> {
    let repo = git2::Repository::open(git_dir).map_err(git_err)?;
    let mut summary = ImportSummary::default();

    let mut tips: Vec<(String, git2::Oid)> = Vec::new();
    for reference in repo.references().map_err(git_err)? {
        let reference = reference.map_err(git_err)?;
        let Some(name) = reference.name() else { continue };
        if !(name.starts_with(HEADS_PREFIX) || name.starts_with(TAGS_PREFIX)) {
            continue;
        }
        match reference.peel_to_commit() {
            Ok(commit) => tips.push((name.to_string(), commit.id())),
            Err(e) => debug!(reference = name, error = %e, "skipping non-commit ref"),
        }
    }

    let mut walk = repo.revwalk().map_err(git_err)?;
    walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)
        .map_err(git_err)?;
    for (_, oid) in &tips {
        walk.push(*oid).map_err(git_err)?;
    }

    let mut commits: HashMap<git2::Oid, String> = HashMap::new();
    let mut trees: HashMap<git2::Oid, String> = HashMap::new();
    for oid in walk {
        let oid = oid.map_err(git_err)?;
        let commit = repo.find_commit(oid).map_err(git_err)?;
        let tree = import_tree(&repo, &commit.tree().map_err(git_err)?, store, &mut trees)?;
        let parents = commit
            .parent_ids()
            .filter_map(|p| commits.get(&p).cloned())
            .collect();
        let committer = signature(&commit.committer());
        let native = Commit {
            tree,
            parents,
            author: signature(&commit.author()),
            timestamp: committer.timestamp,
            committer,
            message: commit.message().unwrap_or("").trim_end().to_string(),
        };
        let id = store.write_object(&native.to_object()?)?;
        commits.insert(oid, id);
        summary.commits += 1;
    }

    for (name, oid) in &tips {
        if let Some(id) = commits.get(oid) {
            store.write_ref(name, RefTarget::Direct(id.clone()))?;
            if name.starts_with(HEADS_PREFIX) {
                summary.branches += 1;
            } else {
                summary.tags += 1;
            }
        }
    }

    let head_branch = repo
        .find_reference(HEAD)
        .ok()
        .and_then(|r| r.symbolic_target().map(str::to_string))
        .filter(|target| tips.iter().any(|(name, _)| name == target))
        .or_else(|| {
            tips.iter()
                .map(|(name, _)| name.clone())
                .find(|name| name.starts_with(HEADS_PREFIX))
        })
        .unwrap_or_else(|| branch_ref(DEFAULT_BRANCH));
    store.write_ref(HEAD, RefTarget::Symbolic(head_branch))?;

    Ok(summary)
}

fn import_tree(
    repo: &git2::Repository,
    tree: &git2::Tree<'_>,
    store: &dyn Store,
    cache: &mut HashMap<git2::Oid, String>,
) -> Result<String, RemoteError> {
    if let Some(id) = cache.get(&tree.id()) {
        return Ok(id.clone());
    }

    let mut native = Tree::new();
    for entry in tree.iter() {
        let Some(name) = entry.name() else { continue };
        match entry.kind() {
            Some(git2::ObjectType::Blob) => {
                let blob = repo.find_blob(entry.id()).map_err(git_err)?;
                let id = store.write_object(&Object::blob(blob.content().to_vec()))?;
                native.add_entry(FILE_MODE.to_string(), name.to_string(), id, ObjectType::Blob);
            }
            Some(git2::ObjectType::Tree) => {
                let subtree = repo.find_tree(entry.id()).map_err(git_err)?;
                let id = import_tree(repo, &subtree, store, cache)?;
                native.add_entry(DIR_MODE.to_string(), name.to_string(), id, ObjectType::Tree);
            }
            // Submodule links have nothing to import.
            _ => {}
        }
    }

    let id = store.write_object(&native.to_object()?)?;
    cache.insert(tree.id(), id.clone());
    Ok(id)
}
