//! Visualization snapshot of a session's current repository.
//!
//! A [`GraphSnapshot`] is rebuilt from scratch on every read: HEAD, the ref
//! maps, the ordered commit list with per-commit labels, working tree
//! status, and enough filesystem context to draw the terminal's surroundings.

pub mod sort;

use crate::core::commit::Commit;
use crate::core::fs::DirEntry;
use crate::core::object::short_id;
use crate::core::refs::Head;
use crate::core::repository::Repository;
use crate::core::status::Status;
use crate::error::StoreResult;
use crate::remote::SharedRemote;
use crate::session::{ReflogEntry, Workspace};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitView {
    pub id: String,
    pub short_id: String,
    pub message: String,
    pub parent: Option<String>,
    pub second_parent: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub branches: Vec<String>,
    pub remote_branches: Vec<String>,
    pub tags: Vec<String>,
    pub is_head: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    /// `None` when the current directory is not inside a repository.
    pub head: Option<Head>,
    pub repo_root: Option<String>,
    pub branches: BTreeMap<String, String>,
    pub remote_branches: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    /// `ORIG_HEAD`, `MERGE_HEAD`.
    pub refs: BTreeMap<String, String>,
    pub commits: Vec<CommitView>,
    pub status: Status,
    pub cwd: String,
    pub cwd_entries: Vec<DirEntry>,
    /// Top-level directories that hold a repository.
    pub projects: Vec<String>,
    pub reflog: Vec<ReflogEntry>,
}

/// Builds the snapshot for `ws`. With `show_all`, every commit object the
/// store can enumerate is included, unless the store is hybrid: its
/// enumeration only covers session-local objects, so reachability is used
/// instead.
pub fn build(ws: &Workspace, show_all: bool) -> StoreResult<GraphSnapshot> {
    let mut snapshot = GraphSnapshot {
        cwd: ws.cwd.display().to_string(),
        cwd_entries: ws.fs.read_dir(&ws.cwd).unwrap_or_default(),
        projects: projects(ws),
        reflog: ws.reflog.clone(),
        ..GraphSnapshot::default()
    };

    let (Some(root), Some(repo)) = (ws.current_repo_root(), ws.current_repo()) else {
        return Ok(snapshot);
    };
    fill_repository(&mut snapshot, repo, show_all)?;
    snapshot.repo_root = Some(root.display().to_string());
    snapshot.status = repo.status(&ws.fs)?;
    Ok(snapshot)
}

/// The shared remote's own view. Its store is never hybrid, so every
/// stored commit is shown.
pub fn build_remote(remote: &SharedRemote) -> StoreResult<GraphSnapshot> {
    let repo = Repository::open(remote.path.clone(), remote.store.clone());
    let mut snapshot = GraphSnapshot {
        cwd: remote.url.clone(),
        repo_root: Some(remote.path.display().to_string()),
        ..GraphSnapshot::default()
    };
    fill_repository(&mut snapshot, &repo, true)?;
    Ok(snapshot)
}

fn fill_repository(snapshot: &mut GraphSnapshot, repo: &Repository, show_all: bool) -> StoreResult<()> {
    snapshot.head = Some(repo.head()?);
    snapshot.branches = repo.branches()?;
    snapshot.remote_branches = repo.remote_branches()?;
    snapshot.tags = repo.tags()?;
    snapshot.refs = repo.special_refs()?;

    let ids = if show_all && !repo.is_hybrid() {
        repo.object_ids()?
            .into_iter()
            .filter(|id| repo.is_commit(id))
            .collect()
    } else {
        repo.reachable_commits(&repo.ref_tips()?)?
    };
    snapshot.commits = commit_views(repo, ids, snapshot)?;
    Ok(())
}

/// Commits reachable from `seeds` (first and second parents), newest first.
pub fn reachable_from(repo: &Repository, seeds: &[String]) -> StoreResult<Vec<String>> {
    let ids = repo.reachable_commits(seeds)?;
    let commits = load(repo, &ids)?;
    Ok(ordered(repo, &commits))
}

fn load(repo: &Repository, ids: &[String]) -> StoreResult<HashMap<String, Commit>> {
    ids.iter()
        .map(|id| Ok((id.clone(), repo.read_commit(id)?)))
        .collect()
}

fn ordered(repo: &Repository, commits: &HashMap<String, Commit>) -> Vec<String> {
    let parents = |id: &str| -> Vec<String> {
        match commits.get(id) {
            Some(commit) => commit.parents.clone(),
            None => repo.read_commit(id).map(|c| c.parents).unwrap_or_default(),
        }
    };
    let entries = commits
        .iter()
        .map(|(id, commit)| (id.clone(), commit.timestamp.timestamp()))
        .collect();
    sort::order_commits(entries, &parents)
}

fn commit_views(repo: &Repository, ids: Vec<String>, labels: &GraphSnapshot) -> StoreResult<Vec<CommitView>> {
    let commits = load(repo, &ids)?;
    let head_commit = repo.head_commit()?;

    let invert = |map: &BTreeMap<String, String>| {
        let mut by_commit: HashMap<String, Vec<String>> = HashMap::new();
        for (name, id) in map {
            by_commit.entry(id.clone()).or_default().push(name.clone());
        }
        by_commit
    };
    let branches = invert(&labels.branches);
    let remotes = invert(&labels.remote_branches);
    let tags = invert(&labels.tags);

    let views = ordered(repo, &commits)
        .into_iter()
        .filter_map(|id| {
            let commit = commits.get(&id)?;
            Some(CommitView {
                short_id: short_id(&id).to_string(),
                message: commit.message.clone(),
                parent: commit.first_parent().map(str::to_string),
                second_parent: commit.second_parent().map(str::to_string),
                timestamp: commit.timestamp,
                author: commit.author.name.clone(),
                branches: branches.get(&id).cloned().unwrap_or_default(),
                remote_branches: remotes.get(&id).cloned().unwrap_or_default(),
                tags: tags.get(&id).cloned().unwrap_or_default(),
                is_head: head_commit.as_deref() == Some(id.as_str()),
                id,
            })
        })
        .collect();
    Ok(views)
}

fn projects(ws: &Workspace) -> Vec<String> {
    let root = Path::new("/");
    ws.fs
        .read_dir(root)
        .unwrap_or_default()
        .into_iter()
        .filter(|entry| entry.is_dir && ws.repos.contains_key(&root.join(&entry.name)))
        .map(|entry| entry.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commit::Author;
    use crate::core::fs::MemFs;
    use crate::core::hybrid::HybridStore;
    use crate::core::refs::{branch_ref, remote_ref, ORIGIN};
    use crate::core::store::{MemoryStore, Store};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn commit(repo: &mut Repository, fs: &mut MemFs, path: &str, secs: i64) -> String {
        let content = format!("{}@{}", path, secs);
        fs.write(&repo.worktree_path(path), content.clone()).unwrap();
        let hash = repo.write_blob(content.as_bytes()).unwrap();
        repo.index_mut().add_entry(path.to_string(), hash);
        let tree = repo.write_tree_from_index().unwrap();
        let parents = repo.head_commit().unwrap().into_iter().collect();
        let when = Utc.timestamp_opt(secs, 0).unwrap();
        let id = repo
            .write_commit(&Commit::new(tree, parents, Author::at("T", "t@x", when), path.to_string()))
            .unwrap();
        repo.advance_head(&id).unwrap();
        id
    }

    fn workspace_with(store: Arc<dyn Store>) -> Workspace {
        let mut ws = Workspace::new();
        let root = PathBuf::from("/project");
        ws.fs.create_dir_all(&root).unwrap();
        ws.repos
            .insert(root.clone(), Repository::init(root.clone(), store, "main").unwrap());
        ws.cwd = root;
        ws
    }

    #[test]
    fn outside_a_repository_only_the_filesystem_is_described() {
        let mut ws = Workspace::new();
        ws.fs.create_dir_all(Path::new("/notes")).unwrap();
        let snapshot = build(&ws, false).unwrap();
        assert_eq!(snapshot.head, None);
        assert!(snapshot.commits.is_empty());
        assert_eq!(snapshot.cwd, "/");
        assert_eq!(snapshot.cwd_entries.len(), 1);
        assert!(snapshot.projects.is_empty());
    }

    #[test]
    fn commits_carry_labels_and_head_marker() {
        let mut ws = workspace_with(Arc::new(MemoryStore::new()));
        let root = PathBuf::from("/project");
        let (repo, fs) = ws.repo_and_fs_mut(&root).unwrap();
        let first = commit(repo, fs, "a.txt", 100);
        let second = commit(repo, fs, "b.txt", 200);
        repo.set_ref("refs/tags/v1", &first).unwrap();

        let snapshot = build(&ws, false).unwrap();
        assert_eq!(snapshot.head, Some(Head::Branch("main".into())));
        assert_eq!(snapshot.projects, vec!["project".to_string()]);
        let ids: Vec<&str> = snapshot.commits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);

        let top = &snapshot.commits[0];
        assert!(top.is_head);
        assert_eq!(top.branches, vec!["main".to_string()]);
        assert_eq!(top.parent.as_deref(), Some(first.as_str()));
        assert_eq!(top.short_id.len(), 7);
        assert_eq!(snapshot.commits[1].tags, vec!["v1".to_string()]);
        assert!(snapshot.status.is_clean());
    }

    #[test]
    fn show_all_includes_unreferenced_commits_of_a_plain_store() {
        let mut ws = workspace_with(Arc::new(MemoryStore::new()));
        let root = PathBuf::from("/project");
        let (repo, fs) = ws.repo_and_fs_mut(&root).unwrap();
        let first = commit(repo, fs, "a.txt", 100);
        let dangling = commit(repo, fs, "b.txt", 200);
        repo.set_ref(&branch_ref("main"), &first).unwrap();

        let reachable = build(&ws, false).unwrap();
        assert!(reachable.commits.iter().all(|c| c.id != dangling));
        let all = build(&ws, true).unwrap();
        assert!(all.commits.iter().any(|c| c.id == dangling));
    }

    #[test]
    fn show_all_on_a_hybrid_store_never_leaks_shared_commits() {
        let shared: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut upstream = Repository::init(PathBuf::from("/up"), shared.clone(), "main").unwrap();
        let mut scratch = MemFs::new();
        let published = commit(&mut upstream, &mut scratch, "a.txt", 100);
        let other = commit(&mut upstream, &mut scratch, "secret.txt", 200);
        upstream.set_ref(&branch_ref("main"), &published).unwrap();
        upstream.set_ref(&branch_ref("other"), &other).unwrap();

        let hybrid: Arc<dyn Store> = Arc::new(HybridStore::new(MemoryStore::new(), shared));
        let mut ws = workspace_with(hybrid);
        let root = PathBuf::from("/project");
        let (repo, _) = ws.repo_and_fs_mut(&root).unwrap();
        repo.set_ref(&remote_ref(ORIGIN, "main"), &published).unwrap();
        repo.set_ref(&branch_ref("main"), &published).unwrap();

        let snapshot = build(&ws, true).unwrap();
        let ids: Vec<&str> = snapshot.commits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![published.as_str()]);
        assert_eq!(snapshot.commits[0].remote_branches, vec!["origin/main".to_string()]);
    }

    #[test]
    fn reachable_from_a_branch_excludes_other_branches() {
        let mut ws = workspace_with(Arc::new(MemoryStore::new()));
        let root = PathBuf::from("/project");
        let (repo, fs) = ws.repo_and_fs_mut(&root).unwrap();
        let base = commit(repo, fs, "a.txt", 100);
        repo.set_ref(&branch_ref("feature"), &base).unwrap();
        repo.set_head_branch("feature").unwrap();
        let feature = commit(repo, fs, "f.txt", 200);

        let from_main = reachable_from(repo, &[base.clone()]).unwrap();
        assert_eq!(from_main, vec![base.clone()]);
        let from_feature = reachable_from(repo, &[feature.clone()]).unwrap();
        assert_eq!(from_feature, vec![feature, base]);
    }
}
