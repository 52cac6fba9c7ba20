//! Clone, fetch and push between a session repository and the shared remote.
//!
//! Each operation is split into a `plan_*` function that only reads and an
//! `apply_*` function that writes. Command handlers call the first from
//! their resolve phase and the second from perform.

use super::{RemoteRegistry, SharedRemote};
use crate::core::fs::MemFs;
use crate::core::hybrid::HybridStore;
use crate::core::object::short_id;
use crate::core::refs::{
    branch_ref, remote_ref, tag_ref, DEFAULT_BRANCH, HEADS_PREFIX, ORIGIN, TAGS_PREFIX,
};
use crate::core::repository::Repository;
use crate::core::store::{resolve_ref, MemoryStore, RefTarget, Store, HEAD};
use crate::core::tree::FileMap;
use crate::error::{CommandError, CommandResult, RemoteError, StoreResult};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Branch and tag tips of the shared remote at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteRefs {
    pub branches: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub head_branch: Option<String>,
}

pub fn remote_refs(remote: &SharedRemote) -> StoreResult<RemoteRefs> {
    let store = remote.store.as_ref();
    let mut refs = RemoteRefs::default();
    for (prefix, map) in [(HEADS_PREFIX, &mut refs.branches), (TAGS_PREFIX, &mut refs.tags)] {
        for (name, _) in store.list_refs(prefix)? {
            if let Some(id) = resolve_ref(store, &name)? {
                map.insert(name[prefix.len()..].to_string(), id);
            }
        }
    }
    refs.head_branch = match store.read_ref(HEAD)? {
        Some(RefTarget::Symbolic(target)) => target.strip_prefix(HEADS_PREFIX).map(str::to_string),
        _ => None,
    };
    Ok(refs)
}

/// Finds the shared remote a repository calls `key`. `origin` goes through
/// `remote.origin.url`; anything else is matched against the live remote
/// directly.
pub fn find_remote(
    repo: &Repository,
    registry: &RemoteRegistry,
    key: &str,
) -> Result<Arc<SharedRemote>, RemoteError> {
    let target = if key == ORIGIN {
        repo.config()
            .remote_url(ORIGIN)
            .cloned()
            .ok_or_else(|| RemoteError::NoSuchRemote(key.to_string()))?
    } else {
        key.to_string()
    };
    registry
        .lookup(&target)
        .ok_or_else(|| RemoteError::NoSuchRemote(key.to_string()))
}

fn ref_line(flag: char, summary: &str, from: &str, to: &str) -> String {
    format!(" {} {:<17} {:<10} -> {}", flag, summary, from, to)
}

#[derive(Clone)]
pub struct ClonePlan {
    pub remote: Arc<SharedRemote>,
    pub root: PathBuf,
    pub refs: RemoteRefs,
    /// Branch checked out after cloning and its files.
    pub branch: String,
    pub files: FileMap,
}

pub fn plan_clone(remote: Arc<SharedRemote>, root: PathBuf, fs: &MemFs) -> CommandResult<ClonePlan> {
    let dir_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let occupied = fs.is_file(&root)
        || (fs.is_dir(&root) && !fs.read_dir(&root).map(|e| e.is_empty()).unwrap_or(true));
    if occupied {
        return Err(CommandError::fatal(format!(
            "fatal: destination path '{}' already exists and is not an empty directory.",
            dir_name
        )));
    }

    let refs = remote_refs(&remote)?;
    let branch = refs
        .head_branch
        .clone()
        .filter(|b| refs.branches.contains_key(b))
        .or_else(|| refs.branches.keys().next().cloned())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    // Read through a throwaway view so the plan does not depend on a
    // repository that does not exist yet.
    let view = Repository::open(root.clone(), remote.store.clone());
    let files = view.commit_files(refs.branches.get(&branch).map(String::as_str))?;

    Ok(ClonePlan {
        remote,
        root,
        refs,
        branch,
        files,
    })
}

/// Builds the cloned repository. Objects stay in the shared pool; only refs
/// are copied into the session.
pub fn apply_clone(fs: &mut MemFs, plan: &ClonePlan) -> CommandResult<(Repository, String)> {
    let store: Arc<dyn Store> = Arc::new(HybridStore::new(
        MemoryStore::new(),
        plan.remote.store.clone(),
    ));
    let mut repo = Repository::init(plan.root.clone(), store, &plan.branch)?;

    for (name, id) in &plan.refs.branches {
        repo.set_ref(&remote_ref(ORIGIN, name), id)?;
    }
    for (name, id) in &plan.refs.tags {
        repo.set_ref(&tag_ref(name), id)?;
    }
    if let Some(tip) = plan.refs.branches.get(&plan.branch) {
        repo.set_ref(&branch_ref(&plan.branch), tip)?;
        let config = repo.config_mut();
        config.set(&format!("branch.{}.remote", plan.branch), ORIGIN);
        config.set(&format!("branch.{}.merge", plan.branch), &branch_ref(&plan.branch));
    }
    repo.set_head_branch(&plan.branch)?;
    repo.config_mut().set("remote.origin.url", &plan.remote.url);

    fs.create_dir_all(&plan.root)?;
    repo.switch_worktree(fs, &FileMap::new(), &plan.files)?;

    let dir_name = plan
        .root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut out = format!("Cloning into '{}'...", dir_name);
    if plan.refs.branches.is_empty() {
        out.push_str("\nwarning: You appear to have cloned an empty repository.");
    }
    debug!(root = %plan.root.display(), branches = plan.refs.branches.len(), "cloned");
    Ok((repo, out))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub name: String,
    pub old: Option<String>,
    pub new: String,
}

#[derive(Clone)]
pub struct FetchPlan {
    pub remote: Arc<SharedRemote>,
    pub branches: Vec<RefUpdate>,
    pub tags: Vec<RefUpdate>,
    /// Remote-tracking branches that no longer exist upstream, with their old tip.
    pub prune: Vec<(String, String)>,
}

impl FetchPlan {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty() && self.tags.is_empty() && self.prune.is_empty()
    }

    /// New tip of `origin/<branch>` after this fetch, if the branch exists upstream.
    pub fn tracking_tip(&self, repo: &Repository, branch: &str) -> StoreResult<Option<String>> {
        if let Some(update) = self.branches.iter().find(|u| u.name == branch) {
            return Ok(Some(update.new.clone()));
        }
        if self.prune.iter().any(|(name, _)| name == branch) {
            return Ok(None);
        }
        repo.ref_target(&remote_ref(ORIGIN, branch))
    }
}

pub fn plan_fetch(repo: &Repository, remote: Arc<SharedRemote>) -> CommandResult<FetchPlan> {
    let refs = remote_refs(&remote)?;
    let tracking = repo.remote_branches()?;
    let prefix = format!("{}/", ORIGIN);

    let mut branches = Vec::new();
    for (name, tip) in &refs.branches {
        let old = tracking.get(&format!("{}{}", prefix, name)).cloned();
        if old.as_deref() != Some(tip.as_str()) {
            branches.push(RefUpdate {
                name: name.clone(),
                old,
                new: tip.clone(),
            });
        }
    }

    let local_tags = repo.tags()?;
    let tags = refs
        .tags
        .iter()
        .filter(|(name, _)| !local_tags.contains_key(*name))
        .map(|(name, tip)| RefUpdate {
            name: name.clone(),
            old: None,
            new: tip.clone(),
        })
        .collect();

    let prune = tracking
        .iter()
        .filter_map(|(display, tip)| {
            let branch = display.strip_prefix(&prefix)?;
            (!refs.branches.contains_key(branch)).then(|| (branch.to_string(), tip.clone()))
        })
        .collect();

    Ok(FetchPlan {
        remote,
        branches,
        tags,
        prune,
    })
}

pub fn apply_fetch(repo: &mut Repository, plan: &FetchPlan) -> CommandResult<String> {
    let shared = plan.remote.store.as_ref();
    let mut lines = Vec::new();

    for update in &plan.branches {
        if !repo.has_object(&update.new) {
            let copied = repo.import_closure(shared, &update.new)?;
            debug!(branch = %update.name, copied, "fetched objects");
        }
        let tracking = format!("{}/{}", ORIGIN, update.name);
        repo.set_ref(&remote_ref(ORIGIN, &update.name), &update.new)?;
        lines.push(match &update.old {
            None => ref_line('*', "[new branch]", &update.name, &tracking),
            Some(old) if repo.is_ancestor(old, &update.new).unwrap_or(false) => ref_line(
                ' ',
                &format!("{}..{}", short_id(old), short_id(&update.new)),
                &update.name,
                &tracking,
            ),
            Some(old) => format!(
                "{}  (forced update)",
                ref_line(
                    '+',
                    &format!("{}...{}", short_id(old), short_id(&update.new)),
                    &update.name,
                    &tracking,
                )
            ),
        });
    }

    for tag in &plan.tags {
        if !repo.has_object(&tag.new) {
            repo.import_closure(shared, &tag.new)?;
        }
        repo.set_ref(&tag_ref(&tag.name), &tag.new)?;
        lines.push(ref_line('*', "[new tag]", &tag.name, &tag.name));
    }

    for (branch, _) in &plan.prune {
        repo.delete_ref(&remote_ref(ORIGIN, branch))?;
        lines.push(ref_line(
            '-',
            "[deleted]",
            "(none)",
            &format!("{}/{}", ORIGIN, branch),
        ));
    }

    if lines.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("From {}\n{}", plan.remote.url, lines.join("\n")))
}

#[derive(Clone)]
pub enum PushPlan {
    UpToDate,
    Update {
        remote: Arc<SharedRemote>,
        branch: String,
        old: Option<String>,
        new: String,
        forced: bool,
        set_upstream: bool,
    },
    Delete {
        remote: Arc<SharedRemote>,
        branch: String,
        old: String,
    },
}

pub struct PushRequest<'a> {
    pub branch: &'a str,
    pub force: bool,
    pub delete: bool,
    pub set_upstream: bool,
}

pub fn plan_push(
    repo: &Repository,
    remote: Arc<SharedRemote>,
    req: PushRequest<'_>,
) -> CommandResult<PushPlan> {
    let remote_name = branch_ref(req.branch);
    let old = resolve_ref(remote.store.as_ref(), &remote_name)?;

    if req.delete {
        let old = old.ok_or_else(|| {
            CommandError::Rejected(format!(
                "error: unable to delete '{}': remote ref does not exist\nerror: failed to push some refs to '{}'",
                req.branch, remote.url
            ))
        })?;
        return Ok(PushPlan::Delete {
            remote,
            branch: req.branch.to_string(),
            old,
        });
    }

    let new = repo.branch_tip(req.branch)?.ok_or_else(|| {
        CommandError::fatal(format!(
            "error: src refspec {} does not match any\nerror: failed to push some refs to '{}'",
            req.branch, remote.url
        ))
    })?;

    if old.as_deref() == Some(new.as_str()) {
        return Ok(PushPlan::UpToDate);
    }

    let fast_forward = match &old {
        None => true,
        Some(old) => repo.has_object(old) && repo.is_ancestor(old, &new)?,
    };
    if !fast_forward && !req.force {
        return Err(CommandError::Rejected(format!(
            "To {}\n ! [rejected]        {} -> {} (non-fast-forward)\n\
             error: failed to push some refs to '{}'\n\
             hint: Updates were rejected because the tip of your current branch is behind\n\
             hint: its remote counterpart. Integrate the remote changes (e.g.\n\
             hint: 'git pull ...') before pushing again.",
            remote.url, req.branch, req.branch, remote.url
        )));
    }

    Ok(PushPlan::Update {
        remote,
        branch: req.branch.to_string(),
        old,
        new,
        forced: !fast_forward,
        set_upstream: req.set_upstream,
    })
}

pub fn apply_push(repo: &mut Repository, plan: &PushPlan) -> CommandResult<String> {
    match plan {
        PushPlan::UpToDate => Ok("Everything up-to-date".to_string()),
        PushPlan::Delete { remote, branch, old } => {
            let swapped = remote
                .store
                .compare_and_swap_ref(&branch_ref(branch), Some(old), None)?;
            if !swapped {
                return Err(stale_remote(remote, branch));
            }
            repo.delete_ref(&remote_ref(ORIGIN, branch))?;
            Ok(format!("To {}\n - {:<17} {}", remote.url, "[deleted]", branch))
        }
        PushPlan::Update {
            remote,
            branch,
            old,
            new,
            forced,
            set_upstream,
        } => {
            let copied = repo.export_closure(new, remote.store.as_ref())?;
            debug!(branch = %branch, copied, "pushed objects");
            let swapped = remote.store.compare_and_swap_ref(
                &branch_ref(branch),
                old.as_deref(),
                Some(new),
            )?;
            if !swapped {
                return Err(stale_remote(remote, branch));
            }
            repo.set_ref(&remote_ref(ORIGIN, branch), new)?;

            let line = match old {
                None => ref_line('*', "[new branch]", branch, branch),
                Some(old) if *forced => format!(
                    "{}  (forced update)",
                    ref_line('+', &format!("{}...{}", short_id(old), short_id(new)), branch, branch)
                ),
                Some(old) => ref_line(
                    ' ',
                    &format!("{}..{}", short_id(old), short_id(new)),
                    branch,
                    branch,
                ),
            };
            let mut out = format!("To {}\n{}", remote.url, line);
            if *set_upstream {
                let config = repo.config_mut();
                config.set(&format!("branch.{}.remote", branch), ORIGIN);
                config.set(&format!("branch.{}.merge", branch), &branch_ref(branch));
                out.push_str(&format!(
                    "\nbranch '{}' set up to track '{}/{}'.",
                    branch, ORIGIN, branch
                ));
            }
            Ok(out)
        }
    }
}

fn stale_remote(remote: &SharedRemote, branch: &str) -> CommandError {
    CommandError::Rejected(format!(
        "To {}\n ! [rejected]        {} -> {} (fetch first)\nerror: failed to push some refs to '{}'",
        remote.url, branch, branch, remote.url
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commit::{Author, Commit};
    use crate::core::disk::DiskStore;
    use chrono::{TimeZone, Utc};
    use std::path::Path;
    use tempfile::TempDir;

    fn shared(dir: &Path) -> Arc<SharedRemote> {
        let store = DiskStore::create(dir.join("upstream"), "main").unwrap();
        Arc::new(SharedRemote::new("upstream", dir.join("upstream"), Arc::new(store), None))
    }

    fn commit(repo: &mut Repository, content: &str, secs: i64) -> String {
        let blob = repo.write_blob(content.as_bytes()).unwrap();
        repo.index_mut().add_entry("file.txt".into(), blob);
        let tree = repo.write_tree_from_index().unwrap();
        let parents = repo.head_commit().unwrap().into_iter().collect();
        let author = Author::at("T", "t@example.com", Utc.timestamp_opt(secs, 0).unwrap());
        let id = repo
            .write_commit(&Commit::new(tree, parents, author, content.to_string()))
            .unwrap();
        repo.advance_head(&id).unwrap();
        id
    }

    fn push(repo: &mut Repository, remote: &Arc<SharedRemote>, force: bool) -> CommandResult<String> {
        let plan = plan_push(
            repo,
            remote.clone(),
            PushRequest {
                branch: "main",
                force,
                delete: false,
                set_upstream: false,
            },
        )?;
        apply_push(repo, &plan)
    }

    #[test]
    fn clone_then_fetch_after_push_from_elsewhere() {
        let dir = TempDir::new().unwrap();
        let remote = shared(dir.path());
        let mut fs = MemFs::new();

        let mut author = Repository::init(
            PathBuf::from("/author"),
            Arc::new(MemoryStore::new()),
            "main",
        )
        .unwrap();
        let first = commit(&mut author, "one", 100);
        assert!(push(&mut author, &remote, false).unwrap().contains("[new branch]"));

        let plan = plan_clone(remote.clone(), PathBuf::from("/clone"), &fs).unwrap();
        let (mut clone, out) = apply_clone(&mut fs, &plan).unwrap();
        assert!(out.starts_with("Cloning into 'clone'"));
        assert!(clone.is_hybrid());
        assert_eq!(clone.head_commit().unwrap(), Some(first.clone()));
        assert_eq!(fs.read(Path::new("/clone/file.txt")).unwrap(), b"one");

        let second = commit(&mut author, "two", 200);
        push(&mut author, &remote, false).unwrap();

        let plan = plan_fetch(&clone, remote.clone()).unwrap();
        assert_eq!(plan.branches.len(), 1);
        let out = apply_fetch(&mut clone, &plan).unwrap();
        assert!(out.contains(&format!("{}..{}", short_id(&first), short_id(&second))));
        assert_eq!(
            clone.ref_target("refs/remotes/origin/main").unwrap(),
            Some(second)
        );
        assert!(plan_fetch(&clone, remote).unwrap().is_empty());
    }

    #[test]
    fn diverged_push_is_rejected_unless_forced() {
        let dir = TempDir::new().unwrap();
        let remote = shared(dir.path());

        let mut a = Repository::init(PathBuf::from("/a"), Arc::new(MemoryStore::new()), "main").unwrap();
        let mut b = Repository::init(PathBuf::from("/b"), Arc::new(MemoryStore::new()), "main").unwrap();
        commit(&mut a, "from a", 100);
        push(&mut a, &remote, false).unwrap();
        let b_tip = commit(&mut b, "from b", 200);

        let err = push(&mut b, &remote, false).unwrap_err();
        assert!(err.to_string().contains("! [rejected]"));
        assert!(err.to_string().contains("(non-fast-forward)"));

        let out = push(&mut b, &remote, true).unwrap();
        assert!(out.contains("(forced update)"));
        assert_eq!(
            resolve_ref(remote.store.as_ref(), "refs/heads/main").unwrap(),
            Some(b_tip)
        );
        assert_eq!(push(&mut b, &remote, false).unwrap(), "Everything up-to-date");
    }
}
