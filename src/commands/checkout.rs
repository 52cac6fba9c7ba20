//! `git checkout`, and the branch-moving machinery `git switch` shares.
//!
//! Checkout runs in exactly one of four modes: restoring paths, switching
//! to an existing branch or commit, creating a branch with `-b`, or
//! starting an orphan branch. The mode is decided during resolve and every
//! precondition (unknown revision, clobbered local changes, bad names) is
//! checked there, so a refused checkout leaves refs, objects and the
//! working tree untouched.

use super::branch::{start_point, validate_new_branch};
use super::{
    matches_pathspec, parse_with_clap, pathspec, repo_mut, require_repo, require_root, Command,
    CommandEnv, Parsed,
};
use crate::core::index::IndexEntry;
use crate::core::object::short_id;
use crate::core::refs::{branch_ref, remote_ref, Head, ORIGIN};
use crate::core::repository::Repository;
use crate::core::tree::FileMap;
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "checkout", about = "Switch branches or restore working tree files")]
pub struct CheckoutOptions {
    /// Branch, commit or start point
    target: Option<String>,
    /// Create a new branch and switch to it
    #[arg(short = 'b', value_name = "NEW_BRANCH", conflicts_with = "orphan")]
    new_branch: Option<String>,
    /// Start a new branch with no history
    #[arg(long, value_name = "NEW_BRANCH")]
    orphan: Option<String>,
    /// Detach HEAD at the named commit
    #[arg(long)]
    detach: bool,
    /// Throw away local changes that would be overwritten
    #[arg(short = 'f', long)]
    force: bool,
    /// Paths to restore
    #[arg(last = true)]
    paths: Vec<String>,
}

/// Where HEAD ends up after a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Branch(String),
    NewBranch {
        name: String,
        at: String,
        /// Branch on `origin` the new branch tracks.
        upstream: Option<String>,
    },
    Detached {
        id: String,
        /// Revision as the user typed it.
        typed: String,
    },
}

pub struct MovePlan {
    root: PathBuf,
    from_files: FileMap,
    to_files: FileMap,
    destination: Destination,
    from_label: String,
    to_label: String,
    force: bool,
    message: String,
}

pub enum CheckoutPlan {
    /// Overwrite paths with the index version, or with a commit's version
    /// (which is staged as well).
    Restore {
        root: PathBuf,
        files: Vec<(String, IndexEntry, Vec<u8>)>,
        stage: bool,
    },
    Move(MovePlan),
    Orphan {
        root: PathBuf,
        branch: String,
        from_label: String,
    },
}

pub struct Checkout;

impl Command for Checkout {
    type Options = CheckoutOptions;
    type Plan = CheckoutPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<CheckoutOptions>> {
        parse_with_clap("checkout", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: CheckoutOptions) -> CommandResult<CheckoutPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        if let Some(branch) = opts.orphan {
            return plan_orphan(repo, root, branch);
        }
        if !opts.paths.is_empty() {
            return plan_restore(ws, repo, root, opts.target.as_deref(), &opts.paths);
        }
        if let Some(name) = opts.new_branch {
            return plan_create(ws, repo, root, name, opts.target.as_deref(), opts.force);
        }

        let target = opts.target.ok_or_else(|| {
            CommandError::usage("usage: git checkout [<options>] <branch>\n   or: git checkout [<options>] [<branch>] -- <file>...")
        })?;

        if !opts.detach {
            if let Some(destination) = branch_destination(repo, &target)? {
                return plan_move(ws, repo, root, destination, opts.force);
            }
        }
        if let Some(id) = repo.resolve_revision(&target)? {
            let destination = Destination::Detached { id, typed: target };
            return plan_move(ws, repo, root, destination, opts.force);
        }

        // `git checkout <file>` with no `--`.
        let spec = pathspec(ws, &root, &target).ok();
        if spec.is_some_and(|spec| repo.index().entries.keys().any(|p| matches_pathspec(&spec, p))) {
            return plan_restore(ws, repo, root, None, &[target]);
        }
        Err(CommandError::fatal(format!(
            "error: pathspec '{}' did not match any file(s) known to git",
            target
        )))
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: CheckoutPlan) -> CommandResult<String> {
        apply(ws, plan)
    }
}

/// An existing local branch, or a remote-tracking `origin/<name>` that a
/// local branch can be created from.
pub fn branch_destination(repo: &Repository, name: &str) -> CommandResult<Option<Destination>> {
    if repo.branch_tip(name)?.is_some() || repo.current_branch()?.as_deref() == Some(name) {
        return Ok(Some(Destination::Branch(name.to_string())));
    }
    if let Some(at) = repo.ref_target(&remote_ref(ORIGIN, name))? {
        return Ok(Some(Destination::NewBranch {
            name: name.to_string(),
            at,
            upstream: Some(name.to_string()),
        }));
    }
    Ok(None)
}

/// Plans `-b <name> [<start>]` (and `switch -c`).
pub fn plan_create(
    ws: &Workspace,
    repo: &Repository,
    root: PathBuf,
    name: String,
    start: Option<&str>,
    force: bool,
) -> CommandResult<CheckoutPlan> {
    validate_new_branch(repo, &name)?;
    if start.is_none() && repo.head_commit()?.is_none() {
        // Nothing to point at yet; the new branch is simply unborn.
        return plan_orphan(repo, root, name);
    }
    let at = start_point(repo, start)?;
    let upstream = match start {
        Some(rev) if repo.remote_branches()?.contains_key(rev) => {
            rev.strip_prefix("origin/").map(str::to_string)
        }
        _ => None,
    };
    plan_move(
        ws,
        repo,
        root,
        Destination::NewBranch { name, at, upstream },
        force,
    )
}

pub fn plan_orphan(repo: &Repository, root: PathBuf, branch: String) -> CommandResult<CheckoutPlan> {
    validate_new_branch(repo, &branch)?;
    Ok(CheckoutPlan::Orphan {
        root,
        branch,
        from_label: head_label(repo)?,
    })
}

/// Plans moving HEAD (and the working tree) to `destination`.
pub fn plan_move(
    ws: &Workspace,
    repo: &Repository,
    root: PathBuf,
    destination: Destination,
    force: bool,
) -> CommandResult<CheckoutPlan> {
    let from_files = repo.head_files()?;
    let to_commit = match &destination {
        Destination::Branch(name) => repo.branch_tip(name)?,
        Destination::NewBranch { at, .. } => Some(at.clone()),
        Destination::Detached { id, .. } => Some(id.clone()),
    };
    let to_files = repo.commit_files(to_commit.as_deref())?;

    if !force {
        let blocked = repo.overwritten_by(&ws.fs, &from_files, &to_files);
        if !blocked.is_empty() {
            let list: Vec<String> = blocked.iter().map(|p| format!("\t{}", p)).collect();
            return Err(CommandError::Rejected(format!(
                "error: Your local changes to the following files would be overwritten by checkout:\n{}\n\
                 Please commit your changes or stash them before you switch branches.\nAborting",
                list.join("\n")
            )));
        }
    }

    let current = repo.current_branch()?;
    let (to_label, message) = match &destination {
        Destination::Branch(name) if current.as_deref() == Some(name.as_str()) => {
            (name.clone(), format!("Already on '{}'", name))
        }
        Destination::Branch(name) => (name.clone(), format!("Switched to branch '{}'", name)),
        Destination::NewBranch { name, upstream, .. } => {
            let mut message = String::new();
            if let Some(upstream) = upstream {
                message.push_str(&format!(
                    "branch '{}' set up to track '{}/{}'.\n",
                    name, ORIGIN, upstream
                ));
            }
            message.push_str(&format!("Switched to a new branch '{}'", name));
            (name.clone(), message)
        }
        Destination::Detached { id, typed } => {
            let label = if typed == id { short_id(id).to_string() } else { typed.clone() };
            (label, detached_message(repo, typed, id)?)
        }
    };

    Ok(CheckoutPlan::Move(MovePlan {
        root,
        from_files,
        to_files,
        destination,
        from_label: head_label(repo)?,
        to_label,
        force,
        message,
    }))
}

fn detached_message(repo: &Repository, typed: &str, id: &str) -> CommandResult<String> {
    let summary = repo.read_commit(id)?.short_message();
    Ok(format!(
        "Note: switching to '{}'.\n\n\
         You are in 'detached HEAD' state. You can look around, make experimental\n\
         changes and commit them, and you can discard any commits you make in this\n\
         state without impacting any branches by switching back to a branch.\n\n\
         HEAD is now at {} {}",
        typed,
        short_id(id),
        summary
    ))
}

fn plan_restore(
    ws: &Workspace,
    repo: &Repository,
    root: PathBuf,
    source: Option<&str>,
    paths: &[String],
) -> CommandResult<CheckoutPlan> {
    let (available, stage) = match source {
        Some(rev) => {
            let id = repo.resolve_revision(rev)?.ok_or_else(|| {
                CommandError::fatal(format!("fatal: invalid reference: {}", rev))
            })?;
            (repo.commit_files(Some(&id))?, true)
        }
        None => (repo.index().to_files(), false),
    };

    let mut files = Vec::new();
    for typed in paths {
        let spec = pathspec(ws, &root, typed)?;
        let matched: Vec<_> = available
            .iter()
            .filter(|(path, _)| matches_pathspec(&spec, path))
            .collect();
        if matched.is_empty() {
            return Err(CommandError::fatal(format!(
                "error: pathspec '{}' did not match any file(s) known to git",
                typed
            )));
        }
        if !stage {
            if let Some((path, _)) = matched.iter().find(|(p, _)| repo.index().get(p).is_some_and(|e| e.stage != 0)) {
                return Err(CommandError::fatal(format!("error: path '{}' is unmerged", path)));
            }
        }
        for (path, entry) in matched {
            let content = repo.read_blob(&entry.hash)?;
            let entry = IndexEntry {
                hash: entry.hash.clone(),
                mode: entry.mode.clone(),
                stage: 0,
            };
            files.push((path.clone(), entry, content));
        }
    }
    Ok(CheckoutPlan::Restore { root, files, stage })
}

/// Branch name, or the short id of a detached HEAD.
pub fn head_label(repo: &Repository) -> CommandResult<String> {
    Ok(match repo.head()? {
        Head::Branch(name) => name,
        Head::Detached(id) => short_id(&id).to_string(),
    })
}

/// Applies any checkout plan. Shared with `git switch`.
pub fn apply(ws: &mut Workspace, plan: CheckoutPlan) -> CommandResult<String> {
    match plan {
        CheckoutPlan::Restore { root, files, stage } => {
            let (repo, fs) = repo_mut(ws, &root)?;
            let count = files.len();
            for (path, entry, content) in files {
                fs.write(&repo.worktree_path(&path), content)?;
                if stage {
                    repo.index_mut().entries.insert(path, entry);
                }
            }
            Ok(format!(
                "Updated {} path{} from the {}",
                count,
                if count == 1 { "" } else { "s" },
                if stage { "tree" } else { "index" }
            ))
        }
        CheckoutPlan::Orphan {
            root,
            branch,
            from_label,
        } => {
            let (repo, _) = repo_mut(ws, &root)?;
            repo.set_head_branch(&branch)?;
            ws.record_reflog(format!("checkout: moving from {} to {}", from_label, branch));
            Ok(format!("Switched to a new branch '{}'", branch))
        }
        CheckoutPlan::Move(plan) => {
            let (repo, fs) = repo_mut(ws, &plan.root)?;
            if plan.force {
                repo.force_worktree(fs, &plan.to_files)?;
            } else {
                repo.switch_worktree(fs, &plan.from_files, &plan.to_files)?;
            }
            match &plan.destination {
                Destination::Branch(name) => repo.set_head_branch(name)?,
                Destination::NewBranch { name, at, upstream } => {
                    repo.set_ref(&branch_ref(name), at)?;
                    if let Some(upstream) = upstream {
                        let config = repo.config_mut();
                        config.set(&format!("branch.{}.remote", name), ORIGIN);
                        config.set(&format!("branch.{}.merge", name), &branch_ref(upstream));
                    }
                    repo.set_head_branch(name)?;
                }
                Destination::Detached { id, .. } => repo.set_head_detached(id)?,
            }
            ws.record_reflog(format!(
                "checkout: moving from {} to {}",
                plan.from_label, plan.to_label
            ));
            Ok(plan.message)
        }
    }
}
