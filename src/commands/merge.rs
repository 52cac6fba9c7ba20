use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::commit::Commit;
use crate::core::merge::{merge_trees, TreeMerge};
use crate::core::object::{short_id, Object};
use crate::core::refs::{MERGE_HEAD, ORIG_HEAD};
use crate::core::repository::Repository;
use crate::core::tree::{FileEntry, FileMap, FILE_MODE};
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "merge", about = "Join two development histories together")]
pub struct MergeOptions {
    /// Branch or commit to merge into the current branch
    target: Option<String>,
    /// Create a merge commit even when a fast-forward is possible
    #[arg(long = "no-ff")]
    no_ff: bool,
    /// Abort the current conflict resolution and restore the pre-merge state
    #[arg(long, conflicts_with = "target")]
    abort: bool,
    /// Message for the merge commit
    #[arg(short = 'm', long = "message")]
    message: Option<String>,
}

pub enum MergePlan {
    UpToDate,
    FastForward {
        root: PathBuf,
        head: Option<String>,
        theirs: String,
        from_files: FileMap,
        to_files: FileMap,
        label: String,
    },
    ThreeWay {
        root: PathBuf,
        head: String,
        theirs: String,
        ours: FileMap,
        result: TreeMerge,
        label: String,
        message: String,
    },
    Abort {
        root: PathBuf,
        head_files: FileMap,
    },
}

pub struct Merge;

impl Command for Merge {
    type Options = MergeOptions;
    type Plan = MergePlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<MergeOptions>> {
        parse_with_clap("merge", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: MergeOptions) -> CommandResult<MergePlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        if opts.abort {
            if repo.ref_target(MERGE_HEAD)?.is_none() {
                return Err(CommandError::fatal("fatal: There is no merge to abort (MERGE_HEAD missing)."));
            }
            return Ok(MergePlan::Abort {
                root,
                head_files: repo.head_files()?,
            });
        }

        let label = opts
            .target
            .ok_or_else(|| CommandError::fatal("fatal: No remote for the current branch."))?;
        let theirs = repo
            .resolve_revision(&label)?
            .ok_or_else(|| CommandError::fatal(format!("merge: {} - not something we can merge", label)))?;
        plan_merge(ws, root, &theirs, &label, opts.no_ff, opts.message)
    }

    fn perform(&self, ws: &mut Workspace, env: &CommandEnv<'_>, plan: MergePlan) -> CommandResult<String> {
        apply_merge(ws, env, plan)
    }
}

/// Decides how merging `theirs` into the current branch of the repository
/// at `root` would go. `label` is the name the user gave it.
pub fn plan_merge(
    ws: &Workspace,
    root: PathBuf,
    theirs: &str,
    label: &str,
    no_ff: bool,
    message: Option<String>,
) -> CommandResult<MergePlan> {
    let repo = ws
        .repos
        .get(&root)
        .ok_or_else(|| CommandError::fatal(super::NOT_A_REPO))?;

    if repo.ref_target(MERGE_HEAD)?.is_some() {
        let reason = if repo.index().has_conflicts() {
            "error: Merging is not possible because you have unmerged files.\n\
             hint: Fix them up in the work tree, and then use 'git add/rm <file>'\n\
             hint: as appropriate to mark resolution and make a commit.\n\
             fatal: Exiting because of an unresolved conflict."
        } else {
            "fatal: You have not concluded your merge (MERGE_HEAD exists).\n\
             Please, commit your changes before you merge."
        };
        return Err(CommandError::fatal(reason));
    }

    let head = repo.head_commit()?;
    let from_files = repo.head_files()?;

    let fast_forward = match &head {
        None => true,
        Some(head) if repo.is_ancestor(theirs, head)? => return Ok(MergePlan::UpToDate),
        Some(head) => !no_ff && repo.is_ancestor(head, theirs)?,
    };

    if fast_forward {
        let to_files = repo.commit_files(Some(theirs))?;
        refuse_if_overwritten(repo.overwritten_by(&ws.fs, &from_files, &to_files))?;
        return Ok(MergePlan::FastForward {
            root,
            head,
            theirs: theirs.to_string(),
            from_files,
            to_files,
            label: label.to_string(),
        });
    }

    let Some(head) = head else {
        return Err(CommandError::fatal("fatal: cannot merge into an unborn branch"));
    };
    let status = repo.status(&ws.fs)?;
    if status.has_tracked_changes() {
        let mut dirty = status.staged.clone();
        dirty.extend(status.modified.iter().cloned());
        dirty.sort();
        dirty.dedup();
        refuse_if_overwritten(dirty)?;
    }

    let base = match repo.merge_base(&head, theirs)? {
        Some(base) => repo.commit_files(Some(&base))?,
        None => FileMap::new(),
    };
    let their_files = repo.commit_files(Some(theirs))?;
    let result = merge_trees(repo, &base, &from_files, &their_files, label)?;
    debug!(theirs = %short_id(theirs), conflicts = result.conflicts.len(), "planned three-way merge");

    let message = message.unwrap_or_else(|| default_message(repo, label));
    Ok(MergePlan::ThreeWay {
        root,
        head,
        theirs: theirs.to_string(),
        ours: from_files,
        result,
        label: label.to_string(),
        message,
    })
}

fn refuse_if_overwritten(paths: Vec<String>) -> CommandResult<()> {
    if paths.is_empty() {
        return Ok(());
    }
    let list: Vec<String> = paths.iter().map(|p| format!("\t{}", p)).collect();
    Err(CommandError::Rejected(format!(
        "error: Your local changes to the following files would be overwritten by merge:\n{}\n\
         Please commit your changes or stash them before you merge.\nAborting",
        list.join("\n")
    )))
}

fn default_message(repo: &Repository, label: &str) -> String {
    let subject = if label.starts_with("origin/") {
        format!("Merge remote-tracking branch '{}'", label)
    } else if repo.branch_tip(label).ok().flatten().is_some() {
        format!("Merge branch '{}'", label)
    } else {
        format!("Merge commit '{}'", label)
    };
    match repo.current_branch().ok().flatten() {
        Some(branch) if branch != "main" && branch != "master" => format!("{} into {}", subject, branch),
        _ => subject,
    }
}

pub fn apply_merge(ws: &mut Workspace, env: &CommandEnv<'_>, plan: MergePlan) -> CommandResult<String> {
    match plan {
        MergePlan::UpToDate => Ok("Already up to date.".to_string()),
        MergePlan::Abort { root, head_files } => {
            let (repo, fs) = repo_mut(ws, &root)?;
            repo.force_worktree(fs, &head_files)?;
            repo.delete_ref(MERGE_HEAD)?;
            Ok(String::new())
        }
        MergePlan::FastForward {
            root,
            head,
            theirs,
            from_files,
            to_files,
            label,
        } => {
            let (repo, fs) = repo_mut(ws, &root)?;
            repo.switch_worktree(fs, &from_files, &to_files)?;
            if let Some(head) = &head {
                repo.set_ref(ORIG_HEAD, head)?;
            }
            repo.advance_head(&theirs)?;
            ws.record_reflog(format!("merge {}: Fast-forward", label));
            let from = head.as_deref().map(short_id).unwrap_or("0000000");
            Ok(format!("Updating {}..{}\nFast-forward", from, short_id(&theirs)))
        }
        MergePlan::ThreeWay {
            root,
            head,
            theirs,
            ours,
            result,
            label,
            message,
        } => {
            let (repo, fs) = repo_mut(ws, &root)?;
            let mut merged = result.clean.clone();
            for (path, content) in &result.conflicts {
                let hash = repo.write_blob(content)?;
                merged.insert(
                    path.clone(),
                    FileEntry {
                        hash,
                        mode: FILE_MODE.to_string(),
                    },
                );
            }
            repo.switch_worktree(fs, &ours, &merged)?;
            repo.set_ref(ORIG_HEAD, &head)?;

            let auto: Vec<String> = result
                .conflicts
                .iter()
                .filter(|(path, _)| ours.contains_key(path))
                .map(|(path, _)| format!("Auto-merging {}", path))
                .collect();

            if result.has_conflicts() {
                let mut lines = auto;
                for (path, content) in &result.conflicts {
                    let hash = Object::blob(content.clone()).id();
                    repo.index_mut().mark_conflicted(path.clone(), hash);
                    lines.push(format!("CONFLICT (content): Merge conflict in {}", path));
                }
                repo.set_ref(MERGE_HEAD, &theirs)?;
                lines.push("Automatic merge failed; fix conflicts and then commit the result.".to_string());
                return Ok(lines.join("\n"));
            }

            let tree = repo.write_tree_from_index()?;
            let commit = Commit::new(tree, vec![head, theirs], env.identity(repo), message);
            let id = repo.write_commit(&commit)?;
            repo.advance_head(&id)?;
            ws.record_reflog(format!("merge {}: Merge made by the 'ort' strategy.", label));
            Ok("Merge made by the 'ort' strategy.".to_string())
        }
    }
}
