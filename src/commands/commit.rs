use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::commit::Commit;
use crate::core::index::Index;
use crate::core::object::{short_id, Object};
use crate::core::refs::{Head, MERGE_HEAD};
use crate::core::repository::Repository;
use crate::core::tree::FileMap;
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use crate::utils::diff::line_stats;
use clap::Parser;
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "commit", about = "Record changes to the repository")]
pub struct CommitOptions {
    /// Commit message; repeated messages become separate paragraphs
    #[arg(short = 'm', long = "message")]
    message: Vec<String>,
    /// Stage modified and deleted tracked files first
    #[arg(short = 'a', long = "all")]
    all: bool,
    /// Replace the tip of the current branch
    #[arg(long)]
    amend: bool,
    #[arg(long = "allow-empty")]
    allow_empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Root,
    Normal,
    Amend,
    Merge,
}

pub struct CommitPlan {
    root: PathBuf,
    /// Index the commit is written from, with `-a` changes applied.
    index: Index,
    /// Blobs `-a` needs written before the tree.
    blobs: Vec<Vec<u8>>,
    parents: Vec<String>,
    message: String,
    kind: Kind,
    summary: String,
}

pub struct CommitCmd;

impl Command for CommitCmd {
    type Options = CommitOptions;
    type Plan = CommitPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<CommitOptions>> {
        parse_with_clap("commit", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: CommitOptions) -> CommandResult<CommitPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        if repo.index().has_conflicts() {
            return Err(CommandError::fatal(
                "error: Committing is not possible because you have unmerged files.\n\
                 hint: Fix them up in the work tree, and then use 'git add/rm <file>'\n\
                 hint: as appropriate to mark resolution and make a commit.\n\
                 fatal: Exiting because of an unresolved conflict.",
            ));
        }

        let head = repo.head_commit()?;
        let merge_head = repo.ref_target(MERGE_HEAD)?;

        let (kind, parents, old_message) = if opts.amend {
            let head_id = head
                .clone()
                .ok_or_else(|| CommandError::fatal("fatal: You have nothing to amend."))?;
            let old = repo.read_commit(&head_id)?;
            (Kind::Amend, old.parents, Some(old.message))
        } else if let (Some(head_id), Some(merge_id)) = (head.clone(), merge_head.clone()) {
            (Kind::Merge, vec![head_id, merge_id], None)
        } else if let Some(head_id) = head.clone() {
            (Kind::Normal, vec![head_id], None)
        } else {
            (Kind::Root, Vec::new(), None)
        };

        let message = if opts.message.is_empty() {
            match (old_message, &merge_head) {
                (Some(old), _) => old,
                (None, Some(merge_id)) => format!("Merge commit '{}'", short_id(merge_id)),
                (None, None) => {
                    return Err(CommandError::fatal("Aborting commit due to empty commit message."))
                }
            }
        } else {
            opts.message.join("\n\n")
        };
        if message.trim().is_empty() {
            return Err(CommandError::fatal("Aborting commit due to empty commit message."));
        }

        let mut index = repo.index().clone();
        let mut blobs = Vec::new();
        if opts.all {
            let worktree = repo.worktree_files(&ws.fs);
            let tracked: Vec<String> = index.entries.keys().cloned().collect();
            for path in tracked {
                match worktree.get(&path) {
                    Some(content) => {
                        let blob = Object::blob(content.clone());
                        if index.get(&path).map(|e| e.hash.as_str()) != Some(blob.id().as_str()) {
                            index.add_entry(path, blob.id());
                            blobs.push(content.clone());
                        }
                    }
                    None => {
                        index.remove_entry(&path);
                    }
                }
            }
        }

        let new_files = index.to_files();
        let base_files = repo.commit_files(parents.first().map(String::as_str))?;
        let unchanged = new_files == base_files;
        if unchanged && !opts.allow_empty && kind != Kind::Merge && kind != Kind::Amend {
            return Err(CommandError::Rejected(nothing_to_commit(repo, ws)?));
        }

        let summary = change_summary(repo, &base_files, &new_files, &index, &blobs)?;
        Ok(CommitPlan {
            root,
            index,
            blobs,
            parents,
            message,
            kind,
            summary,
        })
    }

    fn perform(&self, ws: &mut Workspace, env: &CommandEnv<'_>, plan: CommitPlan) -> CommandResult<String> {
        let (repo, _) = repo_mut(ws, &plan.root)?;
        for blob in &plan.blobs {
            repo.write_blob(blob)?;
        }
        *repo.index_mut() = plan.index;

        let tree = repo.write_tree_from_index()?;
        let commit = Commit::new(tree, plan.parents, env.identity(repo), plan.message.clone());
        let id = repo.write_commit(&commit)?;
        repo.advance_head(&id)?;
        if plan.kind == Kind::Merge {
            repo.delete_ref(MERGE_HEAD)?;
        }

        let where_ = match repo.head()? {
            Head::Branch(name) => name,
            Head::Detached(_) => "detached HEAD".to_string(),
        };
        let label = match plan.kind {
            Kind::Root => " (root-commit)",
            _ => "",
        };
        let reflog_kind = match plan.kind {
            Kind::Root => "commit (initial)",
            Kind::Normal => "commit",
            Kind::Amend => "commit (amend)",
            Kind::Merge => "commit (merge)",
        };
        let first_line = commit.short_message();
        ws.record_reflog(format!("{}: {}", reflog_kind, first_line));

        let mut out = format!("[{}{} {}] {}", where_, label, short_id(&id), first_line);
        if !plan.summary.is_empty() {
            out.push('\n');
            out.push_str(&plan.summary);
        }
        Ok(out)
    }
}

fn nothing_to_commit(repo: &Repository, ws: &Workspace) -> CommandResult<String> {
    let status = repo.status(&ws.fs)?;
    let head_line = match repo.head()? {
        Head::Branch(name) => format!("On branch {}", name),
        Head::Detached(id) => format!("HEAD detached at {}", short_id(&id)),
    };
    let tail = if !status.modified.is_empty() {
        "no changes added to commit (use \"git add\" and/or \"git commit -a\")"
    } else if !status.untracked.is_empty() {
        "nothing added to commit but untracked files present (use \"git add\" to track)"
    } else {
        "nothing to commit, working tree clean"
    };
    Ok(format!("{}\n{}", head_line, tail))
}

/// ` N files changed, X insertions(+), Y deletions(-)` plus create/delete
/// mode lines, the way git reports a new commit.
fn change_summary(
    repo: &Repository,
    before: &FileMap,
    after: &FileMap,
    index: &Index,
    pending: &[Vec<u8>],
) -> CommandResult<String> {
    let pending_by_id: std::collections::HashMap<String, &Vec<u8>> = pending
        .iter()
        .map(|content| (Object::blob(content.clone()).id(), content))
        .collect();
    let read = |id: &str| -> CommandResult<Vec<u8>> {
        match pending_by_id.get(id) {
            Some(content) => Ok((*content).clone()),
            None => Ok(repo.read_blob(id)?),
        }
    };

    let paths: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    let (mut files, mut insertions, mut deletions) = (0, 0, 0);
    let mut modes = Vec::new();
    for path in paths {
        let old = before.get(path).map(|e| e.hash.as_str());
        let new = after.get(path).map(|e| e.hash.as_str());
        if old == new {
            continue;
        }
        files += 1;
        let old_content = old.map(|id| read(id)).transpose()?;
        let new_content = new.map(|id| read(id)).transpose()?;
        let (ins, del) = line_stats(old_content.as_deref(), new_content.as_deref());
        insertions += ins;
        deletions += del;
        match (old, new) {
            (None, Some(_)) => {
                let mode = index.get(path).map(|e| e.mode.as_str()).unwrap_or("100644");
                modes.push(format!(" create mode {} {}", mode, path));
            }
            (Some(_), None) => modes.push(format!(" delete mode 100644 {}", path)),
            _ => {}
        }
    }
    if files == 0 {
        return Ok(String::new());
    }

    let mut line = format!(" {} file{} changed", files, plural(files));
    if insertions > 0 || deletions == 0 {
        line.push_str(&format!(", {} insertion{}(+)", insertions, plural(insertions)));
    }
    if deletions > 0 || insertions == 0 {
        line.push_str(&format!(", {} deletion{}(-)", deletions, plural(deletions)));
    }
    modes.insert(0, line);
    Ok(modes.join("\n"))
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
