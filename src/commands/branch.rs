use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::object::short_id;
use crate::core::refs::{branch_ref, Head};
use crate::core::repository::Repository;
use crate::core::store::is_valid_ref_name;
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "branch", about = "List, create, rename, or delete branches")]
pub struct BranchOptions {
    /// Branch to create, or the new name with -m
    name: Option<String>,
    /// Commit the new branch starts at, or the new name with `-m old new`
    start_point: Option<String>,
    /// List both local and remote-tracking branches
    #[arg(short = 'a', long = "all")]
    all: bool,
    /// List remote-tracking branches only
    #[arg(short = 'r', long = "remotes")]
    remotes: bool,
    /// Delete a fully merged branch
    #[arg(short = 'd', long = "delete", value_name = "BRANCH", conflicts_with = "force_delete")]
    delete: Option<String>,
    /// Delete a branch even if it is not merged
    #[arg(short = 'D', value_name = "BRANCH")]
    force_delete: Option<String>,
    /// Rename a branch
    #[arg(short = 'm', long = "move")]
    rename: bool,
}

pub enum BranchPlan {
    List(String),
    Create {
        root: PathBuf,
        name: String,
        target: String,
    },
    Delete {
        root: PathBuf,
        name: String,
        old: String,
    },
    Rename {
        root: PathBuf,
        old: String,
        new: String,
        /// Tip of the branch; `None` when renaming the current unborn branch.
        target: Option<String>,
        current: bool,
    },
}

pub struct BranchCmd;

impl Command for BranchCmd {
    type Options = BranchOptions;
    type Plan = BranchPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<BranchOptions>> {
        parse_with_clap("branch", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: BranchOptions) -> CommandResult<BranchPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        if let Some(name) = opts.delete.as_deref().or(opts.force_delete.as_deref()) {
            return plan_delete(repo, root, name, opts.force_delete.is_some());
        }
        if opts.rename {
            return plan_rename(repo, root, opts.name, opts.start_point);
        }
        match opts.name {
            Some(name) => {
                let target = start_point(repo, opts.start_point.as_deref())?;
                validate_new_branch(repo, &name)?;
                Ok(BranchPlan::Create { root, name, target })
            }
            None => Ok(BranchPlan::List(list(repo, opts.all, opts.remotes)?)),
        }
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: BranchPlan) -> CommandResult<String> {
        match plan {
            BranchPlan::List(out) => Ok(out),
            BranchPlan::Create { root, name, target } => {
                let (repo, _) = repo_mut(ws, &root)?;
                repo.set_ref(&branch_ref(&name), &target)?;
                Ok(String::new())
            }
            BranchPlan::Delete { root, name, old } => {
                let (repo, _) = repo_mut(ws, &root)?;
                repo.delete_ref(&branch_ref(&name))?;
                let config = repo.config_mut();
                config.remove(&format!("branch.{}.remote", name));
                config.remove(&format!("branch.{}.merge", name));
                Ok(format!("Deleted branch {} (was {}).", name, short_id(&old)))
            }
            BranchPlan::Rename {
                root,
                old,
                new,
                target,
                current,
            } => {
                let (repo, _) = repo_mut(ws, &root)?;
                if let Some(target) = &target {
                    repo.set_ref(&branch_ref(&new), target)?;
                    repo.delete_ref(&branch_ref(&old))?;
                }
                if current {
                    repo.set_head_branch(&new)?;
                }
                let config = repo.config_mut();
                for key in ["remote", "merge"] {
                    if let Some(value) = config.remove(&format!("branch.{}.{}", old, key)) {
                        config.set(&format!("branch.{}.{}", new, key), &value);
                    }
                }
                ws.record_reflog(format!(
                    "Branch: renamed {} to {}",
                    branch_ref(&old),
                    branch_ref(&new)
                ));
                Ok(String::new())
            }
        }
    }
}

/// Checks that `name` can be created as a new local branch.
pub fn validate_new_branch(repo: &Repository, name: &str) -> CommandResult<()> {
    if !is_valid_ref_name(name) {
        return Err(CommandError::fatal(format!(
            "fatal: '{}' is not a valid branch name",
            name
        )));
    }
    if repo.branch_tip(name)?.is_some() {
        return Err(CommandError::fatal(format!(
            "fatal: a branch named '{}' already exists",
            name
        )));
    }
    Ok(())
}

/// Commit a new branch or tag starts at: `rev` if given, else HEAD.
pub fn start_point(repo: &Repository, rev: Option<&str>) -> CommandResult<String> {
    let rev_name = match rev {
        Some(rev) => rev.to_string(),
        None => match repo.head()? {
            Head::Branch(name) => name,
            Head::Detached(_) => "HEAD".to_string(),
        },
    };
    let resolved = match rev {
        Some(rev) => repo.resolve_revision(rev)?,
        None => repo.head_commit()?,
    };
    resolved.ok_or_else(|| {
        CommandError::fatal(format!("fatal: not a valid object name: '{}'", rev_name))
    })
}

fn plan_delete(repo: &Repository, root: PathBuf, name: &str, force: bool) -> CommandResult<BranchPlan> {
    let old = repo
        .branch_tip(name)?
        .ok_or_else(|| CommandError::fatal(format!("error: branch '{}' not found.", name)))?;
    if repo.current_branch()?.as_deref() == Some(name) {
        return Err(CommandError::fatal(format!(
            "error: Cannot delete branch '{}' checked out at '{}'",
            name,
            root.display()
        )));
    }
    if !force {
        let merged = match repo.head_commit()? {
            Some(head) => repo.is_ancestor(&old, &head)?,
            None => false,
        };
        if !merged {
            return Err(CommandError::fatal(format!(
                "error: The branch '{}' is not fully merged.\n\
                 If you are sure you want to delete it, run 'git branch -D {}'.",
                name, name
            )));
        }
    }
    Ok(BranchPlan::Delete {
        root,
        name: name.to_string(),
        old,
    })
}

fn plan_rename(
    repo: &Repository,
    root: PathBuf,
    first: Option<String>,
    second: Option<String>,
) -> CommandResult<BranchPlan> {
    let current = repo.current_branch()?;
    let (old, new) = match (first, second) {
        (Some(old), Some(new)) => (old, new),
        (Some(new), None) => match current.clone() {
            Some(old) => (old, new),
            None => return Err(CommandError::fatal("fatal: cannot rename the current branch while not on any.")),
        },
        (None, _) => return Err(CommandError::fatal("fatal: branch name required")),
    };

    let is_current = current.as_deref() == Some(old.as_str());
    let target = repo.branch_tip(&old)?;
    if target.is_none() && !is_current {
        return Err(CommandError::fatal(format!(
            "error: refname {} not found\nfatal: Branch rename failed",
            branch_ref(&old)
        )));
    }
    validate_new_branch(repo, &new)?;
    Ok(BranchPlan::Rename {
        root,
        old,
        new,
        target,
        current: is_current,
    })
}

fn list(repo: &Repository, all: bool, remotes_only: bool) -> CommandResult<String> {
    let mut lines = Vec::new();
    let head = repo.head()?;

    if !remotes_only {
        if let Head::Detached(id) = &head {
            lines.push(format!("* (HEAD detached at {})", short_id(id)));
        }
        for name in repo.branches()?.keys() {
            let marker = if head.branch() == Some(name.as_str()) { '*' } else { ' ' };
            lines.push(format!("{} {}", marker, name));
        }
    }
    if all || remotes_only {
        let prefix = if remotes_only { "" } else { "remotes/" };
        for name in repo.remote_branches()?.keys() {
            lines.push(format!("  {}{}", prefix, name));
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commit::{Author, Commit};
    use crate::core::store::{MemoryStore, Store};
    use std::sync::Arc;

    fn repo_with_commit() -> (Repository, String) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut repo = Repository::init(PathBuf::from("/p"), store, "main").unwrap();
        let tree = repo.write_tree_from_index().unwrap();
        let id = repo
            .write_commit(&Commit::new(tree, vec![], Author::new("T", "t@x"), "root".into()))
            .unwrap();
        repo.advance_head(&id).unwrap();
        (repo, id)
    }

    #[test]
    fn new_branch_names_are_checked() {
        let (repo, _) = repo_with_commit();
        assert!(validate_new_branch(&repo, "feature/x").is_ok());
        assert!(validate_new_branch(&repo, "main").is_err());
        assert!(validate_new_branch(&repo, "bad..name").is_err());
        assert!(validate_new_branch(&repo, "-x").is_err());
    }

    #[test]
    fn start_point_defaults_to_head() {
        let (repo, id) = repo_with_commit();
        assert_eq!(start_point(&repo, None).unwrap(), id);
        assert!(start_point(&repo, Some("nope")).is_err());
    }

    #[test]
    fn the_current_branch_cannot_be_deleted() {
        let (repo, _) = repo_with_commit();
        let err = plan_delete(&repo, PathBuf::from("/p"), "main", true).err().unwrap();
        assert!(err.to_string().contains("Cannot delete branch 'main'"));
    }

    #[test]
    fn listing_marks_the_current_branch() {
        let (mut repo, id) = repo_with_commit();
        repo.set_ref(&branch_ref("dev"), &id).unwrap();
        assert_eq!(list(&repo, false, false).unwrap(), "  dev\n* main");
    }
}
