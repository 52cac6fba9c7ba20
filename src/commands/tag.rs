use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::object::short_id;
use crate::core::refs::tag_ref;
use crate::core::store::is_valid_ref_name;
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tag", about = "Create, list or delete lightweight tags")]
pub struct TagOptions {
    name: Option<String>,
    /// Commit to tag (defaults to HEAD)
    commit: Option<String>,
    /// Delete the named tag
    #[arg(short = 'd', long = "delete")]
    delete: bool,
    /// List tags
    #[arg(short = 'l', long = "list")]
    list: bool,
    /// Replace an existing tag
    #[arg(short = 'f', long = "force")]
    force: bool,
}

pub enum TagPlan {
    List(String),
    Create { root: PathBuf, name: String, target: String },
    Delete { root: PathBuf, name: String, old: String },
}

pub struct TagCmd;

impl Command for TagCmd {
    type Options = TagOptions;
    type Plan = TagPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<TagOptions>> {
        parse_with_clap("tag", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: TagOptions) -> CommandResult<TagPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        let name = match opts.name {
            Some(name) if !opts.list => name,
            _ => {
                let names: Vec<String> = repo.tags()?.into_keys().collect();
                return Ok(TagPlan::List(names.join("\n")));
            }
        };

        if opts.delete {
            let old = repo
                .tag_target(&name)?
                .ok_or_else(|| CommandError::fatal(format!("error: tag '{}' not found.", name)))?;
            return Ok(TagPlan::Delete { root, name, old });
        }

        if !is_valid_ref_name(&name) {
            return Err(CommandError::fatal(format!("fatal: '{}' is not a valid tag name.", name)));
        }
        if !opts.force && repo.tag_target(&name)?.is_some() {
            return Err(CommandError::fatal(format!("fatal: tag '{}' already exists", name)));
        }
        let rev = opts.commit.unwrap_or_else(|| "HEAD".to_string());
        let target = repo.resolve_revision(&rev)?.ok_or_else(|| {
            CommandError::fatal(format!("fatal: Failed to resolve '{}' as a valid ref.", rev))
        })?;
        Ok(TagPlan::Create { root, name, target })
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: TagPlan) -> CommandResult<String> {
        match plan {
            TagPlan::List(out) => Ok(out),
            TagPlan::Create { root, name, target } => {
                let (repo, _) = repo_mut(ws, &root)?;
                repo.set_ref(&tag_ref(&name), &target)?;
                Ok(String::new())
            }
            TagPlan::Delete { root, name, old } => {
                let (repo, _) = repo_mut(ws, &root)?;
                repo.delete_ref(&tag_ref(&name))?;
                Ok(format!("Deleted tag '{}' (was {})", name, short_id(&old)))
            }
        }
    }
}
