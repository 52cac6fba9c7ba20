use super::{
    matches_pathspec, parse_with_clap, pathspec, repo_mut, require_repo, require_root, Command,
    CommandEnv, Parsed,
};
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rm", about = "Remove files from the working tree and from the index")]
pub struct RmOptions {
    #[arg(required = true)]
    paths: Vec<String>,
    /// Only remove from the index
    #[arg(long)]
    cached: bool,
    /// Allow recursive removal when a directory is given
    #[arg(short = 'r')]
    recursive: bool,
}

pub struct RmPlan {
    root: PathBuf,
    paths: Vec<String>,
    cached: bool,
}

pub struct Rm;

impl Command for Rm {
    type Options = RmOptions;
    type Plan = RmPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<RmOptions>> {
        parse_with_clap("rm", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: RmOptions) -> CommandResult<RmPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        let mut paths = Vec::new();
        for typed in &opts.paths {
            let spec = pathspec(ws, &root, typed)?;
            let matched: Vec<String> = repo
                .index()
                .entries
                .keys()
                .filter(|p| matches_pathspec(&spec, p))
                .cloned()
                .collect();
            if matched.is_empty() {
                return Err(CommandError::fatal(format!(
                    "fatal: pathspec '{}' did not match any files",
                    typed
                )));
            }
            if !opts.recursive && !matched.iter().any(|p| *p == spec) {
                return Err(CommandError::fatal(format!(
                    "fatal: not removing '{}' recursively without -r",
                    typed
                )));
            }
            paths.extend(matched);
        }
        paths.sort();
        paths.dedup();

        Ok(RmPlan {
            root,
            paths,
            cached: opts.cached,
        })
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: RmPlan) -> CommandResult<String> {
        let (repo, fs) = repo_mut(ws, &plan.root)?;
        let mut out = Vec::new();
        for path in &plan.paths {
            repo.index_mut().remove_entry(path);
            if !plan.cached {
                let abs = repo.worktree_path(path);
                if fs.is_file(&abs) {
                    fs.remove_file(&abs)?;
                }
                if let Some(parent) = abs.parent() {
                    fs.prune_empty_dirs(parent, &plan.root);
                }
            }
            out.push(format!("rm '{}'", path));
        }
        Ok(out.join("\n"))
    }
}
