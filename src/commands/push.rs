use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::refs::ORIGIN;
use crate::error::{CommandError, CommandResult};
use crate::remote::sync::{apply_push, find_remote, plan_push, PushPlan, PushRequest};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "push", about = "Update the shared repository's branches")]
pub struct PushOptions {
    /// Remote to push to
    remote: Option<String>,
    /// Branch to push (defaults to the current branch)
    branch: Option<String>,
    /// Allow a non-fast-forward update
    #[arg(short = 'f', long)]
    force: bool,
    /// Record the remote branch as the upstream of the local one
    #[arg(short = 'u', long = "set-upstream")]
    set_upstream: bool,
    /// Delete the remote branch
    #[arg(short = 'd', long)]
    delete: bool,
}

pub struct Push;

impl Command for Push {
    type Options = PushOptions;
    type Plan = (PathBuf, PushPlan);

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<PushOptions>> {
        parse_with_clap("push", args)
    }

    fn resolve(&self, ws: &Workspace, env: &CommandEnv<'_>, opts: PushOptions) -> CommandResult<(PathBuf, PushPlan)> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        let explicit = opts.remote.is_some();
        let remote_name = opts.remote.unwrap_or_else(|| ORIGIN.to_string());
        let branch = match opts.branch {
            Some(branch) => branch,
            None => {
                let current = repo.current_branch()?.ok_or_else(|| {
                    CommandError::fatal(
                        "fatal: You are not currently on a branch.\n\
                         To push the history leading to the current (detached HEAD)\n\
                         state now, use\n\n    git push origin HEAD:<name-of-remote-branch>",
                    )
                })?;
                let has_upstream = repo
                    .config()
                    .get(&format!("branch.{}.remote", current))
                    .is_some();
                if !explicit && !has_upstream && !opts.set_upstream {
                    return Err(CommandError::fatal(format!(
                        "fatal: The current branch {} has no upstream branch.\n\
                         To push the current branch and set the remote as upstream, use\n\n    \
                         git push --set-upstream origin {}",
                        current, current
                    )));
                }
                current
            }
        };

        let remote = find_remote(repo, env.remotes, &remote_name)?;
        let plan = plan_push(
            repo,
            remote,
            PushRequest {
                branch: &branch,
                force: opts.force,
                delete: opts.delete,
                set_upstream: opts.set_upstream,
            },
        )?;
        Ok((root, plan))
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, (root, plan): (PathBuf, PushPlan)) -> CommandResult<String> {
        let (repo, _) = repo_mut(ws, &root)?;
        apply_push(repo, &plan)
    }
}
