use super::{parse_with_clap, Command, CommandEnv, Parsed};
use crate::core::fs::resolve_path;
use crate::error::{CommandResult, RemoteError};
use crate::remote::sync::{apply_clone, plan_clone, ClonePlan};
use crate::session::Workspace;
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "clone", about = "Clone the shared repository into a new directory")]
pub struct CloneOptions {
    /// Name, URL or path of the shared repository
    repository: String,
    /// Directory to clone into (defaults to the repository name)
    directory: Option<String>,
}

pub struct CloneCmd;

impl Command for CloneCmd {
    type Options = CloneOptions;
    type Plan = ClonePlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<CloneOptions>> {
        parse_with_clap("clone", args)
    }

    fn resolve(&self, ws: &Workspace, env: &CommandEnv<'_>, opts: CloneOptions) -> CommandResult<ClonePlan> {
        let remote = env
            .remotes
            .lookup(&opts.repository)
            .ok_or_else(|| RemoteError::NoSuchRemote(opts.repository.clone()))?;
        let directory = opts.directory.unwrap_or_else(|| remote.name.clone());
        let root = resolve_path(&ws.cwd, &directory);
        plan_clone(remote, root, &ws.fs)
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: ClonePlan) -> CommandResult<String> {
        let (repo, out) = apply_clone(&mut ws.fs, &plan)?;
        ws.repos.insert(plan.root.clone(), repo);
        info!(root = %plan.root.display(), remote = %plan.remote.name, "cloned shared remote");
        Ok(out)
    }
}
