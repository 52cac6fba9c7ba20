use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::refs::ORIGIN;
use crate::error::CommandResult;
use crate::remote::sync::{apply_fetch, find_remote, plan_fetch, FetchPlan};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fetch", about = "Download objects and refs from the shared repository")]
pub struct FetchOptions {
    /// Remote to fetch from
    #[arg(default_value = ORIGIN)]
    remote: String,
    /// Remove remote-tracking branches that no longer exist upstream
    /// (always done; accepted for compatibility)
    #[arg(short = 'p', long)]
    #[allow(dead_code)]
    prune: bool,
    #[arg(long)]
    #[allow(dead_code)]
    all: bool,
}

pub struct Fetch;

impl Command for Fetch {
    type Options = FetchOptions;
    type Plan = (PathBuf, FetchPlan);

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<FetchOptions>> {
        parse_with_clap("fetch", args)
    }

    fn resolve(&self, ws: &Workspace, env: &CommandEnv<'_>, opts: FetchOptions) -> CommandResult<(PathBuf, FetchPlan)> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;
        let remote = find_remote(repo, env.remotes, &opts.remote)?;
        Ok((root, plan_fetch(repo, remote)?))
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, (root, plan): (PathBuf, FetchPlan)) -> CommandResult<String> {
        let (repo, _) = repo_mut(ws, &root)?;
        apply_fetch(repo, &plan)
    }
}
