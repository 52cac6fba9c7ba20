use super::merge::{apply_merge, plan_merge};
use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::refs::{HEADS_PREFIX, ORIGIN};
use crate::error::{CommandError, CommandResult};
use crate::remote::sync::{apply_fetch, find_remote, plan_fetch, FetchPlan};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pull", about = "Fetch from the shared repository and merge into the current branch")]
pub struct PullOptions {
    /// Remote to pull from
    #[arg(default_value = ORIGIN)]
    remote: String,
    /// Remote branch to merge (defaults to the current branch's upstream)
    branch: Option<String>,
    /// Always create a merge commit
    #[arg(long = "no-ff")]
    no_ff: bool,
}

pub struct PullPlan {
    root: PathBuf,
    fetch: FetchPlan,
    /// Remote branch merged after the fetch.
    branch: String,
    no_ff: bool,
}

/// Fetch, then merge `origin/<branch>`. The fetch stays applied even when
/// the merge that follows is refused.
pub struct Pull;

impl Command for Pull {
    type Options = PullOptions;
    type Plan = PullPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<PullOptions>> {
        parse_with_clap("pull", args)
    }

    fn resolve(&self, ws: &Workspace, env: &CommandEnv<'_>, opts: PullOptions) -> CommandResult<PullPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        let current = repo.current_branch()?.ok_or_else(|| {
            CommandError::fatal(
                "You are not currently on a branch.\n\
                 Please specify which branch you want to merge with.",
            )
        })?;
        let branch = match opts.branch {
            Some(branch) => branch,
            None => repo
                .config()
                .get(&format!("branch.{}.merge", current))
                .map(|merge| merge.trim_start_matches(HEADS_PREFIX).to_string())
                .unwrap_or_else(|| current.clone()),
        };

        let remote = find_remote(repo, env.remotes, &opts.remote)?;
        let fetch = plan_fetch(repo, remote)?;
        if fetch.tracking_tip(repo, &branch)?.is_none() {
            return Err(CommandError::fatal(format!("fatal: couldn't find remote ref {}", branch)));
        }
        Ok(PullPlan {
            root,
            fetch,
            branch,
            no_ff: opts.no_ff,
        })
    }

    fn perform(&self, ws: &mut Workspace, env: &CommandEnv<'_>, plan: PullPlan) -> CommandResult<String> {
        let (repo, _) = repo_mut(ws, &plan.root)?;
        let fetched = apply_fetch(repo, &plan.fetch)?;
        let label = format!("{}/{}", ORIGIN, plan.branch);
        let tip = plan
            .fetch
            .tracking_tip(repo, &plan.branch)?
            .ok_or_else(|| CommandError::fatal(format!("fatal: couldn't find remote ref {}", plan.branch)))?;

        let merge = plan_merge(ws, plan.root.clone(), &tip, &label, plan.no_ff, None)?;
        let merged = apply_merge(ws, env, merge)?;
        Ok([fetched, merged]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
