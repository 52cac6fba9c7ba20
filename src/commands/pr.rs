use super::{parse_with_clap, Command, CommandEnv, Parsed};
use crate::core::refs::{DEFAULT_BRANCH, ORIGIN};
use crate::error::{CommandError, CommandResult, RemoteError};
use crate::remote::sync::{find_remote, remote_refs};
use crate::remote::SharedRemote;
use crate::session::Workspace;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pr", about = "Open and list pull requests on the shared repository")]
pub struct PrOptions {
    #[command(subcommand)]
    action: PrAction,
}

#[derive(Subcommand, Debug)]
pub enum PrAction {
    /// Open a pull request
    Create {
        #[arg(long)]
        title: String,
        /// Branch with the changes
        #[arg(long)]
        head: String,
        /// Branch to merge into
        #[arg(long, default_value = DEFAULT_BRANCH)]
        base: String,
    },
    /// List open pull requests
    List,
}

pub enum PrPlan {
    List(String),
    Create {
        remote: Arc<SharedRemote>,
        title: String,
        head: String,
        base: String,
        author: String,
    },
}

pub struct Pr;

impl Command for Pr {
    type Options = PrOptions;
    type Plan = PrPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<PrOptions>> {
        parse_with_clap("pr", args)
    }

    fn resolve(&self, ws: &Workspace, env: &CommandEnv<'_>, opts: PrOptions) -> CommandResult<PrPlan> {
        let repo = ws.current_repo();
        let remote = match repo {
            Some(repo) if repo.config().remote_url(ORIGIN).is_some() => find_remote(repo, env.remotes, ORIGIN)?,
            _ => env
                .remotes
                .current()
                .ok_or_else(|| RemoteError::NoSuchRemote(ORIGIN.to_string()))?,
        };

        match opts.action {
            PrAction::List => {
                let lines: Vec<String> = remote
                    .pull_requests()
                    .iter()
                    .map(|pr| format!("#{}\t{}\t{} -> {}\t{}", pr.number, pr.title, pr.head, pr.base, pr.author))
                    .collect();
                if lines.is_empty() {
                    return Ok(PrPlan::List("no open pull requests".to_string()));
                }
                Ok(PrPlan::List(lines.join("\n")))
            }
            PrAction::Create { title, head, base } => {
                if title.trim().is_empty() {
                    return Err(CommandError::fatal("error: a title is required"));
                }
                if head == base {
                    return Err(CommandError::fatal(format!(
                        "error: head and base are the same branch '{}'",
                        head
                    )));
                }
                let branches = remote_refs(&remote)?.branches;
                for (role, branch) in [("head", &head), ("base", &base)] {
                    if !branches.contains_key(branch) {
                        return Err(CommandError::fatal(format!(
                            "error: {} branch '{}' does not exist on {}; push it first",
                            role, branch, remote.url
                        )));
                    }
                }
                let author = match repo {
                    Some(repo) => env.identity(repo).name,
                    None => env.settings.author_name.clone(),
                };
                Ok(PrPlan::Create {
                    remote,
                    title,
                    head,
                    base,
                    author,
                })
            }
        }
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, plan: PrPlan) -> CommandResult<String> {
        match plan {
            PrPlan::List(out) => Ok(out),
            PrPlan::Create {
                remote,
                title,
                head,
                base,
                author,
            } => {
                let pr = remote.open_pull_request(&title, &head, &base, &author);
                Ok(format!(
                    "Created pull request #{}: {} ({} -> {})\n{}/pull/{}",
                    pr.number,
                    pr.title,
                    pr.head,
                    pr.base,
                    remote.url.trim_end_matches(".git"),
                    pr.number
                ))
            }
        }
    }
}
