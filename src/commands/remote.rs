use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::refs::remote_prefix;
use crate::error::{CommandError, CommandResult};
use crate::remote::slug;
use crate::session::Workspace;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "remote", about = "Manage the repository's remotes")]
pub struct RemoteOptions {
    /// Show URLs after names
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
    #[command(subcommand)]
    action: Option<RemoteAction>,
}

#[derive(Subcommand, Debug)]
pub enum RemoteAction {
    /// Add a remote
    Add { name: String, url: String },
    /// Remove a remote and its remote-tracking branches
    #[command(alias = "rm")]
    Remove { name: String },
    /// Print a remote's URL
    GetUrl { name: String },
}

pub enum RemotePlan {
    Show(String),
    Add { root: PathBuf, name: String, url: String },
    Remove { root: PathBuf, name: String, tracking: Vec<String> },
}

pub struct RemoteCmd;

impl Command for RemoteCmd {
    type Options = RemoteOptions;
    type Plan = RemotePlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<RemoteOptions>> {
        parse_with_clap("remote", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: RemoteOptions) -> CommandResult<RemotePlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;
        let url_of = |name: &str| repo.config().remote_url(name).cloned();

        match opts.action {
            Some(RemoteAction::Add { name, url }) => {
                if url_of(&name).is_some() {
                    return Err(CommandError::fatal(format!("error: remote {} already exists.", name)));
                }
                Ok(RemotePlan::Add { root, name, url })
            }
            Some(RemoteAction::Remove { name }) => {
                if url_of(&name).is_none() {
                    return Err(CommandError::fatal(format!("error: No such remote: '{}'", name)));
                }
                let tracking = repo
                    .list_refs(&remote_prefix(&name))?
                    .into_iter()
                    .map(|(full, _)| full)
                    .collect();
                Ok(RemotePlan::Remove { root, name, tracking })
            }
            Some(RemoteAction::GetUrl { name }) => url_of(&name)
                .map(RemotePlan::Show)
                .ok_or_else(|| CommandError::fatal(format!("error: No such remote '{}'", name))),
            None => {
                let mut lines = Vec::new();
                for (key, url) in repo.config().iter() {
                    let Some(name) = key.strip_prefix("remote.").and_then(|k| k.strip_suffix(".url")) else {
                        continue;
                    };
                    if opts.verbose {
                        lines.push(format!("{}\t{} (fetch)", name, url));
                        lines.push(format!("{}\t{} (push)", name, url));
                    } else {
                        lines.push(name.to_string());
                    }
                }
                Ok(RemotePlan::Show(lines.join("\n")))
            }
        }
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: RemotePlan) -> CommandResult<String> {
        match plan {
            RemotePlan::Show(out) => Ok(out),
            RemotePlan::Add { root, name, url } => {
                let (repo, _) = repo_mut(ws, &root)?;
                repo.config_mut().set(&format!("remote.{}.url", name), &url);
                Ok(String::new())
            }
            RemotePlan::Remove { root, name, tracking } => {
                let (repo, _) = repo_mut(ws, &root)?;
                for full in tracking {
                    repo.delete_ref(&full)?;
                }
                let config = repo.config_mut();
                config.remove(&format!("remote.{}.url", name));
                let upstreams: Vec<String> = config
                    .iter()
                    .filter(|(k, v)| k.starts_with("branch.") && k.ends_with(".remote") && **v == name)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in upstreams {
                    config.remove(&key);
                    config.remove(&format!("{}.merge", key.trim_end_matches(".remote")));
                }
                Ok(String::new())
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "remote-init", about = "Create an empty shared repository to clone from and push to")]
pub struct RemoteInitOptions {
    /// Name of the shared repository
    name: String,
}

/// Replaces the shared remote with a new empty one. The shared remote is
/// process-wide, so this affects every session.
pub struct RemoteInit;

impl Command for RemoteInit {
    type Options = RemoteInitOptions;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<RemoteInitOptions>> {
        parse_with_clap("remote-init", args)
    }

    fn resolve(&self, _ws: &Workspace, _env: &CommandEnv<'_>, opts: RemoteInitOptions) -> CommandResult<String> {
        let name = slug(&opts.name);
        if name != opts.name {
            return Err(CommandError::fatal(format!(
                "fatal: invalid remote name '{}' (try '{}')",
                opts.name, name
            )));
        }
        Ok(name)
    }

    fn perform(&self, _ws: &mut Workspace, env: &CommandEnv<'_>, name: String) -> CommandResult<String> {
        let remote = env.remotes.create_empty(&name)?;
        Ok(format!(
            "Initialized empty shared repository '{}' at {}",
            remote.name, remote.url
        ))
    }
}
