use super::{parse_with_clap, repo_mut, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::config::is_valid_key;
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "config", about = "Get and set repository options")]
pub struct ConfigOptions {
    key: Option<String>,
    value: Option<String>,
    /// Print the value of a key
    #[arg(long)]
    get: bool,
    /// Remove a key
    #[arg(long, conflicts_with_all = ["get", "value"])]
    unset: bool,
    /// List every key
    #[arg(short = 'l', long = "list")]
    list: bool,
    /// Accepted for compatibility; all settings are per repository
    #[arg(long)]
    #[allow(dead_code)]
    global: bool,
    #[arg(long)]
    #[allow(dead_code)]
    local: bool,
}

pub enum ConfigPlan {
    Show(String),
    Set { root: PathBuf, key: String, value: String },
    Unset { root: PathBuf, key: String },
}

pub struct ConfigCmd;

impl Command for ConfigCmd {
    type Options = ConfigOptions;
    type Plan = ConfigPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ConfigOptions>> {
        parse_with_clap("config", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ConfigOptions) -> CommandResult<ConfigPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        if opts.list {
            let lines: Vec<String> = repo.config().iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            return Ok(ConfigPlan::Show(lines.join("\n")));
        }

        let key = opts
            .key
            .ok_or_else(|| CommandError::usage("usage: git config [<options>] <name> [<value>]"))?;
        if !is_valid_key(&key) {
            return Err(CommandError::fatal(format!("error: key does not contain a section: {}", key)));
        }

        if opts.unset {
            if repo.config().get(&key).is_none() {
                return Err(CommandError::Rejected(String::new()));
            }
            return Ok(ConfigPlan::Unset { root, key });
        }
        match opts.value {
            Some(value) if !opts.get => Ok(ConfigPlan::Set { root, key, value }),
            _ => match repo.config().get(&key) {
                Some(value) => Ok(ConfigPlan::Show(value.clone())),
                // git exits non-zero without printing anything.
                None => Err(CommandError::Rejected(String::new())),
            },
        }
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: ConfigPlan) -> CommandResult<String> {
        match plan {
            ConfigPlan::Show(out) => Ok(out),
            ConfigPlan::Set { root, key, value } => {
                let (repo, _) = repo_mut(ws, &root)?;
                repo.config_mut().set(&key, &value);
                Ok(String::new())
            }
            ConfigPlan::Unset { root, key } => {
                let (repo, _) = repo_mut(ws, &root)?;
                repo.config_mut().remove(&key);
                Ok(String::new())
            }
        }
    }
}
