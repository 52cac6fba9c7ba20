use super::{parse_with_clap, Command, CommandEnv, Parsed};
use crate::core::fs::resolve_path;
use crate::core::refs::DEFAULT_BRANCH;
use crate::core::repository::Repository;
use crate::core::store::{MemoryStore, Store};
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "init", about = "Create an empty repository or reinitialize an existing one")]
pub struct InitOptions {
    /// Directory to initialize (created if missing)
    directory: Option<String>,
    /// Name of the initial branch
    #[arg(short = 'b', long = "initial-branch")]
    initial_branch: Option<String>,
}

pub struct InitPlan {
    target: PathBuf,
    branch: String,
    existing: bool,
}

pub struct Init;

impl Command for Init {
    type Options = InitOptions;
    type Plan = InitPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<InitOptions>> {
        parse_with_clap("init", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: InitOptions) -> CommandResult<InitPlan> {
        let target = resolve_path(&ws.cwd, opts.directory.as_deref().unwrap_or("."));
        if ws.fs.is_file(&target) {
            return Err(CommandError::fatal(format!(
                "fatal: cannot mkdir {}: File exists",
                target.display()
            )));
        }
        let branch = opts.initial_branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        if !crate::core::store::is_valid_ref_name(&branch) {
            return Err(CommandError::fatal(format!(
                "fatal: invalid initial branch name: '{}'",
                branch
            )));
        }
        Ok(InitPlan {
            existing: ws.repos.contains_key(&target),
            target,
            branch,
        })
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: InitPlan) -> CommandResult<String> {
        if plan.existing {
            return Ok(format!(
                "Reinitialized existing Git repository in {}/.git/",
                display_root(&plan.target)
            ));
        }

        ws.fs.create_dir_all(&plan.target)?;
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let repo = Repository::init(plan.target.clone(), store, &plan.branch)?;
        ws.repos.insert(plan.target.clone(), repo);
        info!(root = %plan.target.display(), "initialized repository");

        Ok(format!(
            "Initialized empty Git repository in {}/.git/",
            display_root(&plan.target)
        ))
    }
}

fn display_root(path: &std::path::Path) -> String {
    let s = path.display().to_string();
    s.trim_end_matches('/').to_string()
}
