use super::checkout::{apply, branch_destination, plan_create, plan_move, plan_orphan, CheckoutPlan, Destination};
use super::{parse_with_clap, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "switch", about = "Switch branches")]
pub struct SwitchOptions {
    /// Branch to switch to, or start point with -c
    target: Option<String>,
    /// Create a new branch and switch to it
    #[arg(short = 'c', long = "create", value_name = "NEW_BRANCH")]
    create: Option<String>,
    /// Switch to a commit for inspection
    #[arg(short = 'd', long)]
    detach: bool,
    /// Create a new branch with no history
    #[arg(long, value_name = "NEW_BRANCH", conflicts_with = "create")]
    orphan: Option<String>,
    /// Throw away local changes
    #[arg(short = 'f', long = "force", alias = "discard-changes")]
    force: bool,
}

pub struct Switch;

impl Command for Switch {
    type Options = SwitchOptions;
    type Plan = CheckoutPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<SwitchOptions>> {
        parse_with_clap("switch", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: SwitchOptions) -> CommandResult<CheckoutPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        if let Some(branch) = opts.orphan {
            return plan_orphan(repo, root, branch);
        }
        if let Some(name) = opts.create {
            return plan_create(ws, repo, root, name, opts.target.as_deref(), opts.force);
        }

        let target = opts
            .target
            .ok_or_else(|| CommandError::fatal("fatal: missing branch or commit argument"))?;
        if opts.detach {
            let id = repo.resolve_revision(&target)?.ok_or_else(|| {
                CommandError::fatal(format!("fatal: invalid reference: {}", target))
            })?;
            return plan_move(ws, repo, root, Destination::Detached { id, typed: target }, opts.force);
        }
        if let Some(destination) = branch_destination(repo, &target)? {
            return plan_move(ws, repo, root, destination, opts.force);
        }
        if repo.resolve_revision(&target)?.is_some() {
            return Err(CommandError::fatal(format!(
                "fatal: a branch is expected, got '{}'\n\
                 hint: If you want to detach HEAD at the commit, try again with the --detach option.",
                target
            )));
        }
        Err(CommandError::fatal(format!("fatal: invalid reference: {}", target)))
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: CheckoutPlan) -> CommandResult<String> {
        apply(ws, plan)
    }
}
