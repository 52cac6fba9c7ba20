use super::{parse_with_clap, require_repo, Command, CommandEnv, Parsed};
use crate::core::object::short_id;
use crate::error::CommandResult;
use crate::session::Workspace;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "reflog", about = "Show where HEAD has been")]
pub struct ReflogOptions {
    /// Only `show` is supported
    #[arg(value_parser = ["show"])]
    action: Option<String>,
    #[arg(short = 'n', long = "max-count", value_name = "NUMBER")]
    max_count: Option<usize>,
}

pub struct Reflog;

impl Command for Reflog {
    type Options = ReflogOptions;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ReflogOptions>> {
        parse_with_clap("reflog", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ReflogOptions) -> CommandResult<String> {
        require_repo(ws)?;
        let lines: Vec<String> = ws
            .reflog
            .iter()
            .take(opts.max_count.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(i, entry)| format!("{} HEAD@{{{}}}: {}", short_id(&entry.commit), i, entry.description))
            .collect();
        Ok(lines.join("\n"))
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, out: String) -> CommandResult<String> {
        Ok(out)
    }
}
