use super::{parse_with_clap, require_repo, Command, CommandEnv, Parsed};
use crate::core::commit::Commit;
use crate::core::object::short_id;
use crate::core::refs::Head;
use crate::core::repository::Repository;
use crate::error::{CommandError, CommandResult};
use crate::graph::reachable_from;
use crate::session::Workspace;
use clap::Parser;
use std::collections::HashMap;

#[derive(Parser, Debug)]
#[command(name = "log", about = "Show commit logs")]
pub struct LogOptions {
    /// Revision to start from (defaults to HEAD)
    revision: Option<String>,
    /// One line per commit
    #[arg(long)]
    oneline: bool,
    /// Limit the number of commits shown
    #[arg(short = 'n', long = "max-count", value_name = "NUMBER")]
    max_count: Option<usize>,
    /// Start from every ref instead of HEAD
    #[arg(long)]
    all: bool,
}

pub struct Log;

impl Command for Log {
    type Options = LogOptions;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<LogOptions>> {
        parse_with_clap("log", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: LogOptions) -> CommandResult<String> {
        let repo = require_repo(ws)?;

        let seeds = if opts.all {
            repo.ref_tips()?
        } else if let Some(rev) = &opts.revision {
            let id = repo.resolve_revision(rev)?.ok_or_else(|| {
                CommandError::fatal(format!(
                    "fatal: ambiguous argument '{}': unknown revision or path not in the working tree.",
                    rev
                ))
            })?;
            vec![id]
        } else {
            match repo.head_commit()? {
                Some(id) => vec![id],
                None => {
                    let branch = repo.current_branch()?.unwrap_or_default();
                    return Err(CommandError::fatal(format!(
                        "fatal: your current branch '{}' does not have any commits yet",
                        branch
                    )));
                }
            }
        };

        let decorations = decorations(repo)?;
        let ids = reachable_from(repo, &seeds)?;
        let limit = opts.max_count.unwrap_or(usize::MAX);

        let mut entries = Vec::new();
        for id in ids.into_iter().take(limit) {
            let commit = repo.read_commit(&id)?;
            let decoration = decorations
                .get(&id)
                .map(|labels| format!(" ({})", labels.join(", ")))
                .unwrap_or_default();
            entries.push(if opts.oneline {
                format!("{}{} {}", short_id(&id), decoration, commit.short_message())
            } else {
                full_entry(&id, &decoration, &commit)
            });
        }
        Ok(entries.join(if opts.oneline { "\n" } else { "\n\n" }))
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, log: String) -> CommandResult<String> {
        Ok(log)
    }
}

fn full_entry(id: &str, decoration: &str, commit: &Commit) -> String {
    let mut out = format!("commit {}{}\n", id, decoration);
    if commit.is_merge() {
        let parents: Vec<&str> = commit.parents.iter().map(|p| short_id(p)).collect();
        out.push_str(&format!("Merge: {}\n", parents.join(" ")));
    }
    out.push_str(&format!("Author: {}\n", commit.author.format_signature()));
    out.push_str(&format!(
        "Date:   {}\n\n",
        commit.author.timestamp.format("%a %b %e %H:%M:%S %Y %z")
    ));
    let body: Vec<String> = commit.message.trim_end().lines().map(|l| format!("    {}", l)).collect();
    out.push_str(&body.join("\n"));
    out
}

/// `HEAD -> main, origin/main, tag: v1` labels per commit, git-style.
fn decorations(repo: &Repository) -> CommandResult<HashMap<String, Vec<String>>> {
    let mut labels: HashMap<String, Vec<String>> = HashMap::new();
    let head = repo.head()?;
    let head_id = repo.head_commit()?;

    if let (Head::Detached(_), Some(id)) = (&head, &head_id) {
        labels.entry(id.clone()).or_default().push("HEAD".to_string());
    }
    for (name, id) in repo.branches()? {
        let label = if head.branch() == Some(name.as_str()) {
            format!("HEAD -> {}", name)
        } else {
            name
        };
        let entry = labels.entry(id).or_default();
        if label.starts_with("HEAD") {
            entry.insert(0, label);
        } else {
            entry.push(label);
        }
    }
    for (name, id) in repo.remote_branches()? {
        labels.entry(id).or_default().push(name);
    }
    for (name, id) in repo.tags()? {
        labels.entry(id).or_default().push(format!("tag: {}", name));
    }
    Ok(labels)
}
