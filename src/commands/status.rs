use super::{parse_with_clap, require_repo, Command, CommandEnv, Parsed};
use crate::core::object::short_id;
use crate::core::refs::{remote_ref, Head, MERGE_HEAD};
use crate::core::repository::Repository;
use crate::core::status::Status;
use crate::error::CommandResult;
use crate::session::Workspace;
use clap::Parser;
use std::collections::HashSet;

#[derive(Parser, Debug)]
#[command(name = "status", about = "Show the working tree status")]
pub struct StatusOptions {
    /// Give the output in the short format
    #[arg(short = 's', long = "short")]
    short: bool,
    #[arg(long)]
    porcelain: bool,
}

pub struct StatusCmd;

impl Command for StatusCmd {
    type Options = StatusOptions;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<StatusOptions>> {
        parse_with_clap("status", args)
    }

    /// Status is read-only, so the rendered report is the whole plan.
    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: StatusOptions) -> CommandResult<String> {
        let repo = require_repo(ws)?;
        let status = repo.status(&ws.fs)?;
        if opts.short || opts.porcelain {
            return Ok(status
                .files
                .iter()
                .map(|(path, code)| format!("{} {}", code, path))
                .collect::<Vec<_>>()
                .join("\n"));
        }
        long_format(repo, &status)
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, report: String) -> CommandResult<String> {
        Ok(report)
    }
}

/// Commits on `a` not reachable from `b`, and the reverse.
pub fn ahead_behind(repo: &Repository, a: &str, b: &str) -> CommandResult<(usize, usize)> {
    let from_a: HashSet<String> = repo.reachable_commits(&[a.to_string()])?.into_iter().collect();
    let from_b: HashSet<String> = repo.reachable_commits(&[b.to_string()])?.into_iter().collect();
    Ok((from_a.difference(&from_b).count(), from_b.difference(&from_a).count()))
}

fn tracking_line(repo: &Repository, branch: &str) -> CommandResult<Option<String>> {
    let Some(remote) = repo.config().get(&format!("branch.{}.remote", branch)).cloned() else {
        return Ok(None);
    };
    let upstream = format!("{}/{}", remote, branch);
    let (Some(local), Some(theirs)) = (repo.branch_tip(branch)?, repo.ref_target(&remote_ref(&remote, branch))?) else {
        return Ok(Some(format!(
            "Your branch is based on '{}', but the upstream is gone.",
            upstream
        )));
    };
    let line = match ahead_behind(repo, &local, &theirs)? {
        (0, 0) => format!("Your branch is up to date with '{}'.", upstream),
        (ahead, 0) => format!(
            "Your branch is ahead of '{}' by {} commit{}.",
            upstream,
            ahead,
            if ahead == 1 { "" } else { "s" }
        ),
        (0, behind) => format!(
            "Your branch is behind '{}' by {} commit{}, and can be fast-forwarded.",
            upstream,
            behind,
            if behind == 1 { "" } else { "s" }
        ),
        (ahead, behind) => format!(
            "Your branch and '{}' have diverged,\nand have {} and {} different commits each, respectively.",
            upstream, ahead, behind
        ),
    };
    Ok(Some(line))
}

fn long_format(repo: &Repository, status: &Status) -> CommandResult<String> {
    let mut sections: Vec<String> = Vec::new();

    let mut header = match repo.head()? {
        Head::Branch(name) => {
            let mut h = format!("On branch {}", name);
            if let Some(line) = tracking_line(repo, &name)? {
                h.push('\n');
                h.push_str(&line);
            }
            h
        }
        Head::Detached(id) => format!("HEAD detached at {}", short_id(&id)),
    };
    if repo.head_commit()?.is_none() {
        header.push_str("\n\nNo commits yet");
    }
    if repo.ref_target(MERGE_HEAD)?.is_some() {
        header.push_str(if status.conflicted.is_empty() {
            "\nAll conflicts fixed but you are still merging.\n  (use \"git commit\" to conclude merge)"
        } else {
            "\nYou have unmerged paths.\n  (fix conflicts and run \"git commit\")\n  (use \"git merge --abort\" to abort the merge)"
        });
    }
    sections.push(header);

    let staged: Vec<String> = status
        .staged
        .iter()
        .map(|path| {
            let label = match status.files[path].chars().next() {
                Some('A') => "new file:",
                Some('D') => "deleted:",
                _ => "modified:",
            };
            format!("\t{:<12}{}", label, path)
        })
        .collect();
    if !staged.is_empty() {
        sections.push(format!(
            "Changes to be committed:\n  (use \"git restore --staged <file>...\" to unstage)\n{}",
            staged.join("\n")
        ));
    }

    if !status.conflicted.is_empty() {
        let lines: Vec<String> = status
            .conflicted
            .iter()
            .map(|path| format!("\t{:<17}{}", "both modified:", path))
            .collect();
        sections.push(format!(
            "Unmerged paths:\n  (use \"git add <file>...\" to mark resolution)\n{}",
            lines.join("\n")
        ));
    }

    let unstaged: Vec<String> = status
        .modified
        .iter()
        .map(|path| {
            let label = match status.files[path].chars().nth(1) {
                Some('D') => "deleted:",
                _ => "modified:",
            };
            format!("\t{:<12}{}", label, path)
        })
        .collect();
    if !unstaged.is_empty() {
        sections.push(format!(
            "Changes not staged for commit:\n  (use \"git add <file>...\" to update what will be committed)\n{}",
            unstaged.join("\n")
        ));
    }

    if !status.untracked.is_empty() {
        let lines: Vec<String> = status.untracked.iter().map(|p| format!("\t{}", p)).collect();
        sections.push(format!(
            "Untracked files:\n  (use \"git add <file>...\" to include in what will be committed)\n{}",
            lines.join("\n")
        ));
    }

    if staged.is_empty() && status.conflicted.is_empty() {
        let tail = if !unstaged.is_empty() {
            "no changes added to commit (use \"git add\" and/or \"git commit -a\")"
        } else if !status.untracked.is_empty() {
            "nothing added to commit but untracked files present (use \"git add\" to track)"
        } else if repo.head_commit()?.is_none() {
            "nothing to commit (create/copy files and use \"git add\" to track)"
        } else {
            "nothing to commit, working tree clean"
        };
        sections.push(tail.to_string());
    }

    Ok(sections.join("\n\n"))
}
