use super::{
    matches_pathspec, parse_with_clap, pathspec, repo_mut, require_repo, require_root, Command,
    CommandEnv, Parsed,
};
use crate::core::index::Index;
use crate::core::object::short_id;
use crate::core::refs::{MERGE_HEAD, ORIG_HEAD};
use crate::core::tree::{FileEntry, FileMap};
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "reset", about = "Reset current HEAD to the specified state")]
#[command(group(ArgGroup::new("mode").args(["soft", "mixed", "hard"])))]
pub struct ResetOptions {
    /// Commit to reset to (defaults to HEAD)
    target: Option<String>,
    /// Move HEAD only
    #[arg(long)]
    soft: bool,
    /// Move HEAD and reset the index (default)
    #[arg(long)]
    mixed: bool,
    /// Move HEAD and reset the index and working tree
    #[arg(long)]
    hard: bool,
    /// Paths to unstage
    #[arg(last = true)]
    paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Soft,
    Mixed,
    Hard,
}

pub enum ResetPlan {
    Move {
        root: PathBuf,
        mode: Mode,
        old: Option<String>,
        target: String,
        label: String,
        files: FileMap,
    },
    /// Index entries to restore from HEAD (`None` removes the entry).
    Unstage {
        root: PathBuf,
        entries: Vec<(String, Option<FileEntry>)>,
    },
}

pub struct Reset;

impl Command for Reset {
    type Options = ResetOptions;
    type Plan = ResetPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ResetOptions>> {
        parse_with_clap("reset", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ResetOptions) -> CommandResult<ResetPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;
        let mode = if opts.soft {
            Mode::Soft
        } else if opts.hard {
            Mode::Hard
        } else {
            Mode::Mixed
        };

        let mut paths = opts.paths;
        let mut target = opts.target;
        // `git reset <file>`: a lone argument that is not a revision but
        // names a tracked path.
        if let Some(candidate) = target.as_deref() {
            if paths.is_empty() && repo.resolve_revision(candidate)?.is_none() {
                paths.push(candidate.to_string());
                target = None;
            }
        }

        if !paths.is_empty() {
            if mode != Mode::Mixed {
                return Err(CommandError::fatal(format!(
                    "fatal: Cannot do {} reset with paths.",
                    if mode == Mode::Soft { "soft" } else { "hard" }
                )));
            }
            let source = match target.as_deref() {
                Some(rev) => {
                    let id = repo.resolve_revision(rev)?.ok_or_else(|| {
                        CommandError::fatal(format!("fatal: ambiguous argument '{}': unknown revision", rev))
                    })?;
                    repo.commit_files(Some(&id))?
                }
                None => repo.head_files()?,
            };
            let mut entries = Vec::new();
            for typed in &paths {
                let spec = pathspec(ws, &root, typed)?;
                let mut matched: Vec<&String> = source
                    .keys()
                    .chain(repo.index().entries.keys())
                    .filter(|p| matches_pathspec(&spec, p))
                    .collect();
                matched.sort();
                matched.dedup();
                if matched.is_empty() {
                    return Err(CommandError::fatal(format!(
                        "fatal: ambiguous argument '{}': unknown revision or path not in the working tree.",
                        typed
                    )));
                }
                entries.extend(matched.into_iter().map(|p| (p.clone(), source.get(p).cloned())));
            }
            return Ok(ResetPlan::Unstage { root, entries });
        }

        let label = target.unwrap_or_else(|| "HEAD".to_string());
        let old = repo.head_commit()?;
        let Some(id) = repo.resolve_revision(&label)? else {
            if old.is_none() && label == "HEAD" {
                // Unborn branch: all a reset can do is empty the index.
                let entries = repo.index().entries.keys().map(|p| (p.clone(), None)).collect();
                return Ok(ResetPlan::Unstage { root, entries });
            }
            return Err(CommandError::fatal(format!(
                "fatal: ambiguous argument '{}': unknown revision or path not in the working tree.",
                label
            )));
        };
        Ok(ResetPlan::Move {
            root,
            mode,
            old,
            files: repo.commit_files(Some(&id))?,
            target: id,
            label,
        })
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: ResetPlan) -> CommandResult<String> {
        match plan {
            ResetPlan::Unstage { root, entries } => {
                let (repo, _) = repo_mut(ws, &root)?;
                for (path, entry) in entries {
                    match entry {
                        Some(entry) => repo.index_mut().add_entry(path, entry.hash),
                        None => {
                            repo.index_mut().remove_entry(&path);
                        }
                    }
                }
                Ok(String::new())
            }
            ResetPlan::Move {
                root,
                mode,
                old,
                target,
                label,
                files,
            } => {
                let (repo, fs) = repo_mut(ws, &root)?;
                match mode {
                    Mode::Soft => {}
                    Mode::Mixed => *repo.index_mut() = Index::from_files(&files),
                    Mode::Hard => repo.force_worktree(fs, &files)?,
                }
                if mode != Mode::Soft {
                    repo.delete_ref(MERGE_HEAD)?;
                }
                if let Some(old) = &old {
                    repo.set_ref(ORIG_HEAD, old)?;
                }
                repo.advance_head(&target)?;

                let out = match mode {
                    Mode::Hard => format!(
                        "HEAD is now at {} {}",
                        short_id(&target),
                        repo.read_commit(&target)?.short_message()
                    ),
                    Mode::Mixed => {
                        let status = repo.status(fs)?;
                        if status.modified.is_empty() {
                            String::new()
                        } else {
                            let lines: Vec<String> = status
                                .modified
                                .iter()
                                .map(|p| format!("{}\t{}", status.files[p].trim(), p))
                                .collect();
                            format!("Unstaged changes after reset:\n{}", lines.join("\n"))
                        }
                    }
                    Mode::Soft => String::new(),
                };
                ws.record_reflog(format!("reset: moving to {}", label));
                Ok(out)
            }
        }
    }
}
