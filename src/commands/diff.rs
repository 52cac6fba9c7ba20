use super::{matches_pathspec, parse_with_clap, pathspec, require_repo, require_root, Command, CommandEnv, Parsed};
use crate::core::repository::Repository;
use crate::core::tree::FileMap;
use crate::error::CommandResult;
use crate::session::Workspace;
use crate::utils::diff::file_diff;
use clap::Parser;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Parser, Debug)]
#[command(name = "diff", about = "Show changes between the index, the working tree and HEAD")]
pub struct DiffOptions {
    /// Compare the index with HEAD instead of the working tree with the index
    #[arg(long, visible_alias = "staged")]
    cached: bool,
    /// Limit the diff to these paths
    #[arg(last = true)]
    paths: Vec<String>,
}

pub struct Diff;

impl Command for Diff {
    type Options = DiffOptions;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<DiffOptions>> {
        parse_with_clap("diff", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: DiffOptions) -> CommandResult<String> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;
        let specs = opts
            .paths
            .iter()
            .map(|p| pathspec(ws, &root, p))
            .collect::<CommandResult<Vec<_>>>()?;

        let index = repo.index().to_files();
        let (old, new) = if opts.cached {
            (contents(repo, &repo.head_files()?)?, contents(repo, &index)?)
        } else {
            // Untracked files never show up in a plain diff.
            let worktree: BTreeMap<String, Vec<u8>> = repo
                .worktree_files(&ws.fs)
                .into_iter()
                .filter(|(path, _)| index.contains_key(path))
                .collect();
            (contents(repo, &index)?, worktree)
        };

        let paths: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        let mut out = String::new();
        for path in paths {
            if !specs.is_empty() && !specs.iter().any(|s| matches_pathspec(s, path)) {
                continue;
            }
            out.push_str(&file_diff(
                path,
                old.get(path).map(Vec::as_slice),
                new.get(path).map(Vec::as_slice),
            ));
        }
        Ok(out.trim_end().to_string())
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, diff: String) -> CommandResult<String> {
        Ok(diff)
    }
}

fn contents(repo: &Repository, files: &FileMap) -> CommandResult<BTreeMap<String, Vec<u8>>> {
    files
        .iter()
        .map(|(path, entry)| Ok((path.clone(), repo.read_blob(&entry.hash)?)))
        .collect()
}
