use super::{
    matches_pathspec, parse_with_clap, pathspec, repo_mut, require_repo, require_root, Command,
    CommandEnv, Parsed,
};
use crate::core::object::Object;
use crate::error::{CommandError, CommandResult};
use crate::session::Workspace;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "add", about = "Add file contents to the index")]
pub struct AddOptions {
    /// Files or directories to stage
    paths: Vec<String>,
    /// Stage every change in the working tree, including deletions
    #[arg(short = 'A', long = "all")]
    all: bool,
}

pub enum Staged {
    Content(Vec<u8>),
    Removed,
}

pub struct AddPlan {
    root: PathBuf,
    changes: BTreeMap<String, Staged>,
    nothing_specified: bool,
}

pub struct Add;

impl Command for Add {
    type Options = AddOptions;
    type Plan = AddPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<AddOptions>> {
        parse_with_clap("add", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: AddOptions) -> CommandResult<AddPlan> {
        let repo = require_repo(ws)?;
        let root = require_root(ws)?;

        // (repository-relative spec, as typed)
        let mut specs: Vec<(String, String)> = Vec::new();
        if opts.all {
            specs.push((String::new(), ".".to_string()));
        }
        for path in &opts.paths {
            specs.push((pathspec(ws, &root, path)?, path.clone()));
        }
        if specs.is_empty() {
            return Ok(AddPlan {
                root,
                changes: BTreeMap::new(),
                nothing_specified: true,
            });
        }

        let worktree = repo.worktree_files(&ws.fs);
        let mut changes = BTreeMap::new();
        for (spec, typed) in &specs {
            let mut matched = false;
            for (path, content) in worktree.iter().filter(|(p, _)| matches_pathspec(spec, p)) {
                matched = true;
                let unchanged = repo
                    .index()
                    .get(path)
                    .map_or(false, |e| e.stage == 0 && e.hash == Object::blob(content.clone()).id());
                if !unchanged {
                    changes.insert(path.clone(), Staged::Content(content.clone()));
                }
            }
            for path in repo.index().entries.keys().filter(|p| matches_pathspec(spec, p)) {
                matched = true;
                if !worktree.contains_key(path) {
                    changes.insert(path.clone(), Staged::Removed);
                }
            }
            if !matched && !ws.fs.is_dir(&root.join(spec)) {
                return Err(CommandError::fatal(format!(
                    "fatal: pathspec '{}' did not match any files",
                    typed
                )));
            }
        }

        Ok(AddPlan {
            root,
            changes,
            nothing_specified: false,
        })
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: AddPlan) -> CommandResult<String> {
        if plan.nothing_specified {
            return Ok("Nothing specified, nothing added.\nhint: Maybe you wanted to say 'git add .'?".to_string());
        }
        let (repo, _) = repo_mut(ws, &plan.root)?;
        for (path, change) in plan.changes {
            match change {
                Staged::Content(content) => {
                    let hash = repo.write_blob(&content)?;
                    repo.index_mut().add_entry(path, hash);
                }
                Staged::Removed => {
                    repo.index_mut().remove_entry(&path);
                }
            }
        }
        Ok(String::new())
    }
}
