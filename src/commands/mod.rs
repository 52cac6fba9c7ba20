//! Command dispatch and the three-phase execution contract.
//!
//! Every command implements [`Command`]:
//!
//! 1. `parse` turns raw arguments into typed options without touching any
//!    state. `--help` short-circuits here.
//! 2. `resolve` reads the workspace through a shared borrow and produces a
//!    plan. All validation happens here, so a rejected command cannot have
//!    changed anything.
//! 3. `perform` applies the plan through a mutable borrow.
//!
//! The [`Dispatcher`] holds the session's write lock across all three.

pub mod add;
pub mod branch;
pub mod checkout;
pub mod clone;
pub mod commit;
pub mod config;
pub mod diff;
pub mod fetch;
pub mod init;
pub mod log;
pub mod merge;
pub mod pr;
pub mod pull;
pub mod push;
pub mod reflog;
pub mod remote;
pub mod reset;
pub mod rm;
pub mod shell;
pub mod status;
pub mod switch;
pub mod tag;

use crate::core::commit::Author;
use crate::core::fs::{relative_to, resolve_path, MemFs};
use crate::core::repository::Repository;
use crate::error::{CommandError, CommandResult};
use crate::remote::RemoteRegistry;
use crate::session::{Session, Workspace};
use crate::settings::Settings;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const NOT_A_REPO: &str = "fatal: not a git repository (or any of the parent directories): .git";

/// Outcome of the parse phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<O> {
    Run(O),
    /// `--help` was requested; the string is the usage text.
    Help(String),
}

/// Process-wide collaborators handed to every command.
pub struct CommandEnv<'a> {
    pub remotes: &'a RemoteRegistry,
    pub settings: &'a Settings,
}

impl CommandEnv<'_> {
    /// Commit identity: repository config first, then process settings.
    pub fn identity(&self, repo: &Repository) -> Author {
        Author::new(
            repo.config().user_name(&self.settings.author_name),
            repo.config().user_email(&self.settings.author_email),
        )
    }
}

pub trait Command: Send + Sync {
    type Options;
    type Plan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<Self::Options>>;

    fn resolve(
        &self,
        ws: &Workspace,
        env: &CommandEnv<'_>,
        opts: Self::Options,
    ) -> CommandResult<Self::Plan>;

    fn perform(
        &self,
        ws: &mut Workspace,
        env: &CommandEnv<'_>,
        plan: Self::Plan,
    ) -> CommandResult<String>;
}

/// Object-safe face of [`Command`], so handlers with different option and
/// plan types can share one table.
pub trait Handler: Send + Sync {
    fn run(&self, ws: &mut Workspace, env: &CommandEnv<'_>, args: &[String]) -> CommandResult<String>;
}

impl<C: Command> Handler for C {
    fn run(&self, ws: &mut Workspace, env: &CommandEnv<'_>, args: &[String]) -> CommandResult<String> {
        let opts = match self.parse(args)? {
            Parsed::Run(opts) => opts,
            Parsed::Help(usage) => return Ok(usage),
        };
        let plan = self.resolve(ws, env, opts)?;
        self.perform(ws, env, plan)
    }
}

/// Parses `args` with a clap-derived option struct. Help output becomes a
/// successful [`Parsed::Help`]; anything else clap rejects is a usage error.
pub fn parse_with_clap<T: clap::Parser>(name: &str, args: &[String]) -> CommandResult<Parsed<T>> {
    let argv = std::iter::once(format!("git {}", name)).chain(args.iter().cloned());
    match T::try_parse_from(argv) {
        Ok(opts) => Ok(Parsed::Run(opts)),
        Err(e) if e.kind() == clap::error::ErrorKind::DisplayHelp => {
            Ok(Parsed::Help(e.render().to_string().trim_end().to_string()))
        }
        Err(e) => Err(CommandError::Usage(e.render().to_string().trim_end().to_string())),
    }
}

/// Splits a command line into words. Handles single and double quotes,
/// backslash escapes outside single quotes, and unquoted `>`/`>>` as
/// separate words.
pub fn tokenize(line: &str) -> CommandResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err(CommandError::usage("unexpected EOF while looking for matching `''")),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(ch @ ('"' | '\\' | '$' | '`')) => current.push(ch),
                            Some('n') => current.push('\n'),
                            Some(ch) => {
                                current.push('\\');
                                current.push(ch);
                            }
                            None => return Err(CommandError::usage("unexpected EOF while looking for matching `\"'")),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err(CommandError::usage("unexpected EOF while looking for matching `\"'")),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(ch) = chars.next() {
                    current.push(ch);
                }
            }
            '>' => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
                if chars.peek() == Some(&'>') {
                    chars.next();
                    words.push(">>".to_string());
                } else {
                    words.push(">".to_string());
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

pub fn require_repo(ws: &Workspace) -> CommandResult<&Repository> {
    ws.current_repo().ok_or_else(|| CommandError::fatal(NOT_A_REPO))
}

pub fn require_root(ws: &Workspace) -> CommandResult<PathBuf> {
    ws.current_repo_root()
        .ok_or_else(|| CommandError::fatal(NOT_A_REPO))
}

/// Mutable access to the repository a plan was resolved against.
pub fn repo_mut<'a>(
    ws: &'a mut Workspace,
    root: &Path,
) -> CommandResult<(&'a mut Repository, &'a mut MemFs)> {
    ws.repo_and_fs_mut(root)
        .ok_or_else(|| CommandError::fatal(NOT_A_REPO))
}

/// Repository-relative form of a user-supplied path.
pub fn pathspec(ws: &Workspace, root: &Path, input: &str) -> CommandResult<String> {
    let abs = resolve_path(&ws.cwd, input);
    relative_to(root, &abs).ok_or_else(|| {
        CommandError::fatal(format!(
            "fatal: {}: '{}' is outside repository at '{}'",
            input,
            abs.display(),
            root.display()
        ))
    })
}

/// Whether repository-relative `path` is `spec` itself or lies beneath it.
pub fn matches_pathspec(spec: &str, path: &str) -> bool {
    spec.is_empty() || path == spec || path.starts_with(&format!("{}/", spec))
}

pub struct Dispatcher {
    git: HashMap<&'static str, Box<dyn Handler>>,
    shell: HashMap<&'static str, Box<dyn Handler>>,
    remotes: Arc<RemoteRegistry>,
    settings: Arc<Settings>,
}

impl Dispatcher {
    pub fn new(remotes: Arc<RemoteRegistry>, settings: Arc<Settings>) -> Self {
        let mut git: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();
        git.insert("init", Box::new(init::Init));
        git.insert("remote-init", Box::new(remote::RemoteInit));
        git.insert("add", Box::new(add::Add));
        git.insert("rm", Box::new(rm::Rm));
        git.insert("commit", Box::new(commit::CommitCmd));
        git.insert("status", Box::new(status::StatusCmd));
        git.insert("log", Box::new(log::Log));
        git.insert("reflog", Box::new(reflog::Reflog));
        git.insert("branch", Box::new(branch::BranchCmd));
        git.insert("checkout", Box::new(checkout::Checkout));
        git.insert("switch", Box::new(switch::Switch));
        git.insert("tag", Box::new(tag::TagCmd));
        git.insert("merge", Box::new(merge::Merge));
        git.insert("reset", Box::new(reset::Reset));
        git.insert("diff", Box::new(diff::Diff));
        git.insert("config", Box::new(config::ConfigCmd));
        git.insert("remote", Box::new(remote::RemoteCmd));
        git.insert("clone", Box::new(clone::CloneCmd));
        git.insert("fetch", Box::new(fetch::Fetch));
        git.insert("push", Box::new(push::Push));
        git.insert("pull", Box::new(pull::Pull));
        git.insert("pr", Box::new(pr::Pr));

        let mut shell: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();
        shell.insert("ls", Box::new(shell::Ls));
        shell.insert("cd", Box::new(shell::Cd));
        shell.insert("pwd", Box::new(shell::Pwd));
        shell.insert("mkdir", Box::new(shell::Mkdir));
        shell.insert("touch", Box::new(shell::Touch));
        shell.insert("cat", Box::new(shell::Cat));
        shell.insert("echo", Box::new(shell::Echo));
        shell.insert("rm", Box::new(shell::Remove));

        Self {
            git,
            shell,
            remotes,
            settings,
        }
    }

    pub fn remotes(&self) -> &Arc<RemoteRegistry> {
        &self.remotes
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Git subcommands this dispatcher knows, sorted.
    pub fn git_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.git.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Runs one command line against `session`, holding its write lock for
    /// the whole run.
    pub fn execute(&self, session: &Session, line: &str) -> CommandResult<String> {
        let words = tokenize(line)?;
        let Some((first, rest)) = words.split_first() else {
            return Ok(String::new());
        };

        let (handler, args) = if first == "git" {
            let Some((sub, args)) = rest.split_first() else {
                return Ok(format!(
                    "usage: git <command> [<args>]\n\nAvailable commands:\n   {}",
                    self.git_commands().join("\n   ")
                ));
            };
            let handler = self.git.get(sub.as_str()).ok_or_else(|| {
                CommandError::UnknownCommand(format!(
                    "git: '{}' is not a git command. See 'git --help'.",
                    sub
                ))
            })?;
            (handler, args)
        } else if let Some(handler) = self.shell.get(first.as_str()).or_else(|| self.git.get(first.as_str())) {
            (handler, rest)
        } else {
            return Err(CommandError::UnknownCommand(format!("{}: command not found", first)));
        };

        debug!(session = session.id(), command = %line, "dispatch");
        let env = CommandEnv {
            remotes: &self.remotes,
            settings: &self.settings,
        };
        let mut ws = session.write();
        handler.run(&mut ws, &env, args)
    }
}
