//! The handful of shell builtins the sandbox terminal understands.
//!
//! These parse their arguments by hand the way a POSIX shell utility would
//! (`-p`, `-rf`) rather than through clap, and report errors in the
//! `<tool>: <operand>: <reason>` form.

use super::{Command, CommandEnv, Parsed};
use crate::core::fs::resolve_path;
use crate::error::{CommandError, CommandResult, FsError};
use crate::session::Workspace;
use std::path::PathBuf;

/// Split arguments: single-dash flag letters and operands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellArgs {
    flags: Vec<char>,
    operands: Vec<String>,
}

impl ShellArgs {
    fn has(&self, flag: char) -> bool {
        self.flags.contains(&flag)
    }
}

fn parse_args(tool: &str, usage: &str, allowed: &str, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
    let mut parsed = ShellArgs::default();
    let mut operands_only = false;
    for arg in args {
        if operands_only || !arg.starts_with('-') || arg == "-" {
            parsed.operands.push(arg.clone());
            continue;
        }
        match arg.as_str() {
            "--help" | "-h" => return Ok(Parsed::Help(usage.to_string())),
            "--" => operands_only = true,
            _ => {
                for flag in arg.chars().skip(1) {
                    if !allowed.contains(flag) {
                        return Err(CommandError::usage(format!(
                            "{}: invalid option -- '{}'\n{}",
                            tool, flag, usage
                        )));
                    }
                    parsed.flags.push(flag);
                }
            }
        }
    }
    Ok(Parsed::Run(parsed))
}

fn reason(err: &FsError) -> &'static str {
    match err {
        FsError::NotFound(_) => "No such file or directory",
        FsError::NotADirectory(_) => "Not a directory",
        FsError::IsADirectory(_) => "Is a directory",
        FsError::AlreadyExists(_) => "File exists",
        FsError::NotEmpty(_) => "Directory not empty",
    }
}

fn missing_operand(tool: &str) -> CommandError {
    CommandError::usage(format!("{}: missing operand", tool))
}

pub struct Ls;

impl Command for Ls {
    type Options = ShellArgs;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
        parse_args("ls", "usage: ls [-al] [path]...", "al", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ShellArgs) -> CommandResult<String> {
        let targets = if opts.operands.is_empty() {
            vec![".".to_string()]
        } else {
            opts.operands.clone()
        };
        let separator = if opts.has('l') { "\n" } else { "  " };
        let mut sections = Vec::new();
        for typed in &targets {
            let path = resolve_path(&ws.cwd, typed);
            if ws.fs.is_file(&path) {
                sections.push(typed.clone());
                continue;
            }
            let entries = ws.fs.read_dir(&path).map_err(|e| {
                CommandError::fatal(format!("ls: cannot access '{}': {}", typed, reason(&e)))
            })?;
            let names: Vec<String> = entries
                .into_iter()
                .map(|e| if e.is_dir { format!("{}/", e.name) } else { e.name })
                .collect();
            let listing = names.join(separator);
            sections.push(if targets.len() > 1 {
                format!("{}:\n{}", typed, listing)
            } else {
                listing
            });
        }
        Ok(sections.join("\n\n"))
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, out: String) -> CommandResult<String> {
        Ok(out)
    }
}

pub struct Cd;

impl Command for Cd {
    type Options = ShellArgs;
    type Plan = PathBuf;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
        parse_args("cd", "usage: cd [dir]", "", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ShellArgs) -> CommandResult<PathBuf> {
        let typed = match opts.operands.as_slice() {
            [] => "/",
            [one] => one.as_str(),
            _ => return Err(CommandError::usage("cd: too many arguments")),
        };
        let path = resolve_path(&ws.cwd, typed);
        if ws.fs.is_dir(&path) {
            return Ok(path);
        }
        let why = if ws.fs.exists(&path) {
            "Not a directory"
        } else {
            "No such file or directory"
        };
        Err(CommandError::fatal(format!("cd: {}: {}", typed, why)))
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, path: PathBuf) -> CommandResult<String> {
        ws.cwd = path;
        Ok(String::new())
    }
}

pub struct Pwd;

impl Command for Pwd {
    type Options = ShellArgs;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
        parse_args("pwd", "usage: pwd", "", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, _opts: ShellArgs) -> CommandResult<String> {
        Ok(ws.cwd.display().to_string())
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, out: String) -> CommandResult<String> {
        Ok(out)
    }
}

pub struct MkdirPlan {
    dirs: Vec<PathBuf>,
    parents: bool,
}

pub struct Mkdir;

impl Command for Mkdir {
    type Options = ShellArgs;
    type Plan = MkdirPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
        parse_args("mkdir", "usage: mkdir [-p] directory...", "p", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ShellArgs) -> CommandResult<MkdirPlan> {
        if opts.operands.is_empty() {
            return Err(missing_operand("mkdir"));
        }
        let parents = opts.has('p');
        let mut dirs = Vec::new();
        for typed in &opts.operands {
            let path = resolve_path(&ws.cwd, typed);
            let failure = if ws.fs.is_dir(&path) && parents {
                None
            } else if ws.fs.exists(&path) {
                Some("File exists")
            } else if !parents && !path.parent().is_some_and(|p| ws.fs.is_dir(p)) {
                Some("No such file or directory")
            } else if parents && blocked_by_file(ws, &path) {
                Some("Not a directory")
            } else {
                None
            };
            if let Some(why) = failure {
                return Err(CommandError::fatal(format!(
                    "mkdir: cannot create directory '{}': {}",
                    typed, why
                )));
            }
            dirs.push(path);
        }
        Ok(MkdirPlan { dirs, parents })
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: MkdirPlan) -> CommandResult<String> {
        for dir in &plan.dirs {
            if plan.parents {
                ws.fs.create_dir_all(dir)?;
            } else {
                ws.fs.create_dir(dir)?;
            }
        }
        Ok(String::new())
    }
}

/// Whether some ancestor of `path` is a regular file.
fn blocked_by_file(ws: &Workspace, path: &std::path::Path) -> bool {
    path.ancestors().skip(1).any(|p| ws.fs.is_file(p))
}

pub struct Touch;

impl Command for Touch {
    type Options = ShellArgs;
    type Plan = Vec<PathBuf>;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
        parse_args("touch", "usage: touch file...", "", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ShellArgs) -> CommandResult<Vec<PathBuf>> {
        if opts.operands.is_empty() {
            return Err(missing_operand("touch"));
        }
        let mut created = Vec::new();
        for typed in &opts.operands {
            let path = resolve_path(&ws.cwd, typed);
            if ws.fs.exists(&path) {
                continue;
            }
            if !path.parent().is_some_and(|p| ws.fs.is_dir(p)) {
                return Err(CommandError::fatal(format!(
                    "touch: cannot touch '{}': No such file or directory",
                    typed
                )));
            }
            created.push(path);
        }
        Ok(created)
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, paths: Vec<PathBuf>) -> CommandResult<String> {
        for path in paths {
            ws.fs.write(&path, Vec::new())?;
        }
        Ok(String::new())
    }
}

pub struct Cat;

impl Command for Cat {
    type Options = ShellArgs;
    type Plan = String;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
        parse_args("cat", "usage: cat file...", "", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ShellArgs) -> CommandResult<String> {
        if opts.operands.is_empty() {
            return Err(missing_operand("cat"));
        }
        let mut out = String::new();
        for typed in &opts.operands {
            let content = ws
                .fs
                .read(&resolve_path(&ws.cwd, typed))
                .map_err(|e| CommandError::fatal(format!("cat: {}: {}", typed, reason(&e))))?;
            out.push_str(&String::from_utf8_lossy(content));
        }
        Ok(out.strip_suffix('\n').unwrap_or(&out).to_string())
    }

    fn perform(&self, _ws: &mut Workspace, _env: &CommandEnv<'_>, out: String) -> CommandResult<String> {
        Ok(out)
    }
}

pub struct EchoPlan {
    text: String,
    redirect: Option<(PathBuf, bool)>,
}

/// `echo words… [> file | >> file]`. Only `-n` is recognised.
pub struct Echo;

impl Command for Echo {
    type Options = Vec<String>;
    type Plan = EchoPlan;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<Vec<String>>> {
        if args.len() == 1 && args[0] == "--help" {
            return Ok(Parsed::Help("usage: echo [-n] [string ...] [> file | >> file]".to_string()));
        }
        Ok(Parsed::Run(args.to_vec()))
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, args: Vec<String>) -> CommandResult<EchoPlan> {
        let (words, redirect) = match args.iter().position(|a| a == ">" || a == ">>") {
            Some(i) => {
                let target = match &args[i + 1..] {
                    [one] => one,
                    _ => return Err(CommandError::usage("syntax error near unexpected token `newline'")),
                };
                let path = resolve_path(&ws.cwd, target);
                if ws.fs.is_dir(&path) {
                    return Err(CommandError::fatal(format!("{}: Is a directory", target)));
                }
                if !path.parent().is_some_and(|p| ws.fs.is_dir(p)) {
                    return Err(CommandError::fatal(format!("{}: No such file or directory", target)));
                }
                (&args[..i], Some((path, args[i] == ">>")))
            }
            None => (&args[..], None),
        };

        let (newline, words) = match words.split_first() {
            Some((first, rest)) if first == "-n" => (false, rest),
            _ => (true, words),
        };
        let mut text = words.join(" ");
        if newline {
            text.push('\n');
        }
        Ok(EchoPlan { text, redirect })
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, plan: EchoPlan) -> CommandResult<String> {
        match plan.redirect {
            Some((path, true)) => {
                ws.fs.append(&path, plan.text.as_bytes())?;
                Ok(String::new())
            }
            Some((path, false)) => {
                ws.fs.write(&path, plan.text)?;
                Ok(String::new())
            }
            None => Ok(plan.text.trim_end_matches('\n').to_string()),
        }
    }
}

/// Shell `rm`. Removing a directory that holds a repository drops the
/// repository as well.
pub struct Remove;

impl Command for Remove {
    type Options = ShellArgs;
    type Plan = Vec<PathBuf>;

    fn parse(&self, args: &[String]) -> CommandResult<Parsed<ShellArgs>> {
        parse_args("rm", "usage: rm [-rf] file...", "rRf", args)
    }

    fn resolve(&self, ws: &Workspace, _env: &CommandEnv<'_>, opts: ShellArgs) -> CommandResult<Vec<PathBuf>> {
        if opts.operands.is_empty() {
            return Err(missing_operand("rm"));
        }
        let recursive = opts.has('r') || opts.has('R');
        let mut paths = Vec::new();
        for typed in &opts.operands {
            let path = resolve_path(&ws.cwd, typed);
            if !ws.fs.exists(&path) {
                if opts.has('f') {
                    continue;
                }
                return Err(CommandError::fatal(format!(
                    "rm: cannot remove '{}': No such file or directory",
                    typed
                )));
            }
            if ws.fs.is_dir(&path) && !recursive {
                return Err(CommandError::fatal(format!("rm: cannot remove '{}': Is a directory", typed)));
            }
            if ws.cwd.starts_with(&path) {
                return Err(CommandError::fatal(format!(
                    "rm: refusing to remove '{}': the current directory is inside it",
                    typed
                )));
            }
            paths.push(path);
        }
        Ok(paths)
    }

    fn perform(&self, ws: &mut Workspace, _env: &CommandEnv<'_>, paths: Vec<PathBuf>) -> CommandResult<String> {
        for path in paths {
            if ws.fs.is_dir(&path) {
                ws.fs.remove_all(&path)?;
                ws.repos.retain(|root, _| !root.starts_with(&path));
            } else {
                ws.fs.remove_file(&path)?;
            }
        }
        Ok(String::new())
    }
}
