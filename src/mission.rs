//! Entry points for the mission runner: scripted setup of a session and
//! read-only checks against the result.

use crate::commands::Dispatcher;
use crate::core::fs::{relative_to, resolve_path};
use crate::core::repository::Repository;
use crate::error::CommandResult;
use crate::session::{Session, Workspace};
use parking_lot::RwLockReadGuard;
use regex::Regex;
use tracing::{debug, warn};

/// Resets `session` to an empty workspace and replays `commands` through
/// the dispatcher, exactly as if a user had typed them. Stops at the first
/// failing command.
pub fn load_context<S: AsRef<str>>(dispatcher: &Dispatcher, session: &Session, commands: &[S]) -> CommandResult<()> {
    session.write().reset();
    for line in commands {
        let line = line.as_ref();
        debug!(session = session.id(), command = line, "mission setup");
        dispatcher.execute(session, line)?;
    }
    Ok(())
}

/// Read accessors over a session, used to decide whether a mission's goal
/// has been met. Holds the session's read lock while alive.
pub struct Checks<'a> {
    ws: RwLockReadGuard<'a, Workspace>,
}

impl<'a> Checks<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { ws: session.read() }
    }

    fn repo(&self) -> Option<&Repository> {
        self.ws.current_repo()
    }

    pub fn has_no_conflicts(&self) -> bool {
        self.repo().map_or(true, |repo| !repo.index().has_conflicts())
    }

    /// Whether the message of the commit HEAD points at matches `pattern`.
    pub fn commit_message_matches(&self, pattern: &str) -> bool {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!(pattern, error = %e, "invalid commit message pattern");
                return false;
            }
        };
        let Some(repo) = self.repo() else {
            return false;
        };
        match repo.head_commit() {
            Ok(Some(id)) => repo
                .read_commit(&id)
                .map(|commit| re.is_match(&commit.message))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Whether the working-tree file at `path` (relative to the current
    /// directory) contains `needle`.
    pub fn file_contains(&self, path: &str, needle: &str) -> bool {
        self.ws
            .fs
            .read(&resolve_path(&self.ws.cwd, path))
            .map(|data| String::from_utf8_lossy(data).contains(needle))
            .unwrap_or(false)
    }

    /// Whether `path` (relative to the current directory) is in the index.
    pub fn is_tracked(&self, path: &str) -> bool {
        let Some(repo) = self.repo() else {
            return false;
        };
        let abs = resolve_path(&self.ws.cwd, path);
        relative_to(repo.root(), &abs).is_some_and(|rel| repo.index().contains(&rel))
    }

    pub fn is_clean(&self) -> bool {
        self.repo()
            .and_then(|repo| repo.status(&self.ws.fs).ok())
            .is_some_and(|status| status.is_clean())
    }

    pub fn branch_exists(&self, name: &str) -> bool {
        self.repo()
            .and_then(|repo| repo.branch_tip(name).ok())
            .flatten()
            .is_some()
    }

    pub fn current_branch_is(&self, name: &str) -> bool {
        self.repo()
            .and_then(|repo| repo.current_branch().ok())
            .flatten()
            .is_some_and(|branch| branch == name)
    }
}
