#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use vizgit::commands::Dispatcher;
use vizgit::error::CommandError;
use vizgit::graph::{self, GraphSnapshot};
use vizgit::remote::RemoteRegistry;
use vizgit::session::{Session, SessionManager};
use vizgit::settings::Settings;

/// A dispatcher with its own data directory plus a session manager.
pub struct Sandbox {
    pub dispatcher: Dispatcher,
    pub sessions: SessionManager,
    _data: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let data = TempDir::new().unwrap();
        let settings = Settings::with_data_dir(data.path());
        let dispatcher = Dispatcher::new(
            Arc::new(RemoteRegistry::new(data.path())),
            Arc::new(settings),
        );
        Self {
            dispatcher,
            sessions: SessionManager::new(),
            _data: data,
        }
    }

    pub fn session(&self, id: &str) -> Arc<Session> {
        self.sessions.get_or_create(id)
    }

    pub fn remotes(&self) -> &RemoteRegistry {
        self.dispatcher.remotes()
    }

    /// Runs each line, panicking with the command's error text on failure.
    pub fn run(&self, session: &Session, lines: &[&str]) -> String {
        let mut last = String::new();
        for line in lines {
            last = self
                .dispatcher
                .execute(session, line)
                .unwrap_or_else(|e| panic!("`{}` failed: {}", line, e));
        }
        last
    }

    pub fn fail(&self, session: &Session, line: &str) -> CommandError {
        match self.dispatcher.execute(session, line) {
            Ok(out) => panic!("`{}` unexpectedly succeeded: {}", line, out),
            Err(e) => e,
        }
    }
}

pub fn snapshot(session: &Session) -> GraphSnapshot {
    graph::build(&session.read(), false).unwrap()
}

pub fn messages(snapshot: &GraphSnapshot) -> Vec<String> {
    snapshot.commits.iter().map(|c| c.message.clone()).collect()
}

/// `/project` with one commit on main.
pub fn project_with_commit(sandbox: &Sandbox, session: &Session) {
    sandbox.run(
        session,
        &[
            "mkdir project",
            "cd project",
            "git init",
            "echo hello > README.md",
            "git add README.md",
            "git commit -m \"Initial commit\"",
        ],
    );
}
