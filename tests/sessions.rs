mod common;

use common::{messages, project_with_commit, snapshot, Sandbox};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use vizgit::core::object::Object;
use vizgit::core::store::{MemoryStore, Store};
use vizgit::core::{HybridStore, Repository};
use vizgit::graph;

#[test]
fn concurrent_get_or_create_yields_one_session() {
    let sandbox = Arc::new(Sandbox::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sandbox = sandbox.clone();
            thread::spawn(move || sandbox.session("shared-id"))
        })
        .collect();
    let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    assert_eq!(sandbox.sessions.len(), 1);
}

#[test]
fn sessions_are_isolated() {
    let sandbox = Sandbox::new();
    let a = sandbox.session("a");
    let b = sandbox.session("b");
    project_with_commit(&sandbox, &a);

    assert_eq!(sandbox.run(&b, &["ls"]), "");
    assert!(common::snapshot(&b).commits.is_empty());
    assert_eq!(common::snapshot(&a).commits.len(), 1);
}

#[test]
fn hybrid_reads_fall_back_and_writes_stay_local() {
    let shared = Arc::new(MemoryStore::new());
    let only_shared = shared.write_object(&Object::blob(b"upstream".to_vec())).unwrap();
    let hybrid = HybridStore::new(MemoryStore::new(), shared.clone());

    assert!(hybrid.read_object(&only_shared).unwrap().is_some());
    assert!(hybrid.read_object(&"0".repeat(64)).unwrap().is_none());

    let local = hybrid.write_object(&Object::blob(b"session".to_vec())).unwrap();
    assert!(!shared.has_object(&local));
    assert_eq!(shared.object_count(), 1);
    assert_eq!(hybrid.object_ids().unwrap(), vec![local]);
}

#[test]
fn show_all_on_a_clone_does_not_leak_unfetched_history() {
    let sandbox = Sandbox::new();
    let owner = sandbox.session("owner");
    project_with_commit(&sandbox, &owner);
    sandbox.run(
        &owner,
        &[
            "git remote-init shared",
            "git remote add origin shared",
            "git push -u origin main",
        ],
    );

    let viewer = sandbox.session("viewer");
    sandbox.run(&viewer, &["git clone shared", "cd shared"]);

    // Pushed after the clone: in the shared pool, unknown to the viewer.
    sandbox.run(
        &owner,
        &["echo more >> README.md", "git commit -am \"Later work\"", "git push"],
    );

    let view = graph::build(&viewer.read(), true).unwrap();
    assert_eq!(common::messages(&view), vec!["Initial commit"]);

    let ws = viewer.read();
    let repo: &Repository = ws.current_repo().unwrap();
    assert!(repo.is_hybrid());
    assert!(repo.object_ids().unwrap().is_empty());
}

#[test]
fn installing_a_remote_replaces_the_previous_one() {
    let sandbox = Sandbox::new();
    let remotes = sandbox.remotes();

    let alpha = remotes.create_empty("alpha").unwrap();
    alpha.open_pull_request("Add docs", "docs", "main", "dev");
    let beta = remotes.create_empty("beta").unwrap();

    for key in [
        alpha.name.clone(),
        alpha.url.clone(),
        alpha.path.display().to_string(),
    ] {
        assert!(remotes.lookup(&key).is_none(), "{} still resolves", key);
    }
    for key in [beta.name.clone(), beta.url.clone(), beta.path.display().to_string()] {
        let found = remotes.lookup(&key).unwrap();
        assert!(Arc::ptr_eq(&found, &beta));
    }
    assert!(remotes.current().unwrap().pull_requests().is_empty());
}

/// A one-commit git repository at `dir` whose only commit says `message`.
fn git_upstream(dir: &Path, message: &str) {
    fs::create_dir_all(dir).unwrap();
    let repo = git2::Repository::init(dir).unwrap();
    let sig = git2::Signature::new("Up", "up@example.com", &git2::Time::new(1_650_000_000, 0)).unwrap();
    fs::write(dir.join("README.md"), format!("{}\n", message)).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("README.md")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]).unwrap();
}

fn history(remote: &vizgit::remote::SharedRemote) -> Vec<String> {
    messages(&graph::build_remote(remote).unwrap())
}

#[test]
fn ingesting_another_url_with_the_same_name_imports_it() {
    let upstreams = TempDir::new().unwrap();
    let first = upstreams.path().join("org-a/project");
    let second = upstreams.path().join("org-b/project");
    git_upstream(&first, "From org a");
    git_upstream(&second, "From org b");

    let sandbox = Sandbox::new();
    let remotes = sandbox.remotes();
    let a = remotes.ingest(first.to_str().unwrap()).unwrap();
    assert_eq!(history(&a), vec!["From org a"]);

    let b = remotes.ingest(second.to_str().unwrap()).unwrap();
    assert_eq!(b.name, "project");
    assert_ne!(b.path, a.path);
    assert_eq!(history(&b), vec!["From org b"]);
    assert!(Arc::ptr_eq(&remotes.lookup("project").unwrap(), &b));
    assert!(remotes.lookup(first.to_str().unwrap()).is_none());

    // Back to the first URL: its earlier import is picked up again.
    let again = remotes.ingest(first.to_str().unwrap()).unwrap();
    assert_eq!(again.path, a.path);
    assert_eq!(history(&again), vec!["From org a"]);

    let viewer = sandbox.session("viewer");
    sandbox.run(&viewer, &["git clone project", "cd project"]);
    assert_eq!(messages(&snapshot(&viewer)), vec!["From org a"]);
}

#[test]
fn ingesting_a_differently_named_url_replaces_the_remote() {
    let upstreams = TempDir::new().unwrap();
    let project = upstreams.path().join("org/project");
    let tool = upstreams.path().join("org/tool");
    git_upstream(&project, "Project start");
    git_upstream(&tool, "Tool start");

    let sandbox = Sandbox::new();
    let remotes = sandbox.remotes();
    remotes.ingest(project.to_str().unwrap()).unwrap();
    let live = remotes.ingest(tool.to_str().unwrap()).unwrap();

    assert_eq!(live.name, "tool");
    assert!(remotes.lookup("project").is_none());
    assert!(Arc::ptr_eq(&remotes.lookup("tool").unwrap(), &live));
    assert_eq!(history(&live), vec!["Tool start"]);
}

#[test]
fn recreating_the_remote_does_not_break_existing_clones() {
    let sandbox = Sandbox::new();
    let owner = sandbox.session("owner");
    project_with_commit(&sandbox, &owner);
    sandbox.run(
        &owner,
        &[
            "git remote-init shared",
            "git remote add origin shared",
            "git push -u origin main",
        ],
    );
    let old_path = sandbox.remotes().current().unwrap().path.clone();

    let viewer = sandbox.session("viewer");
    sandbox.run(&viewer, &["git clone shared", "cd shared"]);

    sandbox.run(&owner, &["git remote-init shared"]);
    let fresh = sandbox.remotes().current().unwrap();
    assert_ne!(fresh.path, old_path);
    assert!(history(&fresh).is_empty());

    assert_eq!(messages(&snapshot(&viewer)), vec!["Initial commit"]);
    assert!(sandbox.run(&viewer, &["git status"]).contains("nothing to commit"));
    assert_eq!(sandbox.run(&viewer, &["cat README.md"]), "hello");

    sandbox.run(&owner, &["git push -u origin main"]);
    assert_eq!(history(&sandbox.remotes().current().unwrap()), vec!["Initial commit"]);
}
