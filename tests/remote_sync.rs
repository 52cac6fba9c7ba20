mod common;

use common::{messages, project_with_commit, snapshot, Sandbox};
use vizgit::core::refs::Head;
use vizgit::error::CommandError;
use vizgit::graph;
use vizgit::session::Session;

/// `owner` publishes `/project` (two commits) as the shared remote `shared`;
/// `viewer` clones it into `/shared`.
fn published(sandbox: &Sandbox) -> (std::sync::Arc<Session>, std::sync::Arc<Session>) {
    let owner = sandbox.session("owner");
    project_with_commit(sandbox, &owner);
    sandbox.run(
        &owner,
        &[
            "echo usage >> README.md",
            "git commit -am \"Document usage\"",
            "git remote-init shared",
            "git remote add origin shared",
            "git push -u origin main",
        ],
    );
    let viewer = sandbox.session("viewer");
    let out = sandbox.run(&viewer, &["git clone shared"]);
    assert_eq!(out, "Cloning into 'shared'...");
    sandbox.run(&viewer, &["cd shared"]);
    (owner, viewer)
}

#[test]
fn clone_checks_out_the_default_branch() {
    let sandbox = Sandbox::new();
    let (_owner, viewer) = published(&sandbox);

    let view = snapshot(&viewer);
    assert_eq!(view.head, Some(Head::Branch("main".to_string())));
    assert_eq!(messages(&view), vec!["Document usage", "Initial commit"]);
    assert_eq!(view.remote_branches.keys().collect::<Vec<_>>(), vec!["origin/main"]);
    assert_eq!(sandbox.run(&viewer, &["cat README.md"]), "hello\nusage");
    assert!(view.status.is_clean());
}

#[test]
fn fetch_without_upstream_changes_is_a_no_op() {
    let sandbox = Sandbox::new();
    let (_owner, viewer) = published(&sandbox);

    let state = |session: &Session| {
        let ws = session.read();
        let repo = ws.current_repo().unwrap();
        (repo.object_ids().unwrap().len(), repo.list_refs("").unwrap())
    };
    let before = state(&viewer);
    assert_eq!(sandbox.run(&viewer, &["git fetch"]), "");
    assert_eq!(state(&viewer), before);
}

#[test]
fn diverged_push_is_rejected_until_pulled() {
    let sandbox = Sandbox::new();
    let (owner, viewer) = published(&sandbox);

    sandbox.run(
        &viewer,
        &["echo v > viewer.txt", "git add viewer.txt", "git commit -m \"Viewer work\""],
    );
    let out = sandbox.run(&viewer, &["git push"]);
    assert!(out.contains("-> main"), "{}", out);

    sandbox.run(
        &owner,
        &["echo o > owner.txt", "git add owner.txt", "git commit -m \"Owner work\""],
    );
    let err = sandbox.fail(&owner, "git push");
    assert!(matches!(&err, CommandError::Rejected(msg) if msg.contains("[rejected]")));

    sandbox.run(&owner, &["git pull"]);
    let view = snapshot(&owner);
    assert!(view.commits[0].second_parent.is_some());
    assert_eq!(sandbox.run(&owner, &["cat viewer.txt"]), "v");
    sandbox.run(&owner, &["git push"]);

    let out = sandbox.run(&viewer, &["git pull"]);
    assert!(out.contains("Fast-forward"), "{}", out);
    let mine = snapshot(&viewer);
    assert_eq!(mine.commits[0].id, view.commits[0].id);
}

#[test]
fn force_push_replaces_remote_history() {
    let sandbox = Sandbox::new();
    let (owner, viewer) = published(&sandbox);

    sandbox.run(&owner, &["git reset --hard HEAD~1", "echo rewrite >> README.md", "git commit -am Rewrite"]);
    assert!(sandbox.dispatcher.execute(&owner, "git push").is_err());
    let out = sandbox.run(&owner, &["git push -f"]);
    assert!(out.contains("(forced update)"), "{}", out);

    let fetched = sandbox.run(&viewer, &["git fetch"]);
    assert!(fetched.contains("(forced update)"), "{}", fetched);
    let remote = graph::build_remote(&sandbox.remotes().current().unwrap()).unwrap();
    assert!(messages(&remote).contains(&"Rewrite".to_string()));
}

#[test]
fn remote_only_branch_checkout_and_prune() {
    let sandbox = Sandbox::new();
    let (owner, viewer) = published(&sandbox);

    sandbox.run(
        &owner,
        &[
            "git checkout -b feature",
            "touch feature.txt",
            "git add feature.txt",
            "git commit -m Feature",
            "git push origin feature",
        ],
    );
    let out = sandbox.run(&viewer, &["git fetch"]);
    assert!(out.contains("[new branch]"), "{}", out);

    let out = sandbox.run(&viewer, &["git checkout feature"]);
    assert!(out.contains("Switched to a new branch 'feature'"), "{}", out);
    {
        let ws = viewer.read();
        let repo = ws.current_repo().unwrap();
        assert_eq!(repo.config().get("branch.feature.remote").map(String::as_str), Some("origin"));
        assert_eq!(repo.branch_tip("feature").unwrap(), repo.ref_target("refs/remotes/origin/feature").unwrap());
    }

    sandbox.run(&owner, &["git push -d origin feature"]);
    let out = sandbox.run(&viewer, &["git fetch --prune"]);
    assert!(out.contains("[deleted]"), "{}", out);

    let view = snapshot(&viewer);
    assert!(!view.remote_branches.contains_key("origin/feature"));
    assert!(view.branches.contains_key("feature"));
}

#[test]
fn refs_under_the_tracking_namespace_are_pruned_even_if_user_made() {
    let sandbox = Sandbox::new();
    let (_owner, viewer) = published(&sandbox);
    {
        let mut ws = viewer.write();
        let repo = ws.current_repo_mut().unwrap();
        let head = repo.head_commit().unwrap().unwrap();
        repo.set_ref("refs/remotes/origin/bookmark", &head).unwrap();
    }
    sandbox.run(&viewer, &["git fetch"]);
    assert!(!snapshot(&viewer).remote_branches.contains_key("origin/bookmark"));
}

#[test]
fn pushed_history_lands_in_the_shared_pool_only_once_pushed() {
    let sandbox = Sandbox::new();
    let (_owner, viewer) = published(&sandbox);
    let remote = sandbox.remotes().current().unwrap();
    let shared_before = remote.store.object_ids().unwrap().len();

    sandbox.run(&viewer, &["echo local > local.txt", "git add local.txt", "git commit -m Local"]);
    assert_eq!(remote.store.object_ids().unwrap().len(), shared_before);
    {
        let ws = viewer.read();
        assert!(!ws.current_repo().unwrap().object_ids().unwrap().is_empty());
    }

    sandbox.run(&viewer, &["git push"]);
    assert!(remote.store.object_ids().unwrap().len() > shared_before);
}

#[test]
fn pull_requests_live_on_the_shared_remote() {
    let sandbox = Sandbox::new();
    let (_owner, viewer) = published(&sandbox);

    sandbox.run(
        &viewer,
        &["git switch -c docs", "echo guide > GUIDE.md", "git add .", "git commit -m Guide"],
    );
    let err = sandbox.fail(&viewer, "git pr create --title \"Add guide\" --head docs");
    assert!(err.to_string().contains("push it first"));

    sandbox.run(&viewer, &["git push -u origin docs"]);
    let out = sandbox.run(&viewer, &["git pr create --title \"Add guide\" --head docs"]);
    assert!(out.starts_with("Created pull request #1: Add guide (docs -> main)"), "{}", out);
    assert!(sandbox.run(&viewer, &["git pr list"]).contains("#1\tAdd guide"));

    sandbox.remotes().create_empty("fresh").unwrap();
    assert!(sandbox.remotes().current().unwrap().pull_requests().is_empty());
}

#[test]
fn unfetched_commits_cannot_be_checked_out_by_full_id() {
    let sandbox = Sandbox::new();
    let (owner, viewer) = published(&sandbox);
    sandbox.run(&owner, &["echo secret >> README.md", "git commit -am \"Secret later\"", "git push"]);
    let secret = snapshot(&owner).commits[0].id.clone();

    let err = sandbox.fail(&viewer, &format!("git checkout {}", secret));
    assert!(err.to_string().contains("did not match"), "{}", err);
    assert_eq!(messages(&snapshot(&viewer)), vec!["Document usage", "Initial commit"]);

    sandbox.run(&viewer, &["git fetch"]);
    let out = sandbox.run(&viewer, &[&format!("git checkout {}", secret)]);
    assert!(out.contains("HEAD is now at"), "{}", out);
    assert_eq!(snapshot(&viewer).head, Some(Head::Detached(secret)));
}

#[test]
fn clone_of_an_unknown_remote_fails() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    let err = sandbox.fail(&s, "git clone nowhere");
    assert_eq!(err.to_string(), "fatal: 'nowhere' does not appear to be a git repository");
    assert!(s.read().repos.is_empty());
}
