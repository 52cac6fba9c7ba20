mod common;

use common::{messages, project_with_commit, snapshot, Sandbox};
use vizgit::core::refs::Head;
use vizgit::error::CommandError;
use vizgit::graph;

#[test]
fn first_commit_on_a_fresh_repository() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);

    let view = snapshot(&s);
    assert_eq!(view.head, Some(Head::Branch("main".to_string())));
    assert_eq!(view.commits.len(), 1);
    let commit = &view.commits[0];
    assert_eq!(commit.message, "Initial commit");
    assert_eq!(commit.parent, None);
    assert!(commit.is_head);
    assert_eq!(commit.branches, vec!["main"]);
    assert!(view.status.is_clean());
    assert_eq!(view.projects, vec!["project"]);
}

#[test]
fn feature_work_is_only_reachable_from_feature() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(
        &s,
        &[
            "git branch feature",
            "git checkout feature",
            "echo wip > feature.txt",
            "git add feature.txt",
            "git commit -m \"Feature work\"",
        ],
    );

    let ws = s.read();
    let repo = ws.current_repo().unwrap();
    let main = repo.branch_tip("main").unwrap().unwrap();
    let feature = repo.branch_tip("feature").unwrap().unwrap();

    let from_main = graph::reachable_from(repo, &[main.clone()]).unwrap();
    assert_eq!(from_main, vec![main.clone()]);
    let from_feature = graph::reachable_from(repo, &[feature.clone()]).unwrap();
    assert_eq!(from_feature, vec![feature, main]);
}

#[test]
fn rejected_checkout_changes_nothing() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(&s, &["echo edit >> README.md", "touch scratch.txt", "git add scratch.txt"]);

    let before_fs = s.read().fs.clone();
    let before_view = snapshot(&s);
    let (before_refs, before_objects, before_index) = {
        let ws = s.read();
        let repo = ws.current_repo().unwrap();
        (
            repo.list_refs("").unwrap(),
            repo.object_ids().unwrap(),
            repo.index().clone(),
        )
    };

    let err = sandbox.fail(&s, "git checkout nonexistent");
    assert_eq!(
        err.to_string(),
        "error: pathspec 'nonexistent' did not match any file(s) known to git"
    );

    let ws = s.read();
    let repo = ws.current_repo().unwrap();
    assert_eq!(ws.fs, before_fs);
    assert_eq!(repo.list_refs("").unwrap(), before_refs);
    assert_eq!(repo.object_ids().unwrap(), before_objects);
    assert_eq!(repo.index(), &before_index);
    drop(ws);
    assert_eq!(snapshot(&s), before_view);
}

#[test]
fn help_is_a_successful_result() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    let out = sandbox.run(&s, &["git commit --help"]);
    assert!(out.contains("Usage"));
    assert!(out.contains("--message"));
    assert!(sandbox.run(&s, &["mkdir --help"]).starts_with("usage: mkdir"));
}

#[test]
fn unknown_commands_are_reported() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    assert!(matches!(
        sandbox.fail(&s, "git frobnicate"),
        CommandError::UnknownCommand(msg) if msg.contains("'frobnicate' is not a git command")
    ));
    assert_eq!(sandbox.fail(&s, "vim file").to_string(), "vim: command not found");
    assert!(sandbox.fail(&s, "git commit --bogus").to_string().contains("--bogus"));
}

#[test]
fn conflicting_merge_then_resolution() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(
        &s,
        &[
            "git checkout -b feature",
            "echo theirs > README.md",
            "git commit -am \"Their change\"",
            "git checkout main",
            "echo ours > README.md",
            "git commit -am \"Our change\"",
        ],
    );

    let out = sandbox.run(&s, &["git merge feature"]);
    assert!(out.contains("CONFLICT (content): Merge conflict in README.md"));
    let view = snapshot(&s);
    assert_eq!(view.status.conflicted, vec!["README.md"]);
    assert!(view.refs.contains_key("MERGE_HEAD"));
    let content = sandbox.run(&s, &["cat README.md"]);
    assert!(content.contains("<<<<<<<") && content.contains(">>>>>>>"));

    assert!(sandbox.dispatcher.execute(&s, "git commit -m done").is_err());

    sandbox.run(
        &s,
        &["echo resolved > README.md", "git add README.md", "git commit -m \"Merge feature\""],
    );
    let view = snapshot(&s);
    let merge = &view.commits[0];
    assert_eq!(merge.message, "Merge feature");
    assert!(merge.second_parent.is_some());
    assert!(!view.refs.contains_key("MERGE_HEAD"));
    assert!(view.status.conflicted.is_empty());
}

#[test]
fn fast_forward_merge_and_branch_cleanup() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(
        &s,
        &[
            "git switch -c topic",
            "touch topic.txt",
            "git add .",
            "git commit -m Topic",
            "git switch main",
        ],
    );
    assert!(sandbox.fail(&s, "git branch -d topic").to_string().contains("not fully merged"));

    let out = sandbox.run(&s, &["git merge topic"]);
    assert!(out.contains("Fast-forward"));
    sandbox.run(&s, &["git branch -d topic"]);

    let view = snapshot(&s);
    assert_eq!(messages(&view), vec!["Topic", "Initial commit"]);
    assert_eq!(view.branches.keys().collect::<Vec<_>>(), vec!["main"]);
}

#[test]
fn orphan_branch_starts_unborn() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    let out = sandbox.run(&s, &["git checkout --orphan pages"]);
    assert_eq!(out, "Switched to a new branch 'pages'");

    let view = snapshot(&s);
    assert_eq!(view.head, Some(Head::Branch("pages".to_string())));
    assert!(!view.branches.contains_key("pages"));
    // The old branch is still drawn, but nothing is HEAD.
    assert!(view.commits.iter().all(|c| !c.is_head));

    sandbox.run(&s, &["git commit -m \"Fresh root\""]);
    let view = snapshot(&s);
    let root = view.commits.iter().find(|c| c.message == "Fresh root").unwrap();
    assert_eq!(root.parent, None);
}

#[test]
fn hard_reset_moves_branch_and_records_orig_head() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(&s, &["echo two >> README.md", "git commit -am Second"]);
    let second = snapshot(&s).commits[0].id.clone();

    sandbox.run(&s, &["git reset --hard HEAD~1"]);
    let view = snapshot(&s);
    assert_eq!(messages(&view), vec!["Initial commit"]);
    assert_eq!(view.refs.get("ORIG_HEAD"), Some(&second));
    assert_eq!(sandbox.run(&s, &["cat README.md"]), "hello");

    let reflog = sandbox.run(&s, &["git reflog"]);
    assert!(reflog.lines().next().unwrap().contains("reset: moving to HEAD~1"));
}

#[test]
fn detached_checkout_and_tags() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(&s, &["git tag v1", "echo x >> README.md", "git commit -am Next"]);

    let out = sandbox.run(&s, &["git checkout v1"]);
    assert!(out.contains("HEAD is now at"));
    let view = snapshot(&s);
    let tagged = &view.tags["v1"];
    assert_eq!(view.head, Some(Head::Detached(tagged.clone())));
    let head_view = view.commits.iter().find(|c| c.is_head).unwrap();
    assert_eq!(head_view.tags, vec!["v1"]);
}

#[test]
fn removing_a_project_directory_drops_its_repository() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(&s, &["cd /", "rm -rf project"]);

    assert!(s.read().repos.is_empty());
    assert!(snapshot(&s).projects.is_empty());
    assert!(sandbox.fail(&s, "git status").to_string().starts_with("fatal: not a git repository"));
}

#[test]
fn malformed_revision_suffix_is_an_unknown_revision() {
    let sandbox = Sandbox::new();
    let s = sandbox.session("s");
    project_with_commit(&sandbox, &s);
    sandbox.run(&s, &["echo two >> README.md", "git commit -am Second"]);
    let before = snapshot(&s);

    for rev in ["HEAD~x", "HEAD~é"] {
        let err = sandbox.fail(&s, &format!("git checkout {}", rev));
        assert!(err.to_string().contains("did not match"), "{}", err);
    }
    assert_eq!(snapshot(&s), before);
}
