use serde::Serialize;

pub const HEADS_PREFIX: &str = "refs/heads/";
pub const TAGS_PREFIX: &str = "refs/tags/";
pub const REMOTES_PREFIX: &str = "refs/remotes/";
pub const ORIGIN: &str = "origin";
pub const ORIG_HEAD: &str = "ORIG_HEAD";
pub const MERGE_HEAD: &str = "MERGE_HEAD";
pub const DEFAULT_BRANCH: &str = "main";

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum Head {
    /// On a branch, which may not have any commits yet.
    Branch(String),
    Detached(String),
}

impl Head {
    pub fn branch(&self) -> Option<&str> {
        match self {
            Head::Branch(name) => Some(name),
            Head::Detached(_) => None,
        }
    }
}

pub fn branch_ref(name: &str) -> String {
    format!("{}{}", HEADS_PREFIX, name)
}

pub fn tag_ref(name: &str) -> String {
    format!("{}{}", TAGS_PREFIX, name)
}

pub fn remote_prefix(remote: &str) -> String {
    format!("{}{}/", REMOTES_PREFIX, remote)
}

pub fn remote_ref(remote: &str, branch: &str) -> String {
    format!("{}{}", remote_prefix(remote), branch)
}

/// `refs/remotes/origin/main` -> `origin/main`.
pub fn remote_display_name(full: &str) -> Option<&str> {
    full.strip_prefix(REMOTES_PREFIX)
}
