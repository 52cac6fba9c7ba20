use crate::core::index::Index;
use crate::core::tree::FileMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Working tree status with porcelain-style two-character codes.
///
/// The first character compares the index against HEAD, the second the
/// working tree against the index. `??` marks untracked files and `UU`
/// unresolved conflicts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    pub files: BTreeMap<String, String>,
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
    pub conflicted: Vec<String>,
}

impl Status {
    /// `worktree` maps each file in the working tree to the blob id of its
    /// current content.
    pub fn compute(head: &FileMap, index: &Index, worktree: &BTreeMap<String, String>) -> Self {
        let mut status = Status::default();
        let paths: BTreeSet<&String> = head
            .keys()
            .chain(index.entries.keys())
            .chain(worktree.keys())
            .collect();

        for path in paths {
            let in_head = head.get(path).map(|f| f.hash.as_str());
            let in_index = index.get(path);
            let in_worktree = worktree.get(path).map(String::as_str);

            if let Some(entry) = in_index {
                if entry.stage != 0 {
                    status.files.insert(path.clone(), "UU".to_string());
                    status.conflicted.push(path.clone());
                    continue;
                }
            }

            let x = match (in_head, in_index) {
                (None, Some(_)) => 'A',
                (Some(_), None) => 'D',
                (Some(h), Some(i)) if h != i.hash => 'M',
                _ => ' ',
            };
            let y = match (in_index, in_worktree) {
                (Some(_), None) => 'D',
                (Some(i), Some(w)) if i.hash != w => 'M',
                _ => ' ',
            };

            if in_index.is_none() && in_worktree.is_some() {
                status.untracked.push(path.clone());
                if x == ' ' {
                    status.files.insert(path.clone(), "??".to_string());
                    continue;
                }
            }
            if x == ' ' && y == ' ' {
                continue;
            }

            status.files.insert(path.clone(), format!("{}{}", x, y));
            if x != ' ' {
                status.staged.push(path.clone());
            }
            if y != ' ' {
                status.modified.push(path.clone());
            }
        }

        status
    }

    /// No staged, modified, conflicted or untracked files.
    pub fn is_clean(&self) -> bool {
        self.files.is_empty()
    }

    /// Changes to tracked content, ignoring untracked files.
    pub fn has_tracked_changes(&self) -> bool {
        !self.staged.is_empty() || !self.modified.is_empty() || !self.conflicted.is_empty()
    }
}
