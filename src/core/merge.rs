use crate::core::repository::Repository;
use crate::core::tree::{FileEntry, FileMap};
use crate::error::StoreResult;
use std::collections::BTreeSet;

/// Result of merging two trees against their common base.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeMerge {
    /// Paths that merged cleanly, with the chosen version.
    pub clean: FileMap,
    /// Conflicted paths with the marker-annotated content to write.
    pub conflicts: Vec<(String, Vec<u8>)>,
}

impl TreeMerge {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// File-level three-way merge. A path changed on only one side takes that
/// side; a path changed identically on both sides takes either; anything
/// else conflicts and gets `<<<<<<<`/`=======`/`>>>>>>>` markers around the
/// two whole versions.
pub fn merge_trees(
    repo: &Repository,
    base: &FileMap,
    ours: &FileMap,
    theirs: &FileMap,
    their_label: &str,
) -> StoreResult<TreeMerge> {
    let mut result = TreeMerge::default();
    let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();

    for path in paths {
        let (b, o, t) = (base.get(path), ours.get(path), theirs.get(path));
        let chosen: Option<Option<&FileEntry>> = if same(o, t) {
            Some(o)
        } else if same(b, o) {
            Some(t)
        } else if same(b, t) {
            Some(o)
        } else {
            None
        };

        match chosen {
            Some(Some(entry)) => {
                result.clean.insert(path.clone(), entry.clone());
            }
            Some(None) => {}
            None => {
                let ours_text = side_content(repo, o)?;
                let theirs_text = side_content(repo, t)?;
                result
                    .conflicts
                    .push((path.clone(), conflict_markers(&ours_text, &theirs_text, their_label)));
            }
        }
    }
    Ok(result)
}

fn same(a: Option<&FileEntry>, b: Option<&FileEntry>) -> bool {
    a.map(|e| &e.hash) == b.map(|e| &e.hash)
}

fn side_content(repo: &Repository, entry: Option<&FileEntry>) -> StoreResult<Vec<u8>> {
    match entry {
        Some(e) => repo.read_blob(&e.hash),
        None => Ok(Vec::new()),
    }
}

pub fn conflict_markers(ours: &[u8], theirs: &[u8], their_label: &str) -> Vec<u8> {
    let mut out = b"<<<<<<< HEAD\n".to_vec();
    push_with_newline(&mut out, ours);
    out.extend_from_slice(b"=======\n");
    push_with_newline(&mut out, theirs);
    out.extend_from_slice(format!(">>>>>>> {}\n", their_label).as_bytes());
    out
}

fn push_with_newline(out: &mut Vec<u8>, content: &[u8]) {
    out.extend_from_slice(content);
    if !content.is_empty() && !content.ends_with(b"\n") {
        out.push(b'\n');
    }
}
