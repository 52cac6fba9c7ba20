use crate::core::commit::Commit;
use crate::core::config::Config;
use crate::core::fs::{relative_to, MemFs};
use crate::core::index::{Index, IndexEntry};
use crate::core::object::{looks_like_id, Object, ObjectType};
use crate::core::refs::{
    branch_ref, remote_display_name, tag_ref, Head, HEADS_PREFIX, MERGE_HEAD, ORIG_HEAD,
    REMOTES_PREFIX, TAGS_PREFIX,
};
use crate::core::status::Status;
use crate::core::store::{copy_closure, get_object, resolve_ref, RefTarget, Store, HEAD};
use crate::core::tree::{FileMap, Tree};
use crate::error::{StoreError, StoreResult};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A working repository rooted at one directory of a session's filesystem.
///
/// Read operations take `&self`. Everything that writes objects, refs, the
/// index or the working tree takes `&mut self`, so code that only holds a
/// shared borrow cannot mutate the repository.
pub struct Repository {
    root: PathBuf,
    store: Arc<dyn Store>,
    index: Index,
    config: Config,
}

impl Repository {
    /// Creates a repository on `store`, pointing HEAD at `default_branch`
    /// unless the store already has a HEAD.
    pub fn init(root: PathBuf, store: Arc<dyn Store>, default_branch: &str) -> StoreResult<Self> {
        if store.read_ref(HEAD)?.is_none() {
            store.write_ref(HEAD, RefTarget::Symbolic(branch_ref(default_branch)))?;
        }
        Ok(Self::open(root, store))
    }

    pub fn open(root: PathBuf, store: Arc<dyn Store>) -> Self {
        Self {
            root,
            store,
            index: Index::new(),
            config: Config::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_hybrid(&self) -> bool {
        self.store.is_hybrid()
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn index_mut(&mut self) -> &mut Index {
        &mut self.index
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn has_object(&self, id: &str) -> bool {
        self.store.has_object(id)
    }

    pub fn object_ids(&self) -> StoreResult<Vec<String>> {
        self.store.object_ids()
    }

    pub fn read_commit(&self, id: &str) -> StoreResult<Commit> {
        let obj = get_object(self.store.as_ref(), id)?;
        if obj.kind != ObjectType::Commit {
            return Err(StoreError::Corrupted {
                id: id.to_string(),
                reason: format!("expected commit, found {}", obj.kind.as_str()),
            });
        }
        Commit::from_object(&obj)
    }

    pub fn is_commit(&self, id: &str) -> bool {
        matches!(self.store.read_object(id), Ok(Some(obj)) if obj.kind == ObjectType::Commit)
    }

    pub fn read_blob(&self, id: &str) -> StoreResult<Vec<u8>> {
        Ok(get_object(self.store.as_ref(), id)?.data)
    }

    /// Files recorded by `commit`, or none for an unborn branch.
    pub fn commit_files(&self, commit: Option<&str>) -> StoreResult<FileMap> {
        match commit {
            Some(id) => {
                let commit = self.read_commit(id)?;
                Tree::flatten(self.store.as_ref(), &commit.tree)
            }
            None => Ok(FileMap::new()),
        }
    }

    pub fn head_files(&self) -> StoreResult<FileMap> {
        let head = self.head_commit()?;
        self.commit_files(head.as_deref())
    }

    /// Copies the closure of `tip` into `dst` (used to publish to the shared remote).
    pub fn export_closure(&self, tip: &str, dst: &dyn Store) -> StoreResult<usize> {
        copy_closure(self.store.as_ref(), dst, tip)
    }

    pub fn write_blob(&mut self, data: &[u8]) -> StoreResult<String> {
        self.store.write_object(&Object::blob(data.to_vec()))
    }

    pub fn write_tree_from_index(&mut self) -> StoreResult<String> {
        Tree::write_from_files(self.store.as_ref(), &self.index.to_files())
    }

    pub fn write_commit(&mut self, commit: &Commit) -> StoreResult<String> {
        self.store.write_object(&commit.to_object()?)
    }

    /// Pulls the closure of `tip` from `src` into this repository's store.
    pub fn import_closure(&mut self, src: &dyn Store, tip: &str) -> StoreResult<usize> {
        copy_closure(src, self.store.as_ref(), tip)
    }

    pub fn head(&self) -> StoreResult<Head> {
        match self.store.read_ref(HEAD)? {
            Some(RefTarget::Symbolic(target)) => Ok(Head::Branch(
                target
                    .strip_prefix(HEADS_PREFIX)
                    .unwrap_or(&target)
                    .to_string(),
            )),
            Some(RefTarget::Direct(id)) => Ok(Head::Detached(id)),
            None => Ok(Head::Branch(crate::core::refs::DEFAULT_BRANCH.to_string())),
        }
    }

    pub fn head_commit(&self) -> StoreResult<Option<String>> {
        match self.head()? {
            Head::Branch(name) => self.ref_target(&branch_ref(&name)),
            Head::Detached(id) => Ok(Some(id)),
        }
    }

    pub fn current_branch(&self) -> StoreResult<Option<String>> {
        Ok(self.head()?.branch().map(str::to_string))
    }

    pub fn ref_target(&self, full_name: &str) -> StoreResult<Option<String>> {
        resolve_ref(self.store.as_ref(), full_name)
    }

    pub fn branch_tip(&self, name: &str) -> StoreResult<Option<String>> {
        self.ref_target(&branch_ref(name))
    }

    pub fn tag_target(&self, name: &str) -> StoreResult<Option<String>> {
        self.ref_target(&tag_ref(name))
    }

    fn short_refs(&self, prefix: &str) -> StoreResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for (name, _) in self.store.list_refs(prefix)? {
            if let Some(id) = self.ref_target(&name)? {
                out.insert(name[prefix.len()..].to_string(), id);
            }
        }
        Ok(out)
    }

    pub fn branches(&self) -> StoreResult<BTreeMap<String, String>> {
        self.short_refs(HEADS_PREFIX)
    }

    pub fn tags(&self) -> StoreResult<BTreeMap<String, String>> {
        self.short_refs(TAGS_PREFIX)
    }

    /// Remote-tracking branches keyed as `origin/<branch>`.
    pub fn remote_branches(&self) -> StoreResult<BTreeMap<String, String>> {
        self.short_refs(REMOTES_PREFIX)
    }

    /// `ORIG_HEAD` and `MERGE_HEAD` when present.
    pub fn special_refs(&self) -> StoreResult<BTreeMap<String, String>> {
        let mut out = BTreeMap::new();
        for name in [ORIG_HEAD, MERGE_HEAD] {
            if let Some(id) = self.ref_target(name)? {
                out.insert(name.to_string(), id);
            }
        }
        Ok(out)
    }

    pub fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, RefTarget)>> {
        self.store.list_refs(prefix)
    }

    pub fn set_ref(&mut self, full_name: &str, id: &str) -> StoreResult<()> {
        self.store.write_ref(full_name, RefTarget::Direct(id.to_string()))
    }

    pub fn delete_ref(&mut self, full_name: &str) -> StoreResult<bool> {
        self.store.delete_ref(full_name)
    }

    pub fn set_head_branch(&mut self, branch: &str) -> StoreResult<()> {
        self.store
            .write_ref(HEAD, RefTarget::Symbolic(branch_ref(branch)))
    }

    pub fn set_head_detached(&mut self, id: &str) -> StoreResult<()> {
        self.store.write_ref(HEAD, RefTarget::Direct(id.to_string()))
    }

    /// Moves whatever HEAD points at (the current branch, or HEAD itself
    /// when detached) to `id`.
    pub fn advance_head(&mut self, id: &str) -> StoreResult<()> {
        match self.head()? {
            Head::Branch(name) => self.set_ref(&branch_ref(&name), id),
            Head::Detached(_) => self.set_head_detached(id),
        }
    }

    /// Resolves `HEAD`, branch, tag, `origin/<b>`, full ref names, object id
    /// prefixes and `~n`/`^n` suffixes to a commit id.
    pub fn resolve_revision(&self, rev: &str) -> StoreResult<Option<String>> {
        let split = rev.find(|c: char| c == '~' || c == '^').unwrap_or(rev.len());
        let (base, suffix) = rev.split_at(split);
        let Some(mut current) = self.resolve_base(base)? else {
            return Ok(None);
        };

        // Each operator is `~` or `^` optionally followed by a decimal count.
        let mut ops = suffix.chars().peekable();
        while let Some(op) = ops.next() {
            let mut digits = String::new();
            while let Some(d) = ops.next_if(|c| c.is_ascii_digit()) {
                digits.push(d);
            }
            if op != '~' && op != '^' {
                return Ok(None);
            }
            let n: usize = if digits.is_empty() {
                1
            } else {
                match digits.parse() {
                    Ok(n) => n,
                    Err(_) => return Ok(None),
                }
            };

            if op == '~' {
                for _ in 0..n {
                    match self.read_commit(&current)?.parents.first() {
                        Some(parent) => current = parent.clone(),
                        None => return Ok(None),
                    }
                }
            } else if n > 0 {
                match self.read_commit(&current)?.parents.get(n - 1) {
                    Some(parent) => current = parent.clone(),
                    None => return Ok(None),
                }
            }
        }

        Ok(Some(current))
    }

    fn resolve_base(&self, base: &str) -> StoreResult<Option<String>> {
        if base.is_empty() {
            return Ok(None);
        }
        if base == HEAD || base == "@" {
            return self.head_commit();
        }
        if base == ORIG_HEAD || base == MERGE_HEAD || base.starts_with("refs/") {
            return self.ref_target(base);
        }
        for candidate in [
            branch_ref(base),
            tag_ref(base),
            format!("{}{}", REMOTES_PREFIX, base),
            format!("refs/{}", base),
        ] {
            if let Some(id) = self.ref_target(&candidate)? {
                return Ok(Some(id));
            }
        }
        if looks_like_id(base) {
            return self.resolve_id_prefix(&base.to_ascii_lowercase());
        }
        Ok(None)
    }

    /// Unique commit whose id starts with `prefix`, searched among enumerable
    /// objects and every commit reachable from a ref. A clone's shared pool
    /// is never searched, so unfetched commits stay out of reach even by
    /// full id.
    fn resolve_id_prefix(&self, prefix: &str) -> StoreResult<Option<String>> {
        if prefix.len() == 64 && !self.is_hybrid() && self.is_commit(prefix) {
            return Ok(Some(prefix.to_string()));
        }
        let mut matches: HashSet<String> = self
            .store
            .object_ids()?
            .into_iter()
            .filter(|id| id.starts_with(prefix) && self.is_commit(id))
            .collect();
        for id in self.reachable_commits(&self.ref_tips()?)? {
            if id.starts_with(prefix) {
                matches.insert(id);
            }
        }
        if matches.len() == 1 {
            Ok(matches.into_iter().next())
        } else {
            Ok(None)
        }
    }

    /// HEAD plus the tip of every branch, remote-tracking branch and tag.
    pub fn ref_tips(&self) -> StoreResult<Vec<String>> {
        let mut tips = Vec::new();
        if let Some(head) = self.head_commit()? {
            tips.push(head);
        }
        for prefix in [HEADS_PREFIX, REMOTES_PREFIX, TAGS_PREFIX] {
            for (name, _) in self.store.list_refs(prefix)? {
                if let Some(id) = self.ref_target(&name)? {
                    tips.push(id);
                }
            }
        }
        Ok(tips)
    }

    /// Breadth-first walk over first and second parents from `seeds`.
    /// Returns commit ids in visit order; seeds that are not commits are skipped.
    pub fn reachable_commits(&self, seeds: &[String]) -> StoreResult<Vec<String>> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<String> = seeds.iter().cloned().collect();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) || !self.is_commit(&id) {
                continue;
            }
            let commit = self.read_commit(&id)?;
            order.push(id);
            for parent in commit.parents.iter().take(2) {
                if !visited.contains(parent) {
                    queue.push_back(parent.clone());
                }
            }
        }
        Ok(order)
    }

    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> StoreResult<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let reachable = self.reachable_commits(&[descendant.to_string()])?;
        Ok(reachable.iter().any(|id| id == ancestor))
    }

    /// Nearest common ancestor of `a` and `b` by breadth-first distance from `a`.
    pub fn merge_base(&self, a: &str, b: &str) -> StoreResult<Option<String>> {
        let from_b: HashSet<String> = self.reachable_commits(&[b.to_string()])?.into_iter().collect();
        Ok(self
            .reachable_commits(&[a.to_string()])?
            .into_iter()
            .find(|id| from_b.contains(id)))
    }

    pub fn worktree_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Every file in the working tree with its current content.
    pub fn worktree_files(&self, fs: &MemFs) -> BTreeMap<String, Vec<u8>> {
        fs.files_under(&self.root)
            .into_iter()
            .filter_map(|path| {
                let rel = relative_to(&self.root, &path)?;
                let content = fs.read(&path).ok()?.to_vec();
                Some((rel, content))
            })
            .collect()
    }

    pub fn status(&self, fs: &MemFs) -> StoreResult<Status> {
        let head = self.head_files()?;
        let worktree = self
            .worktree_files(fs)
            .into_iter()
            .map(|(path, content)| (path, Object::blob(content).id()))
            .collect();
        Ok(Status::compute(&head, &self.index, &worktree))
    }

    /// Tracked paths whose local state would be clobbered by moving the
    /// working tree from `from` to `to`, plus untracked files in the way.
    pub fn overwritten_by(&self, fs: &MemFs, from: &FileMap, to: &FileMap) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        let keys: std::collections::BTreeSet<&String> = from.keys().chain(to.keys()).collect();
        for path in keys {
            let (old, new) = (from.get(path), to.get(path));
            if old == new {
                continue;
            }
            let on_disk = fs
                .read(&self.worktree_path(path))
                .ok()
                .map(|c| Object::blob(c.to_vec()).id());
            let staged = self.index.get(path).map(|e| e.hash.clone());
            let dirty = match old {
                Some(old) => {
                    staged.as_deref() != Some(old.hash.as_str())
                        || on_disk.as_deref() != Some(old.hash.as_str())
                }
                None => {
                    let wanted = new.map(|n| n.hash.as_str());
                    on_disk.is_some() && on_disk.as_deref() != wanted
                }
            };
            if dirty {
                paths.push(path.clone());
            }
        }
        paths
    }

    /// Moves the working tree and index from tree `from` to tree `to`,
    /// carrying over local changes to paths the two trees agree on.
    pub fn switch_worktree(&mut self, fs: &mut MemFs, from: &FileMap, to: &FileMap) -> StoreResult<()> {
        for path in from.keys().filter(|p| !to.contains_key(*p)) {
            let abs = self.worktree_path(path);
            if fs.is_file(&abs) {
                fs.remove_file(&abs)?;
            }
            if let Some(parent) = abs.parent() {
                fs.prune_empty_dirs(parent, &self.root);
            }
            self.index.remove_entry(path);
        }

        for (path, entry) in to {
            let abs = self.worktree_path(path);
            if from.get(path) != Some(entry) {
                let content = self.read_blob(&entry.hash)?;
                fs.write(&abs, content)?;
                self.index.entries.insert(
                    path.clone(),
                    IndexEntry {
                        hash: entry.hash.clone(),
                        mode: entry.mode.clone(),
                        stage: 0,
                    },
                );
            }
        }
        Ok(())
    }

    /// Makes working tree and index match `to` exactly, discarding local
    /// changes to tracked files. Untracked files are left alone. Call before
    /// moving HEAD so files tracked only by the old commit are removed.
    pub fn force_worktree(&mut self, fs: &mut MemFs, to: &FileMap) -> StoreResult<()> {
        let mut tracked: Vec<String> = self.index.entries.keys().cloned().collect();
        tracked.extend(self.head_files()?.into_keys());
        for path in tracked.iter().filter(|p| !to.contains_key(*p)) {
            let abs = self.worktree_path(path);
            if fs.is_file(&abs) {
                fs.remove_file(&abs)?;
                if let Some(parent) = abs.parent() {
                    fs.prune_empty_dirs(parent, &self.root);
                }
            }
        }
        for (path, entry) in to {
            let content = self.read_blob(&entry.hash)?;
            fs.write(&self.worktree_path(path), content)?;
        }
        self.index = Index::from_files(to);
        Ok(())
    }
}

/// Display name for a full ref: `main`, `v1.0`, `origin/main` or `HEAD`.
pub fn short_ref_name(full: &str) -> &str {
    full.strip_prefix(HEADS_PREFIX)
        .or_else(|| full.strip_prefix(TAGS_PREFIX))
        .or_else(|| remote_display_name(full))
        .unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commit::Author;
    use crate::core::store::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn repo() -> (Repository, MemFs) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let repo = Repository::init(PathBuf::from("/p"), store, "main").unwrap();
        (repo, MemFs::new())
    }

    fn commit_file(repo: &mut Repository, fs: &mut MemFs, path: &str, content: &str, secs: i64) -> String {
        fs.write(&repo.worktree_path(path), content).unwrap();
        let hash = repo.write_blob(content.as_bytes()).unwrap();
        repo.index_mut().add_entry(path.to_string(), hash);
        let tree = repo.write_tree_from_index().unwrap();
        let parents = repo.head_commit().unwrap().into_iter().collect();
        let when = Utc.timestamp_opt(secs, 0).unwrap();
        let commit = Commit::new(tree, parents, Author::at("T", "t@example.com", when), format!("edit {}", path));
        let id = repo.write_commit(&commit).unwrap();
        repo.advance_head(&id).unwrap();
        id
    }

    #[test]
    fn unborn_head_is_the_default_branch() {
        let (repo, _) = repo();
        assert_eq!(repo.head().unwrap(), Head::Branch("main".into()));
        assert_eq!(repo.head_commit().unwrap(), None);
    }

    #[test]
    fn revisions_walk_parents() {
        let (mut repo, mut fs) = repo();
        let a = commit_file(&mut repo, &mut fs, "a", "1", 100);
        let b = commit_file(&mut repo, &mut fs, "a", "2", 200);
        let c = commit_file(&mut repo, &mut fs, "a", "3", 300);

        assert_eq!(repo.resolve_revision("HEAD").unwrap(), Some(c.clone()));
        assert_eq!(repo.resolve_revision("main~1").unwrap(), Some(b.clone()));
        assert_eq!(repo.resolve_revision("HEAD^^").unwrap(), Some(a.clone()));
        assert_eq!(repo.resolve_revision("HEAD~3").unwrap(), None);
        assert_eq!(repo.resolve_revision(&c[..8]).unwrap(), Some(c.clone()));
        assert_eq!(repo.resolve_revision("nope").unwrap(), None);
        assert!(repo.is_ancestor(&a, &c).unwrap());
        assert!(!repo.is_ancestor(&c, &a).unwrap());
        assert_eq!(repo.merge_base(&c, &b).unwrap(), Some(b));
    }

    #[test]
    fn malformed_revision_suffixes_resolve_to_nothing() {
        let (mut repo, mut fs) = repo();
        commit_file(&mut repo, &mut fs, "a", "1", 100);
        let b = commit_file(&mut repo, &mut fs, "a", "2", 200);
        commit_file(&mut repo, &mut fs, "a", "3", 300);

        assert_eq!(repo.resolve_revision("HEAD~1^").unwrap(), repo.resolve_revision("HEAD~2").unwrap());
        assert_eq!(repo.resolve_revision("HEAD^0~1").unwrap(), Some(b));
        for rev in ["HEAD~x", "HEAD^x", "HEAD~1x", "HEAD~é", "main^é2", "HEAD~99999999999999999999999"] {
            assert_eq!(repo.resolve_revision(rev).unwrap(), None, "{}", rev);
        }
    }

    #[test]
    fn switching_trees_carries_unrelated_local_edits() {
        let (mut repo, mut fs) = repo();
        commit_file(&mut repo, &mut fs, "keep.txt", "k", 100);
        let first = repo.head_files().unwrap();
        commit_file(&mut repo, &mut fs, "extra.txt", "e", 200);
        let second = repo.head_files().unwrap();

        fs.write(&repo.worktree_path("keep.txt"), "local edit").unwrap();
        assert!(repo.overwritten_by(&fs, &second, &first).is_empty());

        repo.switch_worktree(&mut fs, &second, &first).unwrap();
        assert!(!fs.exists(Path::new("/p/extra.txt")));
        assert_eq!(fs.read(Path::new("/p/keep.txt")).unwrap(), b"local edit");
        assert!(!repo.index().contains("extra.txt"));
    }

    #[test]
    fn dirty_paths_block_a_switch() {
        let (mut repo, mut fs) = repo();
        commit_file(&mut repo, &mut fs, "f.txt", "v1", 100);
        let first = repo.head_files().unwrap();
        commit_file(&mut repo, &mut fs, "f.txt", "v2", 200);
        let second = repo.head_files().unwrap();

        fs.write(&repo.worktree_path("f.txt"), "uncommitted").unwrap();
        assert_eq!(repo.overwritten_by(&fs, &second, &first), vec!["f.txt".to_string()]);
    }

    #[test]
    fn short_names() {
        assert_eq!(short_ref_name("refs/heads/main"), "main");
        assert_eq!(short_ref_name("refs/remotes/origin/x"), "origin/x");
        assert_eq!(short_ref_name("ORIG_HEAD"), "ORIG_HEAD");
    }
}
