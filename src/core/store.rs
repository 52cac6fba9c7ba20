//! Object and reference storage.
//!
//! [`Store`] is the capability set every repository is built on: loose
//! object read/write, whole-store enumeration, and named references.
//! Two concrete backends exist, [`MemoryStore`] for session-owned
//! repositories and [`crate::core::disk::DiskStore`] for the shared bare
//! remote; [`crate::core::hybrid::HybridStore`] composes them.

use crate::core::commit::Commit;
use crate::core::object::{Object, ObjectType};
use crate::core::tree::Tree;
use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const HEAD: &str = "HEAD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Points straight at an object id.
    Direct(String),
    /// Points at another ref, e.g. `HEAD -> refs/heads/main`.
    Symbolic(String),
}

impl RefTarget {
    pub fn as_direct(&self) -> Option<&str> {
        match self {
            RefTarget::Direct(id) => Some(id),
            RefTarget::Symbolic(_) => None,
        }
    }

    pub(crate) fn serialize(&self) -> String {
        match self {
            RefTarget::Direct(id) => format!("{}\n", id),
            RefTarget::Symbolic(name) => format!("ref: {}\n", name),
        }
    }

    pub(crate) fn deserialize(content: &str) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        match content.strip_prefix("ref: ") {
            Some(name) => Some(RefTarget::Symbolic(name.trim().to_string())),
            None => Some(RefTarget::Direct(content.to_string())),
        }
    }
}

pub trait Store: Send + Sync {
    fn read_object(&self, id: &str) -> StoreResult<Option<Object>>;

    fn has_object(&self, id: &str) -> bool {
        matches!(self.read_object(id), Ok(Some(_)))
    }

    /// Stores `obj` and returns its id. Writing an existing object is a no-op.
    fn write_object(&self, obj: &Object) -> StoreResult<String>;

    /// Every object id this store can enumerate.
    fn object_ids(&self) -> StoreResult<Vec<String>>;

    fn read_ref(&self, name: &str) -> StoreResult<Option<RefTarget>>;

    fn write_ref(&self, name: &str, target: RefTarget) -> StoreResult<()>;

    /// Returns whether the ref existed.
    fn delete_ref(&self, name: &str) -> StoreResult<bool>;

    /// All refs whose name starts with `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, RefTarget)>>;

    /// Atomically moves `name` from `expected` to `new` (`None` meaning
    /// absent on either side). Returns false without writing when the
    /// current value does not match `expected`.
    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StoreResult<bool>;

    /// True when reads may be served from a pool this store does not own.
    /// Callers use this instead of inspecting concrete types.
    fn is_hybrid(&self) -> bool {
        false
    }
}

/// Reads an object that must exist.
pub fn get_object(store: &dyn Store, id: &str) -> StoreResult<Object> {
    store
        .read_object(id)?
        .ok_or_else(|| StoreError::ObjectNotFound(id.to_string()))
}

/// Follows symbolic refs until an object id is found.
pub fn resolve_ref(store: &dyn Store, name: &str) -> StoreResult<Option<String>> {
    let mut current = name.to_string();
    for _ in 0..8 {
        match store.read_ref(&current)? {
            Some(RefTarget::Direct(id)) => return Ok(Some(id)),
            Some(RefTarget::Symbolic(next)) => current = next,
            None => return Ok(None),
        }
    }
    Err(StoreError::InvalidRef(name.to_string()))
}

/// Copies every object reachable from `tip` that `dst` cannot already
/// resolve. An object `dst` already has is assumed to come with its whole
/// closure, so the walk stops there. Returns the number of objects written.
pub fn copy_closure(src: &dyn Store, dst: &dyn Store, tip: &str) -> StoreResult<usize> {
    let mut stack = vec![tip.to_string()];
    let mut seen = HashSet::new();
    let mut copied = 0;

    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) || dst.has_object(&id) {
            continue;
        }
        let obj = get_object(src, &id)?;
        match obj.kind {
            ObjectType::Commit => {
                let commit = Commit::from_object(&obj)?;
                stack.push(commit.tree);
                stack.extend(commit.parents);
            }
            ObjectType::Tree => {
                let tree = Tree::from_object(&obj)?;
                stack.extend(tree.entries.into_iter().map(|e| e.hash));
            }
            ObjectType::Blob | ObjectType::Tag => {}
        }
        dst.write_object(&obj)?;
        copied += 1;
    }

    Ok(copied)
}

/// Validates a short branch or tag name the way `git check-ref-format` would
/// for the common cases.
pub fn is_valid_ref_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.ends_with(".lock")
        && !name.ends_with('.')
        && !name.contains("..")
        && !name.contains("//")
        && !name.contains("@{")
        && name != "HEAD"
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(c))
}

fn validate_full_ref(name: &str) -> StoreResult<()> {
    if name == HEAD || name.ends_with("_HEAD") || name.starts_with("refs/") {
        Ok(())
    } else {
        Err(StoreError::InvalidRef(name.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Object>>,
    refs: RwLock<BTreeMap<String, RefTarget>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}

impl Store for MemoryStore {
    fn read_object(&self, id: &str) -> StoreResult<Option<Object>> {
        Ok(self.objects.read().get(id).cloned())
    }

    fn has_object(&self, id: &str) -> bool {
        self.objects.read().contains_key(id)
    }

    fn write_object(&self, obj: &Object) -> StoreResult<String> {
        let id = obj.id();
        self.objects
            .write()
            .entry(id.clone())
            .or_insert_with(|| obj.clone());
        Ok(id)
    }

    fn object_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.objects.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn read_ref(&self, name: &str) -> StoreResult<Option<RefTarget>> {
        Ok(self.refs.read().get(name).cloned())
    }

    fn write_ref(&self, name: &str, target: RefTarget) -> StoreResult<()> {
        validate_full_ref(name)?;
        self.refs.write().insert(name.to_string(), target);
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        Ok(self.refs.write().remove(name).is_some())
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, RefTarget)>> {
        Ok(self
            .refs
            .read()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, target)| (name.clone(), target.clone()))
            .collect())
    }

    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StoreResult<bool> {
        validate_full_ref(name)?;
        let mut refs = self.refs.write();
        let current = refs.get(name).and_then(|t| t.as_direct().map(str::to_string));
        if current.as_deref() != expected {
            return Ok(false);
        }
        match new {
            Some(id) => {
                refs.insert(name.to_string(), RefTarget::Direct(id.to_string()));
            }
            None => {
                refs.remove(name);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_head_resolves_through_branch() {
        let store = MemoryStore::new();
        let id = store.write_object(&Object::blob("x")).unwrap();
        store
            .write_ref(HEAD, RefTarget::Symbolic("refs/heads/main".into()))
            .unwrap();
        assert_eq!(resolve_ref(&store, HEAD).unwrap(), None);

        store
            .write_ref("refs/heads/main", RefTarget::Direct(id.clone()))
            .unwrap();
        assert_eq!(resolve_ref(&store, HEAD).unwrap(), Some(id));
    }

    #[test]
    fn list_refs_filters_by_prefix() {
        let store = MemoryStore::new();
        store
            .write_ref("refs/heads/a", RefTarget::Direct("1".into()))
            .unwrap();
        store
            .write_ref("refs/tags/v1", RefTarget::Direct("2".into()))
            .unwrap();
        store
            .write_ref(HEAD, RefTarget::Symbolic("refs/heads/a".into()))
            .unwrap();

        let heads = store.list_refs("refs/heads/").unwrap();
        assert_eq!(heads.len(), 1);
        assert_eq!(heads[0].0, "refs/heads/a");
        assert_eq!(store.list_refs("").unwrap().len(), 3);
    }

    #[test]
    fn compare_and_swap_refuses_stale_expectation() {
        let store = MemoryStore::new();
        assert!(store
            .compare_and_swap_ref("refs/heads/main", None, Some("a"))
            .unwrap());
        assert!(!store
            .compare_and_swap_ref("refs/heads/main", None, Some("b"))
            .unwrap());
        assert!(store
            .compare_and_swap_ref("refs/heads/main", Some("a"), Some("b"))
            .unwrap());
        assert_eq!(
            resolve_ref(&store, "refs/heads/main").unwrap().as_deref(),
            Some("b")
        );
    }

    #[test]
    fn rejects_bare_ref_names() {
        let store = MemoryStore::new();
        assert!(store.write_ref("main", RefTarget::Direct("1".into())).is_err());
    }

    #[test]
    fn ref_name_rules() {
        assert!(is_valid_ref_name("feature/login"));
        assert!(!is_valid_ref_name("bad name"));
        assert!(!is_valid_ref_name("a..b"));
        assert!(!is_valid_ref_name("-x"));
        assert!(!is_valid_ref_name("HEAD"));
    }
}
