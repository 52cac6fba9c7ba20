//! Composite store used by cloned repositories.
//!
//! A [`HybridStore`] pairs a session-owned `local` store with the shared
//! remote's pool. Every write lands in `local`; single-object reads fall
//! back to `shared`; refs and enumeration only ever see `local`, so history
//! the session never fetched cannot surface through a whole-store scan.

use crate::core::object::Object;
use crate::core::store::{MemoryStore, RefTarget, Store};
use crate::error::StoreResult;
use std::sync::Arc;

pub struct HybridStore {
    local: MemoryStore,
    shared: Arc<dyn Store>,
}

impl HybridStore {
    pub fn new(local: MemoryStore, shared: Arc<dyn Store>) -> Self {
        Self { local, shared }
    }

    pub fn local(&self) -> &MemoryStore {
        &self.local
    }
}

impl Store for HybridStore {
    fn read_object(&self, id: &str) -> StoreResult<Option<Object>> {
        match self.local.read_object(id)? {
            Some(obj) => Ok(Some(obj)),
            None => self.shared.read_object(id),
        }
    }

    fn has_object(&self, id: &str) -> bool {
        self.local.has_object(id) || self.shared.has_object(id)
    }

    fn write_object(&self, obj: &Object) -> StoreResult<String> {
        self.local.write_object(obj)
    }

    fn object_ids(&self) -> StoreResult<Vec<String>> {
        self.local.object_ids()
    }

    fn read_ref(&self, name: &str) -> StoreResult<Option<RefTarget>> {
        self.local.read_ref(name)
    }

    fn write_ref(&self, name: &str, target: RefTarget) -> StoreResult<()> {
        self.local.write_ref(name, target)
    }

    fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        self.local.delete_ref(name)
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, RefTarget)>> {
        self.local.list_refs(prefix)
    }

    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StoreResult<bool> {
        self.local.compare_and_swap_ref(name, expected, new)
    }

    fn is_hybrid(&self) -> bool {
        true
    }
}
