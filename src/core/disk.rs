//! Bare on-disk store backing the shared remote.
//!
//! Layout follows a bare git directory: `HEAD`, `objects/ab/cdef…`
//! (zlib-compressed), and one file per ref under `refs/`.

use crate::core::object::Object;
use crate::core::store::{RefTarget, Store, HEAD};
use crate::error::{StoreError, StoreResult};
use crate::utils::compression::{compress, decompress};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct DiskStore {
    root: PathBuf,
    ref_lock: Mutex<()>,
}

impl DiskStore {
    /// Opens an existing bare store.
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        if !Self::is_valid(&root) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a bare repository: {}", root.display()),
            )));
        }
        Ok(Self {
            root,
            ref_lock: Mutex::new(()),
        })
    }

    /// Creates a fresh bare store. `root` must not exist yet: a store that
    /// is already there may still be read by live clones.
    pub fn create<P: AsRef<Path>>(root: P, default_branch: &str) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        if let Some(parent) = root.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir(&root)?;
        for dir in ["objects", "refs/heads", "refs/tags"] {
            fs::create_dir_all(root.join(dir))?;
        }
        let head = RefTarget::Symbolic(format!("refs/heads/{}", default_branch));
        fs::write(root.join(HEAD), head.serialize())?;
        Ok(Self {
            root,
            ref_lock: Mutex::new(()),
        })
    }

    pub fn is_valid(root: &Path) -> bool {
        root.join(HEAD).is_file() && root.join("objects").is_dir() && root.join("refs").is_dir()
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &str) -> Option<PathBuf> {
        if id.len() < 3 || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let (dir, file) = id.split_at(2);
        Some(self.root.join("objects").join(dir).join(file))
    }

    fn ref_path(&self, name: &str) -> StoreResult<PathBuf> {
        let valid = name == HEAD
            || name.ends_with("_HEAD")
            || (name.starts_with("refs/") && !name.split('/').any(|part| part.is_empty() || part == ".."));
        if !valid {
            return Err(StoreError::InvalidRef(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn read_ref_file(&self, name: &str) -> StoreResult<Option<RefTarget>> {
        let path = self.ref_path(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(RefTarget::deserialize(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_ref_file(&self, name: &str, target: &RefTarget) -> StoreResult<()> {
        let path = self.ref_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut temp_path = path.clone().into_os_string();
        temp_path.push(".lock");
        let temp_path = PathBuf::from(temp_path);
        fs::write(&temp_path, target.serialize())?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn remove_ref_file(&self, name: &str) -> StoreResult<bool> {
        let path = self.ref_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Store for DiskStore {
    fn read_object(&self, id: &str) -> StoreResult<Option<Object>> {
        let Some(path) = self.object_path(id) else {
            return Ok(None);
        };
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = decompress(&compressed)?;
        Ok(Some(Object::decode(id, &raw)?))
    }

    fn has_object(&self, id: &str) -> bool {
        self.object_path(id).map(|p| p.is_file()).unwrap_or(false)
    }

    fn write_object(&self, obj: &Object) -> StoreResult<String> {
        let raw = obj.encode();
        let id = crate::core::object::hash_content(&raw);
        let path = self
            .object_path(&id)
            .ok_or_else(|| StoreError::InvalidRef(id.clone()))?;
        if path.exists() {
            return Ok(id);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&temp_path, compress(&raw)?)?;
        fs::rename(&temp_path, &path)?;
        Ok(id)
    }

    fn object_ids(&self) -> StoreResult<Vec<String>> {
        let objects_dir = self.root.join("objects");
        let mut objects = Vec::new();
        for entry in WalkDir::new(&objects_dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let prefix = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str());
            let suffix = entry.file_name().to_str();
            if let (Some(prefix), Some(suffix)) = (prefix, suffix) {
                if prefix.len() == 2 && suffix.chars().all(|c| c.is_ascii_hexdigit()) {
                    objects.push(format!("{}{}", prefix, suffix));
                }
            }
        }
        objects.sort();
        Ok(objects)
    }

    fn read_ref(&self, name: &str) -> StoreResult<Option<RefTarget>> {
        self.read_ref_file(name)
    }

    fn write_ref(&self, name: &str, target: RefTarget) -> StoreResult<()> {
        let _guard = self.ref_lock.lock();
        self.write_ref_file(name, &target)
    }

    fn delete_ref(&self, name: &str) -> StoreResult<bool> {
        let _guard = self.ref_lock.lock();
        self.remove_ref_file(name)
    }

    fn list_refs(&self, prefix: &str) -> StoreResult<Vec<(String, RefTarget)>> {
        let mut refs = Vec::new();
        if HEAD.starts_with(prefix) {
            if let Some(target) = self.read_ref_file(HEAD)? {
                refs.push((HEAD.to_string(), target));
            }
        }
        for entry in WalkDir::new(self.root.join("refs"))
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            if !name.starts_with(prefix) || name.ends_with(".lock") {
                continue;
            }
            if let Some(target) = self.read_ref_file(&name)? {
                refs.push((name, target));
            }
        }
        refs.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(refs)
    }

    fn compare_and_swap_ref(
        &self,
        name: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StoreResult<bool> {
        let _guard = self.ref_lock.lock();
        let current = self
            .read_ref_file(name)?
            .and_then(|t| t.as_direct().map(str::to_string));
        if current.as_deref() != expected {
            return Ok(false);
        }
        match new {
            Some(id) => self.write_ref_file(name, &RefTarget::Direct(id.to_string()))?,
            None => {
                self.remove_ref_file(name)?;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::resolve_ref;
    use tempfile::TempDir;

    #[test]
    fn persists_objects_and_refs_across_reopen() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("remote");
        let id = {
            let store = DiskStore::create(&root, "main").unwrap();
            let id = store.write_object(&Object::blob("payload")).unwrap();
            store
                .write_ref("refs/heads/main", RefTarget::Direct(id.clone()))
                .unwrap();
            id
        };

        let store = DiskStore::open(&root).unwrap();
        assert_eq!(store.read_object(&id).unwrap(), Some(Object::blob("payload")));
        assert_eq!(store.object_ids().unwrap(), vec![id.clone()]);
        assert_eq!(resolve_ref(&store, HEAD).unwrap(), Some(id));
    }

    #[test]
    fn lists_nested_refs_with_head() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::create(temp.path().join("r"), "main").unwrap();
        store
            .write_ref("refs/heads/feature/x", RefTarget::Direct("ab".into()))
            .unwrap();
        store
            .write_ref("refs/tags/v1", RefTarget::Direct("cd".into()))
            .unwrap();

        let names: Vec<String> = store.list_refs("").unwrap().into_iter().map(|r| r.0).collect();
        assert_eq!(names, vec!["HEAD", "refs/heads/feature/x", "refs/tags/v1"]);
        assert_eq!(store.list_refs("refs/tags/").unwrap().len(), 1);
    }

    #[test]
    fn cas_deletes_when_new_is_none() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::create(temp.path().join("r"), "main").unwrap();
        store
            .write_ref("refs/heads/old", RefTarget::Direct("aa".into()))
            .unwrap();
        assert!(store
            .compare_and_swap_ref("refs/heads/old", Some("aa"), None)
            .unwrap());
        assert_eq!(store.read_ref("refs/heads/old").unwrap(), None);
    }

    #[test]
    fn create_leaves_an_existing_store_alone() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("r");
        let id = {
            let store = DiskStore::create(&root, "main").unwrap();
            store.write_object(&Object::blob("kept")).unwrap()
        };

        let err = DiskStore::create(&root, "main").err().unwrap();
        assert!(matches!(err, StoreError::Io(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists));
        let store = DiskStore::open(&root).unwrap();
        assert_eq!(store.read_object(&id).unwrap(), Some(Object::blob("kept")));
    }

    #[test]
    fn refuses_escaping_ref_names() {
        let temp = TempDir::new().unwrap();
        let store = DiskStore::create(temp.path().join("r"), "main").unwrap();
        assert!(store
            .write_ref("refs/../../etc", RefTarget::Direct("aa".into()))
            .is_err());
    }
}
