pub mod commit;
pub mod config;
pub mod disk;
pub mod fs;
pub mod hybrid;
pub mod index;
pub mod merge;
pub mod object;
pub mod refs;
pub mod repository;
pub mod status;
pub mod store;
pub mod tree;

pub use commit::{Author, Commit};
pub use config::Config;
pub use disk::DiskStore;
pub use fs::MemFs;
pub use hybrid::HybridStore;
pub use index::{Index, IndexEntry};
pub use object::{Object, ObjectType};
pub use refs::Head;
pub use repository::Repository;
pub use status::Status;
pub use store::{MemoryStore, RefTarget, Store};
pub use tree::{FileEntry, FileMap, Tree};
