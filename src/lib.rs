pub mod commands;
pub mod core;
pub mod error;
pub mod graph;
pub mod mission;
pub mod remote;
pub mod server;
pub mod session;
pub mod settings;
pub mod utils;

pub use commands::Dispatcher;
pub use core::repository::Repository;
pub use core::store::{MemoryStore, Store};
pub use core::hybrid::HybridStore;
pub use core::disk::DiskStore;
pub use error::{CommandError, StoreError};
pub use graph::GraphSnapshot;
pub use remote::RemoteRegistry;
pub use session::{Session, SessionManager, Workspace};
pub use settings::Settings;
