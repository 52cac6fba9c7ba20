use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object {0} not found")]
    ObjectNotFound(String),
    #[error("object {id} is corrupted: {reason}")]
    Corrupted { id: String, reason: String },
    #[error("invalid reference name '{0}'")]
    InvalidRef(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Worktree(#[from] FsError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("{}: No such file or directory", .0.display())]
    NotFound(PathBuf),
    #[error("{}: Not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("{}: Is a directory", .0.display())]
    IsADirectory(PathBuf),
    #[error("{}: File exists", .0.display())]
    AlreadyExists(PathBuf),
    #[error("{}: Directory not empty", .0.display())]
    NotEmpty(PathBuf),
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("fatal: unable to access '{url}': {reason}")]
    Unreachable { url: String, reason: String },
    #[error("fatal: '{0}' does not appear to be a git repository")]
    NoSuchRemote(String),
    #[error("failed to import upstream history: {0}")]
    Import(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),
}

/// Failure of a single dispatched command.
///
/// `Usage` comes out of the parse phase, `Fatal` and `Rejected` out of the
/// resolve phase, the wrapped store/fs/remote errors out of perform.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Fatal(String),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    UnknownCommand(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl CommandError {
    pub fn usage(msg: impl Into<String>) -> Self {
        CommandError::Usage(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        CommandError::Fatal(msg.into())
    }

    /// Store IO failures are the only command errors that indicate a fault
    /// in the engine rather than in what the user typed.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CommandError::Store(StoreError::Io(_)) | CommandError::Store(StoreError::Corrupted { .. })
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type CommandResult<T> = Result<T, CommandError>;
