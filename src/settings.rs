use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Process-wide settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Holds the `remotes/<name>-<uuid>` bare stores.
    pub data_dir: PathBuf,
    pub bind: SocketAddr,
    /// Upstream URL imported as the shared remote at startup.
    pub default_remote: Option<String>,
    pub author_name: String,
    pub author_email: String,
}

impl Settings {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let data_dir = env::var_os("VIZGIT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let bind = env::var("VIZGIT_BIND")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_bind);
        let default_remote = env::var("VIZGIT_DEFAULT_REMOTE")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let author_name = env::var("VIZGIT_AUTHOR_NAME").unwrap_or_else(|_| whoami::realname());
        let author_email = env::var("VIZGIT_AUTHOR_EMAIL")
            .unwrap_or_else(|_| format!("{}@vizgit.local", whoami::username()));

        Self {
            data_dir,
            bind,
            default_remote,
            author_name,
            author_email,
        }
    }

    /// Settings rooted at `data_dir` with fixed identity, for tests and tools.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bind: default_bind(),
            default_remote: None,
            author_name: "Sandbox User".to_string(),
            author_email: "sandbox@vizgit.local".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("vizgit")
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}
