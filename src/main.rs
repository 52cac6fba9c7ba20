use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use vizgit::commands::Dispatcher;
use vizgit::remote::RemoteRegistry;
use vizgit::server::{self, AppContext};
use vizgit::session::SessionManager;
use vizgit::settings::Settings;
use vizgit::utils::log::init_logging;

#[derive(Parser)]
#[command(name = "vizgit")]
#[command(about = "Sandboxed version control engine for graph visualization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Upstream repository imported as the shared remote
        #[arg(long)]
        remote: Option<String>,
    },
    /// Interactive sandbox terminal on stdin/stdout
    Shell {
        #[arg(long)]
        session: Option<String>,
        /// Upstream repository imported as the shared remote
        #[arg(long)]
        remote: Option<String>,
    },
    /// Import an upstream repository into the shared remote store
    Ingest { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let settings = Settings::from_env();
    let remotes = Arc::new(RemoteRegistry::new(settings.data_dir.clone()));

    match cli.command {
        Commands::Serve { bind, remote } => {
            let bind = bind.unwrap_or(settings.bind);
            if let Some(url) = remote.or_else(|| settings.default_remote.clone()) {
                let registry = remotes.clone();
                tokio::task::spawn_blocking(move || install_remote(&registry, &url)).await?;
            }
            let ctx = AppContext {
                sessions: Arc::new(SessionManager::new()),
                dispatcher: Arc::new(Dispatcher::new(remotes, Arc::new(settings))),
            };
            server::run_server(bind, ctx)
                .await
                .with_context(|| format!("server on {} failed", bind))?;
        }
        Commands::Shell { session, remote } => {
            if let Some(url) = remote.or_else(|| settings.default_remote.clone()) {
                install_remote(&remotes, &url);
            }
            let dispatcher = Dispatcher::new(remotes, Arc::new(settings));
            repl(&dispatcher, session)?;
        }
        Commands::Ingest { url } => {
            let remote = remotes
                .ingest(&url)
                .with_context(|| format!("failed to import {}", url))?;
            println!(
                "{} {} into {}",
                "Imported".green(),
                remote.url,
                remote.path.display()
            );
        }
    }

    Ok(())
}

/// A failed import leaves the engine usable without a shared remote.
fn install_remote(remotes: &RemoteRegistry, url: &str) {
    match remotes.ingest(url) {
        Ok(remote) => info!(name = %remote.name, "shared remote ready"),
        Err(e) => warn!(url, error = %e, "could not import upstream repository"),
    }
}

fn repl(dispatcher: &Dispatcher, session_id: Option<String>) -> Result<()> {
    let sessions = SessionManager::new();
    let session = match session_id {
        Some(id) => sessions.get_or_create(&id),
        None => sessions.create(),
    };
    println!("{} {}", "session".cyan(), session.id());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        let cwd = session.read().cwd.display().to_string();
        print!("{} $ ", cwd.blue().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        match dispatcher.execute(&session, line) {
            Ok(output) if output.is_empty() => {}
            Ok(output) => println!("{}", output),
            Err(e) => println!("{}", e.to_string().red()),
        }
    }
    Ok(())
}
