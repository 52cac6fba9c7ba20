//! Thin HTTP surface over the session engine.
//!
//! Every core call runs on the blocking pool; the async side only moves
//! JSON in and out. User mistakes in a command come back as `200 {error}`,
//! faults in the engine as `500`.

use crate::commands::Dispatcher;
use crate::error::SessionError;
use crate::graph::{self, GraphSnapshot};
use crate::session::SessionManager;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppContext {
    pub sessions: Arc<SessionManager>,
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GraphQuery {
    #[serde(default)]
    pub show_all: bool,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker failed: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        let body = CommandResponse {
            output: None,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id/commands", post(run_command))
        .route("/api/sessions/:id/graph", get(session_graph))
        .route("/api/remote/graph", get(remote_graph))
        .with_state(ctx)
}

pub async fn run_server(bind: SocketAddr, ctx: AppContext) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", bind);
    axum::serve(listener, router(ctx)).await
}

pub async fn create_session(State(ctx): State<AppContext>) -> Json<SessionCreated> {
    let session = ctx.sessions.create();
    Json(SessionCreated {
        session_id: session.id().to_string(),
    })
}

pub async fn run_command(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let session = ctx.sessions.get(&id)?;
    let dispatcher = ctx.dispatcher.clone();
    let result = tokio::task::spawn_blocking(move || dispatcher.execute(&session, &req.command)).await?;

    match result {
        Ok(output) => Ok(Json(CommandResponse {
            output: Some(output),
            error: None,
        })),
        Err(e) if e.is_internal() => Err(ApiError::Internal(e.to_string())),
        Err(e) => Ok(Json(CommandResponse {
            output: None,
            error: Some(e.to_string()),
        })),
    }
}

pub async fn session_graph(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<GraphQuery>,
) -> Result<Json<GraphSnapshot>, ApiError> {
    let session = ctx.sessions.get(&id)?;
    let snapshot = tokio::task::spawn_blocking(move || graph::build(&session.read(), query.show_all))
        .await?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(snapshot))
}

/// The shared remote's own history; empty when no remote is installed.
pub async fn remote_graph(State(ctx): State<AppContext>) -> Result<Json<GraphSnapshot>, ApiError> {
    let Some(remote) = ctx.dispatcher.remotes().current() else {
        return Ok(Json(GraphSnapshot::default()));
    };
    let snapshot = tokio::task::spawn_blocking(move || graph::build_remote(&remote))
        .await?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteRegistry;
    use crate::settings::Settings;

    fn context() -> AppContext {
        AppContext {
            sessions: Arc::new(SessionManager::new()),
            dispatcher: Arc::new(Dispatcher::new(
                Arc::new(RemoteRegistry::new("/tmp/vizgit-server")),
                Arc::new(Settings::with_data_dir("/tmp/vizgit-server")),
            )),
        }
    }

    async fn send(ctx: &AppContext, id: &str, command: &str) -> Result<Json<CommandResponse>, ApiError> {
        run_command(
            State(ctx.clone()),
            Path(id.to_string()),
            Json(CommandRequest {
                command: command.to_string(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn user_errors_are_200_with_error_field() {
        let ctx = context();
        let Json(created) = create_session(State(ctx.clone())).await;

        let Json(ok) = send(&ctx, &created.session_id, "git init").await.unwrap();
        assert!(ok.output.is_some() && ok.error.is_none());

        let Json(failed) = send(&ctx, &created.session_id, "git checkout nonexistent").await.unwrap();
        assert_eq!(failed.output, None);
        assert!(failed.error.unwrap().contains("did not match"));
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let ctx = context();
        let err = send(&ctx, "ghost", "ls").await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn graph_reflects_commands() {
        let ctx = context();
        let Json(created) = create_session(State(ctx.clone())).await;
        let id = created.session_id;
        for line in ["mkdir p", "cd p", "git init", "touch a", "git add a", "git commit -m first"] {
            send(&ctx, &id, line).await.unwrap();
        }
        let Json(snapshot) = session_graph(State(ctx.clone()), Path(id), Query(GraphQuery::default()))
            .await
            .unwrap();
        assert_eq!(snapshot.commits.len(), 1);
        assert_eq!(snapshot.commits[0].message, "first");

        let Json(remote) = remote_graph(State(ctx)).await.unwrap();
        assert!(remote.commits.is_empty());
    }

    #[test]
    fn response_omits_absent_fields() {
        let body = CommandResponse {
            output: Some("ok".into()),
            error: None,
        };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"output":"ok"}"#);
    }
}
