//! HTTP routes for managing backups.
//!

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::{
    auth::Authorizer,
    database::DatabaseTool,
    service::{BackupError, BackupService},
};

/// State shared by the handlers.
pub struct AppState<D: DatabaseTool> {
    /// The backup service.
    pub service: Arc<BackupService<D>>,

    /// Decides which requests may manage backups.
    pub authorizer: Arc<dyn Authorizer>,
}

/// The body of a `POST /backups` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRequest {
    /// `create`, `restore`, `delete` or `rename`.
    pub action: String,

    /// The backup to act on.
    pub name: Option<String>,

    /// The new name for `rename`.
    pub new_name: Option<String>,
}

/// The body of a response to a request that failed because of the request.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message.
    pub message: String,

    /// Machine readable code.
    pub code: String,
}

/// Create the router for the backup routes.
pub fn router<D: DatabaseTool + 'static>(state: Arc<AppState<D>>) -> Router {
    Router::new()
        .route("/backups", get(list_backups::<D>).post(backup_action::<D>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_backups<D: DatabaseTool + 'static>(
    State(state): State<Arc<AppState<D>>>,
    headers: HeaderMap,
) -> Response {
    if !state.authorizer.is_authorized(&headers) {
        return unauthorized();
    }

    let service = Arc::clone(&state.service);
    match blocking(move || service.list_backups()).await {
        Ok(backups) => Json(backups).into_response(),
        Err(error) => {
            error!("Could not list backups: {error:?}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list backups").into_response()
        }
    }
}

async fn backup_action<D: DatabaseTool + 'static>(
    State(state): State<Arc<AppState<D>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.authorizer.is_authorized(&headers) {
        return unauthorized();
    }

    let request: BackupRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!("Rejected malformed backup request: {error}");
            return bad_request("Invalid request body");
        }
    };

    let Some(action) = Action::parse(&request.action) else {
        warn!("Rejected unknown backup action '{}'", request.action);
        return bad_request("Invalid action");
    };

    let Some(name) = request.name else {
        return bad_request("Missing name");
    };

    let service = Arc::clone(&state.service);
    let result = match action {
        Action::Create => blocking(move || service.create_backup(&name))
            .await
            .map(|metadata| Json(metadata).into_response()),

        Action::Restore => blocking(move || service.restore_backup(&name))
            .await
            .map(|()| StatusCode::OK.into_response()),

        Action::Delete => blocking(move || service.delete_backup(&name))
            .await
            .map(|()| StatusCode::OK.into_response()),

        Action::Rename => {
            let Some(new_name) = request.new_name else {
                return bad_request("Missing newName");
            };

            blocking(move || service.rename_backup(&name, &new_name))
                .await
                .map(|()| StatusCode::OK.into_response())
        }
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

/// The actions of a `POST /backups` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Restore,
    Delete,
    Rename,
}

impl Action {
    fn parse(action: &str) -> Option<Self> {
        match action {
            "create" => Some(Self::Create),
            "restore" => Some(Self::Restore),
            "delete" => Some(Self::Delete),
            "rename" => Some(Self::Rename),
            _ => None,
        }
    }
}

/// Run a blocking backup operation off the async runtime.
async fn blocking<T, F>(operation: F) -> Result<T, HandlerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BackupError> + Send + 'static,
{
    match tokio::task::spawn_blocking(operation).await {
        Ok(result) => result.map_err(HandlerError::Backup),
        Err(error) => {
            error!("Backup operation did not complete: {error}");
            Err(HandlerError::Panicked)
        }
    }
}

/// Why a handler failed.
#[derive(Debug)]
enum HandlerError {
    Backup(BackupError),
    Panicked,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        match self {
            Self::Backup(error) => error.into_response(),
            Self::Panicked => internal_error(),
        }
    }
}

impl IntoResponse for BackupError {
    fn into_response(self) -> Response {
        match self.code() {
            Some(code) => {
                let body = ErrorBody {
                    message: self.to_string(),
                    code: code.to_string(),
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            None => {
                error!("Backup operation failed: {self}");
                internal_error()
            }
        }
    }
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}

fn bad_request(message: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Backup operation failed").into_response()
}
