//! API route table.

use axum::Router;
use axum::routing::{get, put};

use crate::error::ApiError;
use crate::server::AppState;

pub mod tasks;
pub mod users;

/// Routes under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/users/profile", get(users::profile))
        .route("/tasks", get(tasks::index).post(tasks::create))
        .route("/tasks/my-tasks", get(tasks::my_tasks))
        .route(
            "/tasks/{id}",
            get(tasks::show).put(tasks::update).delete(tasks::delete),
        )
        .route("/tasks/{id}/change-status", put(tasks::change_status))
        .route("/tasks/{id}/assign", put(tasks::assign))
}

/// Run a synchronous service call on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> trellis_tasks::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
