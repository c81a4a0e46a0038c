//! `/api/tasks` handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use tracing::instrument;
use trellis_tasks::{Paginated, TaskError, TaskView};

use super::blocking;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::server::AppState;
use crate::validation::{
    AssignTaskBody, ChangeStatusBody, CreateTaskBody, ListTasksQuery, UpdateTaskBody,
};

type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// GET /api/tasks
#[instrument(skip_all, fields(user = %user.0.id))]
pub async fn index(
    State(state): State<AppState>,
    user: CurrentUser,
    query: Result<Query<ListTasksQuery>, QueryRejection>,
) -> ApiResult<Paginated<TaskView>> {
    let Query(query) = query?;
    let (filter, page) = query.validate()?;
    let actor = user.actor();
    let service = state.service;
    let tasks = blocking(move || service.list_tasks(&actor, &filter, page)).await?;
    Ok(ApiResponse::ok(tasks, "Tasks Retrieved Successfully"))
}

/// POST /api/tasks
#[instrument(skip_all, fields(user = %user.0.id))]
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Result<Json<CreateTaskBody>, JsonRejection>,
) -> ApiResult<TaskView> {
    let Json(body) = body?;
    let (params, dependency_ids) = body.validate()?;
    let actor = user.actor();
    let service = state.service;
    let task = blocking(move || service.create_task(&actor, &params, dependency_ids.as_deref()))
        .await
        .map_err(|e| referenced(e, None))?;
    Ok(ApiResponse::created(task, "Task Created Successfuly"))
}

/// GET /api/tasks/my-tasks
#[instrument(skip_all, fields(user = %user.0.id))]
pub async fn my_tasks(State(state): State<AppState>, user: CurrentUser) -> ApiResult<Vec<TaskView>> {
    let actor = user.actor();
    let service = state.service;
    let tasks = blocking(move || service.my_tasks(&actor)).await?;
    Ok(ApiResponse::ok(tasks, "My Tasks"))
}

/// GET /api/tasks/{id}
#[instrument(skip_all, fields(user = %user.0.id, task_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<TaskView> {
    let actor = user.actor();
    let service = state.service;
    let task = blocking(move || service.get_task(&actor, &id)).await?;
    Ok(ApiResponse::ok(task, "Task Retrieved Successfully"))
}

/// PUT /api/tasks/{id}
#[instrument(skip_all, fields(user = %user.0.id, task_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<UpdateTaskBody>, JsonRejection>,
) -> ApiResult<TaskView> {
    let Json(body) = body?;
    let (params, dependency_ids) = body.validate()?;
    let actor = user.actor();
    let service = state.service;
    let task_id = id.clone();
    let task = blocking(move || {
        service.update_task(&actor, &task_id, &params, dependency_ids.as_deref())
    })
    .await
    .map_err(|e| referenced(e, Some(id.as_str())))?;
    Ok(ApiResponse::ok(task, "Task Updated Successfully"))
}

/// DELETE /api/tasks/{id}
#[instrument(skip_all, fields(user = %user.0.id, task_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let actor = user.actor();
    let service = state.service;
    blocking(move || service.delete_task(&actor, &id)).await?;
    Ok(ApiResponse::empty("Task Deleted Successfully"))
}

/// PUT /api/tasks/{id}/change-status
#[instrument(skip_all, fields(user = %user.0.id, task_id = %id))]
pub async fn change_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<ChangeStatusBody>, JsonRejection>,
) -> ApiResult<TaskView> {
    let Json(body) = body?;
    let status = body.validate()?;
    let actor = user.actor();
    let service = state.service;
    let task = blocking(move || service.change_status(&actor, &id, status)).await?;
    Ok(ApiResponse::ok(task, "Task Status Updated Successfully"))
}

/// PUT /api/tasks/{id}/assign
#[instrument(skip_all, fields(user = %user.0.id, task_id = %id))]
pub async fn assign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Result<Json<AssignTaskBody>, JsonRejection>,
) -> ApiResult<TaskView> {
    let Json(body) = body?;
    let assignee = body.validate()?;
    let actor = user.actor();
    let service = state.service;
    let task_id = id.clone();
    let task = blocking(move || service.assign_task(&actor, &task_id, &assignee))
        .await
        .map_err(|e| referenced(e, Some(id.as_str())))?;
    Ok(ApiResponse::ok(task, "Task Assigned Successfully"))
}

/// A missing user or dependency named in the body is a validation failure,
/// not a missing resource. Only the task in the path maps to 404.
fn referenced(err: ApiError, path_task: Option<&str>) -> ApiError {
    match err {
        ApiError::Task(TaskError::NotFound {
            entity: "User",
            id,
        }) => ApiError::field(
            "assigned_to",
            format!("The selected assigned_to ({id}) is invalid."),
        ),
        ApiError::Task(TaskError::NotFound {
            entity: "Task",
            id,
        }) if path_task != Some(id.as_str()) => ApiError::field(
            "dependency_ids",
            format!("The selected dependency ({id}) is invalid."),
        ),
        other => other,
    }
}
