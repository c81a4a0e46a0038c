//! `/api/users` handlers.

use axum::extract::State;
use tracing::instrument;
use trellis_tasks::UserSummary;

use super::blocking;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::server::AppState;

/// GET /api/users/profile
#[instrument(skip_all, fields(user = %user.0.id))]
pub async fn profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<ApiResponse<UserSummary>, ApiError> {
    let actor = user.actor();
    let service = state.service;
    let me = blocking(move || service.profile(&actor)).await?;
    Ok(ApiResponse::ok(UserSummary::from(&me), "User Profile"))
}
