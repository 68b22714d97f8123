use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::{ActivitySummary, Favorite, HistoryEntry, HistoryQuery};
use super::{repo, services};
use crate::{auth::AuthUser, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(list_history))
        .route("/history/summary", get(history_summary))
        .route("/favorites", get(list_favorites))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, (StatusCode, String)> {
    let entries = services::list(
        state.store.as_ref(),
        &user.id,
        q.plan_id.as_deref(),
        q.limit,
    )
    .await
    .map_err(|e| {
        error!(error = %e, "list_history failed");
        internal(e)
    })?;
    Ok(Json(entries))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn history_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ActivitySummary>, (StatusCode, String)> {
    let summary = services::summary(state.store.as_ref(), &user.id)
        .await
        .map_err(internal)?;
    Ok(Json(summary))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Favorite>>, (StatusCode, String)> {
    let favs = repo::list_favorites(state.store.as_ref(), &user.id)
        .await
        .map_err(internal)?;
    Ok(Json(favs))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
