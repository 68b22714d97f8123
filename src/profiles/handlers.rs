use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::{ProfileSnapshot, SnapshotQuery};
use super::repo;
use crate::{auth::AuthUser, plans::dto::UserProfile, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(put_profile))
        .route("/profile/history", get(profile_history))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    match repo::load(state.store.as_ref(), &user.id).await {
        Ok(Some(p)) => Ok(Json(p)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "Profile not found".into())),
        Err(e) => {
            error!(error = %e, "get_profile failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn put_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<UserProfile>,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    let mut body = body;
    body.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if body.email.is_none() {
        body.email = user.email.clone();
    }
    repo::save(state.store.as_ref(), &user.id, &body)
        .await
        .map_err(|e| {
            error!(error = %e, "put_profile failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(body))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn profile_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<SnapshotQuery>,
) -> Result<Json<Vec<ProfileSnapshot>>, (StatusCode, String)> {
    let snapshots = repo::snapshots(state.store.as_ref(), &user.id, q.limit.clamp(1, 100))
        .await
        .map_err(|e| {
            error!(error = %e, "profile_history failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(snapshots))
}
