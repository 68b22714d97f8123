use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::{DietPlan, GenerationOutcome, Pagination, PlanListItem, RecentQuery, UserProfile};
use super::services;
use crate::{auth::AuthUser, history::dto::FavoriteToggled, state::AppState};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/plans/recent", get(recent_plans))
        .route("/plans/:id", get(get_plan).delete(delete_plan))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/plans/generate", post(generate_plan))
        .route("/plans/:id/favorite", post(toggle_favorite))
}

// --- handlers ---

/// POST /plans/generate. 201 even when the plan had to be synthesized;
/// `source` and `notice` tell the two apart.
#[instrument(skip(state, user, profile), fields(user_id = %user.id))]
pub async fn generate_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Json(profile): Json<UserProfile>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<GenerationOutcome>), (StatusCode, String)>
{
    profile
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let outcome = services::generate_plan(&state, &user, profile)
        .await
        .map_err(|e| {
            error!(error = %e, "generate_plan failed");
            internal(e)
        })?;

    let location = format!("/api/v1/plans/{}", outcome.plan.plan_id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(outcome)))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_plans(
    State(state): State<AppState>,
    user: AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<PlanListItem>>, (StatusCode, String)> {
    let plans = services::list_plans(&state, &user, p.limit, p.offset)
        .await
        .map_err(internal)?;
    Ok(Json(plans.iter().map(PlanListItem::from).collect()))
}

/// GET /plans/recent. Created or opened plans, newest first, at most ten.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn recent_plans(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<RecentQuery>,
) -> Result<Json<Vec<PlanListItem>>, (StatusCode, String)> {
    let plans = services::recent_plans(&state, &user, q.limit)
        .await
        .map_err(|e| {
            error!(error = %e, "recent_plans failed");
            internal(e)
        })?;
    Ok(Json(plans.iter().map(PlanListItem::from).collect()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DietPlan>, (StatusCode, String)> {
    match services::view_plan(&state, &user, &id).await {
        Ok(Some(plan)) => Ok(Json(plan)),
        Ok(None) => Err(not_found()),
        Err(e) => {
            error!(error = %e, %id, "get_plan failed");
            Err(internal(e))
        }
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_plan(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    match services::delete_plan(&state, &user, &id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err(not_found()),
        Err(e) => {
            error!(error = %e, %id, "delete_plan failed");
            Err(internal(e))
        }
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FavoriteToggled>, (StatusCode, String)> {
    match services::toggle_favorite(&state, &user, &id).await {
        Ok(Some(favorite)) => Ok(Json(FavoriteToggled { plan_id: id, favorite })),
        Ok(None) => Err(not_found()),
        Err(e) => {
            error!(error = %e, %id, "toggle_favorite failed");
            Err(internal(e))
        }
    }
}

fn not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Plan not found".into())
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
