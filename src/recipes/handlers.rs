use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::dto::{RecipeQuery, RecipeResponse};
use super::services::{fetch_recipe, RecipeError};
use crate::{auth::AuthUser, gemini::QueueError, state::AppState};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/recipes", get(get_recipe))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<RecipeQuery>,
) -> Result<Json<RecipeResponse>, (StatusCode, String)> {
    let dish = q.dish.trim();
    if dish.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "dish is required".into()));
    }
    let cuisine = q.cuisine.as_deref().map(str::trim).filter(|c| !c.is_empty());

    fetch_recipe(&state.completions, dish, cuisine)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, %dish, "get_recipe failed");
            match e {
                RecipeError::Completion(QueueError::RateLimited(_)) => {
                    (StatusCode::TOO_MANY_REQUESTS, e.to_string())
                }
                _ => (StatusCode::BAD_GATEWAY, e.to_string()),
            }
        })
}
