use anyhow::Context;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{DietPlan, GenerationOutcome, UserProfile, RECENT_CAP};
use super::normalizer::{self, Normalized, Strategy};
use super::prompt::build_plan_prompt;
use super::repo;
use crate::auth::AuthUser;
use crate::gemini::{GeminiError, GenerateContentResponse, QueueError};
use crate::history::{dto::HistoryAction, repo as history_repo, services as history};
use crate::profiles;
use crate::state::AppState;

/// Always produces a plan: provider failures fall back to synthesis and are
/// reported through `notice`. Only persistence failures are errors.
pub async fn generate_plan(
    st: &AppState,
    user: &AuthUser,
    mut profile: UserProfile,
) -> anyhow::Result<GenerationOutcome> {
    if profile.email.is_none() {
        profile.email = user.email.clone();
    }

    let request = st.completions.plan_request(build_plan_prompt(&profile));
    let usable = |r: &GenerateContentResponse| {
        matches!(normalizer::decide(r.text()), Strategy::StructuredParse(_))
    };
    let (normalized, notice) = match st.completions.complete(request, usable).await {
        Ok(completion) => {
            let n = normalizer::normalize(&completion.response, &profile, &mut rand::thread_rng());
            (n, None)
        }
        Err(e) => {
            warn!(error = %e, user_id = %user.id, "completion failed; serving fallback plan");
            let n = normalizer::fallback_plan(&profile, &mut rand::thread_rng());
            (n, Some(user_message(&e)))
        }
    };
    let Normalized {
        meal_plans,
        recommendations,
        source,
        fallback_reason,
    } = normalized;

    let plan = DietPlan {
        plan_id: Uuid::new_v4().to_string(),
        user_data: profile,
        meal_plans,
        recommendations,
        created_at: OffsetDateTime::now_utc(),
        user_id: user.id.clone(),
    };
    repo::insert(st.store.as_ref(), &plan).await?;
    info!(plan_id = %plan.plan_id, ?source, ?fallback_reason, days = plan.meal_plans.len(), "plan created");

    history::record_quietly(
        st.store.as_ref(),
        &user.id,
        &plan.plan_id,
        HistoryAction::Created,
        Some(format!("{} day plan", plan.meal_plans.len())),
    )
    .await;
    if let Err(e) = profiles::repo::save(st.store.as_ref(), &user.id, &plan.user_data).await {
        warn!(error = %e, user_id = %user.id, "failed to save profile");
    }

    Ok(GenerationOutcome {
        plan,
        source,
        notice,
    })
}

/// Text shown to the user when the completion could not be obtained.
pub fn user_message(e: &QueueError) -> String {
    match e {
        QueueError::RateLimited(_) => e.to_string(),
        QueueError::Request(GeminiError::Auth { .. }) => {
            "The meal planning service is not authorized right now. A standard plan is shown instead.".into()
        }
        QueueError::Request(GeminiError::Rejected { .. }) => {
            "The meal planning service rejected the request. A standard plan is shown instead.".into()
        }
        _ => "Failed to generate a personalized meal plan. A standard plan is shown instead.".into(),
    }
}

/// The plan if it exists and belongs to `user`; records a view.
pub async fn view_plan(st: &AppState, user: &AuthUser, plan_id: &str) -> anyhow::Result<Option<DietPlan>> {
    let Some(plan) = owned_plan(st, user, plan_id).await? else {
        return Ok(None);
    };
    history::record_quietly(st.store.as_ref(), &user.id, plan_id, HistoryAction::Viewed, None).await;
    Ok(Some(plan))
}

pub async fn list_plans(
    st: &AppState,
    user: &AuthUser,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<DietPlan>> {
    repo::list_by_user(st.store.as_ref(), &user.id, limit.clamp(1, 100), offset.max(0)).await
}

/// Plans the user recently created or opened, most recent first. Deleted
/// plans drop out.
pub async fn recent_plans(st: &AppState, user: &AuthUser, limit: usize) -> anyhow::Result<Vec<DietPlan>> {
    let ids = history::recent_plan_ids(st.store.as_ref(), &user.id, limit.clamp(1, RECENT_CAP)).await?;
    let mut plans = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(plan) = owned_plan(st, user, &id).await? {
            plans.push(plan);
        }
    }
    Ok(plans)
}

/// `false` when there was no such plan for this user.
pub async fn delete_plan(st: &AppState, user: &AuthUser, plan_id: &str) -> anyhow::Result<bool> {
    if owned_plan(st, user, plan_id).await?.is_none() {
        return Ok(false);
    }
    let deleted = repo::delete(st.store.as_ref(), plan_id).await?;
    if deleted {
        if let Err(e) = history_repo::remove_favorite(st.store.as_ref(), &user.id, plan_id).await {
            warn!(error = %e, %plan_id, "failed to clear favourite");
        }
        history::record_quietly(st.store.as_ref(), &user.id, plan_id, HistoryAction::Deleted, None).await;
    }
    Ok(deleted)
}

/// New favourite state, or `None` when the plan is not the user's.
pub async fn toggle_favorite(
    st: &AppState,
    user: &AuthUser,
    plan_id: &str,
) -> anyhow::Result<Option<bool>> {
    if owned_plan(st, user, plan_id).await?.is_none() {
        return Ok(None);
    }
    let favorite = history::toggle_favorite(st.store.as_ref(), &user.id, plan_id)
        .await
        .context("toggle favourite")?;
    Ok(Some(favorite))
}

async fn owned_plan(st: &AppState, user: &AuthUser, plan_id: &str) -> anyhow::Result<Option<DietPlan>> {
    Ok(repo::get(st.store.as_ref(), plan_id)
        .await?
        .filter(|p| p.user_id == user.id))
}
