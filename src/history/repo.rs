use anyhow::Context;
use time::OffsetDateTime;

use super::dto::{Favorite, HistoryEntry};
use crate::store::DocumentStore;

const HISTORY: &str = "plan_history";
const FAVORITES: &str = "favorite_plans";

pub async fn append(store: &dyn DocumentStore, entry: &HistoryEntry) -> anyhow::Result<()> {
    let body = serde_json::to_value(entry)?;
    store
        .create(HISTORY, &entry.id, &entry.user_id, body)
        .await
        .context("append history entry")?;
    Ok(())
}

/// Newest first. Entries that no longer deserialize are skipped.
pub async fn list_for_user(
    store: &dyn DocumentStore,
    user_id: &str,
) -> anyhow::Result<Vec<HistoryEntry>> {
    let docs = store.list_all_by_owner(HISTORY, user_id).await?;
    Ok(docs
        .into_iter()
        .filter_map(|d| match serde_json::from_value::<HistoryEntry>(d.body) {
            Ok(e) => Some(e),
            Err(e) => {
                tracing::warn!(error = %e, id = %d.id, "skipping malformed history entry");
                None
            }
        })
        .collect())
}

fn favorite_id(user_id: &str, plan_id: &str) -> String {
    format!("{user_id}:{plan_id}")
}

/// Flips the favourite flag; returns the new state.
pub async fn toggle_favorite(
    store: &dyn DocumentStore,
    user_id: &str,
    plan_id: &str,
) -> anyhow::Result<bool> {
    let id = favorite_id(user_id, plan_id);
    if store.delete(FAVORITES, &id).await? {
        return Ok(false);
    }
    let fav = Favorite {
        plan_id: plan_id.to_string(),
        added_at: OffsetDateTime::now_utc(),
    };
    store
        .create(FAVORITES, &id, user_id, serde_json::to_value(&fav)?)
        .await
        .context("store favourite")?;
    Ok(true)
}

pub async fn remove_favorite(
    store: &dyn DocumentStore,
    user_id: &str,
    plan_id: &str,
) -> anyhow::Result<()> {
    store.delete(FAVORITES, &favorite_id(user_id, plan_id)).await?;
    Ok(())
}

pub async fn list_favorites(
    store: &dyn DocumentStore,
    user_id: &str,
) -> anyhow::Result<Vec<Favorite>> {
    let docs = store.list_all_by_owner(FAVORITES, user_id).await?;
    docs.into_iter()
        .map(|d| serde_json::from_value(d.body).context("decode favourite"))
        .collect()
}
