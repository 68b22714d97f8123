use std::collections::HashSet;

use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::{ActivitySummary, HistoryAction, HistoryEntry};
use super::repo;
use crate::store::DocumentStore;

pub async fn record(
    store: &dyn DocumentStore,
    user_id: &str,
    plan_id: &str,
    action: HistoryAction,
    details: Option<String>,
) -> anyhow::Result<HistoryEntry> {
    let entry = HistoryEntry {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        plan_id: plan_id.to_string(),
        action,
        details,
        timestamp: OffsetDateTime::now_utc(),
    };
    repo::append(store, &entry).await?;
    Ok(entry)
}

/// Like [`record`], but a failure is only logged. History never blocks the
/// operation it describes.
pub async fn record_quietly(
    store: &dyn DocumentStore,
    user_id: &str,
    plan_id: &str,
    action: HistoryAction,
    details: Option<String>,
) {
    if let Err(e) = record(store, user_id, plan_id, action, details).await {
        tracing::warn!(error = %e, %user_id, %plan_id, ?action, "failed to record history");
    }
}

pub async fn list(
    store: &dyn DocumentStore,
    user_id: &str,
    plan_id: Option<&str>,
    limit: usize,
) -> anyhow::Result<Vec<HistoryEntry>> {
    let entries = repo::list_for_user(store, user_id).await?;
    Ok(entries
        .into_iter()
        .filter(|e| plan_id.map_or(true, |p| e.plan_id == p))
        .take(limit)
        .collect())
}

/// Most recently created or viewed plan ids, each once, newest first.
pub async fn recent_plan_ids(
    store: &dyn DocumentStore,
    user_id: &str,
    limit: usize,
) -> anyhow::Result<Vec<String>> {
    let entries = repo::list_for_user(store, user_id).await?;
    let mut seen = HashSet::new();
    Ok(entries
        .into_iter()
        .filter(|e| matches!(e.action, HistoryAction::Created | HistoryAction::Viewed))
        .map(|e| e.plan_id)
        .filter(|id| seen.insert(id.clone()))
        .take(limit)
        .collect())
}

pub async fn summary(store: &dyn DocumentStore, user_id: &str) -> anyhow::Result<ActivitySummary> {
    let entries = repo::list_for_user(store, user_id).await?;
    Ok(ActivitySummary::from_entries(&entries))
}

/// Toggles the favourite flag and records the matching history action.
pub async fn toggle_favorite(
    store: &dyn DocumentStore,
    user_id: &str,
    plan_id: &str,
) -> anyhow::Result<bool> {
    let favorite = repo::toggle_favorite(store, user_id, plan_id).await?;
    let action = if favorite {
        HistoryAction::Favorited
    } else {
        HistoryAction::Unfavorited
    };
    record_quietly(store, user_id, plan_id, action, None).await;
    Ok(favorite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;

    #[tokio::test]
    async fn list_filters_by_plan_and_limits() {
        let store = MemoryDocumentStore::new();
        record(&store, "u1", "p1", HistoryAction::Created, None).await.unwrap();
        record(&store, "u1", "p2", HistoryAction::Created, None).await.unwrap();
        record(&store, "u1", "p1", HistoryAction::Viewed, None).await.unwrap();
        record(&store, "u2", "p9", HistoryAction::Created, None).await.unwrap();

        let p1 = list(&store, "u1", Some("p1"), 50).await.unwrap();
        assert_eq!(p1.len(), 2);
        assert_eq!(p1[0].action, HistoryAction::Viewed);
        assert_eq!(p1[1].action, HistoryAction::Created);

        let limited = list(&store, "u1", None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].plan_id, "p1");
    }

    #[tokio::test]
    async fn toggle_flips_and_records_both_directions() {
        let store = MemoryDocumentStore::new();
        assert!(toggle_favorite(&store, "u1", "p1").await.unwrap());
        assert_eq!(repo::list_favorites(&store, "u1").await.unwrap().len(), 1);
        assert!(!toggle_favorite(&store, "u1", "p1").await.unwrap());
        assert!(repo::list_favorites(&store, "u1").await.unwrap().is_empty());

        let s = summary(&store, "u1").await.unwrap();
        assert_eq!((s.total, s.favorited, s.unfavorited), (2, 1, 1));
        assert!(s.last_activity.is_some());
    }

    #[tokio::test]
    async fn recent_ids_are_distinct_and_ignore_other_actions() {
        let store = MemoryDocumentStore::new();
        record(&store, "u1", "p1", HistoryAction::Created, None).await.unwrap();
        record(&store, "u1", "p2", HistoryAction::Created, None).await.unwrap();
        record(&store, "u1", "p1", HistoryAction::Viewed, None).await.unwrap();
        record(&store, "u1", "p3", HistoryAction::Favorited, None).await.unwrap();
        record(&store, "u1", "p1", HistoryAction::Viewed, None).await.unwrap();

        assert_eq!(recent_plan_ids(&store, "u1", 10).await.unwrap(), vec!["p1", "p2"]);
        assert_eq!(recent_plan_ids(&store, "u1", 1).await.unwrap(), vec!["p1"]);

        for i in 0..15 {
            record(&store, "u1", &format!("n{i}"), HistoryAction::Viewed, None).await.unwrap();
        }
        let ids = recent_plan_ids(&store, "u1", 10).await.unwrap();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], "n14");
    }

    #[tokio::test]
    async fn summary_counts_every_entry_of_a_long_history() {
        let store = MemoryDocumentStore::new();
        for i in 0..1205 {
            let action = if i % 5 == 0 { HistoryAction::Created } else { HistoryAction::Viewed };
            record(&store, "u1", "p1", action, None).await.unwrap();
        }
        let s = summary(&store, "u1").await.unwrap();
        assert_eq!((s.total, s.created, s.viewed), (1205, 241, 964));
        assert_eq!(list(&store, "u1", Some("p1"), 5000).await.unwrap().len(), 1205);
    }

    #[tokio::test]
    async fn summary_of_nothing_is_zeroed() {
        let store = MemoryDocumentStore::new();
        assert_eq!(summary(&store, "nobody").await.unwrap(), ActivitySummary::default());
    }
}
