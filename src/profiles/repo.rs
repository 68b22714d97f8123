use anyhow::Context;
use time::OffsetDateTime;
use uuid::Uuid;

use super::dto::ProfileSnapshot;
use crate::plans::dto::UserProfile;
use crate::store::DocumentStore;

const PROFILES: &str = "user_profiles";
const SNAPSHOTS: &str = "user_profile_history";

/// The last profile the user submitted, one per user.
pub async fn load(store: &dyn DocumentStore, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
    let Some(doc) = store.get(PROFILES, user_id).await? else {
        return Ok(None);
    };
    let profile = serde_json::from_value(doc.body).context("decode stored profile")?;
    Ok(Some(profile))
}

/// Replaces the current profile and appends a snapshot of it.
pub async fn save(
    store: &dyn DocumentStore,
    user_id: &str,
    profile: &UserProfile,
) -> anyhow::Result<ProfileSnapshot> {
    let body = serde_json::to_value(profile)?;
    store
        .upsert(PROFILES, user_id, user_id, body)
        .await
        .context("save profile")?;

    let snapshot = ProfileSnapshot {
        id: Uuid::new_v4().to_string(),
        profile: profile.clone(),
        submitted_at: OffsetDateTime::now_utc(),
    };
    store
        .create(SNAPSHOTS, &snapshot.id, user_id, serde_json::to_value(&snapshot)?)
        .await
        .context("append profile snapshot")?;
    Ok(snapshot)
}

/// Newest first.
pub async fn snapshots(
    store: &dyn DocumentStore,
    user_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<ProfileSnapshot>> {
    let docs = store.list_by_owner(SNAPSHOTS, user_id, limit, 0).await?;
    docs.into_iter()
        .map(|d| serde_json::from_value(d.body).context("decode profile snapshot"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plans::dto::fixtures::profile;
    use crate::plans::dto::CuisinePreference;
    use crate::store::MemoryDocumentStore;

    #[tokio::test]
    async fn saving_twice_keeps_the_latest() {
        let store = MemoryDocumentStore::new();
        assert!(load(&store, "u1").await.unwrap().is_none());

        save(&store, "u1", &profile(3, CuisinePreference::Both)).await.unwrap();
        save(&store, "u1", &profile(7, CuisinePreference::SouthIndian)).await.unwrap();

        let got = load(&store, "u1").await.unwrap().unwrap();
        assert_eq!(got.days, 7);
        assert_eq!(got.cuisine_preference, CuisinePreference::SouthIndian);
    }

    #[tokio::test]
    async fn every_submission_is_kept_newest_first() {
        let store = MemoryDocumentStore::new();
        for days in [3, 5, 7] {
            save(&store, "u1", &profile(days, CuisinePreference::Both)).await.unwrap();
        }
        save(&store, "u2", &profile(1, CuisinePreference::Both)).await.unwrap();

        let all = snapshots(&store, "u1", 20).await.unwrap();
        let days: Vec<u32> = all.iter().map(|s| s.profile.days).collect();
        assert_eq!(days, vec![7, 5, 3]);

        let latest = snapshots(&store, "u1", 1).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].profile.days, 7);
        assert!(snapshots(&store, "nobody", 20).await.unwrap().is_empty());
    }
}
