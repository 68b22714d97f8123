use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Created,
    Viewed,
    Favorited,
    Unfavorited,
    Deleted,
}

/// One append-only activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub action: HistoryAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub plan_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { 50 }

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub total: usize,
    pub created: usize,
    pub viewed: usize,
    pub favorited: usize,
    pub unfavorited: usize,
    pub deleted: usize,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_activity: Option<OffsetDateTime>,
}

impl ActivitySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        let mut s = Self {
            total: entries.len(),
            ..Self::default()
        };
        for e in entries {
            match e.action {
                HistoryAction::Created => s.created += 1,
                HistoryAction::Viewed => s.viewed += 1,
                HistoryAction::Favorited => s.favorited += 1,
                HistoryAction::Unfavorited => s.unfavorited += 1,
                HistoryAction::Deleted => s.deleted += 1,
            }
            if s.last_activity.map_or(true, |t| e.timestamp > t) {
                s.last_activity = Some(e.timestamp);
            }
        }
        s
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteToggled {
    pub plan_id: String,
    pub favorite: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub plan_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}
