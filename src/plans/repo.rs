use anyhow::Context;

use super::dto::DietPlan;
use crate::store::DocumentStore;

const PLANS: &str = "diet_plans";

pub async fn insert(store: &dyn DocumentStore, plan: &DietPlan) -> anyhow::Result<()> {
    store
        .create(PLANS, &plan.plan_id, &plan.user_id, serde_json::to_value(plan)?)
        .await
        .context("insert diet plan")?;
    Ok(())
}

pub async fn get(store: &dyn DocumentStore, plan_id: &str) -> anyhow::Result<Option<DietPlan>> {
    let Some(doc) = store.get(PLANS, plan_id).await? else {
        return Ok(None);
    };
    let plan = serde_json::from_value(doc.body).context("decode diet plan")?;
    Ok(Some(plan))
}

pub async fn list_by_user(
    store: &dyn DocumentStore,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<DietPlan>> {
    let docs = store.list_by_owner(PLANS, user_id, limit, offset).await?;
    docs.into_iter()
        .map(|d| serde_json::from_value(d.body).context("decode diet plan"))
        .collect()
}

pub async fn delete(store: &dyn DocumentStore, plan_id: &str) -> anyhow::Result<bool> {
    store.delete(PLANS, plan_id).await
}
