use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// A JSON document owned by one user, keyed by `(collection, id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub body: Value,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fails if the id is already taken in the collection.
    async fn create(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        body: Value,
    ) -> anyhow::Result<Document>;

    /// Insert or replace; `created_at` of an existing document is kept.
    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        body: Value,
    ) -> anyhow::Result<Document>;

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>>;

    /// `false` when nothing was deleted.
    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool>;

    /// Newest first.
    async fn list_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Document>>;

    /// Every document the owner has in the collection, newest first, read
    /// in pages of [`LIST_PAGE`].
    async fn list_all_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> anyhow::Result<Vec<Document>> {
        let mut all = Vec::new();
        loop {
            let page = self
                .list_by_owner(collection, owner_id, LIST_PAGE, all.len() as i64)
                .await?;
            let short = (page.len() as i64) < LIST_PAGE;
            all.extend(page);
            if short {
                return Ok(all);
            }
        }
    }
}

pub const LIST_PAGE: i64 = 200;

// --- postgres ---

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    owner_id: String,
    body: Json<Value>,
    created_at: OffsetDateTime,
}

impl From<DocumentRow> for Document {
    fn from(r: DocumentRow) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            body: r.body.0,
            created_at: r.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    db: PgPool,
}

impl PgDocumentStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }
        Ok(Self { db })
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        body: Value,
    ) -> anyhow::Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (collection, id, owner_id, body)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, body, created_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(owner_id)
        .bind(Json(body))
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("insert {collection}/{id}"))?;
        Ok(row.into())
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        body: Value,
    ) -> anyhow::Result<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (collection, id, owner_id, body)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, id)
            DO UPDATE SET owner_id = EXCLUDED.owner_id, body = EXCLUDED.body, updated_at = now()
            RETURNING id, owner_id, body, created_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(owner_id)
        .bind(Json(body))
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("upsert {collection}/{id}"))?;
        Ok(row.into())
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, owner_id, body, created_at
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, owner_id, body, created_at
            FROM documents
            WHERE collection = $1 AND owner_id = $2
            ORDER BY created_at DESC, seq DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(collection)
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// --- in-memory ---

struct Stored {
    doc: Document,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<(String, String), Stored>,
    next_seq: u64,
}

/// Used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        body: Value,
    ) -> anyhow::Result<Document> {
        let mut inner = self.inner.write().await;
        let key = (collection.to_string(), id.to_string());
        if inner.docs.contains_key(&key) {
            anyhow::bail!("{collection}/{id} already exists");
        }
        let doc = Document {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            body,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.docs.insert(key, Stored { doc: doc.clone(), seq });
        Ok(doc)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        owner_id: &str,
        body: Value,
    ) -> anyhow::Result<Document> {
        let mut inner = self.inner.write().await;
        let key = (collection.to_string(), id.to_string());
        if let Some(existing) = inner.docs.get_mut(&key) {
            existing.doc.owner_id = owner_id.to_string();
            existing.doc.body = body;
            return Ok(existing.doc.clone());
        }
        let doc = Document {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            body,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.docs.insert(key, Stored { doc: doc.clone(), seq });
        Ok(doc)
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|s| s.doc.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner
            .docs
            .remove(&(collection.to_string(), id.to_string()))
            .is_some())
    }

    async fn list_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Document>> {
        let inner = self.inner.read().await;
        let mut hits: Vec<&Stored> = inner
            .docs
            .iter()
            .filter(|((c, _), s)| c == collection && s.doc.owner_id == owner_id)
            .map(|(_, s)| s)
            .collect();
        hits.sort_by(|a, b| {
            b.doc
                .created_at
                .cmp(&a.doc.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(hits
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|s| s.doc.clone())
            .collect())
    }
}
