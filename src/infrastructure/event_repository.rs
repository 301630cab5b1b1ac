//! SQLite implementation of `EventRepository`
//!
//! An event row, its get-or-created categories and the association rows are
//! written in one transaction. `events.link` is unique, so a second persist
//! of the same URL is answered with `PersistOutcome::AlreadyStored`.

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::domain::event::{EventRecord, PersistOutcome};
use crate::domain::repositories::{EventRepository, RepositoryError};

#[derive(Clone)]
pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count_events(&self) -> Result<i64, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Category names attached to the event stored under `link`, by name
    pub async fn categories_for(&self, link: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT c.category_name
            FROM categories c
            JOIN event_categories ec ON ec.category_id = c.category_id
            JOIN events e ON e.event_id = ec.event_id
            WHERE e.link = ?
            ORDER BY c.category_name
            "#,
        )
        .bind(link)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("category_name")).collect())
    }

    async fn category_id(tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<i64, RepositoryError> {
        sqlx::query("INSERT INTO categories (category_name) VALUES (?) ON CONFLICT(category_name) DO NOTHING")
            .bind(name)
            .execute(&mut **tx)
            .await?;

        Ok(sqlx::query_scalar("SELECT category_id FROM categories WHERE category_name = ?")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?)
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn persist(&self, record: &EventRecord) -> Result<PersistOutcome, RepositoryError> {
        let Some(start_time) = record.start_time else {
            return Ok(PersistOutcome::SkippedMissingStartTime);
        };

        let mut tx = self.pool.begin().await?;

        let event_id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO events
                (name, start_time, end_time, timezone, location, description,
                 event_type, link, latitude, longitude, group_name)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO NOTHING
            RETURNING event_id
            "#,
        )
        .bind(&record.name)
        .bind(start_time)
        .bind(record.end_time)
        .bind(&record.timezone)
        .bind(&record.location)
        .bind(&record.description)
        .bind(&record.event_type)
        .bind(&record.url)
        .bind(record.latitude())
        .bind(record.longitude())
        .bind(&record.group)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(event_id) = event_id else {
            tx.rollback().await?;
            return Ok(PersistOutcome::AlreadyStored);
        };

        for name in &record.categories {
            let category_id = Self::category_id(&mut tx, name).await?;
            sqlx::query(
                "INSERT INTO event_categories (event_id, category_id) VALUES (?, ?) \
                 ON CONFLICT(event_id, category_id) DO NOTHING",
            )
            .bind(event_id)
            .bind(category_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(event_id, url = %record.url, "Stored event");
        Ok(PersistOutcome::Inserted)
    }
}
