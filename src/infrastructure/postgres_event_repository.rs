//! PostgreSQL implementation of `EventRepository`
//!
//! Same schema and transaction shape as the SQLite repository; connection
//! parameters come from the `database` configuration section.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::domain::event::{EventRecord, PersistOutcome};
use crate::domain::repositories::{EventRepository, RepositoryError};
use crate::infrastructure::config::DatabaseConfig;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS events (
        event_id BIGSERIAL PRIMARY KEY,
        name TEXT,
        start_time TIMESTAMP NOT NULL,
        end_time TIMESTAMP,
        timezone TEXT,
        location TEXT,
        description TEXT,
        event_type TEXT,
        link TEXT NOT NULL UNIQUE,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION,
        group_name TEXT,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        category_id BIGSERIAL PRIMARY KEY,
        category_name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event_categories (
        event_id BIGINT NOT NULL REFERENCES events (event_id) ON DELETE CASCADE,
        category_id BIGINT NOT NULL REFERENCES categories (category_id) ON DELETE CASCADE,
        UNIQUE (event_id, category_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_events_start_time ON events (start_time)",
];

#[derive(Clone)]
pub struct PostgresEventRepository {
    pool: PgPool,
}

impl PostgresEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using host, user, password and database name
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepositoryError> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| RepositoryError::Connection("database host is not set".into()))?;
        let database = config
            .name
            .as_deref()
            .ok_or_else(|| RepositoryError::Connection("database name is not set".into()))?;

        let mut options = PgConnectOptions::new().host(host).database(database);
        if let Some(port) = config.port {
            options = options.port(port);
        }
        if let Some(user) = config.user.as_deref() {
            options = options.username(user);
        }
        if let Some(password) = config.password.as_deref() {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        info!("Connected to PostgreSQL database {} on {}", database, host);
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("PostgreSQL schema is up to date");
        Ok(())
    }

    async fn category_id(tx: &mut Transaction<'_, Postgres>, name: &str) -> Result<i64, RepositoryError> {
        sqlx::query("INSERT INTO categories (category_name) VALUES ($1) ON CONFLICT (category_name) DO NOTHING")
            .bind(name)
            .execute(&mut **tx)
            .await?;

        Ok(sqlx::query_scalar("SELECT category_id FROM categories WHERE category_name = $1")
            .bind(name)
            .fetch_one(&mut **tx)
            .await?)
    }
}

#[async_trait]
impl EventRepository for PostgresEventRepository {
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (link) DO NOTHING
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
                "INSERT INTO event_categories (event_id, category_id) VALUES ($1, $2) \
                 ON CONFLICT (event_id, category_id) DO NOTHING",
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
