use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use fleet_contracts::{NewOutboxRecord, OutboxId, OutboxRecord, OutboxState};
use sqlx::{PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::database::ports::outbox::OutboxRepository;
use crate::error::Result;

#[derive(Clone)]
pub struct PostgresOutboxRepository {
    pool: PgPool,
}

impl PostgresOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> std::result::Result<OutboxRecord, sqlx::Error> {
    let state_str: String = row.try_get("state")?;
    let state: OutboxState = state_str
        .parse()
        .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
    let headers_json: serde_json::Value = row.try_get("headers")?;
    let headers: Vec<(String, String)> =
        serde_json::from_value(headers_json).unwrap_or_default();

    Ok(OutboxRecord {
        id: OutboxId(row.try_get("id")?),
        topic: row.try_get("topic")?,
        partition_key: row.try_get("partition_key")?,
        payload: row.try_get("payload")?,
        headers,
        state,
        created_at: row.try_get("created_at")?,
        lock_id: row.try_get("lock_id")?,
        locked_at: row.try_get("locked_at")?,
        processed_at: row.try_get("processed_at")?,
        attempts: row.try_get("attempts")?,
        last_attempt_at: row.try_get("last_attempt_at")?,
        last_error: row.try_get("last_error")?,
    })
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn insert_batch(&self, records: Vec<NewOutboxRecord>) -> Result<Vec<OutboxRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(records.len());

        for record in records {
            let headers_json = serde_json::to_value(&record.headers).unwrap_or_default();
            let row = sqlx::query(
                r#"
                INSERT INTO outbox (id, topic, partition_key, payload, headers, state, created_at, attempts)
                VALUES ($1, $2, $3, $4, $5, 'pending', $6, 0)
                RETURNING id, topic, partition_key, payload, headers, state, created_at,
                          lock_id, locked_at, processed_at, attempts, last_attempt_at, last_error
                "#,
            )
            .bind(Uuid::now_v7())
            .bind(&record.topic)
            .bind(&record.partition_key)
            .bind(&record.payload)
            .bind(headers_json)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

            inserted.push(row_to_record(&row)?);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn acquire(&self, machine_id: &str, limit: i64) -> Result<Vec<OutboxRecord>> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET lock_id = $1, locked_at = now()
            WHERE id IN (
                SELECT id FROM outbox
                WHERE state = 'pending' AND lock_id IS NULL
                ORDER BY created_at
                LIMIT $2
            )
            "#,
        )
        .bind(machine_id)
        .bind(limit)
        .execute(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT id, topic, partition_key, payload, headers, state, created_at,
                   lock_id, locked_at, processed_at, attempts, last_attempt_at, last_error
            FROM outbox
            WHERE lock_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(machine_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_record(row).map_err(Into::into))
            .collect()
    }

    async fn mark_delivered(&self, id: OutboxId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET state = 'delivered', processed_at = now(), lock_id = NULL, locked_at = NULL,
                last_attempt_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: OutboxId,
        error: &str,
        max_attempts_enabled: bool,
        max_attempts: i32,
    ) -> Result<()> {
        let row = sqlx::query(
            r#"
            UPDATE outbox
            SET attempts = attempts + 1,
                last_error = $2,
                last_attempt_at = now(),
                lock_id = NULL,
                locked_at = NULL
            WHERE id = $1
            RETURNING attempts
            "#,
        )
        .bind(id.0)
        .bind(error)
        .fetch_one(&self.pool)
        .await?;

        let attempts: i32 = row.try_get("attempts")?;
        if max_attempts_enabled && attempts >= max_attempts {
            warn!(outbox_id = %id, attempts, "outbox record exhausted retries, marking dead");
            sqlx::query("UPDATE outbox SET state = 'dead' WHERE id = $1")
                .bind(id.0)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn release_lock(&self, ids: &[OutboxId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let raw_ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();
        sqlx::query("UPDATE outbox SET lock_id = NULL, locked_at = NULL WHERE id = ANY($1)")
            .bind(&raw_ids)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn unlock_expired(&self, max_lock_age: ChronoDuration) -> Result<u64> {
        let cutoff = Utc::now() - max_lock_age;
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET lock_id = NULL, locked_at = NULL
            WHERE lock_id IS NOT NULL AND locked_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_older_than(&self, retention: ChronoDuration) -> Result<u64> {
        let cutoff = Utc::now() - retention;
        let result = sqlx::query("DELETE FROM outbox WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn pending_stats(&self) -> Result<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS pending_count,
                COALESCE(EXTRACT(EPOCH FROM (now() - MIN(created_at)))::BIGINT, 0) AS oldest_age_seconds
            FROM outbox
            WHERE state = 'pending'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let pending_count: i64 = row.try_get("pending_count")?;
        let oldest_age_seconds: i64 = row.try_get("oldest_age_seconds")?;
        Ok((pending_count, oldest_age_seconds))
    }
}
