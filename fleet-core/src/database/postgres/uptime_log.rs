use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_contracts::{AgentId, AgentStatus, UptimeLogEntry};
use sqlx::{PgPool, Row};

use crate::database::ports::uptime_log::UptimeLogRepository;
use crate::error::Result;

#[derive(Clone)]
pub struct PostgresUptimeLogRepository {
    pool: PgPool,
}

impl PostgresUptimeLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &sqlx::postgres::PgRow) -> std::result::Result<UptimeLogEntry, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status: AgentStatus = status_str
        .parse()
        .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
    Ok(UptimeLogEntry {
        agent_id: AgentId(row.try_get("agent_id")?),
        status,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl UptimeLogRepository for PostgresUptimeLogRepository {
    async fn upsert(&self, entry: &UptimeLogEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO server_uptime (document_id, agent_id, status, timestamp)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (document_id) DO UPDATE
            SET status = EXCLUDED.status, timestamp = EXCLUDED.timestamp
            "#,
        )
        .bind(entry.document_id())
        .bind(entry.agent_id.as_str())
        .bind(entry.status.as_str())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn range(
        &self,
        agent_id: &AgentId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<UptimeLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT agent_id, status, timestamp
            FROM server_uptime
            WHERE agent_id = $1 AND timestamp >= $2 AND timestamp <= $3
            ORDER BY timestamp ASC
            "#,
        )
        .bind(agent_id.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_entry(row).map_err(Into::into))
            .collect()
    }

    async fn last_before(
        &self,
        agent_id: &AgentId,
        start: DateTime<Utc>,
    ) -> Result<Option<UptimeLogEntry>> {
        let row = sqlx::query(
            r#"
            SELECT agent_id, status, timestamp
            FROM server_uptime
            WHERE agent_id = $1 AND timestamp < $2
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(agent_id.as_str())
        .bind(start)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_entry(&row).map_err(Into::into))
            .transpose()
    }
}
