use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_contracts::AgentId;
use sqlx::PgPool;

use crate::database::ports::metrics::MetricsSinkRepository;
use crate::error::Result;

#[derive(Clone)]
pub struct PostgresMetricsSinkRepository {
    pool: PgPool,
}

impl PostgresMetricsSinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsSinkRepository for PostgresMetricsSinkRepository {
    async fn write_point(
        &self,
        agent_id: &AgentId,
        timestamp: DateTime<Utc>,
        cpu: f64,
        ram: f64,
        disk: f64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_metrics (agent_id, timestamp, cpu, ram, disk)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (agent_id, timestamp) DO UPDATE
            SET cpu = EXCLUDED.cpu, ram = EXCLUDED.ram, disk = EXCLUDED.disk
            "#,
        )
        .bind(agent_id.as_str())
        .bind(timestamp)
        .bind(cpu)
        .bind(ram)
        .bind(disk)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
