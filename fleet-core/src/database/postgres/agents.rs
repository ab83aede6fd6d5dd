use async_trait::async_trait;
use chrono::Utc;
use fleet_contracts::{Agent, AgentId, AgentStatus, RegisterAgentRequest};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::database::ports::agents::AgentRepository;
use crate::error::{FleetError, Result};

#[derive(Clone)]
pub struct PostgresAgentRepository {
    pool: PgPool,
}

impl PostgresAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_agent(row: &sqlx::postgres::PgRow) -> std::result::Result<Agent, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status: AgentStatus = status_str
        .parse()
        .map_err(|e: String| sqlx::Error::Decode(e.into()))?;
    Ok(Agent {
        agent_id: AgentId(row.try_get("agent_id")?),
        server_name: row.try_get("server_name")?,
        description: row.try_get("description")?,
        ipv4: row.try_get("ipv4")?,
        os: row.try_get("os")?,
        location: row.try_get("location")?,
        status,
        interval_seconds: row.try_get("interval_seconds")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl AgentRepository for PostgresAgentRepository {
    async fn register(&self, request: RegisterAgentRequest) -> Result<Agent> {
        if request.interval_time <= 0 {
            return Err(FleetError::Validation(
                "interval_time must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO agents (
                agent_id, server_name, description, location, os,
                status, interval_seconds, created_at
            )
            VALUES ($1, $2, $3, $4, $5, 'OFF', $6, $7)
            ON CONFLICT (agent_id) DO NOTHING
            RETURNING agent_id, server_name, description, ipv4, os, location,
                      status, interval_seconds, created_at
            "#,
        )
        .bind(request.agent_id.as_str())
        .bind(&request.server_name)
        .bind(&request.description)
        .bind(&request.location)
        .bind(&request.os)
        .bind(request.interval_time)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let agent = row_to_agent(&row)?;
                info!(agent_id = %agent.agent_id, "agent registered");
                Ok(agent)
            }
            None => Err(FleetError::Conflict(format!(
                "agent {} already registered",
                request.agent_id
            ))),
        }
    }

    async fn find(&self, agent_id: &AgentId) -> Result<Option<Agent>> {
        let row = sqlx::query(
            r#"
            SELECT agent_id, server_name, description, ipv4, os, location,
                   status, interval_seconds, created_at
            FROM agents
            WHERE agent_id = $1
            "#,
        )
        .bind(agent_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_agent(&row).map_err(FleetError::from))
            .transpose()
    }

    async fn set_status(&self, agent_id: &AgentId, status: AgentStatus) -> Result<()> {
        let result = sqlx::query("UPDATE agents SET status = $1 WHERE agent_id = $2")
            .bind(status.as_str())
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FleetError::NotFound(format!("agent {agent_id} not found")));
        }
        Ok(())
    }

    async fn set_interval_seconds(&self, agent_id: &AgentId, interval_seconds: i64) -> Result<()> {
        if interval_seconds <= 0 {
            return Err(FleetError::Validation(
                "interval_seconds must be positive".to_string(),
            ));
        }
        let result = sqlx::query("UPDATE agents SET interval_seconds = $1 WHERE agent_id = $2")
            .bind(interval_seconds)
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(FleetError::NotFound(format!("agent {agent_id} not found")));
        }
        Ok(())
    }

    async fn delete(&self, agent_id: &AgentId) -> Result<()> {
        sqlx::query("DELETE FROM agents WHERE agent_id = $1")
            .bind(agent_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<AgentId>> {
        let rows = sqlx::query("SELECT agent_id FROM agents")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| AgentId(row.get("agent_id")))
            .collect())
    }
}
