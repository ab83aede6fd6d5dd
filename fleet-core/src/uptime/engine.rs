use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleet_contracts::{AgentId, AgentStatus, FleetUptimeSummary, UptimeLogEntry, UptimeWindow};
use tokio::sync::Semaphore;
use tracing::warn;

use crate::database::ports::{AgentRepository, UptimeLogRepository};
use crate::error::Result;

/// Window query and carry-over uptime computation (spec §4.4).
pub struct UptimeEngine<A, U>
where
    A: AgentRepository + 'static,
    U: UptimeLogRepository + 'static,
{
    agents: Arc<A>,
    log: Arc<U>,
    worker_pool_size: usize,
    health_threshold_percent: f64,
}

impl<A, U> UptimeEngine<A, U>
where
    A: AgentRepository + 'static,
    U: UptimeLogRepository + 'static,
{
    pub fn new(agents: Arc<A>, log: Arc<U>, worker_pool_size: usize, health_threshold_percent: f64) -> Self {
        Self {
            agents,
            log,
            worker_pool_size: worker_pool_size.max(1),
            health_threshold_percent,
        }
    }

    /// `ComputeWindow(agent_id, start, end)` (spec §4.4 steps 1-5).
    pub async fn compute_window(
        &self,
        agent_id: &AgentId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<UptimeWindow> {
        let entries = self.log.range(agent_id, start, end).await?;
        let prior = self.log.last_before(agent_id, start).await?;
        let prior_status = prior.map(|e| e.status).unwrap_or(AgentStatus::Off);

        let window_seconds = (end - start).num_milliseconds() as f64 / 1000.0;
        let on_seconds = on_seconds_in_window(&entries, prior_status, start, end);

        let uptime_ratio = if window_seconds > 0.0 {
            100.0 * on_seconds / window_seconds
        } else {
            0.0
        };
        let label = if uptime_ratio >= self.health_threshold_percent && on_seconds > 0.0 {
            AgentStatus::On
        } else {
            AgentStatus::Off
        };

        Ok(UptimeWindow {
            agent_id: agent_id.clone(),
            on_seconds,
            window_seconds,
            uptime_ratio,
            label,
        })
    }

    /// `AverageUptime(start, end)`: fans `compute_window` out over every
    /// known agent through a semaphore-bounded pool (spec §4.4, §5).
    pub async fn average_uptime(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<FleetUptimeSummary> {
        let agent_ids = self.agents.list_ids().await?;
        if agent_ids.is_empty() {
            return Ok(FleetUptimeSummary::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.worker_pool_size));
        let mut tasks = Vec::with_capacity(agent_ids.len());

        for agent_id in agent_ids {
            let semaphore = Arc::clone(&semaphore);
            let agents = Arc::clone(&self.agents);
            let log = Arc::clone(&self.log);
            let health_threshold_percent = self.health_threshold_percent;
            tasks.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("uptime worker pool semaphore never closes");
                let engine = UptimeEngine {
                    agents,
                    log,
                    worker_pool_size: 1,
                    health_threshold_percent,
                };
                engine.compute_window(&agent_id, start, end).await
            }));
        }

        let mut windows = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(Ok(window)) => windows.push(window),
                Ok(Err(err)) => warn!(error = %err, "uptime window computation failed, excluding agent"),
                Err(err) => warn!(error = %err, "uptime worker task panicked, excluding agent"),
            }
        }

        Ok(summarize(&windows))
    }
}

fn on_seconds_in_window(
    entries: &[UptimeLogEntry],
    prior_status: AgentStatus,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> f64 {
    if entries.is_empty() {
        return if prior_status == AgentStatus::On {
            (end - start).num_milliseconds() as f64 / 1000.0
        } else {
            0.0
        };
    }

    let mut total_ms: i64 = 0;

    let first = &entries[0];
    if first.status == AgentStatus::Off && prior_status == AgentStatus::On {
        total_ms += (first.timestamp - start).num_milliseconds();
    }

    for pair in entries.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if current.status == AgentStatus::On {
            total_ms += (next.timestamp - current.timestamp).num_milliseconds();
        }
    }

    let last = entries.last().expect("checked non-empty above");
    if last.status == AgentStatus::On {
        total_ms += (end - last.timestamp).num_milliseconds();
    }

    total_ms.max(0) as f64 / 1000.0
}

fn summarize(windows: &[UptimeWindow]) -> FleetUptimeSummary {
    let total = windows.len();
    let online_count = windows.iter().filter(|w| w.label == AgentStatus::On).count();
    let offline_count = total - online_count;
    let avg_uptime_ratio = if total > 0 {
        windows.iter().map(|w| w.uptime_ratio).sum::<f64>() / total as f64
    } else {
        0.0
    };

    FleetUptimeSummary {
        total,
        online_count,
        offline_count,
        avg_uptime_ratio,
    }
}
