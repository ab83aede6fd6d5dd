//! Library surface of the fleet monitoring server: the HTTP boundary
//! (`routes`), the HTTP error mapping (`errors`), and the credential-issuer
//! seam (`auth`). `main.rs` wires these to the process lifecycle; the
//! `tests/` integration suite exercises them directly against a real
//! Postgres pool and Redis connection.

pub mod auth;
pub mod errors;
pub mod routes;

use std::sync::Arc;

use fleet_core::database::postgres::{PostgresAgentRepository, PostgresOutboxRepository};
use fleet_core::gateway::HeartbeatGateway;

use crate::auth::CredentialIssuer;

#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<PostgresAgentRepository>,
    pub gateway: Arc<HeartbeatGateway<PostgresAgentRepository, PostgresOutboxRepository>>,
    pub credential_issuer: Arc<dyn CredentialIssuer>,
}
