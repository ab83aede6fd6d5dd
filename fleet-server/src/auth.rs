use fleet_contracts::AgentId;

/// Issues credentials returned to a newly registered agent.
///
/// JWT issuance and the broader auth/role domain are out of scope (spec
/// non-goals); this trait exists only so `register_handler` has a stable
/// seam to call into once that work is scoped, instead of hardcoding a
/// placeholder token inline.
pub trait CredentialIssuer: Send + Sync {
    fn issue(&self, agent_id: &AgentId) -> String;
}

/// Stand-in issuer: a random opaque token, not a verifiable credential.
pub struct OpaqueTokenIssuer;

impl CredentialIssuer for OpaqueTokenIssuer {
    fn issue(&self, agent_id: &AgentId) -> String {
        format!("{}.{}", agent_id, uuid::Uuid::new_v4())
    }
}
