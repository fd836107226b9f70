//! Caller context for request-scoped identity.

use serde::{Deserialize, Serialize};

use crate::types::{Capability, ExternalUserId, IdentityProvider};

/// Identity of the client calling the service.
///
/// Built once per request (REST) or per session (MCP) and immutable
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    /// External identity (e.g., API key hash or "anonymous")
    external_id: ExternalUserId,
    /// Identity provider that authenticated this caller
    provider: IdentityProvider,
    /// Optional display name
    display_name: Option<String>,
    /// Capabilities granted to the caller
    capabilities: Vec<Capability>,
    /// Whether this is an anonymous caller
    is_anonymous: bool,
    /// Client IP address
    ip_address: Option<String>,
    /// Client user agent
    user_agent: Option<String>,
}

impl CallerContext {
    /// Create a new caller context.
    pub fn new(
        external_id: ExternalUserId,
        provider: IdentityProvider,
        display_name: Option<String>,
        capabilities: Vec<Capability>,
    ) -> Self {
        let is_anonymous = provider.as_str() == "anonymous";
        Self {
            external_id,
            provider,
            display_name,
            capabilities,
            is_anonymous,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Create an anonymous caller with the given capabilities.
    pub fn anonymous(capabilities: Vec<Capability>) -> Self {
        Self {
            external_id: ExternalUserId::new("anonymous"),
            provider: IdentityProvider::new("anonymous"),
            display_name: Some("Anonymous".to_string()),
            capabilities,
            is_anonymous: true,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Trusted local operator (CLI and stdio transport). Holds every
    /// capability.
    pub fn local_operator() -> Self {
        Self::new(
            ExternalUserId::new("local"),
            IdentityProvider::new("local"),
            Some("Local Operator".to_string()),
            vec![Capability::new(Capability::WILDCARD)],
        )
    }

    /// Set client metadata for logging.
    pub fn with_client_info(
        mut self,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// Get the external identity.
    pub fn external_id(&self) -> &ExternalUserId {
        &self.external_id
    }

    /// Get the identity provider.
    pub fn provider(&self) -> &IdentityProvider {
        &self.provider
    }

    /// Get the display name.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Capabilities granted to this caller.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Whether any granted capability covers `required`.
    pub fn has_capability(&self, required: &Capability) -> bool {
        self.capabilities.iter().any(|c| c.grants(required))
    }

    /// Check if this is an anonymous caller.
    pub fn is_anonymous(&self) -> bool {
        self.is_anonymous
    }

    /// Get the client IP address.
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Get the client user agent.
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Get a display-friendly name for this caller.
    pub fn display(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.external_id.to_string(),
        }
    }
}
