//! Multi-tenancy context

use crate::error::{CrmError, CrmResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization identifier used for tenant isolation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Authenticated identity handed over by the external auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// Session context threaded explicitly into every accessor call.
///
/// A session is never re-pointed at another tenant: switching organization
/// or signing out builds a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    auth: AuthContext,
    tenant: Option<TenantId>,
}

impl Session {
    pub fn new(auth: AuthContext, tenant: Option<TenantId>) -> Self {
        Self { auth, tenant }
    }

    pub fn for_tenant(user_id: impl Into<String>, tenant: impl Into<TenantId>) -> Self {
        Self::new(AuthContext::new(user_id), Some(tenant.into()))
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Current tenant, or `TenantMissing` when none could be resolved
    pub fn tenant(&self) -> CrmResult<&TenantId> {
        self.tenant.as_ref().ok_or(CrmError::TenantMissing)
    }

    pub fn has_tenant(&self) -> bool {
        self.tenant.is_some()
    }

    /// New session for the same user scoped to another organization
    pub fn switch_tenant(&self, tenant: TenantId) -> Self {
        Self::new(self.auth.clone(), Some(tenant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tenant() {
        let session = Session::new(AuthContext::new("alice"), None);
        assert!(matches!(session.tenant(), Err(CrmError::TenantMissing)));
        assert!(!session.has_tenant());
    }

    #[test]
    fn test_switch_tenant_builds_new_session() {
        let session = Session::for_tenant("alice", "org-1");
        let other = session.switch_tenant(TenantId::new("org-2"));
        assert_eq!(session.tenant().unwrap().as_str(), "org-1");
        assert_eq!(other.tenant().unwrap().as_str(), "org-2");
        assert_eq!(other.auth().user_id, "alice");
    }
}
