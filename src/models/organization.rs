use crate::models::tenant::TenantId;
use serde::{Deserialize, Serialize};

/// Organization (agency) - the tenant itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: TenantId,
    pub name: String,
    pub created_ts: i64,
}

impl Organization {
    pub fn new(name: String) -> Self {
        Self {
            id: TenantId::new(uuid::Uuid::new_v4().to_string()),
            name,
            created_ts: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Agent,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationMember {
    pub organization_id: TenantId,
    pub user_id: String,
    pub role: MemberRole,
    pub created_ts: i64,
}
