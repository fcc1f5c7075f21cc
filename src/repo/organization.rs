use crate::accessor::TenantAccessor;
use crate::backend::{to_row, Backend, Order, Query};
use crate::db::schema::{ORGANIZATIONS, ORGANIZATION_MEMBERS};
use crate::error::{CrmError, CrmResult};
use crate::models::{validate, MemberRole, Organization, OrganizationMember, TenantId};

/// Repository for the tenant-defining tables.
///
/// These reads go through the accessor without tenant filter injection, so
/// they work for a session that has not selected an organization yet.
pub struct OrganizationRepo;

impl OrganizationRepo {
    /// Found a new organization; the caller becomes its owner
    pub fn create<B: Backend>(acc: &TenantAccessor<'_, B>, name: &str) -> CrmResult<Organization> {
        validate::non_empty(name, "Organization name")?;
        let org = Organization::new(name.trim().to_string());
        acc.insert(ORGANIZATIONS, to_row(&org)?)?;

        let member = OrganizationMember {
            organization_id: org.id.clone(),
            user_id: acc.session().auth().user_id.clone(),
            role: MemberRole::Owner,
            created_ts: org.created_ts,
        };
        acc.insert(ORGANIZATION_MEMBERS, to_row(&member)?)?;
        log::info!("Created organization {} ({})", org.name, org.id);
        Ok(org)
    }

    /// Organizations the current user belongs to, by name
    pub fn list_for_user<B: Backend>(acc: &TenantAccessor<'_, B>) -> CrmResult<Vec<Organization>> {
        acc.select_as(ORGANIZATIONS, Query::new().order_by(Order::asc("name")))
    }

    pub fn get<B: Backend>(acc: &TenantAccessor<'_, B>, id: &TenantId) -> CrmResult<Organization> {
        let found: Vec<Organization> =
            acc.select_as(ORGANIZATIONS, Query::new().filter("id", id.as_str()).limit(1))?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::not_found(format!("Organization {}", id)))
    }

    pub fn members<B: Backend>(acc: &TenantAccessor<'_, B>, id: &TenantId) -> CrmResult<Vec<OrganizationMember>> {
        acc.select_as(
            ORGANIZATION_MEMBERS,
            Query::new()
                .filter("organization_id", id.as_str())
                .order_by(Order::asc("created_ts")),
        )
    }

    /// Add an agent to an organization (owners only, enforced by the backend)
    pub fn add_member<B: Backend>(
        acc: &TenantAccessor<'_, B>,
        id: &TenantId,
        user_id: &str,
    ) -> CrmResult<OrganizationMember> {
        validate::non_empty(user_id, "User")?;
        let member = OrganizationMember {
            organization_id: id.clone(),
            user_id: user_id.trim().to_string(),
            role: MemberRole::Agent,
            created_ts: chrono::Utc::now().timestamp(),
        };
        acc.insert(ORGANIZATION_MEMBERS, to_row(&member)?)?;
        Ok(member)
    }

    /// Resolve a full id or unique prefix among the user's organizations
    pub fn resolve_id<B: Backend>(acc: &TenantAccessor<'_, B>, prefix: &str) -> CrmResult<TenantId> {
        let orgs = Self::list_for_user(acc)?;
        crate::repo::resolve_id_prefix(orgs.iter().map(|o| o.id.as_str()), prefix, "Organization")
            .map(TenantId::from)
    }
}
