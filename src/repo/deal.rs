use crate::accessor::TenantAccessor;
use crate::backend::{Backend, Query};
use crate::db::schema::DEALS;
use crate::error::CrmResult;
use crate::models::{Deal, DealPatch, NewDeal};
use crate::repo::{fetch_one, insert_model, newest_first, patch_model};

/// Deal repository, scoped to the accessor's tenant
pub struct DealRepo;

impl DealRepo {
    pub fn list_query() -> Query {
        newest_first(None)
    }

    pub fn list<B: Backend>(acc: &TenantAccessor<'_, B>, limit: Option<usize>) -> CrmResult<Vec<Deal>> {
        acc.select_as(DEALS, newest_first(limit))
    }

    pub fn list_for_contact<B: Backend>(acc: &TenantAccessor<'_, B>, contact_id: &str) -> CrmResult<Vec<Deal>> {
        acc.select_as(DEALS, newest_first(None).filter("contact_id", contact_id))
    }

    pub fn get<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<Deal> {
        fetch_one(acc, DEALS, "Deal", id)
    }

    pub fn create<B: Backend>(acc: &TenantAccessor<'_, B>, form: NewDeal) -> CrmResult<Deal> {
        form.validate()?;
        if let Some(contact_id) = &form.contact_id {
            // Linked contact must be visible to this tenant
            crate::repo::ContactRepo::get(acc, contact_id)?;
        }
        let deal = form.into_deal(acc.tenant()?);
        insert_model(acc, DEALS, &deal)
    }

    /// Field update. A stage change made here gets the same terminal
    /// probability coercion as a board move.
    pub fn update<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str, patch: DealPatch) -> CrmResult<Deal> {
        patch.validate()?;
        if let Some(contact_id) = &patch.contact_id {
            crate::repo::ContactRepo::get(acc, contact_id)?;
        }
        let patch = patch.coerce_terminal_probability();
        patch_model(acc, DEALS, id, &patch)
    }

    pub fn delete<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<()> {
        acc.delete(DEALS, id)
    }

    pub fn resolve_id<B: Backend>(acc: &TenantAccessor<'_, B>, prefix: &str) -> CrmResult<String> {
        let deals = Self::list(acc, None)?;
        crate::repo::resolve_id_prefix(deals.iter().map(|d| d.id.as_str()), prefix, "Deal")
    }
}
