use crate::accessor::TenantAccessor;
use crate::backend::{Backend, Query};
use crate::db::schema::CONTACTS;
use crate::error::CrmResult;
use crate::models::{Contact, ContactPatch, NewContact};
use crate::repo::{fetch_one, insert_model, newest_first, patch_model};

/// Contact repository, scoped to the accessor's tenant
pub struct ContactRepo;

impl ContactRepo {
    /// Query backing the contact list and the contact board
    pub fn list_query() -> Query {
        newest_first(None)
    }

    pub fn list<B: Backend>(acc: &TenantAccessor<'_, B>, limit: Option<usize>) -> CrmResult<Vec<Contact>> {
        acc.select_as(CONTACTS, newest_first(limit))
    }

    pub fn get<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<Contact> {
        fetch_one(acc, CONTACTS, "Contact", id)
    }

    /// Validate the form and insert the contact in the initial stage
    pub fn create<B: Backend>(acc: &TenantAccessor<'_, B>, form: NewContact) -> CrmResult<Contact> {
        form.validate()?;
        let contact = form.into_contact(acc.tenant()?);
        insert_model(acc, CONTACTS, &contact)
    }

    pub fn update<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str, patch: &ContactPatch) -> CrmResult<Contact> {
        patch.validate()?;
        patch_model(acc, CONTACTS, id, patch)
    }

    pub fn delete<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<()> {
        acc.delete(CONTACTS, id)
    }

    /// Resolve a full id or unique id prefix
    pub fn resolve_id<B: Backend>(acc: &TenantAccessor<'_, B>, prefix: &str) -> CrmResult<String> {
        let contacts = Self::list(acc, None)?;
        crate::repo::resolve_id_prefix(contacts.iter().map(|c| c.id.as_str()), prefix, "Contact")
    }
}
