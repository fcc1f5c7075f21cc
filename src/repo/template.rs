use crate::accessor::TenantAccessor;
use crate::backend::{Backend, Order, Query};
use crate::db::schema::EMAIL_TEMPLATES;
use crate::error::{CrmError, CrmResult};
use crate::models::{EmailTemplate, NewTemplate, TemplatePatch};
use crate::repo::{fetch_one, insert_model, patch_model};

/// Email template repository, scoped to the accessor's tenant
pub struct TemplateRepo;

impl TemplateRepo {
    pub fn list<B: Backend>(acc: &TenantAccessor<'_, B>) -> CrmResult<Vec<EmailTemplate>> {
        acc.select_as(EMAIL_TEMPLATES, Query::new().order_by(Order::asc("name")))
    }

    pub fn get<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<EmailTemplate> {
        fetch_one(acc, EMAIL_TEMPLATES, "Template", id)
    }

    pub fn get_by_name<B: Backend>(acc: &TenantAccessor<'_, B>, name: &str) -> CrmResult<EmailTemplate> {
        let found: Vec<EmailTemplate> =
            acc.select_as(EMAIL_TEMPLATES, Query::new().filter("name", name).limit(1))?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| CrmError::not_found(format!("Template '{}'", name)))
    }

    pub fn create<B: Backend>(acc: &TenantAccessor<'_, B>, form: NewTemplate) -> CrmResult<EmailTemplate> {
        form.validate()?;
        let template = form.into_template(acc.tenant()?);
        insert_model(acc, EMAIL_TEMPLATES, &template)
    }

    pub fn update<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str, patch: &TemplatePatch) -> CrmResult<EmailTemplate> {
        patch_model(acc, EMAIL_TEMPLATES, id, patch)
    }

    pub fn delete<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<()> {
        acc.delete(EMAIL_TEMPLATES, id)
    }
}
