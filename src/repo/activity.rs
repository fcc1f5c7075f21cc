use crate::accessor::TenantAccessor;
use crate::backend::{Backend, Order, Query};
use crate::db::schema::ACTIVITIES;
use crate::error::CrmResult;
use crate::models::{Activity, ActivityPatch, ActivityStatus, NewActivity};
use crate::repo::{fetch_one, insert_model, newest_first, patch_model, ContactRepo, DealRepo};

/// Activity repository, scoped to the accessor's tenant
pub struct ActivityRepo;

impl ActivityRepo {
    pub fn list<B: Backend>(acc: &TenantAccessor<'_, B>, limit: Option<usize>) -> CrmResult<Vec<Activity>> {
        acc.select_as(ACTIVITIES, newest_first(limit))
    }

    pub fn list_for_contact<B: Backend>(acc: &TenantAccessor<'_, B>, contact_id: &str) -> CrmResult<Vec<Activity>> {
        acc.select_as(ACTIVITIES, newest_first(None).filter("contact_id", contact_id))
    }

    pub fn list_for_deal<B: Backend>(acc: &TenantAccessor<'_, B>, deal_id: &str) -> CrmResult<Vec<Activity>> {
        acc.select_as(ACTIVITIES, newest_first(None).filter("deal_id", deal_id))
    }

    /// Planned activities by due date; undated ones last
    pub fn upcoming<B: Backend>(acc: &TenantAccessor<'_, B>, limit: Option<usize>) -> CrmResult<Vec<Activity>> {
        let query = Query::new()
            .filter("status", ActivityStatus::Planifie.as_str())
            .order_by(Order::asc("due_ts"));
        let mut activities: Vec<Activity> = acc.select_as(ACTIVITIES, query)?;
        activities.sort_by_key(|a| (a.due_ts.is_none(), a.due_ts));
        if let Some(n) = limit {
            activities.truncate(n);
        }
        Ok(activities)
    }

    pub fn get<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<Activity> {
        fetch_one(acc, ACTIVITIES, "Activity", id)
    }

    pub fn create<B: Backend>(acc: &TenantAccessor<'_, B>, form: NewActivity) -> CrmResult<Activity> {
        form.validate()?;
        if let Some(contact_id) = &form.contact_id {
            ContactRepo::get(acc, contact_id)?;
        }
        if let Some(deal_id) = &form.deal_id {
            DealRepo::get(acc, deal_id)?;
        }
        let activity = form.into_activity(acc.tenant()?);
        insert_model(acc, ACTIVITIES, &activity)
    }

    pub fn update<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str, patch: &ActivityPatch) -> CrmResult<Activity> {
        if let Some(title) = &patch.title {
            crate::models::validate::non_empty(title, "Title")?;
        }
        patch_model(acc, ACTIVITIES, id, patch)
    }

    /// Mark an activity done
    pub fn complete<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<Activity> {
        let patch = ActivityPatch {
            status: Some(ActivityStatus::Termine),
            ..Default::default()
        };
        patch_model(acc, ACTIVITIES, id, &patch)
    }

    pub fn delete<B: Backend>(acc: &TenantAccessor<'_, B>, id: &str) -> CrmResult<()> {
        acc.delete(ACTIVITIES, id)
    }

    pub fn resolve_id<B: Backend>(acc: &TenantAccessor<'_, B>, prefix: &str) -> CrmResult<String> {
        let activities = Self::list(acc, None)?;
        crate::repo::resolve_id_prefix(activities.iter().map(|a| a.id.as_str()), prefix, "Activity")
    }
}
