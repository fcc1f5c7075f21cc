use crate::error::CrmResult;
use crate::models::stage::{ContactStage, StageSet};
use crate::models::tenant::TenantId;
use crate::models::validate;
use serde::{Deserialize, Serialize};

/// Contact (lead) model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub organization_id: TenantId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Where the lead came from (portal, referral, walk-in, ...)
    #[serde(default)]
    pub source: Option<String>,
    /// Purchase budget in euros
    #[serde(default)]
    pub budget: Option<i64>,
    pub stage: ContactStage,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Contact {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Contact creation form
#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub budget: Option<i64>,
    pub notes: Option<String>,
}

impl NewContact {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> CrmResult<()> {
        validate::non_empty(&self.last_name, "Last name")?;
        if let Some(email) = &self.email {
            validate::email(email)?;
        }
        if let Some(phone) = &self.phone {
            validate::phone(phone)?;
        }
        if let Some(budget) = self.budget {
            validate::non_negative_amount(budget, "Budget")?;
        }
        Ok(())
    }

    /// Build the row to insert: fresh id, owning tenant, initial stage
    pub fn into_contact(self, tenant: &TenantId) -> Contact {
        let now = chrono::Utc::now().timestamp();
        Contact {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: tenant.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email,
            phone: self.phone,
            source: self.source,
            budget: self.budget,
            stage: ContactStage::initial(),
            notes: self.notes,
            created_ts: now,
            modified_ts: now,
        }
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ContactStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.source.is_none()
            && self.budget.is_none()
            && self.stage.is_none()
            && self.notes.is_none()
    }

    pub fn validate(&self) -> CrmResult<()> {
        if let Some(last_name) = &self.last_name {
            validate::non_empty(last_name, "Last name")?;
        }
        if let Some(email) = &self.email {
            validate::email(email)?;
        }
        if let Some(phone) = &self.phone {
            validate::phone(phone)?;
        }
        if let Some(budget) = self.budget {
            validate::non_negative_amount(budget, "Budget")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contact_starts_in_initial_stage() {
        let tenant = TenantId::new("org-1");
        let contact = NewContact::new(" Marie ", "Dupont").into_contact(&tenant);
        assert_eq!(contact.stage, ContactStage::Nouveau);
        assert_eq!(contact.organization_id, tenant);
        assert_eq!(contact.first_name, "Marie");
        assert!(!contact.id.is_empty());
        assert_eq!(contact.display_name(), "Marie Dupont");
    }

    #[test]
    fn test_new_contact_validation() {
        assert!(NewContact::new("Marie", "").validate().is_err());

        let mut form = NewContact::new("Marie", "Dupont");
        form.email = Some("not-an-email".to_string());
        assert!(form.validate().is_err());

        form.email = Some("marie@agence.fr".to_string());
        form.budget = Some(-5);
        assert!(form.validate().is_err());

        form.budget = Some(350_000);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = ContactPatch {
            stage: Some(ContactStage::Mandat),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "stage": "mandat" }));
        assert!(!patch.is_empty());
        assert!(ContactPatch::default().is_empty());
    }
}
