use crate::error::CrmResult;
use crate::models::tenant::TenantId;
use crate::models::validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Appel,
    Email,
    RendezVous,
    Visite,
    Tache,
}

impl ActivityType {
    pub const ALL: &'static [ActivityType] = &[
        ActivityType::Appel,
        ActivityType::Email,
        ActivityType::RendezVous,
        ActivityType::Visite,
        ActivityType::Tache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Appel => "appel",
            ActivityType::Email => "email",
            ActivityType::RendezVous => "rendez_vous",
            ActivityType::Visite => "visite",
            ActivityType::Tache => "tache",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

/// Activity priority, ordered from lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Basse,
    Normale,
    Haute,
    Urgente,
}

impl Priority {
    pub const ALL: &'static [Priority] = &[
        Priority::Basse,
        Priority::Normale,
        Priority::Haute,
        Priority::Urgente,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Basse => "basse",
            Priority::Normale => "normale",
            Priority::Haute => "haute",
            Priority::Urgente => "urgente",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == s)
    }
}

/// Activity lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    Planifie,
    Termine,
    Annule,
}

impl ActivityStatus {
    pub const ALL: &'static [ActivityStatus] = &[
        ActivityStatus::Planifie,
        ActivityStatus::Termine,
        ActivityStatus::Annule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Planifie => "planifie",
            ActivityStatus::Termine => "termine",
            ActivityStatus::Annule => "annule",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityStatus::Termine | ActivityStatus::Annule)
    }
}

/// Scheduled activity (call, visit, appointment...) optionally tied to a contact or deal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub organization_id: TenantId,
    pub title: String,
    pub activity_type: ActivityType,
    pub priority: Priority,
    pub status: ActivityStatus,
    #[serde(default)]
    pub due_ts: Option<i64>,
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub deal_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Activity {
    pub fn is_overdue(&self, now: i64) -> bool {
        self.status == ActivityStatus::Planifie && self.due_ts.is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub title: String,
    pub activity_type: ActivityType,
    pub priority: Priority,
    pub due_ts: Option<i64>,
    pub contact_id: Option<String>,
    pub deal_id: Option<String>,
    pub notes: Option<String>,
}

impl NewActivity {
    pub fn new(title: impl Into<String>, activity_type: ActivityType) -> Self {
        Self {
            title: title.into(),
            activity_type,
            priority: Priority::Normale,
            due_ts: None,
            contact_id: None,
            deal_id: None,
            notes: None,
        }
    }

    pub fn validate(&self) -> CrmResult<()> {
        validate::non_empty(&self.title, "Title")
    }

    pub fn into_activity(self, tenant: &TenantId) -> Activity {
        let now = chrono::Utc::now().timestamp();
        Activity {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: tenant.clone(),
            title: self.title.trim().to_string(),
            activity_type: self.activity_type,
            priority: self.priority,
            status: ActivityStatus::Planifie,
            due_ts: self.due_ts,
            contact_id: self.contact_id,
            deal_id: self.deal_id,
            notes: self.notes,
            created_ts: now,
            modified_ts: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ActivityStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_conversions() {
        assert_eq!(ActivityType::from_str("rendez_vous"), Some(ActivityType::RendezVous));
        assert_eq!(ActivityType::from_str("À faire"), None);
        assert_eq!(Priority::from_str("urgente"), Some(Priority::Urgente));
        assert_eq!(ActivityStatus::from_str("planifie"), Some(ActivityStatus::Planifie));
        assert!(Priority::Urgente > Priority::Haute);
    }

    #[test]
    fn test_new_activity_is_planned() {
        let activity = NewActivity::new("Rappeler M. Martin", ActivityType::Appel)
            .into_activity(&TenantId::new("org-1"));
        assert_eq!(activity.status, ActivityStatus::Planifie);
        assert_eq!(activity.priority, Priority::Normale);
    }

    #[test]
    fn test_is_overdue() {
        let mut activity = NewActivity::new("Visite", ActivityType::Visite)
            .into_activity(&TenantId::new("org-1"));
        assert!(!activity.is_overdue(1_000));
        activity.due_ts = Some(500);
        assert!(activity.is_overdue(1_000));
        activity.status = ActivityStatus::Termine;
        assert!(!activity.is_overdue(1_000));
    }
}
