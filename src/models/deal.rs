use crate::error::CrmResult;
use crate::models::stage::{DealStage, StageSet};
use crate::models::tenant::TenantId;
use crate::models::validate;
use serde::{Deserialize, Serialize};

/// Default win probability of a freshly created deal
pub const DEFAULT_PROBABILITY: i64 = 10;

/// Deal (sale or rental opportunity) model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub organization_id: TenantId,
    pub title: String,
    #[serde(default)]
    pub contact_id: Option<String>,
    #[serde(default)]
    pub property_address: Option<String>,
    /// Expected amount in euros
    #[serde(default)]
    pub amount: Option<i64>,
    /// Win probability, 0..=100
    pub probability: i64,
    pub stage: DealStage,
    #[serde(default)]
    pub expected_close_ts: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Deal {
    /// Weighted pipeline value (amount x probability), saturating at the i64 bounds
    pub fn weighted_amount(&self) -> Option<i64> {
        self.amount.map(|amount| {
            let weighted = i128::from(amount) * i128::from(self.probability) / 100;
            i64::try_from(weighted).unwrap_or(if weighted < 0 { i64::MIN } else { i64::MAX })
        })
    }
}

/// Deal creation form
#[derive(Debug, Clone)]
pub struct NewDeal {
    pub title: String,
    pub contact_id: Option<String>,
    pub property_address: Option<String>,
    pub amount: Option<i64>,
    pub probability: i64,
    pub expected_close_ts: Option<i64>,
    pub notes: Option<String>,
}

impl NewDeal {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            contact_id: None,
            property_address: None,
            amount: None,
            probability: DEFAULT_PROBABILITY,
            expected_close_ts: None,
            notes: None,
        }
    }

    pub fn validate(&self) -> CrmResult<()> {
        validate::non_empty(&self.title, "Title")?;
        validate::probability(self.probability)?;
        if let Some(amount) = self.amount {
            validate::non_negative_amount(amount, "Amount")?;
        }
        Ok(())
    }

    pub fn into_deal(self, tenant: &TenantId) -> Deal {
        let now = chrono::Utc::now().timestamp();
        Deal {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: tenant.clone(),
            title: self.title.trim().to_string(),
            contact_id: self.contact_id,
            property_address: self.property_address,
            amount: self.amount,
            probability: self.probability,
            stage: DealStage::initial(),
            expected_close_ts: self.expected_close_ts,
            notes: self.notes,
            created_ts: now,
            modified_ts: now,
        }
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, Serialize)]
pub struct DealPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<DealStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_close_ts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DealPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.contact_id.is_none()
            && self.property_address.is_none()
            && self.amount.is_none()
            && self.probability.is_none()
            && self.stage.is_none()
            && self.expected_close_ts.is_none()
            && self.notes.is_none()
    }

    pub fn validate(&self) -> CrmResult<()> {
        if let Some(title) = &self.title {
            validate::non_empty(title, "Title")?;
        }
        if let Some(probability) = self.probability {
            validate::probability(probability)?;
        }
        if let Some(amount) = self.amount {
            validate::non_negative_amount(amount, "Amount")?;
        }
        Ok(())
    }

    /// A stage change into a terminal stage overrides any explicit probability.
    pub fn coerce_terminal_probability(mut self) -> Self {
        if let Some(forced) = self.stage.and_then(|s| s.forced_probability()) {
            self.probability = Some(forced);
        }
        self
    }
}
