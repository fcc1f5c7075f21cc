//! Filter expression evaluator and list sorting
//!
//! Filtering runs client-side over the collection already fetched for the
//! current tenant; nothing here talks to the backend.

use crate::filter::parser::FilterTerm;
use crate::models::{Contact, Deal, StageSet};
use crate::utils::did_you_mean;

#[derive(Debug, Clone)]
pub enum FilterExpr {
    All,
    Term(FilterTerm),
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

/// Fields an entity exposes to filters and sort keys
pub trait Filterable {
    type Stage: StageSet;

    fn stage(&self) -> Self::Stage;
    fn source(&self) -> Option<&str> {
        None
    }
    fn amount(&self) -> Option<i64>;
    fn probability(&self) -> Option<i64> {
        None
    }
    fn sort_name(&self) -> String;
    fn created_ts(&self) -> i64;
    /// Free-text fields searched by `+text`
    fn text_fields(&self) -> Vec<&str>;
}

impl Filterable for Contact {
    type Stage = crate::models::ContactStage;

    fn stage(&self) -> Self::Stage {
        self.stage
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn amount(&self) -> Option<i64> {
        self.budget
    }

    fn sort_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name).to_lowercase()
    }

    fn created_ts(&self) -> i64 {
        self.created_ts
    }

    fn text_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.first_name.as_str(), self.last_name.as_str()];
        fields.extend(self.email.as_deref());
        fields.extend(self.phone.as_deref());
        fields.extend(self.source.as_deref());
        fields.extend(self.notes.as_deref());
        fields
    }
}

impl Filterable for Deal {
    type Stage = crate::models::DealStage;

    fn stage(&self) -> Self::Stage {
        self.stage
    }

    fn amount(&self) -> Option<i64> {
        self.amount
    }

    fn probability(&self) -> Option<i64> {
        Some(self.probability)
    }

    fn sort_name(&self) -> String {
        self.title.to_lowercase()
    }

    fn created_ts(&self) -> i64 {
        self.created_ts
    }

    fn text_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str()];
        fields.extend(self.property_address.as_deref());
        fields.extend(self.notes.as_deref());
        fields
    }
}

impl FilterTerm {
    pub fn matches<T: Filterable>(&self, item: &T) -> bool {
        match self {
            FilterTerm::Stage(values) => values.iter().any(|v| v == item.stage().as_str()),
            FilterTerm::Source(values) => item
                .source()
                .map(|s| s.to_lowercase())
                .is_some_and(|s| values.contains(&s)),
            // Entities without an amount never satisfy a bound
            FilterTerm::Amount(op, bound) => item.amount().is_some_and(|a| op.compare(a, *bound)),
            FilterTerm::Probability(op, bound) => item.probability().is_some_and(|p| op.compare(p, *bound)),
            FilterTerm::Text(needle) => item
                .text_fields()
                .iter()
                .any(|field| field.to_lowercase().contains(needle.as_str())),
        }
    }
}

impl FilterExpr {
    pub fn matches<T: Filterable>(&self, item: &T) -> bool {
        match self {
            FilterExpr::All => true,
            FilterExpr::Term(term) => term.matches(item),
            FilterExpr::And(exprs) => exprs.iter().all(|e| e.matches(item)),
            FilterExpr::Or(exprs) => exprs.iter().any(|e| e.matches(item)),
            FilterExpr::Not(expr) => !expr.matches(item),
        }
    }

    /// Reject stage values that are not part of `S`, with a suggestion
    pub fn check_stages<S: StageSet>(&self) -> Result<(), String> {
        match self {
            FilterExpr::All => Ok(()),
            FilterExpr::Term(FilterTerm::Stage(values)) => {
                let known: Vec<&str> = S::ALL.iter().map(|s| s.as_str()).collect();
                for value in values {
                    if S::from_str(value).is_none() {
                        return Err(format!(
                            "Unknown stage '{}'. Stages: {}.{}",
                            value,
                            known.join(", "),
                            did_you_mean(value, &known)
                        ));
                    }
                }
                Ok(())
            }
            FilterExpr::Term(_) => Ok(()),
            FilterExpr::And(exprs) | FilterExpr::Or(exprs) => {
                exprs.iter().try_for_each(|e| e.check_stages::<S>())
            }
            FilterExpr::Not(expr) => expr.check_stages::<S>(),
        }
    }
}

/// Keep the items matching `expr`, in their original order
pub fn filter_items<T: Filterable + Clone>(items: &[T], expr: &FilterExpr) -> Vec<T> {
    items.iter().filter(|item| expr.matches(*item)).cloned().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Newest first
    #[default]
    Created,
    Name,
    /// Largest first; missing amounts last
    Amount,
    /// Highest first
    Probability,
    /// Pipeline order
    Stage,
}

impl SortKey {
    pub const ALL: [&'static str; 5] = ["created", "name", "amount", "probability", "stage"];

    pub fn parse(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "created" => Ok(SortKey::Created),
            "name" => Ok(SortKey::Name),
            "amount" => Ok(SortKey::Amount),
            "probability" => Ok(SortKey::Probability),
            "stage" => Ok(SortKey::Stage),
            other => Err(format!(
                "Unknown sort key '{}'. Valid keys: {}.{}",
                other,
                Self::ALL.join(", "),
                did_you_mean(other, &Self::ALL)
            )),
        }
    }
}

/// Stable sort; ties keep their current order
pub fn sort_items<T: Filterable>(items: &mut [T], key: SortKey) {
    match key {
        SortKey::Created => items.sort_by(|a, b| b.created_ts().cmp(&a.created_ts())),
        SortKey::Name => items.sort_by_key(|a| a.sort_name()),
        SortKey::Amount => items.sort_by_key(|a| (a.amount().is_none(), std::cmp::Reverse(a.amount()))),
        SortKey::Probability => items.sort_by_key(|a| std::cmp::Reverse(a.probability())),
        SortKey::Stage => items.sort_by_key(|a| a.stage().position()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter;
    use crate::models::{ContactStage, DealStage, NewContact, NewDeal, TenantId};

    fn filter(tokens: &[&str]) -> FilterExpr {
        parse_filter(tokens.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn deal(title: &str, stage: DealStage, amount: Option<i64>, created_ts: i64) -> Deal {
        let mut deal = NewDeal::new(title).into_deal(&TenantId::new("org-1"));
        deal.stage = stage;
        deal.amount = amount;
        deal.created_ts = created_ts;
        deal
    }

    fn sample() -> Vec<Deal> {
        vec![
            deal("Maison Lyon", DealStage::Offre, Some(420_000), 30),
            deal("Studio Paris", DealStage::Perdu, Some(180_000), 20),
            deal("Terrain", DealStage::Visite, None, 10),
        ]
    }

    fn titles(deals: &[Deal]) -> Vec<&str> {
        deals.iter().map(|d| d.title.as_str()).collect()
    }

    #[test]
    fn test_filter_deals() {
        let deals = sample();
        assert_eq!(titles(&filter_items(&deals, &filter(&["stage=offre,visite"]))), vec!["Maison Lyon", "Terrain"]);
        assert_eq!(titles(&filter_items(&deals, &filter(&["min=200000"]))), vec!["Maison Lyon"]);
        assert_eq!(titles(&filter_items(&deals, &filter(&["max=200000"]))), vec!["Studio Paris"]);
        assert_eq!(titles(&filter_items(&deals, &filter(&["+paris", "or", "+lyon"]))).len(), 2);
        assert_eq!(titles(&filter_items(&deals, &filter(&["not", "stage=perdu"]))).len(), 2);
        assert_eq!(filter_items(&deals, &FilterExpr::All).len(), 3);
    }

    #[test]
    fn test_filter_contacts_by_source_and_budget() {
        let tenant = TenantId::new("org-1");
        let mut a = NewContact::new("Jeanne", "Martin");
        a.source = Some("SeLoger".to_string());
        a.budget = Some(300_000);
        let b = NewContact::new("Paul", "Durand");
        let contacts = vec![a.into_contact(&tenant), b.into_contact(&tenant)];

        let found = filter_items(&contacts, &filter(&["source=seloger"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].last_name, "Martin");
        assert_eq!(filter_items(&contacts, &filter(&["min=100000"])).len(), 1);
        assert_eq!(filter_items(&contacts, &filter(&["+durand"])).len(), 1);
        // probability is a deal field
        assert!(filter_items(&contacts, &filter(&["probability>0"])).is_empty());
    }

    #[test]
    fn test_check_stages() {
        assert!(filter(&["stage=offre"]).check_stages::<DealStage>().is_ok());
        let err = filter(&["not", "stage=ofre"]).check_stages::<DealStage>().unwrap_err();
        assert!(err.contains("Did you mean: offre?"));
        assert!(filter(&["stage=visite"]).check_stages::<ContactStage>().is_err());
    }

    #[test]
    fn test_sorting() {
        let mut deals = sample();
        sort_items(&mut deals, SortKey::Amount);
        assert_eq!(titles(&deals), vec!["Maison Lyon", "Studio Paris", "Terrain"]);
        sort_items(&mut deals, SortKey::Stage);
        assert_eq!(titles(&deals), vec!["Terrain", "Maison Lyon", "Studio Paris"]);
        sort_items(&mut deals, SortKey::Name);
        assert_eq!(titles(&deals), vec!["Maison Lyon", "Studio Paris", "Terrain"]);
        sort_items(&mut deals, SortKey::Created);
        assert_eq!(titles(&deals), vec!["Maison Lyon", "Studio Paris", "Terrain"]);

        assert_eq!(SortKey::parse("Amount").unwrap(), SortKey::Amount);
        assert!(SortKey::parse("amont").unwrap_err().contains("Did you mean: amount?"));
    }
}
