//! Pipeline (kanban) stage engine.
//!
//! Entities are grouped into a [`Board`] by stage. A drag gesture is reduced
//! to `(dragged id, drop target | none)`; the [`StageEngine`] turns it into
//! an optimistic local move, a tenant-scoped backend update, and either a
//! reconciling refetch or a rollback.

pub mod board;
pub mod engine;

pub use board::*;
pub use engine::*;

use crate::backend::{Query, Row};
use crate::db::schema::{CONTACTS, DEALS};
use crate::models::{Contact, ContactStage, Deal, DealStage, StageSet};
use crate::repo::{ContactRepo, DealRepo};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Debug;

/// An entity that lives in exactly one stage of a closed stage set
pub trait PipelineEntity: Clone + Debug + DeserializeOwned {
    type Stage: StageSet;

    const TABLE: &'static str;
    /// Singular name used in messages
    const LABEL: &'static str;

    fn id(&self) -> &str;

    fn stage(&self) -> Self::Stage;

    /// Card title
    fn title(&self) -> String;

    /// Move this in-memory copy into `stage`, with any field coercions
    /// the move implies.
    fn apply_stage(&mut self, stage: Self::Stage);

    /// Backend patch for a move into `stage`. Must carry the same coercions
    /// as `apply_stage` so the optimistic copy and the stored row agree.
    fn stage_patch(stage: Self::Stage) -> Row {
        let mut row = Row::new();
        row.insert("stage".to_string(), Value::String(stage.as_str().to_string()));
        row
    }

    /// Query whose result the board is derived from
    fn list_query() -> Query;
}

impl PipelineEntity for Contact {
    type Stage = ContactStage;

    const TABLE: &'static str = CONTACTS;
    const LABEL: &'static str = "Contact";

    fn id(&self) -> &str {
        &self.id
    }

    fn stage(&self) -> ContactStage {
        self.stage
    }

    fn title(&self) -> String {
        self.display_name()
    }

    fn apply_stage(&mut self, stage: ContactStage) {
        self.stage = stage;
    }

    fn list_query() -> Query {
        ContactRepo::list_query()
    }
}

impl PipelineEntity for Deal {
    type Stage = DealStage;

    const TABLE: &'static str = DEALS;
    const LABEL: &'static str = "Deal";

    fn id(&self) -> &str {
        &self.id
    }

    fn stage(&self) -> DealStage {
        self.stage
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    /// Won forces probability 100, lost forces 0
    fn apply_stage(&mut self, stage: DealStage) {
        self.stage = stage;
        if let Some(probability) = stage.forced_probability() {
            self.probability = probability;
        }
    }

    fn stage_patch(stage: DealStage) -> Row {
        let mut row = Row::new();
        row.insert("stage".to_string(), Value::String(stage.as_str().to_string()));
        if let Some(probability) = stage.forced_probability() {
            row.insert("probability".to_string(), Value::from(probability));
        }
        row
    }

    fn list_query() -> Query {
        DealRepo::list_query()
    }
}
