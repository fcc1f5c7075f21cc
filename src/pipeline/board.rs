use crate::models::StageSet;
use crate::pipeline::PipelineEntity;

/// Where a card was released: a column, or another card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget<S: StageSet> {
    Column(S),
    Card(String),
}

impl<S: StageSet> DropTarget<S> {
    /// Interpret a raw drop id: a stage value names a column, anything else a card
    pub fn from_over_id(raw: &str) -> Self {
        match S::from_str(raw) {
            Some(stage) => DropTarget::Column(stage),
            None => DropTarget::Card(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column<E: PipelineEntity> {
    pub stage: E::Stage,
    pub cards: Vec<E>,
}

/// Derived grouping of a collection by stage.
///
/// Never persisted: rebuilt from the collection on every change. Columns
/// follow the stage set's order (empty ones included) and cards keep the
/// collection's order, newest first.
#[derive(Debug, Clone)]
pub struct Board<E: PipelineEntity> {
    columns: Vec<Column<E>>,
}

impl<E: PipelineEntity> Board<E> {
    pub fn from_entities(entities: &[E]) -> Self {
        let mut columns: Vec<Column<E>> = E::Stage::ALL
            .iter()
            .map(|stage| Column {
                stage: *stage,
                cards: Vec::new(),
            })
            .collect();
        for entity in entities {
            let idx = entity.stage().position();
            if let Some(column) = columns.get_mut(idx) {
                column.cards.push(entity.clone());
            }
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[Column<E>] {
        &self.columns
    }

    pub fn column(&self, stage: E::Stage) -> Option<&Column<E>> {
        self.columns.iter().find(|c| c.stage == stage)
    }

    /// Column currently containing the card `id`
    pub fn column_of(&self, id: &str) -> Option<E::Stage> {
        self.columns
            .iter()
            .find(|c| c.cards.iter().any(|card| card.id() == id))
            .map(|c| c.stage)
    }

    /// Stage a drop resolves to. Card drops resolve to the card's column;
    /// the position within the column is not kept.
    pub fn resolve(&self, target: &DropTarget<E::Stage>) -> Option<E::Stage> {
        match target {
            DropTarget::Column(stage) => Some(*stage),
            DropTarget::Card(id) => self.column_of(id),
        }
    }

    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Deal, DealStage, NewDeal, TenantId};

    fn deal(title: &str, stage: DealStage) -> Deal {
        let mut deal = NewDeal::new(title).into_deal(&TenantId::new("org-1"));
        deal.stage = stage;
        deal
    }

    #[test]
    fn test_every_stage_has_a_column_in_order() {
        let board: Board<Deal> = Board::from_entities(&[]);
        let stages: Vec<DealStage> = board.columns().iter().map(|c| c.stage).collect();
        assert_eq!(stages, DealStage::ALL.to_vec());
        assert_eq!(board.total(), 0);
    }

    #[test]
    fn test_grouping_keeps_collection_order() {
        let a = deal("A", DealStage::Offre);
        let b = deal("B", DealStage::Visite);
        let c = deal("C", DealStage::Offre);
        let board = Board::from_entities(&[a.clone(), b.clone(), c.clone()]);

        let offre = board.column(DealStage::Offre).unwrap();
        let titles: Vec<&str> = offre.cards.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(board.total(), 3);
        assert_eq!(board.column_of(&b.id), Some(DealStage::Visite));
        assert_eq!(board.column_of("missing"), None);
    }

    #[test]
    fn test_drop_target_parsing_and_resolution() {
        let y = deal("Y", DealStage::Negociation);
        let board = Board::from_entities(&[y.clone()]);

        let column = DropTarget::<DealStage>::from_over_id("vendu");
        assert_eq!(column, DropTarget::Column(DealStage::Vendu));
        assert_eq!(board.resolve(&column), Some(DealStage::Vendu));

        let card = DropTarget::<DealStage>::from_over_id(&y.id);
        assert_eq!(card, DropTarget::Card(y.id.clone()));
        assert_eq!(board.resolve(&card), Some(DealStage::Negociation));

        assert_eq!(board.resolve(&DropTarget::Card("nowhere".into())), None);
    }
}
