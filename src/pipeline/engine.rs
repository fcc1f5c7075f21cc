use crate::accessor::TenantAccessor;
use crate::backend::Backend;
use crate::cache::{FetchTicket, QueryCache, QueryKey};
use crate::error::{CrmError, CrmResult};
use crate::models::{Session, StageSet, TenantId};
use crate::notify::{Notification, Notifier};
use crate::pipeline::{Board, DropTarget, PipelineEntity};
use std::collections::HashMap;

/// Lifecycle of one stage move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    /// Snapshot taken and optimistic copy written to the cache
    Applied,
    /// Update sent to the backend
    Issued,
    /// Backend accepted the update
    Confirmed,
    /// Backend refused the update; pre-move state restored
    RolledBack,
}

/// A move that has been applied locally but not yet settled
#[derive(Debug, Clone)]
pub struct PendingMove<E: PipelineEntity> {
    id: String,
    from: E::Stage,
    to: E::Stage,
    snapshot: Vec<E>,
    previous: E,
    write_seq: u64,
    phase: MovePhase,
}

impl<E: PipelineEntity> PendingMove<E> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from(&self) -> E::Stage {
        self.from
    }

    pub fn to(&self) -> E::Stage {
        self.to
    }

    pub fn phase(&self) -> MovePhase {
        self.phase
    }

    /// Collection as it was immediately before the optimistic write
    pub fn snapshot(&self) -> &[E] {
        &self.snapshot
    }
}

/// Result of settling a move
#[derive(Debug)]
pub enum Settlement {
    /// Backend confirmed; the ticket identifies the reconciling refetch
    Confirmed(FetchTicket),
    RolledBack(CrmError),
}

/// What a complete drag did, as reported to callers of [`StageEngine::move_entity`]
#[derive(Debug)]
pub enum MoveOutcome<S> {
    /// No drop target, unknown card, or dropped back into its own column
    Unchanged,
    Moved { from: S, to: S },
    RolledBack { from: S, to: S, error: CrmError },
}

/// Headless kanban engine for one entity kind.
///
/// The board is always derived from the cached collection; the engine owns
/// the only writer of that cache entry. A move goes through explicit phases
/// so the network boundary can be driven step by step:
///
/// `drag_start` -> `drag_end` (optimistic) -> `issue` -> `settle` -> `finish_reconcile`
///
/// [`StageEngine::move_entity`] runs the whole sequence synchronously.
#[derive(Debug)]
pub struct StageEngine<E: PipelineEntity> {
    tenant: Option<TenantId>,
    key: QueryKey,
    cache: QueryCache<Vec<E>>,
    active_drag: Option<E>,
    /// Bumped on every optimistic write
    write_seq: u64,
    /// Newest unsettled write per entity id
    pending_writes: HashMap<String, u64>,
    /// Value to restore for an entity whose older move failed while a newer
    /// one was still pending
    superseded: HashMap<String, E>,
}

impl<E: PipelineEntity> StageEngine<E> {
    pub fn new(session: &Session) -> Self {
        let tenant = session.tenant().ok().cloned();
        Self {
            key: Self::key_for(tenant.clone()),
            tenant,
            cache: QueryCache::new(),
            active_drag: None,
            write_seq: 0,
            pending_writes: HashMap::new(),
            superseded: HashMap::new(),
        }
    }

    fn key_for(tenant: Option<TenantId>) -> QueryKey {
        QueryKey::new(E::TABLE, tenant, &E::list_query().filters)
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn cache(&self) -> &QueryCache<Vec<E>> {
        &self.cache
    }

    /// Current collection (empty until loaded)
    pub fn entities(&self) -> &[E] {
        self.cache.get(&self.key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, id: &str) -> Option<&E> {
        self.entities().iter().find(|e| e.id() == id)
    }

    pub fn board(&self) -> Board<E> {
        Board::from_entities(self.entities())
    }

    pub fn active_drag(&self) -> Option<&E> {
        self.active_drag.as_ref()
    }

    pub fn is_stale(&self) -> bool {
        self.cache.is_stale(&self.key)
    }

    /// Point the engine at another organization. Cached data of the previous
    /// one is dropped.
    pub fn switch_tenant(&mut self, tenant: Option<TenantId>) {
        if self.tenant == tenant {
            return;
        }
        if let Some(old) = &self.tenant {
            self.cache.clear_tenant(old);
        }
        log::debug!(
            "{} board switched to tenant {}",
            E::LABEL,
            tenant.as_ref().map(|t| t.as_str()).unwrap_or("-")
        );
        self.key = Self::key_for(tenant.clone());
        self.tenant = tenant;
        self.active_drag = None;
        self.pending_writes.clear();
        self.superseded.clear();
    }

    fn sync_tenant<B: Backend>(&mut self, acc: &TenantAccessor<'_, B>) -> CrmResult<()> {
        let tenant = acc.tenant()?.clone();
        self.switch_tenant(Some(tenant));
        Ok(())
    }

    /// Fetch the authoritative collection into the cache
    pub fn load<B: Backend>(&mut self, acc: &TenantAccessor<'_, B>) -> CrmResult<()> {
        self.sync_tenant(acc)?;
        let ticket = self.cache.begin_fetch(&self.key);
        let result = acc.select_as(E::TABLE, E::list_query());
        self.finish_reconcile(&ticket, result).map(|_| ())
    }

    /// Load only if the cache entry is stale and no fetch is running
    pub fn refetch<B: Backend>(&mut self, acc: &TenantAccessor<'_, B>) -> CrmResult<bool> {
        if !self.is_stale() || self.cache.is_fetching(&self.key) {
            return Ok(false);
        }
        self.load(acc)?;
        Ok(true)
    }

    /// Start a reconciling fetch; it supersedes any fetch already in flight
    pub fn begin_reconcile(&mut self) -> FetchTicket {
        self.cache.begin_fetch(&self.key)
    }

    /// Deliver the response of a fetch. Returns whether it was applied: the
    /// response of a cancelled or superseded fetch is discarded.
    pub fn finish_reconcile(&mut self, ticket: &FetchTicket, result: CrmResult<Vec<E>>) -> CrmResult<bool> {
        match result {
            Ok(rows) => Ok(self.cache.complete_fetch(ticket, rows)),
            Err(e) => {
                self.cache.abandon_fetch(ticket);
                Err(e)
            }
        }
    }

    /// Remember the dragged card. Returns false if it is not on the board.
    pub fn drag_start(&mut self, id: &str) -> bool {
        self.active_drag = self.find(id).cloned();
        self.active_drag.is_some()
    }

    pub fn cancel_drag(&mut self) {
        self.active_drag = None;
    }

    /// Release the dragged card over `over` (or over nothing).
    ///
    /// Returns `None` when nothing changes: no drag, no target, an unknown
    /// card target, or a drop into the card's own column. Otherwise cancels
    /// any in-flight fetch, snapshots the collection and applies the move to
    /// the cache before returning the pending move to issue.
    pub fn drag_end(&mut self, over: Option<&DropTarget<E::Stage>>) -> CrmResult<Option<PendingMove<E>>> {
        let Some(dragged) = self.active_drag.take() else {
            return Ok(None);
        };
        let Some(over) = over else {
            return Ok(None);
        };
        let board = self.board();
        let Some(target) = board.resolve(over) else {
            log::debug!("drop over unknown target ignored");
            return Ok(None);
        };
        let Some(current) = self.find(dragged.id()).cloned() else {
            return Ok(None);
        };
        if current.stage() == target {
            return Ok(None);
        }
        if self.tenant.is_none() {
            return Err(CrmError::TenantMissing);
        }

        if self.cache.cancel(&self.key) {
            log::debug!("cancelled in-flight {} fetch before optimistic write", E::TABLE);
        }
        let snapshot = self.entities().to_vec();
        let id = current.id().to_string();
        self.cache.patch(&self.key, |entities| {
            if let Some(entity) = entities.iter_mut().find(|e| e.id() == id) {
                entity.apply_stage(target);
            }
        });
        self.write_seq += 1;
        self.pending_writes.insert(id.clone(), self.write_seq);

        Ok(Some(PendingMove {
            id,
            from: current.stage(),
            to: target,
            snapshot,
            previous: current,
            write_seq: self.write_seq,
            phase: MovePhase::Applied,
        }))
    }

    /// Send the stage update, scoped by entity id and tenant
    pub fn issue<B: Backend>(&self, pending: &mut PendingMove<E>, acc: &TenantAccessor<'_, B>) -> CrmResult<()> {
        if pending.phase != MovePhase::Applied {
            return Err(CrmError::validation(format!("{} move already issued", E::LABEL)));
        }
        pending.phase = MovePhase::Issued;
        acc.update(E::TABLE, &pending.id, E::stage_patch(pending.to)).map(|_| ())
    }

    /// Settle a move with the backend's answer.
    ///
    /// On success the cache entry is invalidated and a reconciling fetch is
    /// started. On failure any in-flight fetch is cancelled and the pre-move
    /// state restored: the whole snapshot when no later move was applied,
    /// otherwise only the moved entity so the later move survives. When a
    /// later move of the same entity is still pending, nothing is restored
    /// now; that move falls back to this pre-move value if it fails too.
    pub fn settle(&mut self, mut pending: PendingMove<E>, result: CrmResult<()>, notifier: &dyn Notifier) -> Settlement {
        let from = pending.from.label();
        let to = pending.to.label();
        let overtaken = self
            .pending_writes
            .get(&pending.id)
            .is_some_and(|&seq| seq > pending.write_seq);
        if !overtaken {
            self.pending_writes.remove(&pending.id);
        }
        match result {
            Ok(()) => {
                pending.phase = MovePhase::Confirmed;
                self.superseded.remove(&pending.id);
                self.cache.invalidate(&self.key);
                log::info!("{} {} moved from {} to {}", E::LABEL, pending.id, from, to);
                let title = self
                    .find(&pending.id)
                    .map(|e| e.title())
                    .unwrap_or_else(|| pending.id.clone());
                notifier.notify(Notification::success(
                    "Étape mise à jour",
                    format!("{} : {} -> {}", title, from, to),
                ));
                Settlement::Confirmed(self.begin_reconcile())
            }
            Err(error) => {
                pending.phase = MovePhase::RolledBack;
                self.cache.cancel(&self.key);
                let restored = self.superseded.remove(&pending.id).unwrap_or(pending.previous);
                if overtaken {
                    self.superseded.insert(pending.id.clone(), restored);
                } else if pending.write_seq == self.write_seq {
                    let mut snapshot = pending.snapshot;
                    if let Some(entity) = snapshot.iter_mut().find(|e| e.id() == restored.id()) {
                        *entity = restored;
                    }
                    self.cache.set(&self.key, snapshot);
                } else {
                    self.cache.patch(&self.key, |entities| {
                        if let Some(entity) = entities.iter_mut().find(|e| e.id() == restored.id()) {
                            *entity = restored;
                        }
                    });
                }
                log::warn!(
                    "{} {} move to {} rolled back: {}",
                    E::LABEL,
                    pending.id,
                    to,
                    error
                );
                notifier.notify(Notification::error("Échec du déplacement", error.to_string()));
                Settlement::RolledBack(error)
            }
        }
    }

    /// Run one complete drag: optimistic move, backend update, then
    /// reconciliation or rollback
    pub fn move_entity<B: Backend>(
        &mut self,
        acc: &TenantAccessor<'_, B>,
        id: &str,
        over: &DropTarget<E::Stage>,
    ) -> CrmResult<MoveOutcome<E::Stage>> {
        acc.tenant()?;
        if self.entities().is_empty() || self.tenant.as_ref() != acc.tenant().ok() {
            self.load(acc)?;
        }
        if !self.drag_start(id) {
            return Err(CrmError::not_found(format!("{} {}", E::LABEL, id)));
        }
        let Some(mut pending) = self.drag_end(Some(over))? else {
            return Ok(MoveOutcome::Unchanged);
        };
        let (from, to) = (pending.from, pending.to);
        let result = self.issue(&mut pending, acc);
        match self.settle(pending, result, acc.notifier()) {
            Settlement::Confirmed(ticket) => {
                let rows = acc.select_as(E::TABLE, E::list_query());
                if let Err(e) = self.finish_reconcile(&ticket, rows) {
                    // the move itself is confirmed; keep the optimistic copy
                    log::warn!("{} reconcile failed: {}", E::TABLE, e);
                }
                Ok(MoveOutcome::Moved { from, to })
            }
            Settlement::RolledBack(error) => Ok(MoveOutcome::RolledBack { from, to, error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteBackend;
    use crate::models::{
        AuthContext, Contact, ContactStage, Deal, DealStage, NewContact, NewDeal,
    };
    use crate::notify::{NotificationKind, RecordingNotifier};
    use crate::repo::{ContactRepo, DealRepo, OrganizationRepo};

    fn setup(backend: &SqliteBackend, notifier: &RecordingNotifier) -> Session {
        let bootstrap = TenantAccessor::new(Session::new(AuthContext::new("alice"), None), backend, notifier);
        let org = OrganizationRepo::create(&bootstrap, "Agence du Port").unwrap();
        Session::for_tenant("alice", org.id)
    }

    fn deal_in(acc: &TenantAccessor<'_, &SqliteBackend>, stage: DealStage, probability: i64) -> Deal {
        let mut form = NewDeal::new("Appartement T3");
        form.probability = probability;
        let deal = DealRepo::create(acc, form).unwrap();
        DealRepo::update(
            acc,
            &deal.id,
            crate::models::DealPatch {
                stage: Some(stage),
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_optimistic_then_confirmed_move() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let deal = deal_in(&acc, DealStage::Negociation, 60);

        let mut engine: StageEngine<Deal> = StageEngine::new(&session);
        engine.load(&acc).unwrap();
        assert!(engine.drag_start(&deal.id));
        let mut pending = engine
            .drag_end(Some(&DropTarget::Column(DealStage::Vendu)))
            .unwrap()
            .unwrap();
        assert!(engine.active_drag().is_none());

        let optimistic = engine.find(&deal.id).unwrap();
        assert_eq!(optimistic.stage, DealStage::Vendu);
        assert_eq!(optimistic.probability, 100);
        assert_eq!(pending.snapshot()[0].stage, DealStage::Negociation);

        let result = engine.issue(&mut pending, &acc);
        assert_eq!(pending.phase(), MovePhase::Issued);
        let ticket = match engine.settle(pending, result, &notifier) {
            Settlement::Confirmed(ticket) => ticket,
            Settlement::RolledBack(e) => panic!("unexpected rollback: {}", e),
        };
        assert!(engine.is_stale());
        let rows = acc.select_as(Deal::TABLE, Deal::list_query());
        assert!(engine.finish_reconcile(&ticket, rows).unwrap());

        let stored = engine.find(&deal.id).unwrap();
        assert_eq!(stored.stage, DealStage::Vendu);
        assert_eq!(stored.probability, 100);
        assert_eq!(notifier.count(NotificationKind::Success), 1);
    }

    #[test]
    fn test_failure_restores_snapshot() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let contact = ContactRepo::create(&acc, NewContact::new("Jeanne", "Martin")).unwrap();

        let mut engine: StageEngine<Contact> = StageEngine::new(&session);
        engine.load(&acc).unwrap();
        let before = engine.entities().to_vec();
        engine.drag_start(&contact.id);
        let pending = engine
            .drag_end(Some(&DropTarget::Column(ContactStage::Mandat)))
            .unwrap()
            .unwrap();
        assert_eq!(engine.find(&contact.id).unwrap().stage, ContactStage::Mandat);

        let outcome = engine.settle(
            pending,
            Err(CrmError::Transport("connection reset".into())),
            &notifier,
        );
        assert!(matches!(outcome, Settlement::RolledBack(CrmError::Transport(_))));
        assert_eq!(engine.entities(), before.as_slice());
        assert_eq!(notifier.count(NotificationKind::Error), 1);
    }

    #[test]
    fn test_rollback_keeps_later_move() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let a = deal_in(&acc, DealStage::Visite, 30);
        let b = deal_in(&acc, DealStage::Visite, 30);

        let mut engine: StageEngine<Deal> = StageEngine::new(&session);
        engine.load(&acc).unwrap();

        engine.drag_start(&a.id);
        let first = engine.drag_end(Some(&DropTarget::Column(DealStage::Offre))).unwrap().unwrap();
        engine.drag_start(&b.id);
        let second = engine.drag_end(Some(&DropTarget::Column(DealStage::Perdu))).unwrap().unwrap();

        engine.settle(first, Err(CrmError::Transport("timeout".into())), &notifier);
        assert_eq!(engine.find(&a.id).unwrap().stage, DealStage::Visite);
        assert_eq!(engine.find(&b.id).unwrap().stage, DealStage::Perdu);
        assert_eq!(engine.find(&b.id).unwrap().probability, 0);
        drop(second);
    }

    #[test]
    fn test_failed_older_move_keeps_newer_drag_of_same_card() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let deal = deal_in(&acc, DealStage::Nouveau, 10);

        let mut engine: StageEngine<Deal> = StageEngine::new(&session);
        engine.load(&acc).unwrap();
        let before = engine.entities().to_vec();

        engine.drag_start(&deal.id);
        let first = engine
            .drag_end(Some(&DropTarget::Column(DealStage::Qualification)))
            .unwrap()
            .unwrap();
        engine.drag_start(&deal.id);
        let second = engine
            .drag_end(Some(&DropTarget::Column(DealStage::Visite)))
            .unwrap()
            .unwrap();
        assert_eq!(second.from(), DealStage::Qualification);

        engine.settle(first, Err(CrmError::Transport("timeout".into())), &notifier);
        assert_eq!(engine.find(&deal.id).unwrap().stage, DealStage::Visite);

        // The newer move failing too falls back past the rejected one
        engine.settle(second, Err(CrmError::Transport("timeout".into())), &notifier);
        assert_eq!(engine.entities(), before.as_slice());
        assert_eq!(notifier.count(NotificationKind::Error), 2);
    }

    #[test]
    fn test_noop_drops() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let deal = deal_in(&acc, DealStage::Offre, 40);

        let mut engine: StageEngine<Deal> = StageEngine::new(&session);
        engine.load(&acc).unwrap();

        // no drag in progress
        assert!(engine.drag_end(Some(&DropTarget::Column(DealStage::Vendu))).unwrap().is_none());
        // released over nothing
        engine.drag_start(&deal.id);
        assert!(engine.drag_end(None).unwrap().is_none());
        assert!(engine.active_drag().is_none());
        // own column
        engine.drag_start(&deal.id);
        assert!(engine.drag_end(Some(&DropTarget::Column(DealStage::Offre))).unwrap().is_none());
        // unknown card
        engine.drag_start(&deal.id);
        assert!(engine.drag_end(Some(&DropTarget::Card("ghost".into()))).unwrap().is_none());
        // cancelled drag
        engine.drag_start(&deal.id);
        engine.cancel_drag();
        assert!(engine.drag_end(Some(&DropTarget::Column(DealStage::Vendu))).unwrap().is_none());

        assert!(!engine.drag_start("ghost"));
        assert_eq!(engine.find(&deal.id).unwrap().stage, DealStage::Offre);
        assert!(notifier.notifications().is_empty());
    }

    #[test]
    fn test_new_drag_cancels_inflight_reconcile() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let deal = deal_in(&acc, DealStage::Nouveau, 10);

        let mut engine: StageEngine<Deal> = StageEngine::new(&session);
        engine.load(&acc).unwrap();
        let stale_rows = acc.select_as::<Deal>(Deal::TABLE, Deal::list_query()).unwrap();
        let ticket = engine.begin_reconcile();

        engine.drag_start(&deal.id);
        let _pending = engine
            .drag_end(Some(&DropTarget::Column(DealStage::Qualification)))
            .unwrap()
            .unwrap();

        assert!(!engine.finish_reconcile(&ticket, Ok(stale_rows)).unwrap());
        assert_eq!(engine.find(&deal.id).unwrap().stage, DealStage::Qualification);
    }

    #[test]
    fn test_drag_without_tenant_is_blocked() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let deal = deal_in(&acc, DealStage::Offre, 40);

        let mut engine: StageEngine<Deal> = StageEngine::new(&session);
        engine.load(&acc).unwrap();
        engine.drag_start(&deal.id);
        engine.switch_tenant(None);
        assert!(engine.active_drag().is_none());
        assert!(engine.entities().is_empty());

        let orphan = TenantAccessor::new(Session::new(AuthContext::new("alice"), None), &backend, &notifier);
        let err = engine
            .move_entity(&orphan, &deal.id, &DropTarget::Column(DealStage::Vendu))
            .unwrap_err();
        assert!(matches!(err, CrmError::TenantMissing));
        assert_eq!(DealRepo::get(&acc, &deal.id).unwrap().stage, DealStage::Offre);
    }

    #[test]
    fn test_move_entity_runs_full_cycle() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let session = setup(&backend, &notifier);
        let acc = TenantAccessor::new(session.clone(), &backend, &notifier);
        let deal = deal_in(&acc, DealStage::Compromis, 80);

        let mut engine: StageEngine<Deal> = StageEngine::new(&session);
        let outcome = engine
            .move_entity(&acc, &deal.id, &DropTarget::Column(DealStage::Perdu))
            .unwrap();
        assert!(matches!(
            outcome,
            MoveOutcome::Moved { from: DealStage::Compromis, to: DealStage::Perdu }
        ));
        assert!(!engine.is_stale());
        let stored = DealRepo::get(&acc, &deal.id).unwrap();
        assert_eq!(stored.stage, DealStage::Perdu);
        assert_eq!(stored.probability, 0);
        assert_eq!(engine.find(&deal.id), Some(&stored));
    }
}
