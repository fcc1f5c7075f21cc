//! Query cache keyed by (table, tenant, filter set).
//!
//! Views read from the cache; it is written only through `set`/`patch`
//! (optimistic writes) and `complete_fetch` (authoritative data). A fetch is
//! identified by a [`FetchTicket`]; `cancel` drops the live ticket so that
//! the late response of a cancelled fetch is discarded instead of clobbering
//! newer local state.

use crate::backend::Filter;
use crate::models::TenantId;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub table: String,
    pub tenant: Option<TenantId>,
    /// Sorted so that filter order does not split cache entries
    pub filters: Vec<Filter>,
}

impl QueryKey {
    pub fn new(table: &str, tenant: Option<TenantId>, filters: &[Filter]) -> Self {
        let mut filters = filters.to_vec();
        filters.sort();
        Self {
            table: table.to_string(),
            tenant,
            filters,
        }
    }
}

/// Handle of one fetch for one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: QueryKey,
    seq: u64,
}

#[derive(Debug)]
struct Entry<T> {
    data: Option<T>,
    stale: bool,
    in_flight: Option<u64>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            data: None,
            stale: true,
            in_flight: None,
        }
    }
}

#[derive(Debug)]
pub struct QueryCache<T> {
    entries: HashMap<QueryKey, Entry<T>>,
    next_seq: u64,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<&T> {
        self.entries.get(key).and_then(|e| e.data.as_ref())
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries.get(key).map_or(true, |e| e.stale)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries.get(key).is_some_and(|e| e.in_flight.is_some())
    }

    /// Register a new fetch for `key`; it supersedes any fetch already in flight
    pub fn begin_fetch(&mut self, key: &QueryKey) -> FetchTicket {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.entries.entry(key.clone()).or_default().in_flight = Some(seq);
        FetchTicket { key: key.clone(), seq }
    }

    /// Store the result of a fetch. Returns false (and stores nothing) when
    /// the ticket was cancelled or superseded.
    pub fn complete_fetch(&mut self, ticket: &FetchTicket, data: T) -> bool {
        let Some(entry) = self.entries.get_mut(&ticket.key) else {
            return false;
        };
        if entry.in_flight != Some(ticket.seq) {
            log::debug!("discarding stale fetch for {}", ticket.key.table);
            return false;
        }
        entry.in_flight = None;
        entry.data = Some(data);
        entry.stale = false;
        true
    }

    /// Give up on a fetch without storing anything (e.g. it failed)
    pub fn abandon_fetch(&mut self, ticket: &FetchTicket) {
        if let Some(entry) = self.entries.get_mut(&ticket.key) {
            if entry.in_flight == Some(ticket.seq) {
                entry.in_flight = None;
            }
        }
    }

    /// Cancel whatever fetch is in flight for `key`. Returns whether one was.
    pub fn cancel(&mut self, key: &QueryKey) -> bool {
        self.entries
            .get_mut(key)
            .and_then(|e| e.in_flight.take())
            .is_some()
    }

    /// Local write. Callers cancel in-flight fetches for the key first.
    pub fn set(&mut self, key: &QueryKey, data: T) {
        self.entries.entry(key.clone()).or_default().data = Some(data);
    }

    /// Mutate the cached value in place, if any
    pub fn patch<F: FnOnce(&mut T)>(&mut self, key: &QueryKey, f: F) -> bool {
        match self.entries.get_mut(key).and_then(|e| e.data.as_mut()) {
            Some(data) => {
                f(data);
                true
            }
            None => false,
        }
    }

    /// Mark the entry stale so that the next read refetches it
    pub fn invalidate(&mut self, key: &QueryKey) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    /// Drop every entry of a tenant (sign-out, organization switch)
    pub fn clear_tenant(&mut self, tenant: &TenantId) {
        self.entries.retain(|k, _| k.tenant.as_ref() != Some(tenant));
    }
}
