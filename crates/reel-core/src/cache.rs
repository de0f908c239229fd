//! Per-key snapshot cache backing the query channels.
//!
//! Each mounted key owns exactly one entry. An entry has at most one fetch in
//! flight; ticks that come due while a fetch is outstanding are skipped, and a
//! `mark_stale` issued meanwhile is honoured as soon as that fetch resolves.

use std::collections::BTreeMap;

use crate::config::PollingConfig;
use crate::error::RequestError;
use crate::error::StaleDataError;
use crate::model::AbTestStatus;
use crate::model::HealthStatus;
use crate::model::WorkflowDetail;
use crate::model::WorkflowId;
use crate::model::WorkflowSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Workflow,
    AbStatus,
    WorkflowList,
    Health,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::AbStatus => "ab-status",
            Self::WorkflowList => "workflows",
            Self::Health => "health",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKey {
    Workflow(WorkflowId),
    AbStatus(WorkflowId),
    WorkflowList,
    Health,
}

impl QueryKey {
    pub fn resource(&self) -> ResourceKind {
        match self {
            Self::Workflow(_) => ResourceKind::Workflow,
            Self::AbStatus(_) => ResourceKind::AbStatus,
            Self::WorkflowList => ResourceKind::WorkflowList,
            Self::Health => ResourceKind::Health,
        }
    }

    pub fn subject(&self) -> Option<&WorkflowId> {
        match self {
            Self::Workflow(id) | Self::AbStatus(id) => Some(id),
            Self::WorkflowList | Self::Health => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPayload {
    Workflow(WorkflowDetail),
    AbStatus(AbTestStatus),
    WorkflowList(Vec<WorkflowSummary>),
    Health(HealthStatus),
}

impl QueryPayload {
    pub fn resource(&self) -> ResourceKind {
        match self {
            Self::Workflow(_) => ResourceKind::Workflow,
            Self::AbStatus(_) => ResourceKind::AbStatus,
            Self::WorkflowList(_) => ResourceKind::WorkflowList,
            Self::Health(_) => ResourceKind::Health,
        }
    }

    pub fn subject(&self) -> Option<&WorkflowId> {
        match self {
            Self::Workflow(detail) => Some(&detail.workflow_id),
            Self::AbStatus(status) => Some(&status.workflow_id),
            Self::WorkflowList(_) | Self::Health(_) => None,
        }
    }
}

/// Issued with every fetch; the result must present it back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: QueryKey,
    pub generation: u64,
    pub seq: u64,
}

#[derive(Debug, Clone, Default)]
pub struct QueryEntry {
    pub snapshot: Option<QueryPayload>,
    pub error: Option<RequestError>,
    pub stale: bool,
    pub in_flight: Option<u64>,
    pub next_poll_at_ms: Option<u64>,
    pub last_success_ms: Option<u64>,
}

impl QueryEntry {
    fn fresh() -> Self {
        Self {
            stale: true,
            ..Self::default()
        }
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.is_none() && self.error.is_none()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    fn is_due(&self, now_ms: u64) -> bool {
        self.in_flight.is_none()
            && (self.stale || self.next_poll_at_ms.is_some_and(|at| now_ms >= at))
    }
}

/// Polling delay after a snapshot of `key` was observed; `None` stops polling.
pub fn poll_interval(
    key: &QueryKey,
    snapshot: Option<&QueryPayload>,
    polling: &PollingConfig,
) -> Option<u64> {
    match (key, snapshot) {
        (QueryKey::Workflow(_), Some(QueryPayload::Workflow(detail))) => detail
            .status
            .keeps_polling()
            .then_some(polling.workflow_interval_ms),
        (QueryKey::AbStatus(_), Some(QueryPayload::AbStatus(status))) => status
            .is_running
            .then_some(polling.ab_status_interval_ms),
        (QueryKey::Workflow(_), _) => Some(polling.workflow_interval_ms),
        (QueryKey::AbStatus(_), _) => Some(polling.ab_status_interval_ms),
        (QueryKey::WorkflowList, _) => Some(polling.workflow_list_interval_ms),
        (QueryKey::Health, _) => Some(polling.health_interval_ms),
    }
}

#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: BTreeMap<QueryKey, QueryEntry>,
    next_seq: u64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 1,
        }
    }
}

impl QueryCache {
    /// Replaces every entry with an empty, stale one for each of `keys`.
    /// Outstanding fetches are forgotten; their results no longer match.
    pub fn remount(&mut self, keys: &[QueryKey]) {
        self.entries = keys
            .iter()
            .map(|key| (key.clone(), QueryEntry::fresh()))
            .collect();
    }

    pub fn mounted_keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.keys()
    }

    pub fn entry(&self, key: &QueryKey) -> Option<&QueryEntry> {
        self.entries.get(key)
    }

    /// Returns false when `key` is not mounted.
    pub fn mark_stale(&mut self, key: &QueryKey) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_stale(&mut self) {
        for entry in self.entries.values_mut() {
            entry.stale = true;
        }
    }

    pub fn due_keys(&self, now_ms: u64) -> Vec<QueryKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_due(now_ms))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Starts a fetch for `key` unless one is already outstanding.
    pub fn begin_fetch(&mut self, key: &QueryKey, generation: u64) -> Option<FetchTicket> {
        let entry = self.entries.get_mut(key)?;
        if entry.in_flight.is_some() {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        entry.in_flight = Some(seq);
        entry.stale = false;
        Some(FetchTicket {
            key: key.clone(),
            generation,
            seq,
        })
    }

    /// Releases the in-flight slot held by `ticket` and hands back the entry.
    pub fn finish_fetch(
        &mut self,
        ticket: &FetchTicket,
    ) -> Result<&mut QueryEntry, StaleDataError> {
        let entry = self
            .entries
            .get_mut(&ticket.key)
            .ok_or(StaleDataError::Superseded)?;
        if entry.in_flight != Some(ticket.seq) {
            return Err(StaleDataError::Superseded);
        }
        entry.in_flight = None;
        Ok(entry)
    }

    /// Stores a snapshot that did not come from a poll, e.g. a command
    /// response carrying the updated workflow.
    pub fn store_snapshot(&mut self, key: &QueryKey, payload: QueryPayload, now_ms: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.snapshot = Some(payload);
            entry.error = None;
            entry.last_success_ms = Some(now_ms);
        }
    }

    pub fn workflow(&self, id: &WorkflowId) -> Option<&WorkflowDetail> {
        match self.snapshot(&QueryKey::Workflow(id.clone())) {
            Some(QueryPayload::Workflow(detail)) => Some(detail),
            _ => None,
        }
    }

    pub fn ab_status(&self, id: &WorkflowId) -> Option<&AbTestStatus> {
        match self.snapshot(&QueryKey::AbStatus(id.clone())) {
            Some(QueryPayload::AbStatus(status)) => Some(status),
            _ => None,
        }
    }

    pub fn workflow_list(&self) -> Option<&[WorkflowSummary]> {
        match self.snapshot(&QueryKey::WorkflowList) {
            Some(QueryPayload::WorkflowList(list)) => Some(list.as_slice()),
            _ => None,
        }
    }

    pub fn health(&self) -> Option<&HealthStatus> {
        match self.snapshot(&QueryKey::Health) {
            Some(QueryPayload::Health(health)) => Some(health),
            _ => None,
        }
    }

    fn snapshot(&self, key: &QueryKey) -> Option<&QueryPayload> {
        self.entries.get(key).and_then(|entry| entry.snapshot.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn key() -> QueryKey {
        QueryKey::Workflow(WorkflowId::from("wf-1"))
    }

    #[test]
    fn remount_starts_every_key_empty_and_stale() {
        let mut cache = QueryCache::default();
        cache.remount(&[key(), QueryKey::Health]);
        let ticket = cache.begin_fetch(&key(), 1).expect("fetch");
        cache.remount(&[key()]);

        let keys: Vec<&QueryKey> = cache.mounted_keys().collect();
        assert_eq!(keys, vec![&key()]);
        assert!(cache.entry(&key()).is_some_and(|entry| entry.stale && !entry.is_fetching()));
        assert_eq!(cache.finish_fetch(&ticket).err(), Some(StaleDataError::Superseded));
    }

    #[test]
    fn second_fetch_is_refused_while_first_is_outstanding() {
        let mut cache = QueryCache::default();
        cache.remount(&[key()]);

        let first = cache.begin_fetch(&key(), 1).expect("first fetch");
        assert!(cache.begin_fetch(&key(), 1).is_none());
        assert!(cache.due_keys(u64::MAX).is_empty());

        cache.finish_fetch(&first).expect("finish");
        assert!(cache.begin_fetch(&key(), 1).is_some());
    }

    #[test]
    fn stale_mark_during_flight_survives_completion() {
        let mut cache = QueryCache::default();
        cache.remount(&[key()]);
        let ticket = cache.begin_fetch(&key(), 1).expect("fetch");

        assert!(cache.mark_stale(&key()));
        cache.finish_fetch(&ticket).expect("finish");

        assert_eq!(cache.due_keys(0), vec![key()]);
    }

    #[test]
    fn finishing_an_unknown_ticket_is_superseded() {
        let mut cache = QueryCache::default();
        cache.remount(&[key()]);
        let ticket = cache.begin_fetch(&key(), 1).expect("fetch");
        cache.finish_fetch(&ticket).expect("finish");

        assert_eq!(
            cache.finish_fetch(&ticket).err(),
            Some(StaleDataError::Superseded)
        );
        assert!(!cache.mark_stale(&QueryKey::Health));
    }

    #[test]
    fn poll_interval_follows_previous_snapshot() {
        let polling = PollingConfig::default();
        assert_eq!(poll_interval(&key(), None, &polling), Some(2_000));
        assert_eq!(
            poll_interval(&QueryKey::Health, None, &polling),
            Some(10_000)
        );

        let ab_key = QueryKey::AbStatus(WorkflowId::from("wf-1"));
        let finished = QueryPayload::AbStatus(AbTestStatus {
            workflow_id: WorkflowId::from("wf-1"),
            status: crate::model::AbTestPhase::Completed,
            is_running: false,
            variants: Vec::new(),
            current_confidence: 0.97,
            total_impressions: 4_000,
            winner_id: Some("t1".to_string()),
            elapsed_time_seconds: 3_600.0,
            estimated_time_remaining: 0.0,
            checks_completed: 12,
            can_declare_early: false,
        });
        assert_eq!(poll_interval(&ab_key, Some(&finished), &polling), None);
    }
}
