use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::cache::QueryKey;
use crate::commands::CommandKind;
use crate::commands::CommandScope;
use crate::config::Config;
use crate::error::PreconditionError;
use crate::lifecycle::LifecycleState;
use crate::model::AbTestStatus;
use crate::model::WorkflowDetail;
use crate::model::WorkflowId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Dashboard,
    WorkflowDetail(WorkflowId),
    AbMonitor(WorkflowId),
}

impl Route {
    pub fn subject(&self) -> Option<&WorkflowId> {
        match self {
            Self::Dashboard => None,
            Self::WorkflowDetail(id) | Self::AbMonitor(id) => Some(id),
        }
    }

    /// Query channels a view keeps mounted while it is shown.
    pub fn mounted_keys(&self) -> Vec<QueryKey> {
        match self {
            Self::Dashboard => vec![QueryKey::WorkflowList, QueryKey::Health],
            Self::WorkflowDetail(id) => vec![QueryKey::Workflow(id.clone())],
            Self::AbMonitor(id) => vec![
                QueryKey::AbStatus(id.clone()),
                QueryKey::Workflow(id.clone()),
            ],
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Dashboard => "/".to_string(),
            Self::WorkflowDetail(id) => format!("/workflows/{id}"),
            Self::AbMonitor(id) => format!("/workflows/{id}/ab-test"),
        }
    }
}

/// Operator's highlighted variants prior to submission. Seeded from the
/// backend once, then owned by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewSelection {
    pub script: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

impl NotificationLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub seq: u64,
    pub level: NotificationLevel,
    pub message: Arc<str>,
    pub expires_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct NotificationBuffer {
    cap: usize,
    next_seq: u64,
    buf: VecDeque<Notification>,
}

impl NotificationBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            next_seq: 1,
            buf: VecDeque::with_capacity(cap.max(1)),
        }
    }

    pub fn push(
        &mut self,
        level: NotificationLevel,
        message: impl Into<Arc<str>>,
        expires_at_ms: u64,
    ) -> Notification {
        let notification = Notification {
            seq: self.next_seq,
            level,
            message: message.into(),
            expires_at_ms,
        };
        self.next_seq += 1;

        if self.buf.len() == self.cap {
            self.buf.pop_front();
        }
        self.buf.push_back(notification.clone());
        notification
    }

    pub fn dismiss(&mut self, seq: u64) -> bool {
        let before = self.buf.len();
        self.buf.retain(|entry| entry.seq != seq);
        self.buf.len() != before
    }

    pub fn prune(&mut self, now_ms: u64) -> bool {
        let before = self.buf.len();
        self.buf.retain(|entry| entry.expires_at_ms > now_ms);
        self.buf.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.buf.iter()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlightCommand {
    pub seq: u64,
    pub kind: CommandKind,
}

#[derive(Debug, Clone)]
pub struct CommandState {
    pub in_flight: BTreeMap<CommandScope, InFlightCommand>,
    pub next_seq: u64,
}

impl Default for CommandState {
    fn default() -> Self {
        Self {
            in_flight: BTreeMap::new(),
            next_seq: 1,
        }
    }
}

impl CommandState {
    pub fn is_busy(&self, scope: &CommandScope) -> bool {
        self.in_flight.contains_key(scope)
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleState {
    pub config: Config,
    pub now_ms: u64,
    pub route: Route,
    /// Bumped on every route change; results carrying an older value are dropped.
    pub generation: u64,
    pub cache: QueryCache,
    pub selection: ReviewSelection,
    pub commands: CommandState,
    pub lifecycle: LifecycleState,
    pub validation: Option<PreconditionError>,
    pub notifications: NotificationBuffer,
}

impl ConsoleState {
    pub fn new(config: Config) -> Self {
        let notifications = NotificationBuffer::new(config.notifications.capacity);
        let route = Route::Dashboard;
        let mut cache = QueryCache::default();
        cache.remount(&route.mounted_keys());
        Self {
            config,
            now_ms: 0,
            route,
            generation: 1,
            cache,
            selection: ReviewSelection::default(),
            commands: CommandState::default(),
            lifecycle: LifecycleState::default(),
            validation: None,
            notifications,
        }
    }

    pub fn subject(&self) -> Option<&WorkflowId> {
        self.route.subject()
    }

    pub fn current_workflow(&self) -> Option<&WorkflowDetail> {
        self.subject().and_then(|id| self.cache.workflow(id))
    }

    pub fn current_ab_status(&self) -> Option<&AbTestStatus> {
        match &self.route {
            Route::AbMonitor(id) => self.cache.ab_status(id),
            _ => None,
        }
    }

    pub fn subject_busy(&self) -> bool {
        self.subject()
            .is_some_and(|id| self.commands.is_busy(&CommandScope::Workflow(id.clone())))
    }
}
