//! Time-boxed effects driven by observed snapshots: the completion redirect,
//! the winner presentation and the one-shot jump to the A/B monitor.
//!
//! Each machine is advanced only by explicit observations and clock ticks so
//! the reducer can test every transition without real timers.

use crate::model::AbTestStatus;
use crate::model::WorkflowDetail;
use crate::model::WorkflowId;
use crate::model::WorkflowStatus;
use crate::state::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectTimer {
    #[default]
    Idle,
    Armed {
        deadline_ms: u64,
    },
    /// Stays here until the condition reverses or the route changes.
    Fired,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WinnerPresentation {
    #[default]
    Hidden,
    Presenting {
        winner_id: String,
    },
    Dismissed {
        winner_id: String,
    },
}

impl WinnerPresentation {
    pub fn is_presenting(&self) -> bool {
        matches!(self, Self::Presenting { .. })
    }

    fn last_winner(&self) -> Option<&str> {
        match self {
            Self::Hidden => None,
            Self::Presenting { winner_id } | Self::Dismissed { winner_id } => Some(winner_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleSignal {
    Navigate(Route),
    PresentWinner {
        workflow_id: WorkflowId,
        winner_id: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleState {
    pub redirect: RedirectTimer,
    pub winner: WinnerPresentation,
    /// Workflow whose A/B monitor has already been entered.
    pub monitor_entered_for: Option<WorkflowId>,
}

impl LifecycleState {
    /// Cancels timers and presentation when `route` becomes current.
    pub fn reset_for_route(&mut self, route: &Route) {
        self.redirect = RedirectTimer::Idle;
        self.winner = WinnerPresentation::Hidden;
        match route {
            Route::AbMonitor(id) => self.monitor_entered_for = Some(id.clone()),
            Route::WorkflowDetail(id) if self.monitor_entered_for.as_ref() == Some(id) => {}
            _ => self.monitor_entered_for = None,
        }
    }

    pub fn observe_workflow(
        &mut self,
        route: &Route,
        workflow: &WorkflowDetail,
    ) -> Option<LifecycleSignal> {
        let Route::WorkflowDetail(id) = route else {
            return None;
        };
        if workflow.status != WorkflowStatus::AbTesting
            || self.monitor_entered_for.as_ref() == Some(id)
        {
            return None;
        }
        self.monitor_entered_for = Some(id.clone());
        Some(LifecycleSignal::Navigate(Route::AbMonitor(id.clone())))
    }

    pub fn observe_ab_status(
        &mut self,
        route: &Route,
        status: &AbTestStatus,
        now_ms: u64,
        grace_ms: u64,
    ) -> Vec<LifecycleSignal> {
        let Route::AbMonitor(id) = route else {
            return Vec::new();
        };
        let mut signals = Vec::new();

        self.redirect = match (self.redirect, status.is_finished()) {
            (RedirectTimer::Idle, true) => RedirectTimer::Armed {
                deadline_ms: now_ms.saturating_add(grace_ms),
            },
            (armed_or_fired, true) => armed_or_fired,
            (_, false) => RedirectTimer::Idle,
        };

        if let Some(winner_id) = status.winner_id.as_deref() {
            if self.winner.last_winner() != Some(winner_id) {
                self.winner = WinnerPresentation::Presenting {
                    winner_id: winner_id.to_string(),
                };
                signals.push(LifecycleSignal::PresentWinner {
                    workflow_id: id.clone(),
                    winner_id: winner_id.to_string(),
                });
            }
        }

        signals
    }

    pub fn on_tick(&mut self, route: &Route, now_ms: u64) -> Option<LifecycleSignal> {
        let Route::AbMonitor(id) = route else {
            return None;
        };
        match self.redirect {
            RedirectTimer::Armed { deadline_ms } if now_ms >= deadline_ms => {
                self.redirect = RedirectTimer::Fired;
                Some(LifecycleSignal::Navigate(Route::WorkflowDetail(id.clone())))
            }
            _ => None,
        }
    }

    /// Returns false when nothing was being presented.
    pub fn dismiss_winner(&mut self) -> bool {
        match std::mem::take(&mut self.winner) {
            WinnerPresentation::Presenting { winner_id } => {
                self.winner = WinnerPresentation::Dismissed { winner_id };
                true
            }
            other => {
                self.winner = other;
                false
            }
        }
    }
}
