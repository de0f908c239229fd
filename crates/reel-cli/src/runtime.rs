//! Drives the console engine: carries out its effects on the blocking pool and
//! feeds results, clock ticks and operator input back in as actions.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use anyhow::bail;
use anyhow::Context;
use reel_client::ConsoleApi;
use reel_client::RemoteClient;
use reel_core::cache::FetchTicket;
use reel_core::commands::CommandTicket;
use reel_core::reduce;
use reel_core::Command;
use reel_core::Config;
use reel_core::ConsoleAction;
use reel_core::ConsoleEffect;
use reel_core::ConsoleState;
use reel_core::Notification;
use reel_core::NotificationLevel;
use reel_core::Route;
use reel_core::RuntimeAction;
use reel_core::UserAction;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::time::Interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;

use crate::input::parse_operator_line;
use crate::input::OperatorInput;
use crate::input::HELP;
use crate::render;

const TICK: Duration = Duration::from_millis(250);
const WAIT_SLACK: Duration = Duration::from_secs(5);

pub struct Session<C> {
    api: Arc<ConsoleApi<C>>,
    state: ConsoleState,
    started: Instant,
    results_tx: mpsc::UnboundedSender<RuntimeAction>,
    results_rx: mpsc::UnboundedReceiver<RuntimeAction>,
    show_frames: bool,
    last_frame: String,
    wait_timeout: Duration,
}

impl<C: RemoteClient + 'static> Session<C> {
    pub fn new(api: ConsoleApi<C>, config: Config, show_frames: bool) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let wait_timeout = Duration::from_secs(config.api.timeout_secs) + WAIT_SLACK;
        Self {
            api: Arc::new(api),
            state: ConsoleState::new(config),
            started: Instant::now(),
            results_tx,
            results_rx,
            show_frames,
            last_frame: String::new(),
            wait_timeout,
        }
    }

    pub fn state(&self) -> &ConsoleState {
        &self.state
    }

    pub fn dispatch(&mut self, action: impl Into<ConsoleAction>) -> Vec<Notification> {
        let effects = reduce(&mut self.state, action.into());
        self.perform(effects)
    }

    fn perform(&mut self, effects: Vec<ConsoleEffect>) -> Vec<Notification> {
        let mut notifications = Vec::new();
        let mut redraw = false;
        for effect in effects {
            match effect {
                ConsoleEffect::Fetch(ticket) => self.spawn_fetch(ticket),
                ConsoleEffect::SendCommand { ticket, command } => {
                    self.spawn_command(ticket, command)
                }
                ConsoleEffect::Navigate(route) => {
                    info!(event = "route_changed", path = %route.path());
                }
                ConsoleEffect::Notify(notification) => {
                    println!("{}", render::notification_line(&notification));
                    notifications.push(notification);
                }
                ConsoleEffect::PresentWinner {
                    workflow_id,
                    winner_id,
                } => {
                    info!(
                        event = "winner_presented",
                        workflow_id = %workflow_id,
                        winner_id = %winner_id
                    );
                    redraw = true;
                }
                ConsoleEffect::RequestFrame => redraw = true,
            }
        }
        if redraw {
            self.redraw(false);
        }
        notifications
    }

    fn redraw(&mut self, force: bool) {
        if !self.show_frames {
            return;
        }
        let frame = render::frame(&self.state);
        if force || frame != self.last_frame {
            println!("{frame}");
            self.last_frame = frame;
        }
    }

    fn spawn_fetch(&self, ticket: FetchTicket) {
        let api = Arc::clone(&self.api);
        let tx = self.results_tx.clone();
        debug!(event = "fetch_issued", key = ?ticket.key, seq = ticket.seq);
        tokio::task::spawn_blocking(move || {
            let result = api.execute_query(&ticket.key);
            let _ = tx.send(RuntimeAction::FetchResolved { ticket, result });
        });
    }

    fn spawn_command(&self, ticket: CommandTicket, command: Command) {
        let api = Arc::clone(&self.api);
        let tx = self.results_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = api.execute_command(&command);
            let _ = tx.send(RuntimeAction::CommandResolved {
                ticket,
                command,
                result,
            });
        });
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn ticker() -> Interval {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// Waits for one result or one clock tick and applies it.
    async fn step(&mut self, ticker: &mut Interval) -> Vec<Notification> {
        tokio::select! {
            Some(action) = self.results_rx.recv() => self.dispatch(action),
            _ = ticker.tick() => {
                let now_ms = self.now_ms();
                self.dispatch(RuntimeAction::Tick { now_ms })
            }
        }
    }

    /// Runs the engine until `done` holds, collecting notifications on the way.
    pub async fn wait_until<F>(&mut self, mut done: F) -> anyhow::Result<Vec<Notification>>
    where
        F: FnMut(&ConsoleState) -> bool,
    {
        let mut ticker = Self::ticker();
        let mut notifications = Vec::new();
        let deadline = tokio::time::Instant::now() + self.wait_timeout;
        while !done(&self.state) {
            tokio::select! {
                batch = self.step(&mut ticker) => notifications.extend(batch),
                _ = tokio::time::sleep_until(deadline) => {
                    bail!(
                        "timed out after {}s waiting for the backend",
                        self.wait_timeout.as_secs()
                    );
                }
            }
        }
        Ok(notifications)
    }

    /// Opens `route` and waits for its primary snapshot.
    pub async fn open(&mut self, route: Route) -> anyhow::Result<()> {
        let Some(key) = route.mounted_keys().into_iter().next() else {
            bail!("route {} shows no data", route.path());
        };
        let path = route.path();
        self.dispatch(UserAction::Navigate(route));
        self.wait_until(|state| {
            state
                .cache
                .entry(&key)
                .is_some_and(|entry| entry.snapshot.is_some() || entry.error.is_some())
        })
        .await?;
        match self.state.cache.entry(&key) {
            Some(entry) if entry.snapshot.is_none() => match &entry.error {
                Some(err) => bail!("failed to load {path}: {err}"),
                None => bail!("failed to load {path}"),
            },
            _ => Ok(()),
        }
    }

    /// Applies an operator action and, when it sent a command, waits for the
    /// command to settle. Rejected preconditions and failed commands are errors.
    pub async fn submit(&mut self, action: UserAction) -> anyhow::Result<Vec<Notification>> {
        let mut notifications = self.dispatch(action);
        if let Some(err) = &self.state.validation {
            bail!("{err}");
        }
        notifications.extend(
            self.wait_until(|state| state.commands.in_flight.is_empty())
                .await?,
        );
        if let Some(failed) = notifications
            .iter()
            .find(|notification| notification.level == NotificationLevel::Error)
        {
            bail!("{}", failed.message);
        }
        Ok(notifications)
    }

    /// Interactive loop: operator lines on stdin, until `quit`, end of input
    /// combined with Ctrl-C, or Ctrl-C alone.
    pub async fn run_interactive(&mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut input_open = true;
        let mut ticker = Self::ticker();
        println!("{HELP}");
        let now_ms = self.now_ms();
        self.dispatch(RuntimeAction::Tick { now_ms });
        self.redraw(true);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!(event = "session_interrupted");
                    return Ok(());
                }
                line = lines.next_line(), if input_open => {
                    match line.context("failed to read operator input")? {
                        Some(line) => {
                            if !self.handle_line(&line) {
                                return Ok(());
                            }
                        }
                        None => {
                            debug!(event = "operator_input_closed");
                            input_open = false;
                        }
                    }
                }
                _ = self.step(&mut ticker) => {}
            }
        }
    }

    /// Returns false when the operator asked to leave.
    fn handle_line(&mut self, line: &str) -> bool {
        match parse_operator_line(line) {
            Ok(OperatorInput::Empty) => self.redraw(true),
            Ok(OperatorInput::Help) => println!("{HELP}"),
            Ok(OperatorInput::Quit) => return false,
            Ok(OperatorInput::Action(action)) => {
                self.dispatch(action);
            }
            Err(err) => println!("! {err}"),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use reel_client::SimulatedRemoteClient;
    use reel_core::model::WorkflowId;
    use reel_core::model::WorkflowStatus;

    use super::*;

    fn session() -> Session<SimulatedRemoteClient> {
        Session::new(
            ConsoleApi::new(SimulatedRemoteClient::new()),
            Config::default(),
            false,
        )
    }

    #[tokio::test]
    async fn start_then_approve_against_the_simulated_backend() {
        let mut session = session();
        session.open(Route::Dashboard).await.expect("dashboard");

        let notifications = session
            .submit(UserAction::StartWorkflow {
                topic: "Sourdough basics".to_string(),
                platforms: vec!["youtube".to_string()],
            })
            .await
            .expect("start");
        assert_eq!(notifications.len(), 1);
        assert_eq!(&*notifications[0].message, "Workflow started");

        let Route::WorkflowDetail(id) = session.state().route.clone() else {
            panic!("expected the new workflow to open");
        };
        assert_eq!(id, WorkflowId::from("sim-0001"));

        session
            .wait_until(|state| {
                state
                    .current_workflow()
                    .is_some_and(|detail| detail.status == WorkflowStatus::AwaitingApproval)
            })
            .await
            .expect("scripts");
        assert_eq!(session.state().selection.script.as_deref(), Some("s1-1"));

        session.submit(UserAction::Approve).await.expect("approve");
        assert_eq!(
            session.state().current_workflow().map(|detail| detail.status.clone()),
            Some(WorkflowStatus::Running)
        );
    }

    #[tokio::test]
    async fn rejected_precondition_is_reported_without_a_request() {
        let mut session = session();
        session.open(Route::Dashboard).await.expect("dashboard");

        let err = session
            .submit(UserAction::StartWorkflow {
                topic: "   ".to_string(),
                platforms: vec!["youtube".to_string()],
            })
            .await
            .expect_err("empty topic");
        assert!(session.state().commands.in_flight.is_empty());
        assert!(!err.to_string().is_empty());
    }

    #[tokio::test]
    async fn unknown_workflow_fails_to_open() {
        let mut session = session();
        let err = session
            .open(Route::WorkflowDetail(WorkflowId::from("missing")))
            .await
            .expect_err("404");
        assert!(err.to_string().contains("Workflow not found"), "{err}");
    }
}
