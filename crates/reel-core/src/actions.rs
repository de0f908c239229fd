use crate::cache::FetchTicket;
use crate::cache::QueryPayload;
use crate::commands::Command;
use crate::commands::CommandOutcome;
use crate::commands::CommandTicket;
use crate::error::RequestError;
use crate::state::Route;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    Navigate(Route),
    /// Marks every mounted channel stale, restarting stopped polls.
    Reload,
    SelectScript(String),
    SelectThumbnail(String),
    Approve,
    Reject,
    Finalize,
    DeclareWinner {
        thumbnail_id: String,
    },
    StopTest {
        reason: Option<String>,
    },
    StartWorkflow {
        topic: String,
        platforms: Vec<String>,
    },
    DismissWinner,
    DismissNotification(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeAction {
    /// Monotonic clock reading; readings older than the current one are ignored.
    Tick {
        now_ms: u64,
    },
    FetchResolved {
        ticket: FetchTicket,
        result: Result<QueryPayload, RequestError>,
    },
    CommandResolved {
        ticket: CommandTicket,
        command: Command,
        result: Result<CommandOutcome, RequestError>,
    },
}

impl From<UserAction> for ConsoleAction {
    fn from(action: UserAction) -> Self {
        Self::User(action)
    }
}

impl From<RuntimeAction> for ConsoleAction {
    fn from(action: RuntimeAction) -> Self {
        Self::Runtime(action)
    }
}
