//! Operator commands typed into an interactive session.

use reel_core::commands::DEFAULT_PLATFORM;
use reel_core::model::WorkflowId;
use reel_core::Route;
use reel_core::UserAction;

pub const HELP: &str = "\
commands:
  home                      show the dashboard
  open <workflow>           show a workflow
  monitor <workflow>        show the A/B monitor
  reload                    refetch everything on screen
  script <id>               pick a script
  thumb <id>                pick a thumbnail
  approve | reject          review the picked script
  finalize                  confirm the picked thumbnail and start the test
  winner <thumbnail>        declare a winner manually
  stop [reason]             stop the running test early
  start <topic>             start a new workflow
  dismiss [notification]    dismiss the winner banner or a notification
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorInput {
    Empty,
    Help,
    Quit,
    Action(UserAction),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),
    #[error("`{command}` needs {what}")]
    MissingArgument {
        command: &'static str,
        what: &'static str,
    },
    #[error("`{0}` is not a notification number")]
    BadNotification(String),
}

pub fn parse_operator_line(line: &str) -> Result<OperatorInput, InputError> {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    let arg = (!rest.is_empty()).then_some(rest);

    let action = match command {
        "" => return Ok(OperatorInput::Empty),
        "help" | "?" => return Ok(OperatorInput::Help),
        "quit" | "exit" | "q" => return Ok(OperatorInput::Quit),
        "home" | "dashboard" => UserAction::Navigate(Route::Dashboard),
        "open" => UserAction::Navigate(Route::WorkflowDetail(workflow("open", arg)?)),
        "monitor" => UserAction::Navigate(Route::AbMonitor(workflow("monitor", arg)?)),
        "reload" | "r" => UserAction::Reload,
        "script" => UserAction::SelectScript(required("script", "a script id", arg)?),
        "thumb" => UserAction::SelectThumbnail(required("thumb", "a thumbnail id", arg)?),
        "approve" => UserAction::Approve,
        "reject" => UserAction::Reject,
        "finalize" => UserAction::Finalize,
        "winner" => UserAction::DeclareWinner {
            thumbnail_id: required("winner", "a thumbnail id", arg)?,
        },
        "stop" => UserAction::StopTest {
            reason: arg.map(str::to_string),
        },
        "start" => UserAction::StartWorkflow {
            topic: arg.unwrap_or_default().to_string(),
            platforms: vec![DEFAULT_PLATFORM.to_string()],
        },
        "dismiss" => match arg {
            None => UserAction::DismissWinner,
            Some(seq) => UserAction::DismissNotification(
                seq.trim_start_matches('#')
                    .parse()
                    .map_err(|_| InputError::BadNotification(seq.to_string()))?,
            ),
        },
        other => return Err(InputError::Unknown(other.to_string())),
    };
    Ok(OperatorInput::Action(action))
}

fn required(
    command: &'static str,
    what: &'static str,
    arg: Option<&str>,
) -> Result<String, InputError> {
    arg.map(str::to_string)
        .ok_or(InputError::MissingArgument { command, what })
}

fn workflow(command: &'static str, arg: Option<&str>) -> Result<WorkflowId, InputError> {
    required(command, "a workflow id", arg).map(WorkflowId::from)
}
