use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use reel_client::ConsoleApi;
use reel_client::HttpRemoteClient;
use reel_client::RemoteClient;
use reel_client::SimulatedRemoteClient;
use reel_core::config::BASE_URL_ENV;
use reel_core::model::WorkflowId;
use reel_core::Config;
use reel_core::Route;
use reel_core::UserAction;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod input;
mod render;
mod runtime;

use runtime::Session;

const LOG_ENV: &str = "REEL_LOG";
const DEMO_TOPIC: &str = "Five habits of productive remote teams";

#[derive(Parser, Debug)]
#[command(name = "reel", version, about = "Operator console for the content pipeline")]
struct Cli {
    /// Config file; defaults to <config dir>/reel/config.toml when present.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = BASE_URL_ENV, value_name = "URL")]
    base_url: Option<String>,
    /// Talk to an in-memory pipeline instead of the backend.
    #[arg(long, global = true)]
    simulate: bool,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Check that the backend is up.
    Health,
    /// List workflows, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Start a workflow for a topic.
    Start {
        topic: String,
        #[arg(long = "platform", value_name = "PLATFORM")]
        platforms: Vec<String>,
    },
    /// Follow a workflow interactively.
    Watch {
        workflow: String,
        /// Open the A/B monitor instead of the review view.
        #[arg(long)]
        monitor: bool,
    },
    /// Approve a script, the pre-selected one unless --script is given.
    Approve {
        workflow: String,
        #[arg(long)]
        script: Option<String>,
    },
    /// Reject all scripts and regenerate.
    Reject { workflow: String },
    /// Confirm a thumbnail and start the A/B test.
    Finalize {
        workflow: String,
        #[arg(long)]
        thumbnail: Option<String>,
    },
    /// End a running test with a chosen winner.
    DeclareWinner { workflow: String, thumbnail: String },
    /// End a running test, picking the best CTR.
    StopTest {
        workflow: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    config.apply_base_url_override(cli.base_url);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let command = cli.command;
    if cli.simulate {
        let client = SimulatedRemoteClient::new();
        let seeded = client
            .seed_workflow(DEMO_TOPIC)
            .context("failed to seed the simulated pipeline")?;
        info!(event = "simulation_started", workflow_id = %seeded);
        runtime.block_on(execute(ConsoleApi::new(client), config, command))
    } else {
        let client = HttpRemoteClient::new(&config.api).context("invalid api settings")?;
        info!(event = "backend_selected", base_url = %config.api.base_url);
        runtime.block_on(execute(ConsoleApi::new(client), config, command))
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path).context("failed to load config");
    }
    match dirs::config_dir() {
        Some(dir) => Config::load_or_default(&dir.join("reel").join("config.toml"))
            .context("failed to load config"),
        None => Ok(Config::default()),
    }
}

async fn execute<C: RemoteClient + 'static>(
    api: ConsoleApi<C>,
    config: Config,
    command: Option<CliCommand>,
) -> anyhow::Result<()> {
    let Some(command) = command else {
        let mut session = Session::new(api, config, true);
        return session.run_interactive().await;
    };

    match command {
        CliCommand::Health => {
            let health = tokio::task::spawn_blocking(move || api.health()).await??;
            println!("backend: {}", health.status);
        }
        CliCommand::List { json } => {
            let workflows = tokio::task::spawn_blocking(move || api.list_workflows()).await??;
            if json {
                println!("{}", serde_json::to_string_pretty(&workflows)?);
            } else if workflows.is_empty() {
                println!("no workflows yet");
            } else {
                for summary in &workflows {
                    println!(
                        "{:<14} {:<30} {:<30} created {} updated {}",
                        summary.workflow_id.as_str(),
                        summary.topic,
                        summary.status.as_str(),
                        summary.created_label(),
                        summary.updated_label()
                    );
                }
            }
        }
        CliCommand::Start { topic, platforms } => {
            let mut session = Session::new(api, config, false);
            session.open(Route::Dashboard).await?;
            session
                .submit(UserAction::StartWorkflow { topic, platforms })
                .await?;
            if let Some(id) = session.state().subject() {
                println!("{id}");
            }
        }
        CliCommand::Watch { workflow, monitor } => {
            let id = WorkflowId::from(workflow);
            let route = if monitor {
                Route::AbMonitor(id)
            } else {
                Route::WorkflowDetail(id)
            };
            let mut session = Session::new(api, config, true);
            session.dispatch(UserAction::Navigate(route));
            session.run_interactive().await?;
        }
        CliCommand::Approve { workflow, script } => {
            let mut session = review_session(api, config, workflow).await?;
            if let Some(script) = script {
                session.submit(UserAction::SelectScript(script)).await?;
            }
            session.submit(UserAction::Approve).await?;
        }
        CliCommand::Reject { workflow } => {
            let mut session = review_session(api, config, workflow).await?;
            session.submit(UserAction::Reject).await?;
        }
        CliCommand::Finalize {
            workflow,
            thumbnail,
        } => {
            let mut session = review_session(api, config, workflow).await?;
            if let Some(thumbnail) = thumbnail {
                session.submit(UserAction::SelectThumbnail(thumbnail)).await?;
            }
            session.submit(UserAction::Finalize).await?;
        }
        CliCommand::DeclareWinner {
            workflow,
            thumbnail,
        } => {
            let mut session = monitor_session(api, config, workflow).await?;
            session
                .submit(UserAction::DeclareWinner {
                    thumbnail_id: thumbnail,
                })
                .await?;
        }
        CliCommand::StopTest { workflow, reason } => {
            let mut session = monitor_session(api, config, workflow).await?;
            session.submit(UserAction::StopTest { reason }).await?;
        }
    }
    Ok(())
}

async fn review_session<C: RemoteClient + 'static>(
    api: ConsoleApi<C>,
    config: Config,
    workflow: String,
) -> anyhow::Result<Session<C>> {
    let mut session = Session::new(api, config, false);
    session
        .open(Route::WorkflowDetail(WorkflowId::from(workflow)))
        .await?;
    Ok(session)
}

async fn monitor_session<C: RemoteClient + 'static>(
    api: ConsoleApi<C>,
    config: Config,
    workflow: String,
) -> anyhow::Result<Session<C>> {
    let mut session = Session::new(api, config, false);
    session
        .open(Route::AbMonitor(WorkflowId::from(workflow)))
        .await?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from([
            "reel",
            "stop-test",
            "wf-1",
            "--reason",
            "budget",
            "--simulate",
        ])
        .expect("parse");
        assert!(cli.simulate);
        match cli.command {
            Some(CliCommand::StopTest { workflow, reason }) => {
                assert_eq!(workflow, "wf-1");
                assert_eq!(reason.as_deref(), Some("budget"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn platforms_repeat() {
        let cli = Cli::try_parse_from([
            "reel",
            "start",
            "Home espresso",
            "--platform",
            "youtube",
            "--platform",
            "tiktok",
        ])
        .expect("parse");
        match cli.command {
            Some(CliCommand::Start { topic, platforms }) => {
                assert_eq!(topic, "Home espresso");
                assert_eq!(platforms, vec!["youtube", "tiktok"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn explicit_config_must_exist() {
        let err = load_config(Some(Path::new("/nonexistent/reel.toml"))).expect_err("missing");
        assert!(format!("{err:#}").contains("failed to load config"));
    }
}
