use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gatechat::cli::Commands;
use gatechat::{
    parse_entity_id, ChatConfig, ChatEntry, ChatSessionUseCase, ConnectionInfo,
    DispatchCompletionUseCase, HttpTransport, Message, MockTransport, ReqwestTransport,
    TerminalRenderer,
};

#[derive(Parser)]
#[command(name = "gatechat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Send requests through the security gateway (RPROXY_URL)
    #[arg(long, global = true)]
    gateway: bool,

    #[arg(long, global = true)]
    api_url: Option<String>,

    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_parser = parse_timeout_secs)]
    timeout: Option<f64>,

    /// Answer locally with an echo instead of calling the API
    #[arg(long, global = true)]
    mock_transport: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ChatConfig::load(&cli.env_file)?;

    let transport: Arc<dyn HttpTransport> = if cli.mock_transport {
        info!("Using mock transport");
        Arc::new(MockTransport::new())
    } else {
        Arc::new(ReqwestTransport::new())
    };
    let dispatcher = DispatchCompletionUseCase::new(transport, config.dispatch_defaults(cli.gateway));
    let timeout = cli.timeout.map(Duration::from_secs_f64);

    match cli.command {
        Commands::Chat => {
            let mut session = ChatSessionUseCase::new(dispatcher)
                .with_model(cli.model)
                .with_credential(cli.api_key)
                .with_endpoint(cli.api_url)
                .with_timeout(timeout);

            let mut renderer = TerminalRenderer::stdout();
            renderer.connection_info(&ConnectionInfo {
                endpoint: session.endpoint(),
                model: session.model(),
                has_credential: session.has_credential(),
                via_gateway: cli.gateway,
                entity_id: config.entity_id.as_deref(),
            })?;
            renderer.notice("Type a message, /clear to reset history, /quit to leave.\n")?;

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                match line.trim() {
                    "/quit" | "/exit" => break,
                    "/clear" => {
                        session.clear();
                        renderer.notice("History cleared.\n")?;
                    }
                    input => {
                        session
                            .submit(input, |entry| {
                                if let Err(e) = renderer.on_entry(entry) {
                                    warn!("Failed to render entry: {e}");
                                }
                            })
                            .await;
                    }
                }
            }
        }

        Commands::Send { message, json } => {
            let dispatch = dispatcher
                .execute(
                    vec![Message::user(message)],
                    cli.model.as_deref(),
                    cli.api_key.as_deref(),
                    cli.api_url.as_deref(),
                    timeout,
                )
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&dispatch)?);
            } else {
                let mut renderer = TerminalRenderer::stdout().without_spinner();
                renderer.on_entry(&ChatEntry::from_dispatch(&dispatch))?;
            }

            if dispatch.outcome.is_error() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::EntityId { key } => {
            let key = key.unwrap_or_else(|| config.gateway_auth_header.clone());
            if key.trim().is_empty() {
                bail!("No key given and RPROXY_AUTH_HEADER is not set");
            }
            match parse_entity_id(Some(&key)) {
                Some(id) => println!("{id}"),
                None => {
                    eprintln!("No entity ID found: key is not in vpsk_live_ or vigil_ format");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        Commands::Config => {
            let defaults = dispatcher.defaults();
            let endpoint = cli.api_url.as_deref().unwrap_or(&defaults.endpoint);
            let model = cli.model.as_deref().unwrap_or(&defaults.model);
            let has_credential = cli.api_key.as_deref().is_some_and(|k| !k.is_empty())
                || !defaults.credential.is_empty();

            let mut renderer = TerminalRenderer::stdout();
            renderer.connection_info(&ConnectionInfo {
                endpoint,
                model,
                has_credential,
                via_gateway: cli.gateway,
                entity_id: config.entity_id.as_deref(),
            })?;
            renderer.notice(&format!("  Timeout:   {}s", config.timeout.as_secs_f64()))?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn parse_timeout_secs(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err("timeout must be a positive number of seconds".to_string());
    }
    Ok(secs)
}
