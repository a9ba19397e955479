//! Main Entrypoint for the Telehealth Terminal Client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment and the command line.
//! 2. Building the `SessionContext` for the chosen role and opening the relay connection.
//! 3. Starting the splat status poller and the state renderer.
//! 4. Turning stdin lines into chat messages and image uploads until shutdown.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use telehealth_client::{
    config::Config,
    console::{self, Command},
};
use telehealth_core::{
    config::TransportKind,
    model::Role,
    notify::LogNotifier,
    splat::{HttpStatusSource, HttpUploader},
};
use telehealth_realtime::{SendOutcome, SessionContext};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(version, about = "Join a telehealth session from the terminal")]
struct Cli {
    /// Which side of the session this process plays (doctor or patient).
    role: Role,

    /// Overrides the TRANSPORT environment variable (raw or multiplexed).
    #[arg(long)]
    transport: Option<TransportKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    let mut session_config = config.session(cli.role);
    if let Some(transport) = cli.transport {
        session_config.transport = transport;
    }
    info!(
        role = %session_config.role,
        transport = %session_config.transport,
        relay = %session_config.relay_url,
        api = %session_config.api_base_url,
        "Configuration loaded. Joining session..."
    );

    // --- 3. Build the Session ---
    let ctx = SessionContext::new(session_config, Arc::new(LogNotifier))
        .context("Failed to create session")?;
    let lease = ctx.transport();

    let api_base_url = ctx.config().api_base_url.clone();
    let source = Arc::new(HttpStatusSource::new(
        &api_base_url,
        ctx.config().artifact_content_type.clone(),
    ));
    let poller = ctx.start_polling(source);
    let renderer = tokio::spawn(console::render(ctx.store().subscribe(), api_base_url.clone()));
    let uploader = HttpUploader::new(&api_base_url);

    info!("Type a message and press enter. '/upload <files...>' sends images, '/quit' leaves.");

    // --- 4. Input Loop ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal. Leaving session...");
                break;
            }
            line = lines.next_line() => line.context("Failed to read from stdin")?,
        };
        let Some(line) = line else {
            break;
        };

        match console::parse_line(&line) {
            Command::Nothing => {}
            Command::Quit => break,
            Command::Chat(text) => {
                match ctx.send_chat(&text).await {
                    SendOutcome::Failed(e) => warn!(error = %e, "Message not sent"),
                    SendOutcome::Rejected(e) => warn!(error = %e, "Message not authored"),
                    SendOutcome::Empty | SendOutcome::Sent(_) => {}
                }
            }
            Command::Upload(paths) => match console::read_images(&paths).await {
                Ok(images) => {
                    let status = ctx.upload_images(&uploader, images).await;
                    info!(%status, "Upload finished");
                }
                Err(e) => warn!(error = %e, "Could not read images"),
            },
        }
    }

    // --- 5. Shutdown ---
    poller.stop();
    lease.release();
    renderer.abort();
    info!("Session closed.");
    Ok(())
}
