//! cloudpark-monitor: operator occupancy watch and driver navigation
//!
//! - `watch` keeps a live view of spot occupancy and logs every change
//! - `navigate` guides a driver to a spot, one Enter per step
//! - `assign` asks the server for a free spot (and optionally navigates there)

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use cloudpark_monitor::{
    ApiClient, MonitorConfig, MonitorView, NavigationSession, RouteRequest, SyncSettings,
    Synchronizer, WsEventSource,
};

#[derive(Parser)]
#[command(name = "cloudpark-monitor")]
#[command(about = "Real-time occupancy monitor and driver navigation for CloudPark")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cloudpark-monitor.toml")]
    config: String,

    /// API base URL (overrides config file)
    #[arg(long, env = "CLOUDPARK_API_URL")]
    api_url: Option<String>,

    /// Spot event WebSocket URL (overrides config file)
    #[arg(long, env = "CLOUDPARK_WS_URL")]
    ws_url: Option<String>,

    /// Bearer token (overrides config file)
    #[arg(long, env = "CLOUDPARK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow facility occupancy until Ctrl-C
    Watch,

    /// Step-by-step guidance to a spot
    Navigate {
        /// Target spot ID
        #[arg(long)]
        spot: i64,

        /// Start column on the zone grid
        #[arg(long, default_value_t = 0)]
        start_x: i64,

        /// Start row on the zone grid
        #[arg(long, default_value_t = 0)]
        start_y: i64,
    },

    /// Request a free spot
    Assign {
        /// Start navigation to the assigned spot
        #[arg(long)]
        navigate: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cloudpark_monitor=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = MonitorConfig::load(&cli.config)?;
    config.apply_env();
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    if let Some(url) = cli.ws_url {
        config.events.url = url;
    }
    if let Some(token) = cli.token {
        config.api.token = Some(token);
    }
    config.validate()?;

    info!(api = %config.api.base_url, events = %config.events.url, "Starting cloudpark-monitor");

    let api = Arc::new(ApiClient::new(&config.api)?);

    match cli.command {
        Command::Watch => watch(&config, api).await,
        Command::Navigate {
            spot,
            start_x,
            start_y,
        } => {
            navigate(
                &api,
                RouteRequest {
                    target_spot_id: spot,
                    start_x,
                    start_y,
                },
            )
            .await
        }
        Command::Assign { navigate: follow } => {
            let assignment = api.assign_spot().await?;
            println!(
                "Assigned spot {} ({}) in {}",
                assignment.spot_name, assignment.spot_id, assignment.zone_name
            );
            if follow {
                navigate(&api, RouteRequest::to_spot(assignment.spot_id)).await?;
            }
            Ok(())
        }
    }
}

async fn watch(config: &MonitorConfig, api: Arc<ApiClient>) -> anyhow::Result<()> {
    let events = Arc::new(WsEventSource::new(config.events.url.clone()));
    let sync = Synchronizer::start(api, events, SyncSettings::from(config));
    let mut views = sync.subscribe();

    let mut last = sync.view();
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                report(&last, &view);
                last = view;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
        }
    }

    sync.shutdown().await;
    Ok(())
}

/// Log what changed between two views
fn report(previous: &MonitorView, current: &MonitorView) {
    if previous.is_live() != current.is_live() {
        if current.is_live() {
            info!("Live");
        } else {
            info!(link = ?current.link(), "Offline");
        }
    }

    if previous.occupancy() != current.occupancy() {
        let occupancy = current.occupancy();
        info!(
            total = occupancy.total,
            occupied = occupancy.occupied,
            free = occupancy.free,
            rate = %format!("{:.1}%", occupancy.rate() * 100.0),
            "Occupancy"
        );
    }

    let seen = previous.feed().first().map(|e| e.id).unwrap_or(0);
    for entry in current.feed().iter().rev().filter(|e| e.id > seen) {
        info!(spot_id = entry.spot_id, status = %entry.status, time = %entry.time, "Spot changed");
    }
}

async fn navigate(api: &ApiClient, request: RouteRequest) -> anyhow::Result<()> {
    println!("Calculating route to spot #{}...", request.target_spot_id);
    let mut session = NavigationSession::load(api, request).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_step(&session);
        if session.is_terminal() {
            break;
        }
        if lines.next_line().await?.is_none() {
            break;
        }
        session.advance();
    }
    Ok(())
}

fn print_step(session: &NavigationSession) {
    let Some(instruction) = session.current() else {
        return;
    };
    let display = instruction.display();
    match session.progress() {
        Some(progress) => println!(
            "[{}] {}  (step {} of {}, press Enter to continue)",
            display.icon, display.label, progress.step, progress.total
        ),
        None => println!("[{}] {}  (spot #{})", display.icon, display.label, session.target_spot_id()),
    }
}
