// src/main.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::bail;
use clap::{Args, Parser, Subcommand};
use tokio::time::sleep;
use tracing::info;
use waypoint::{
    app::{App, cmd_init},
    config::{ConfigStore, EnvConfigStore},
    logger::{LogConfig, LogLevel, init_tracing},
    schema::write_schema,
    surface::TracingSurface,
};

#[derive(Parser, Debug)]
#[command(
    name = "waypoint",
    about = "Hierarchical flow-coordination runtime",
    version = "0.2.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the runtime
    Run(RunArgs),

    /// Emit JSON Schemas for the public wire types
    Schema,

    /// Initialize a fresh root layout
    Init,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// OpenTelemetry log endpoint (e.g. http://localhost:4318)
    #[arg(long)]
    otel_endpoint: Option<String>,

    /// Fire a demo tracking trigger this many seconds after startup
    #[arg(long)]
    demo_trigger_after: Option<u64>,
}

/// Resolve the waypoint root directory from the environment or use default.
fn resolve_root_dir() -> PathBuf {
    if let Ok(path) = env::var("WAYPOINT_ROOT") {
        PathBuf::from(path)
    } else {
        PathBuf::from("./waypoint")
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs {
        log_level: "info".to_string(),
        otel_endpoint: None,
        demo_trigger_after: None,
    })) {
        Commands::Run(args) => run(resolve_root_dir(), args).await,
        Commands::Schema => {
            let out_dir = resolve_root_dir().join("schemas");
            write_schema(out_dir.clone())?;
            println!("Schemas written to {}", out_dir.display());
            Ok(())
        }
        Commands::Init => {
            let root = resolve_root_dir();
            cmd_init(root.clone()).await?;
            println!("Initialized waypoint layout at {}", root.display());
            Ok(())
        }
    }
}

async fn run(root: PathBuf, args: RunArgs) -> anyhow::Result<()> {
    let log_config = LogConfig::new(
        LogLevel::parse(&args.log_level),
        None,
        args.otel_endpoint.clone(),
    );
    let _logger = init_tracing(root.clone(), &log_config)?;

    info!("waypoint runtime starting up…");

    if !root.exists() {
        bail!(
            "Root directory `{}` does not exist. Please run `waypoint init` first.",
            root.display()
        );
    }

    let env_file = root.join("config").join(".env");
    let config = ConfigStore(EnvConfigStore::new(env_file));

    let mut app = App::new();
    app.bootstrap(&config, Arc::new(TracingSurface::new()))
        .await?;

    if let Some(seconds) = args.demo_trigger_after {
        if let Some(bridge) = app.bridge() {
            tokio::spawn(async move {
                sleep(Duration::from_secs(seconds)).await;
                info!("demo: publishing a distance tracking trigger");
                bridge.publish_trigger(Some("distance"));
            });
        }
    }

    println!("waypoint running; press Ctrl-C to exit");
    tokio::signal::ctrl_c().await?;

    println!("\nShutting down…");
    app.shutdown().await;
    Ok(())
}
