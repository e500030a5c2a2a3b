//! SceneBridge - A Command Execution Bridge for Single-Threaded Hosts
//!
//! This is the main entry point for the SceneBridge server.
//! It builds the demo scene, starts its owner thread and serves clients until
//! Ctrl+C.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use scenebridge::commands::{FeatureFlags, Router, SharedFlags};
use scenebridge::scene::{
    self, ApiKey, Hyper3dMode, Integrations, Scene, DEFAULT_SCENE_NAME, HYPER3D_FLAG,
    POLYHAVEN_FLAG,
};
use scenebridge::scheduler::Scheduler;
use scenebridge::server::{Server, ServerConfig};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Which backend the generative model commands use
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    MainSite,
    FalAi,
}

impl From<Mode> for Hyper3dMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::MainSite => Hyper3dMode::MainSite,
            Mode::FalAi => Hyper3dMode::FalAi,
        }
    }
}

/// Server configuration
#[derive(Debug, Parser)]
#[command(name = "scenebridge", version, about = "Command execution bridge for a single-threaded scene host")]
struct Config {
    /// Host to bind to
    #[arg(long, default_value = scenebridge::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = scenebridge::DEFAULT_PORT)]
    port: u16,

    /// Enable the PolyHaven asset commands
    #[arg(long)]
    polyhaven: bool,

    /// Enable the Hyper3D Rodin model generation commands
    #[arg(long)]
    hyper3d: bool,

    /// Hyper3D backend
    #[arg(long, value_enum, default_value_t = Mode::MainSite)]
    hyper3d_mode: Mode,

    /// Hyper3D API key, or "free-trial" for the shared trial key
    #[arg(long, env = "SCENEBRIDGE_HYPER3D_API_KEY", hide_env_values = true)]
    hyper3d_api_key: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// How long shutdown waits for open connections, in milliseconds
    #[arg(long, default_value_t = 1000)]
    join_timeout_ms: u64,

    /// Largest incomplete request a connection will buffer, in bytes
    #[arg(long, default_value_t = scenebridge::protocol::MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

impl Config {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            join_timeout: Duration::from_millis(self.join_timeout_ms),
            max_frame_size: self.max_frame_size,
        }
    }

    fn feature_flags(&self) -> FeatureFlags {
        let mut flags = FeatureFlags::new();
        flags.set(POLYHAVEN_FLAG, self.polyhaven);
        flags.set(HYPER3D_FLAG, self.hyper3d);
        flags
    }
}

fn print_banner(config: &Config) {
    println!(
        r#"
SceneBridge v{} - Command Execution Bridge
──────────────────────────────────────────────────────────────
Listening on {}
Send {{"type": "get_scene_info", "params": {{}}}} to get started.

Use Ctrl+C to shutdown gracefully.
"#,
        scenebridge::VERSION,
        config.server_config().bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::parse();

    // Set up logging; RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Flags are shared so the host could toggle them while running
    let flags = SharedFlags::new(config.feature_flags());
    let mut integrations = Integrations::new(Arc::new(flags.clone()));
    integrations.hyper3d_mode = config.hyper3d_mode.into();
    integrations.hyper3d_key = config.hyper3d_api_key.as_deref().and_then(ApiKey::parse);

    let scene = Scene::new(DEFAULT_SCENE_NAME, integrations);
    let router = Router::new(scene::command_registry(), Arc::new(flags));

    // The scene now belongs to the owner thread
    let (scheduler, handle) = Scheduler::new(scene, router);
    let worker = scheduler.spawn().context("failed to start owner thread")?;

    let mut server = Server::new(config.server_config(), handle);
    server.start().await.context("failed to start server")?;
    print_banner(&config);

    signal::ctrl_c()
        .await
        .context("failed to install Ctrl+C handler")?;
    info!("Shutdown signal received, stopping server...");

    server.stop().await;
    let stats = Arc::clone(server.stats());
    drop(server);

    // Every handle is gone; the owner thread drains what is left and exits
    let scene = tokio::task::spawn_blocking(move || worker.join())
        .await
        .context("owner thread join failed")??;

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        objects = scene.objects().len(),
        "Server shutdown complete"
    );
    Ok(())
}
