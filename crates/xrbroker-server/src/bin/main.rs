use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use xrbroker_core::collaborators::mock::{
    MockCompositorFactory, MockDevice, MockSpaceOverseer, MockSystemCompositor,
};
use xrbroker_core::collaborators::Device;
use xrbroker_core::devices::DeviceRegistry;
use xrbroker_core::ShmRegion;
use xrbroker_server::config::ServerConfig;
use xrbroker_server::mainloop::{Broker, UnixMainloopTransport};
use xrbroker_util::{scope_err, tokio_read_file_anyhow, MultiError};

// === Clap === //

#[derive(Debug, Clone, Parser)]
#[command(about = "session/resource broker between XR clients and the compositor", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommand {
    /// Bind the broker socket and accept client connections.
    Serve(CliServeCommand),
}

#[derive(Debug, Clone, Args)]
struct CliServeCommand {
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Overrides `socket_path` from the config file.
    #[arg(short = 's', long = "socket")]
    socket: Option<String>,
}

// === Config file wrapper === //

#[derive(Debug, Clone, Deserialize)]
struct ConfRoot {
    #[serde(flatten)]
    server: ServerConfig,
}

// === Driver === //

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("INFO"));

    let cmd = CliArgs::parse();
    match &cmd.command {
        CliCommand::Serve(sub) => do_serve_command(sub).await?,
    }
    Ok(())
}

async fn do_serve_command(sub: &CliServeCommand) -> anyhow::Result<()> {
    let mut config = match &sub.config {
        Some(path) => {
            let raw = tokio_read_file_anyhow("config file", path).await?;
            let raw = String::from_utf8(raw).context("server config is invalid UTF-8")?;
            toml::from_str::<ConfRoot>(&raw)?.server
        }
        None => ServerConfig::default(),
    };
    if let Some(socket) = &sub.socket {
        config.socket_path = socket.clone();
    }

    for mismatch in config.limits.mismatches_compiled_limits() {
        log::warn!("configured limit ignored: {mismatch}");
    }

    let mut errors = MultiError::new("broker startup");

    let shm = errors.maybe_report(scope_err(|| {
        ShmRegion::create().context("failed to create shared-memory region")
    }));
    let transport = errors.maybe_report(scope_err(|| {
        UnixMainloopTransport::bind(&config.socket_path)
            .context("failed to bind broker socket")
    }));
    errors.finish()?;

    let shm = shm.unwrap();
    let transport = transport.unwrap();

    // The compositor, device, and space-overseer backends are external
    // integration points the core only consumes (spec §1, §6.4); this
    // binary wires up the broker's own in-memory stand-ins so the broker
    // runs standalone. A real deployment supplies its own implementations
    // of `Compositor`/`CompositorFactory`/`SpaceOverseer`/`Device` and
    // passes them to `Broker::new` instead.
    let system_compositor: Arc<dyn xrbroker_core::collaborators::SystemCompositor> =
        Arc::new(MockSystemCompositor::default());
    let overseer: Arc<dyn xrbroker_core::collaborators::SpaceOverseer> =
        Arc::new(MockSpaceOverseer::new());
    let compositor_factory: Arc<dyn xrbroker_core::collaborators::CompositorFactory> =
        Arc::new(MockCompositorFactory);
    let devices = DeviceRegistry::new(vec![
        Box::new(MockDevice::new("hmd")) as Box<dyn Device>,
        Box::new(MockDevice::new("left_controller")) as Box<dyn Device>,
        Box::new(MockDevice::new("right_controller")) as Box<dyn Device>,
    ]);

    let broker = Broker::new(system_compositor, overseer, devices, compositor_factory, shm);

    log::info!("xrbroker-server ready on {}", config.socket_path);
    tokio::task::spawn_blocking(move || xrbroker_server::mainloop::run(transport, broker))
        .await
        .context("mainloop task panicked")??;

    Ok(())
}
