use kovri::{ActiveLogConfig, LoggingContext, OptionResolver, Resolution, Sink};
use tokio::signal;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let options = match OptionResolver::default().resolve_default(std::env::args_os())? {
        Resolution::Run(options) => options,
        Resolution::Exit(usage) => {
            println!("{usage}");
            return Ok(());
        }
    };

    let log_config = ActiveLogConfig::from_options(&options)?;
    if log_config.sinks.is_empty() {
        eprintln!("warning: both log-to-console and log-to-file are disabled");
    }
    let logging = LoggingContext::install(log_config)?;
    let log_config = logging.config();

    if let Some(path) = options.config_file() {
        info!("Loaded configuration from {}", path.display());
    }
    if log_config.has_sink(Sink::File) {
        info!("Logging to {}", log_config.file.pattern());
    }
    for (name, option) in options.iter() {
        debug!("{} = {} ({:?})", name, option.value, option.source);
    }
    info!(
        "Router on {}:{}",
        options.string("host")?,
        options.int("port")?
    );

    let tunnels_file = options.tunnels_file()?;
    let tunnels = match kovri::tunnels::load(&tunnels_file) {
        Ok(tunnels) => tunnels,
        Err(e) => {
            error!(fatal = true, "{}", e);
            return Err(e.into());
        }
    };

    for tunnel in &tunnels {
        info!(
            "Tunnel '{}' ({}) on {}:{}",
            tunnel.name,
            tunnel.kind.key(),
            tunnel.address,
            tunnel.port
        );
        match tunnel.destinations() {
            Ok(destinations) => {
                for destination in destinations {
                    debug!("  -> {}", destination);
                }
            }
            Err(e) => warn!("Tunnel '{}': {}", tunnel.name, e),
        }
        if tunnel.acl.is_enabled() {
            debug!(
                "  {:?} of {} entries",
                tunnel.acl.mode,
                tunnel.acl.entries.len()
            );
        }
    }

    info!("Configuration complete. Press Ctrl+C to stop.");
    signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");

    Ok(())
}
