use anyhow::Context;
use pds_relay::{resolve_config, Consumption, LogLevel, Relay, RelayConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_logging(level: LogLevel) {
    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,pds_relay={}", level.as_str())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shut down");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env().context("reading configuration")?;
    let config = resolve_config(config).context("validating configuration")?;
    init_logging(config.log_level);

    tracing::info!(
        queue = %config.broker.queue,
        chains = ?config.upstream.chains.chain_ids(),
        ethereum_api = %config.upstream.ethereum_api,
        "starting relay"
    );

    let relay = Relay::connect(&config)
        .await
        .context("Cannot connect to RabbitMQ server")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    loop {
        match relay.subscribe(shutdown.clone()).await? {
            Consumption::Shutdown => break,
            Consumption::Cancelled => {
                tokio::select! {
                    _ = tokio::time::sleep(config.poll_interval) => {
                        tracing::info!("subscribing again");
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        }
    }

    relay.close().await?;
    Ok(())
}
