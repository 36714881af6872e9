/*
[INPUT]:  CLI arguments, YAML configuration file, wallet key, OS signals
[OUTPUT]: Authenticated live signal stream logged until shutdown
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or signal handling
*/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gestalt_signal_adapter::{
    AuthManager, ClientConfig, EvmWalletSigner, GestaltClient, SessionStore, WalletSigner,
};
use gestalt_signal_monitor::stream::{ConnectivityProbe, SuspendDetector};
use gestalt_signal_monitor::{MonitorConfig, StreamClient, StreamView, TriggerHub, logging};

#[derive(Parser, Debug)]
#[command(
    name = "gestalt-signal-monitor",
    version,
    about = "Live Gestalt trading signal monitor"
)]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Also write daily-rotated logs into this directory
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,
    /// Validate configuration and exit
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Forget the persisted wallet session and exit
    #[arg(long = "logout")]
    logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let _log_guard = logging::init(&args.log_level, args.log_dir.as_deref())?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting gestalt-signal-monitor"
    );

    let config = MonitorConfig::from_file(&args.config_path).context("load config")?;
    info!(ws_url = %config.server.ws_url, auth_url = %config.server.auth_url, "configuration loaded");

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let client = GestaltClient::with_config_and_base_url(ClientConfig::default(), &config.server.auth_url)
        .context("create auth client")?;
    let sessions = SessionStore::with_file(config.session_path());
    let auth = AuthManager::with_session_store(client, sessions);

    if args.logout {
        auth.logout().context("clear session")?;
        info!("wallet session cleared");
        return Ok(());
    }

    login(&auth, &config).await?;

    let shutdown = CancellationToken::new();
    let hub = TriggerHub::new();
    spawn_trigger_sources(&config, &hub, &shutdown);

    let stream = StreamClient::spawn(
        config.server.ws_url.clone(),
        config.stream.session_config(),
        auth.sessions(),
        &hub,
    );
    let reporter = tokio::spawn(report_views(stream.subscribe()));
    stream.start();

    wait_for_shutdown(&stream).await;
    info!("shutdown signal received");

    stream.stop().await;
    shutdown.cancel();
    reporter.abort();
    info!("stream stopped");
    Ok(())
}

async fn login(auth: &AuthManager, config: &MonitorConfig) -> Result<()> {
    if let Some(session) = auth.restore_session() {
        info!(address = %session.address, expires_at = %session.expires_at, "restored wallet session");
        return Ok(());
    }

    let key = std::env::var(&config.wallet.private_key_env).with_context(|| {
        format!(
            "no valid session and {} is not set",
            config.wallet.private_key_env
        )
    })?;
    let wallet = EvmWalletSigner::new(&key).context("load wallet key")?;

    if let Some(expected) = &config.wallet.address {
        if !expected.eq_ignore_ascii_case(wallet.address()) {
            bail!(
                "wallet key derives {} but config expects {expected}",
                wallet.address()
            );
        }
    }

    info!(address = %wallet.address(), "authenticating wallet");
    auth.authenticate(&wallet).await.context("wallet login")?;
    Ok(())
}

fn spawn_trigger_sources(config: &MonitorConfig, hub: &TriggerHub, shutdown: &CancellationToken) {
    let probe_secs = config.triggers.connectivity_probe_secs;
    if probe_secs > 0 {
        match ConnectivityProbe::for_url(&config.server.ws_url, Duration::from_secs(probe_secs)) {
            Some(probe) => {
                info!(host = %probe.target(), interval_secs = probe_secs, "connectivity probe enabled");
                probe.spawn(hub.clone(), shutdown.clone());
            }
            None => warn!(ws_url = %config.server.ws_url, "connectivity probe disabled: no host"),
        }
    }

    let suspend_secs = config.triggers.suspend_check_secs;
    if suspend_secs > 0 {
        SuspendDetector::new(Duration::from_secs(suspend_secs)).spawn(hub.clone(), shutdown.clone());
    }
}

async fn report_views(mut views: watch::Receiver<StreamView>) {
    let mut last_status = None;
    let mut last_history_len = 0usize;

    while views.changed().await.is_ok() {
        let view = views.borrow_and_update().clone();

        if last_status != Some(view.status) {
            match &view.error {
                Some(error) => warn!(status = %view.status, %error, "stream status"),
                None => info!(status = %view.status, "stream status"),
            }
            last_status = Some(view.status);
        }

        if let Some(snapshot) = &view.snapshot {
            debug!(
                symbol = snapshot.symbol.as_deref().unwrap_or("?"),
                close = ?snapshot.close,
                signal = snapshot.trading_signal.map(|signal| signal.as_str()).unwrap_or("-"),
                "market data"
            );
        }

        if view.history.len() != last_history_len {
            if let Some(latest) = view.history.first() {
                info!(
                    signal = latest.signal.as_str(),
                    symbol = latest.symbol.as_deref().unwrap_or("?"),
                    price = ?latest.price,
                    entries = view.history.len(),
                    "signal history updated"
                );
            }
            last_history_len = view.history.len();
        }
    }
}

/// Resolve on SIGINT or SIGTERM; SIGHUP forces a reconnect.
async fn wait_for_shutdown(stream: &StreamClient) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut terminate, mut hangup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(terminate), Ok(hangup)) => (terminate, hangup),
            (Err(err), _) | (_, Err(err)) => {
                warn!(error = %err, "failed to install unix signal handlers");
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "failed to install SIGINT handler");
                }
                return;
            }
        };

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(err) = result {
                        warn!(error = %err, "failed to install SIGINT handler");
                    }
                    info!("received SIGINT");
                    return;
                }
                _ = terminate.recv() => {
                    info!("received SIGTERM");
                    return;
                }
                _ = hangup.recv() => {
                    info!("received SIGHUP; forcing reconnect");
                    stream.force_reconnect();
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = stream;
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
        }
        info!("received SIGINT");
    }
}
