//! Volkeep - Volume Lifecycle Manager
//!
//! Loads the configuration directory, logs in and reconciles cluster
//! volumes until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use volkeep_auth::KinitAuthProvider;
use volkeep_cluster::{HadoopCli, RestClientConfig, RestClusterClient};
use volkeep_config::{ConfigStore, DirConfigStore, SystemDirectory};
use volkeep_control::{Collaborators, ControlLoop};

const DEFAULT_CONFIG_DIR: &str = "/opt/volkeep/conf";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,volkeep=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting volkeep");

    let config_dir = std::env::var("VOLKEEP_CONFIG_DIR")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR), PathBuf::from);

    let store = Arc::new(DirConfigStore::new(
        &config_dir,
        Arc::new(SystemDirectory::new()),
    ));

    let loaded_at = SystemTime::now();
    let config = match store.load() {
        Ok(config) => config,
        Err(e) => {
            error!(config_dir = %config_dir.display(), error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        config_dir = %config_dir.display(),
        groups = config.groups.len(),
        endpoints = ?config.manager.endpoints(),
        "Configuration loaded"
    );
    let manager = &config.manager;

    let cluster = match RestClusterClient::new(RestClientConfig {
        alarm_entity: manager.alarm_entity.clone(),
        accept_invalid_certs: manager.tls_accept_invalid_certs,
        user: manager.rest_user.clone(),
        password: manager.rest_password.clone(),
    }) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to create REST client");
            return ExitCode::FAILURE;
        }
    };
    let hadoop = Arc::new(HadoopCli::new(&manager.hadoop_bin));

    let services = Collaborators {
        store,
        cluster,
        fs: hadoop.clone(),
        acl: hadoop,
        auth: Arc::new(KinitAuthProvider::new(manager.ticket_lifetime)),
    };
    let mut control = ControlLoop::new(services, config, loaded_at);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal, stopping after the current cycle");
        let _ = shutdown_tx.send(true);
    });

    control.run(shutdown_rx).await;
    ExitCode::SUCCESS
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            error!(error = %e, "Cannot listen for SIGTERM, only Ctrl-C stops the loop");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
