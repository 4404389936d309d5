//! Plugin server on a Unix socket.

pub mod handlers;

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use mkfsvol::VolumeDriver;
use mkfsvol_shared::constants::plugin as const_plugin;
use nix::unistd::{Group, chown};
use tokio::net::UnixListener;
use tokio::signal::unix::{SignalKind, signal};

pub use handlers::router;

/// Serves the volume plugin protocol for one driver.
pub struct PluginServer {
    driver: Arc<VolumeDriver>,
    socket_path: PathBuf,
    socket_group: String,
}

impl PluginServer {
    pub fn new(driver: Arc<VolumeDriver>, socket_path: PathBuf, socket_group: String) -> Self {
        Self {
            driver,
            socket_path,
            socket_group,
        }
    }

    /// Serve until SIGINT or SIGTERM, then remove the socket file.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = bind(&self.socket_path, &self.socket_group)?;
        tracing::info!(
            plugin = const_plugin::NAME,
            socket = %self.socket_path.display(),
            "Listening on unix://{}",
            self.socket_path.display()
        );

        let result = axum::serve(listener, router(self.driver))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("plugin server failed");

        if let Err(e) = fs::remove_file(&self.socket_path) {
            tracing::warn!(
                socket = %self.socket_path.display(),
                error = %e,
                "Failed to remove plugin socket"
            );
        }
        tracing::info!("Plugin server stopped");

        result
    }
}

/// Bind the plugin socket, replacing a stale one, and hand it to `group`.
pub fn bind(socket_path: &Path, group: &str) -> anyhow::Result<UnixListener> {
    if socket_path.exists() {
        fs::remove_file(socket_path).with_context(|| {
            format!("failed to remove stale socket {}", socket_path.display())
        })?;
    }

    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    tracing::debug!(socket = %socket_path.display(), "Binding plugin socket");
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind {}", socket_path.display()))?;

    let gid = Group::from_name(group)
        .with_context(|| format!("failed to look up group {group}"))?
        .with_context(|| format!("group {group} does not exist"))?
        .gid;
    chown(socket_path, None, Some(gid))
        .with_context(|| format!("failed to chown {} to group {group}", socket_path.display()))?;
    fs::set_permissions(
        socket_path,
        fs::Permissions::from_mode(const_plugin::SOCKET_MODE),
    )
    .with_context(|| format!("failed to set permissions on {}", socket_path.display()))?;

    Ok(listener)
}

async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for SIGINT");
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate.recv() => tracing::info!("Received SIGTERM, shutting down"),
    }
}
