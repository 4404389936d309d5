//! Command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use mkfsvol::{DriverOptions, catalog};
use mkfsvol_shared::constants::{plugin as const_plugin, volume as const_volume};

/// mkfsvol - volume plugin that formats and mounts partitions from a fixed pool
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Partitions available for volumes, allocated in the order given
    #[arg(value_name = "PARTITION", required = true, num_args = 1..)]
    pub partitions: Vec<PathBuf>,

    /// Directory under which volumes are mounted
    #[arg(short = 'd', long = "dir", default_value = const_volume::DEFAULT_MOUNT_DIR)]
    pub mount_dir: PathBuf,

    #[arg(
        long,
        env = "MKFSVOL_DEFAULT_FS",
        default_value = const_volume::DEFAULT_FILESYSTEM,
        help = default_fs_help()
    )]
    pub default_fs: String,

    /// Unix socket to serve the plugin protocol on
    #[arg(long, default_value = const_plugin::DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,

    /// Group that owns the plugin socket
    #[arg(long, default_value = const_plugin::DEFAULT_SOCKET_GROUP)]
    pub socket_group: String,

    /// Abort a formatting command after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub format_timeout: Option<u64>,

    /// Log filter (e.g. "debug", "mkfsvol=trace"); overrides RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

fn default_fs_help() -> String {
    format!(
        "Filesystem used when a create request does not set the `fs` option ({})",
        catalog::supported_list()
    )
}

impl Cli {
    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions {
            partitions: self.partitions.clone(),
            mount_dir: self.mount_dir.clone(),
            default_filesystem: self.default_fs.clone(),
            format_timeout: self.format_timeout.map(Duration::from_secs),
        }
    }
}
