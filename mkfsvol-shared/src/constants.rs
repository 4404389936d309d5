//! Shared constants between the driver and the plugin server.

/// Plugin socket and protocol constants
pub mod plugin {
    /// Plugin name announced to the container runtime.
    ///
    /// The runtime discovers the plugin by the socket file name, so this must
    /// match the stem of [`DEFAULT_SOCKET_PATH`].
    pub const NAME: &str = "mkfs";

    /// Default Unix socket the plugin listens on
    pub const DEFAULT_SOCKET_PATH: &str = "/run/docker/plugins/mkfs.sock";

    /// Group that owns the socket by default
    pub const DEFAULT_SOCKET_GROUP: &str = "root";

    /// Socket file permissions (owner and group read/write)
    pub const SOCKET_MODE: u32 = 0o660;

    /// Content type for every plugin response
    pub const CONTENT_TYPE: &str = "application/vnd.docker.plugins.v1.1+json";

    /// Subsystem implemented by this plugin (reported on activation)
    pub const IMPLEMENTS: &str = "VolumeDriver";
}

/// Volume layout constants
pub mod volume {
    /// Default directory under which volumes are mounted
    pub const DEFAULT_MOUNT_DIR: &str = "/mnt";

    /// Default filesystem kind when a create request does not name one
    pub const DEFAULT_FILESYSTEM: &str = "ext4";

    /// Create option key that selects the filesystem kind
    pub const FS_OPTION: &str = "fs";

    /// Mount-point directory permissions (owner only)
    pub const MOUNT_DIR_MODE: u32 = 0o700;

    /// Volume scope reported by capabilities
    pub const SCOPE: &str = "local";
}
