use std::path::{Path, PathBuf};

pub use chestkeeper_core::config::config_dir_at as chestkeeper_root;

pub const DAEMON_SOCKET: &str = "chestkeeper.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    chestkeeper_root(home).join(DAEMON_SOCKET)
}
