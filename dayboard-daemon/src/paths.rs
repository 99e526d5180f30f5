use std::path::{Path, PathBuf};

pub use dayboard_core::store::board_root;

pub const DAEMON_SOCKET: &str = "dayboard.sock";

pub fn socket_path(home: &Path) -> PathBuf {
    board_root(home).join(DAEMON_SOCKET)
}
