//! Host platform utility functions

use std::path::PathBuf;

/// Environment variable pointing at the root of the navigation software tree.
pub const NAV_SW_ROOT_VAR: &str = "NAV_SW_ROOT";

/// Get the root directory of the navigation software.
///
/// Uses the `NAV_SW_ROOT` environment variable if set, otherwise the current working directory.
pub fn get_nav_sw_root() -> std::io::Result<PathBuf> {
    match std::env::var_os(NAV_SW_ROOT_VAR) {
        Some(root) => Ok(PathBuf::from(root)),
        None => std::env::current_dir()
    }
}
