//! Configuration file location
//!
//! - **Development**: `config.yaml` in the current working directory, when present.
//! - **Installed** (default): `<config dir>/pamidicontrol/config.yaml`, i.e.
//!   `~/.config/pamidicontrol/config.yaml` on Linux.

use std::path::{Path, PathBuf};

/// Directory name under the user config directory
const APP_DIR: &str = "pamidicontrol";

/// Config file name
const CONFIG_FILE: &str = "config.yaml";

/// Resolve the config file to use when `--config` is not given
pub fn default_config_path() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_config_path(&cwd, dirs::config_dir().as_deref())
}

fn resolve_config_path(cwd: &Path, config_dir: Option<&Path>) -> PathBuf {
    let local = cwd.join(CONFIG_FILE);
    if local.exists() {
        return local;
    }

    match config_dir {
        Some(dir) => dir.join(APP_DIR).join(CONFIG_FILE),
        None => local,
    }
}
