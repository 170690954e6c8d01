use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use pastepage::config::{read_config, Config};
use pastepage::logger::default_log_location;

use crate::CFG_FILE_NAME;

fn find_config_path() -> Option<PathBuf> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.to_path_buf()));

    [exe_dir, env::current_dir().ok(), dirs::config_dir()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(CFG_FILE_NAME))
        .find(|path| path.exists())
}

/// Reads the config file if there is one, then applies the environment on
/// top of it. Only an explicit `cfg_path` has to exist.
pub(crate) fn open_config(cfg_path: Option<PathBuf>) -> Result<Config> {
    let mut config = match cfg_path.or_else(find_config_path) {
        Some(path) => {
            println!("Reading config from {}", path.display());
            read_config(&path)?
        }
        None => {
            println!("No {} found. Using defaults", CFG_FILE_NAME);
            Config::default()
        }
    };

    config.apply_env().context("Error reading environment")?;

    if let Some(ref mut log) = config.log {
        let location = log.location.get_or_insert_with(default_log_location);
        println!("Log enabled. Files will be written in {}", location.display());
    } else {
        println!("Log disabled. Using stdout");
    }

    Ok(config)
}
