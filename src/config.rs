use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::Deserialize;

use crate::auth::Credentials;

pub const USERNAME_ENV: &str = "PNG_USERNAME";
pub const PASSWORD_ENV: &str = "PNG_PASSWORD";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error opening configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Error parsing configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Paths {
    pub storage_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Paths { storage_dir: PathBuf::from("public") }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Server {
    pub address: String,
    pub port: u16,
    /// Largest request body accepted, uploads included.
    pub max_upload_bytes: usize,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            address: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Auth {
    pub username: String,
    pub password: String,
    /// Keep session keys here so logins survive a restart. Unset means
    /// fresh keys on every start.
    pub session_key_file: Option<PathBuf>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
pub struct Store {
    /// Remove pages left half-written by a crash when starting up.
    pub prune_incomplete: bool,
}

#[derive(Deserialize, Debug)]
pub struct Log {
    pub level: LogLevel,
    pub log_to_console: bool,
    pub location: Option<PathBuf>,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum LogLevel {
    Critical = 0,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub paths: Paths,
    pub auth: Auth,
    pub store: Store,
    pub log: Option<Log>,
}

impl Config {
    /// Overrides credentials and port from `PNG_USERNAME`, `PNG_PASSWORD`
    /// and `PORT`. Empty variables count as unset.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| env::var(name).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.is_empty());

        if let Some(username) = lookup(USERNAME_ENV) {
            self.auth.username = username;
        }
        if let Some(password) = lookup(PASSWORD_ENV) {
            self.auth.password = password;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.port = match port.parse() {
                Ok(port) => port,
                Err(_) => return Err(ConfigError::InvalidEnv { name: PORT_ENV, value: port }),
            };
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.auth.username.as_str(), self.auth.password.as_str())
    }
}

fn parse_path(path: PathBuf) -> PathBuf {
    let Ok(relative) = path.strip_prefix("${exe_dir}").map(Path::to_path_buf) else {
        return path;
    };
    match env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        Some(exe_dir) => exe_dir.join(relative),
        None => path,
    }
}

pub fn parse_config(cfg_content: &str) -> Result<Config, ConfigError> {
    let mut cfg: Config = toml::from_str(cfg_content)?;

    cfg.paths.storage_dir = parse_path(cfg.paths.storage_dir);
    cfg.auth.session_key_file = cfg.auth.session_key_file.map(parse_path);
    if let Some(ref mut log) = cfg.log {
        log.location = log.location.take().map(parse_path);
    }

    Ok(cfg)
}

pub fn read_config(cfg_path: &Path) -> Result<Config, ConfigError> {
    let cfg_content = fs::read_to_string(cfg_path).map_err(|source| ConfigError::Read {
        path: cfg_path.to_path_buf(),
        source,
    })?;
    parse_config(&cfg_content)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.server.address, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.paths.storage_dir, PathBuf::from("public"));
        assert!(cfg.auth.username.is_empty());
        assert!(cfg.auth.password.is_empty());
        assert!(cfg.auth.session_key_file.is_none());
        assert!(!cfg.store.prune_incomplete);
        assert!(cfg.log.is_none());
        assert!(!cfg.credentials().is_enabled());
    }

    #[test]
    fn test_full_config() {
        let cfg = parse_config(r#"
[server]
address = "127.0.0.1"
port = 9000

[paths]
storage_dir = "/srv/pages"

[auth]
username = "admin"
password = "secret"
session_key_file = "/var/lib/pastepage/session.key"

[store]
prune_incomplete = true

[log]
level = "Debug"
log_to_console = true
"#).unwrap();
        assert_eq!(cfg.server.address, "127.0.0.1");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.paths.storage_dir, PathBuf::from("/srv/pages"));
        assert!(cfg.credentials().is_enabled());
        assert_eq!(cfg.auth.session_key_file, Some(PathBuf::from("/var/lib/pastepage/session.key")));
        assert!(cfg.store.prune_incomplete);
        let log = cfg.log.unwrap();
        assert_eq!(log.level, LogLevel::Debug);
        assert!(log.log_to_console);
        assert!(log.location.is_none());
    }

    #[test]
    fn test_exe_dir_expansion() {
        let cfg = parse_config("[paths]\nstorage_dir = \"${exe_dir}/public\"").unwrap();
        let exe_dir = env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert_eq!(cfg.paths.storage_dir, exe_dir.join("public"));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(parse_config("[server]\nport = \"x\""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = read_config(Path::new("/definitely/not/here.toml")).err().unwrap();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_from(env_of(&[
            (USERNAME_ENV, "admin"),
            (PASSWORD_ENV, "secret"),
            (PORT_ENV, "3000"),
        ])).unwrap();
        assert_eq!(cfg.auth.username, "admin");
        assert_eq!(cfg.auth.password, "secret");
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn test_empty_env_is_unset() {
        let mut cfg = parse_config("[auth]\nusername = \"admin\"\npassword = \"secret\"").unwrap();
        cfg.apply_env_from(env_of(&[(USERNAME_ENV, ""), (PORT_ENV, "")])).unwrap();
        assert_eq!(cfg.auth.username, "admin");
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn test_bad_port_env() {
        let mut cfg = Config::default();
        let err = cfg.apply_env_from(env_of(&[(PORT_ENV, "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "PORT", .. }));
    }
}
