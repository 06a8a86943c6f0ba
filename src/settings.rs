use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{defaults, envvars};

/// Process settings read once from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub config_dir: PathBuf,
    pub docs_db: PathBuf,
    /// Base64 JSON map of templates, replacing the templates directory.
    pub templates_env: Option<String>,
    /// Base64 JSON map of configs, replacing the config directory.
    pub configs_env: Option<String>,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let config_dir = PathBuf::from(defaults::CONFIG_DIR);
        Settings {
            docs_db: config_dir.join("docs.db"),
            config_dir,
            templates_env: None,
            configs_env: None,
            request_timeout: defaults::REQUEST_TIMEOUT,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

impl Settings {
    pub fn from_env() -> Self {
        let config_dir = non_empty_var(envvars::CONFIG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(defaults::CONFIG_DIR));
        let docs_db = non_empty_var(envvars::DOCS_DB)
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join("docs.db"));
        let request_timeout = match non_empty_var(envvars::REQUEST_TIMEOUT) {
            Some(secs) => match secs.parse::<u64>() {
                Ok(secs) => Duration::from_secs(secs),
                Err(_) => {
                    log::warn!(
                        "Invalid {}={secs}; using {}s",
                        envvars::REQUEST_TIMEOUT,
                        defaults::REQUEST_TIMEOUT.as_secs()
                    );
                    defaults::REQUEST_TIMEOUT
                }
            },
            None => defaults::REQUEST_TIMEOUT,
        };

        Settings {
            config_dir,
            docs_db,
            templates_env: non_empty_var(envvars::TEMPLATES),
            configs_env: non_empty_var(envvars::CONFIGS),
            request_timeout,
        }
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.config_dir.join(defaults::TEMPLATES_SUBDIR)
    }
}
