use std::env;

use crate::constants::envvars;

pub fn load_dotenv() {
    if dotenv::dotenv().is_ok() {
        log::debug!("Loaded local .env")
    }
    // Also load $CONNECTOR_CONFIG_DIR/.env if exists
    if let Ok(config_dir) = env::var(envvars::CONFIG_DIR) {
        let config_dotenv = format!("{config_dir}/.env");
        if dotenv::from_path(&config_dotenv).is_ok() {
            log::debug!("Loaded {config_dotenv}");
        }
    }
}
