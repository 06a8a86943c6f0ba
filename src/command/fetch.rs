use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::argsets::FetchArgs;
use data_connector::registry::{loader, RegistryHandle};
use data_connector::{Connector, ErrorEnvelope, Settings};

fn read_request(path: &Path) -> Result<Value> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&text)?)
}

/// Runs one broker request and prints the output envelope. Pipeline errors are
/// printed as an error envelope and fail the command.
pub async fn fetch(args: FetchArgs) -> Result<()> {
    let body = read_request(&args.request)?;
    let settings = Settings::from_env();
    let registry = loader::load(&settings)?;
    log::info!(
        "Loaded {} configs and {} templates from {}",
        registry.config_count(),
        registry.template_count(),
        settings.config_dir.display()
    );

    let connector = Connector::new(
        Arc::new(RegistryHandle::new(registry)),
        settings.request_timeout,
    );
    match connector.get_data(body.into()).await {
        Ok(composed) => {
            println!("{}", serde_json::to_string_pretty(&composed)?);
            Ok(())
        }
        Err(err) => {
            println!("{}", serde_json::to_string_pretty(&ErrorEnvelope::from(&err))?);
            Err(anyhow!("Request failed with status {}", err.http_status_code()))
        }
    }
}
