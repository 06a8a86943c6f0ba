use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConnectorError;
use crate::registry::Config;

/// Injects secrets (basic auth, OAuth2 or API keys) into `config.static`.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn attach(
        &self,
        config: &Config,
        product_code: &str,
        auth: Option<&Value>,
    ) -> Result<Config, ConnectorError>;
}

/// Runs the provider, keeping the original config when it fails.
pub async fn attach_or_keep(
    provider: &dyn CredentialsProvider,
    config: Config,
    product_code: &str,
    auth: Option<&Value>,
) -> Config {
    match provider.attach(&config, product_code, auth).await {
        Ok(augmented) => augmented,
        Err(err) => {
            log::warn!("{product_code}: Credentials not attached: {err}");
            config
        }
    }
}
