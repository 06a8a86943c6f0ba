pub const CONFIG_DIR: &str = "CONNECTOR_CONFIG_DIR";
pub const DOCS_DB: &str = "CONNECTOR_DOCS_DB";
pub const REQUEST_TIMEOUT: &str = "CONNECTOR_REQUEST_TIMEOUT";

pub const TEMPLATES: &str = "TEMPLATES";
pub const CONFIGS: &str = "CONFIGS";

pub const LOG_LEVEL: &str = "LOGGING_LEVEL";
