use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const LOG_LEVEL: &str = "INFO";
pub const CONFIG_DIR: &str = "./config";
pub const TEMPLATES_SUBDIR: &str = "templates";

/// Range assumed for requests without an explicit start.
pub const TIME_RANGE_HOURS: i64 = 48;

pub const PRODUCT_CODE: &str = "default";
