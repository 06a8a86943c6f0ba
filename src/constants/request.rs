//! Broker request body paths.

pub const PRODUCT_CODE: &str = "productCode";
pub const TIMESTAMP: &str = "timestamp";
pub const PARAMETERS: &str = "parameters";
pub const IDS: &str = "parameters.ids";
pub const TARGET_OBJECT: &str = "parameters.targetObject";
pub const START: &str = "parameters.startTime";
pub const END: &str = "parameters.endTime";
pub const DATA_TYPES: &str = "parameters.dataTypes";
pub const PERIOD: &str = "period";

pub const MISSING_FIELD: &str = "Missing data for required field.";

/// Always required, checked before config lookup.
pub const GLOBAL_REQUIRED: &[&str] = &[PRODUCT_CODE, TIMESTAMP, PARAMETERS];
