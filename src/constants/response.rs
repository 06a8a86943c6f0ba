//! Output envelope and measurement key names.

pub const CONTEXT: &str = "@context";
pub const CONTEXT_VALUE: &str =
    "https://standards.oftrust.net/v2/Context/DataProductOutput/Sensor/";
pub const OBJECT: &str = "data";
pub const ARRAY: &str = "sensors";

pub const ID: &str = "id";
pub const DATA: &str = "measurements";
pub const TYPE: &str = "@type";
pub const TIMESTAMP: &str = "timestamp";
pub const VALUE: &str = "value";
