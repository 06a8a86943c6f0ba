pub mod defaults;
pub mod envvars;
pub mod request;
pub mod response;
