//! Data product connector.
//!
//! Translates broker requests into calls against backend data sources and
//! returns the results as a signing-ready JSON envelope. A request is matched to
//! a data product [`registry::Config`] and its [`registry::Template`], the
//! template is resolved with the request parameters, dispatched to a protocol
//! adapter, and the raw responses are normalized into measurement items.

pub mod connector;
pub mod constants;
pub mod error;
pub mod helpers;
pub mod plugins;
pub mod protocols;
pub mod registry;
pub mod settings;

pub use connector::{BrokerRequest, Composed, Connector};
pub use error::{ConnectorError, ErrorEnvelope};
pub use settings::Settings;
