//! Plugins shipped with the connector.

mod basic;
mod filter_by_id;
mod millis;

use super::Plugin;

pub use basic::BasicAuth;
pub use filter_by_id::FilterById;
pub use millis::Millis;

pub fn all() -> Vec<Plugin> {
    vec![
        Plugin::new(basic::NAME).with_request(BasicAuth),
        Plugin::new(filter_by_id::NAME).with_response(FilterById),
        Plugin::new(millis::NAME).with_request(Millis),
    ]
}
