//! Port traits: the boundaries between the domain and the outside world.

pub mod actuator;
pub mod blob_store;
pub mod config_port;
pub mod notifier;
pub mod price_source;
