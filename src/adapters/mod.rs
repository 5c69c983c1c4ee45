//! Concrete implementations of the port traits.

pub mod command_actuator;
pub mod dry_run_actuator;
pub mod file_config_adapter;
#[cfg(feature = "http")]
pub mod http_price_source;
pub mod local_blob_store;
pub mod log_notifier;
#[cfg(feature = "http")]
pub mod object_blob_store;
#[cfg(feature = "http")]
pub mod telegram_notifier;
