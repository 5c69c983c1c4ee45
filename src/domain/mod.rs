//! Core domain types and logic.

pub mod config_validation;
pub mod daylight;
pub mod decision;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod price;
pub mod repository;
pub mod settings;
pub mod storage_key;
