//! Actuator port: applies an operating setting to the controlled device.

use crate::domain::decision::Setting;
use crate::domain::error::PriceGateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Changed,
    AlreadyApplied,
}

pub trait Actuator {
    fn apply(&self, setting: &Setting) -> Result<ApplyOutcome, PriceGateError>;
}
