use crate::domain::decision::Setting;
use crate::domain::error::PriceGateError;
use crate::ports::actuator::{Actuator, ApplyOutcome};
use tracing::info;

/// Logs the setting it would apply and reports it as changed.
pub struct DryRunActuator;

impl Actuator for DryRunActuator {
    fn apply(&self, setting: &Setting) -> Result<ApplyOutcome, PriceGateError> {
        info!(%setting, "dry run, not applying");
        Ok(ApplyOutcome::Changed)
    }
}
