//! Remote price source port.

use crate::domain::error::PriceGateError;
use crate::domain::payload::RawPayload;

pub trait PriceSource {
    /// Fetches whatever the upstream currently publishes for the near-term
    /// horizon. Network failures and timeouts surface as `Fetch` errors.
    fn fetch(&self) -> Result<RawPayload, PriceGateError>;
}
