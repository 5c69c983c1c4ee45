//! Day-ahead price source fetched over HTTP.

use crate::domain::error::PriceGateError;
use crate::domain::payload::{PayloadFormat, RawPayload};
use crate::ports::price_source::PriceSource;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::info;

const USER_AGENT: &str = concat!("pricegate/", env!("CARGO_PKG_VERSION"));

pub struct HttpPriceSource {
    client: Client,
    url: String,
    format: PayloadFormat,
}

impl HttpPriceSource {
    pub fn new(
        url: impl Into<String>,
        format: PayloadFormat,
        timeout: Duration,
    ) -> Result<Self, PriceGateError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PriceGateError::Fetch {
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            format,
        })
    }
}

impl PriceSource for HttpPriceSource {
    fn fetch(&self) -> Result<RawPayload, PriceGateError> {
        info!(url = %self.url, "fetching prices");

        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| PriceGateError::Fetch {
                reason: format!("request to {} failed: {e}", self.url),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceGateError::Fetch {
                reason: format!("{} returned HTTP {status}", self.url),
            });
        }

        let body = response.text().map_err(|e| PriceGateError::Fetch {
            reason: format!("cannot read response body: {e}"),
        })?;
        info!(bytes = body.len(), "price payload received");
        Ok(RawPayload::new(body, self.format))
    }
}
