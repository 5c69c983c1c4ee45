//! Object-storage blob store over plain HTTP:
//! `PUT | GET | HEAD {endpoint}/{bucket}/{key}` with an optional bearer token.

use crate::domain::error::PriceGateError;
use crate::ports::blob_store::BlobStore;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, warn};

pub struct ObjectBlobStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl ObjectBlobStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, PriceGateError> {
        let bucket = bucket.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PriceGateError::Storage {
                key: bucket.clone(),
                reason: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket,
            token,
        })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl BlobStore for ObjectBlobStore {
    fn write_binary(&self, key: &str, bytes: &[u8]) -> bool {
        let request = self
            .client
            .put(self.url(key))
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec());
        match self.authorize(request).send() {
            Ok(resp) if resp.status().is_success() => {
                debug!(key, bytes = bytes.len(), "object written");
                true
            }
            Ok(resp) => {
                warn!(key, status = %resp.status(), "object write rejected");
                false
            }
            Err(e) => {
                warn!(key, error = %e, "object write failed");
                false
            }
        }
    }

    fn read_binary(&self, key: &str) -> Option<Vec<u8>> {
        let resp = match self.authorize(self.client.get(self.url(key))).send() {
            Ok(resp) => resp,
            Err(e) => {
                warn!(key, error = %e, "object read failed");
                return None;
            }
        };

        match resp.status() {
            StatusCode::NOT_FOUND => None,
            status if status.is_success() => match resp.bytes() {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(e) => {
                    warn!(key, error = %e, "object body could not be read");
                    None
                }
            },
            status => {
                warn!(key, %status, "object read rejected");
                None
            }
        }
    }

    fn exists(&self, key: &str) -> bool {
        match self.authorize(self.client.head(self.url(key))).send() {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => false,
            Ok(resp) => {
                warn!(key, status = %resp.status(), "object probe rejected");
                false
            }
            Err(e) => {
                warn!(key, error = %e, "object probe failed");
                false
            }
        }
    }
}
