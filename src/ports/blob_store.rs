//! Key-value blob storage port.
//!
//! Implementations report failures as `false` / `None` and log the cause; the
//! repository decides what a failure means for the domain operation.

use tracing::warn;

pub trait BlobStore {
    /// Returns `false` if the write did not complete.
    fn write_binary(&self, key: &str, bytes: &[u8]) -> bool;

    /// `None` for a missing key or a failed read, never a panic.
    fn read_binary(&self, key: &str) -> Option<Vec<u8>>;

    fn exists(&self, key: &str) -> bool;

    fn write_text(&self, key: &str, text: &str) -> bool {
        self.write_binary(key, text.as_bytes())
    }

    fn read_text(&self, key: &str) -> Option<String> {
        let bytes = self.read_binary(key)?;
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(key, error = %e, "stored blob is not valid UTF-8");
                None
            }
        }
    }
}
