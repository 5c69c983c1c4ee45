//! Filesystem blob store: each key is a path below a root directory.

use crate::ports::blob_store::BlobStore;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl BlobStore for LocalBlobStore {
    fn write_binary(&self, key: &str, bytes: &[u8]) -> bool {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(key, dir = %parent.display(), error = %e, "cannot create directory");
                return false;
            }
        }

        // write-then-rename so readers never see a partial document
        let tmp = path.with_extension("tmp");
        let result = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, &path));
        match result {
            Ok(()) => {
                debug!(key, bytes = bytes.len(), "blob written");
                true
            }
            Err(e) => {
                warn!(key, path = %path.display(), error = %e, "blob write failed");
                let _ = fs::remove_file(&tmp);
                false
            }
        }
    }

    fn read_binary(&self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "blob read failed");
                None
            }
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }
}
