use authz::{PageStore, SaveError};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Page store that writes the page text back to its source file
#[derive(Debug, Clone)]
pub struct FilePageStore {
    path: PathBuf,
}

impl FilePageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PageStore for FilePageStore {
    fn save(&self, page: &str, text: &str) -> Result<(), SaveError> {
        debug!("Writing page {} to {:?}", page, self.path);
        // Write to a sibling file first so a failed write never truncates the page
        let staging = self.path.with_extension("acl-tmp");
        fs::write(&staging, text)
            .and_then(|_| fs::rename(&staging, &self.path))
            .map_err(|e| SaveError::new(page, e.to_string()))
    }
}
