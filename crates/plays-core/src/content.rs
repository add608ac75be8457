//! On-disk home of playbook text and the shared inventory.
//!
//! ```text
//! <root>/
//!   inventory.ini              shared execution targets, created once
//!   playbooks/
//!     playbook_<id>.yml        one file per playbook
//!     _validate*.yml           transient syntax-check files
//! ```

use crate::config::Config;
use crate::error::{PlaysError, Result};
use crate::io;
use crate::paths;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone)]
pub struct ContentStore {
    playbooks_dir: PathBuf,
    inventory_path: PathBuf,
    extension: String,
    inventory_default: String,
}

impl ContentStore {
    pub fn new(root: &Path, config: &Config) -> Result<Self> {
        if !paths::is_plain_file_name(&config.inventory.file) {
            return Err(PlaysError::InvalidConfig(format!(
                "inventory file '{}' must be a plain file name",
                config.inventory.file
            )));
        }
        if !paths::is_valid_extension(&config.playbooks.extension) {
            return Err(PlaysError::InvalidConfig(format!(
                "playbook extension '{}' must be alphanumeric",
                config.playbooks.extension
            )));
        }
        Ok(Self {
            playbooks_dir: paths::playbooks_dir(root),
            inventory_path: paths::inventory_path(root, &config.inventory.file),
            extension: config.playbooks.extension.clone(),
            inventory_default: config.inventory.default_content.clone(),
        })
    }

    pub fn playbooks_dir(&self) -> &Path {
        &self.playbooks_dir
    }

    pub fn inventory_path(&self) -> &Path {
        &self.inventory_path
    }

    pub fn playbook_path(&self, id: u64) -> PathBuf {
        self.playbooks_dir
            .join(paths::playbook_file_name(id, &self.extension))
    }

    /// Create the playbook directory and the default inventory if missing.
    /// An existing inventory is never touched.
    pub fn ensure_ready(&self) -> Result<()> {
        io::ensure_dir(&self.playbooks_dir)?;
        if io::write_if_missing(&self.inventory_path, self.inventory_default.as_bytes())? {
            tracing::info!(path = %self.inventory_path.display(), "created default inventory");
        }
        Ok(())
    }

    /// Write `content` as the authoritative copy for playbook `id`.
    pub fn save(&self, id: u64, content: &str) -> Result<()> {
        let path = self.playbook_path(id);
        match io::atomic_write(&path, content.as_bytes()) {
            Ok(()) => {
                tracing::info!(playbook_id = id, path = %path.display(), "playbook saved");
                Ok(())
            }
            Err(e) => {
                tracing::error!(playbook_id = id, error = %e, "failed to save playbook");
                Err(e)
            }
        }
    }

    pub fn exists(&self, id: u64) -> bool {
        self.playbook_path(id).is_file()
    }

    pub fn read(&self, id: u64) -> Result<String> {
        let path = self.playbook_path(id);
        std::fs::read_to_string(&path).map_err(|e| PlaysError::filesystem(&path, e))
    }

    /// Delete the stored file for `id`. Returns false if there was none.
    pub fn remove(&self, id: u64) -> Result<bool> {
        io::remove_if_exists(&self.playbook_path(id))
    }

    /// Write `content` to a uniquely named scratch file in the playbook
    /// directory. The file is deleted when the handle is dropped.
    pub fn scratch_file(&self, content: &str) -> Result<NamedTempFile> {
        use std::io::Write;

        io::ensure_dir(&self.playbooks_dir)?;
        let suffix = format!(".{}", self.extension);
        let mut file = tempfile::Builder::new()
            .prefix(paths::SCRATCH_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&self.playbooks_dir)
            .map_err(|e| PlaysError::filesystem(&self.playbooks_dir, e))?;
        let path = file.path().to_path_buf();
        file.write_all(content.as_bytes())
            .map_err(|e| PlaysError::filesystem(&path, e))?;
        file.flush().map_err(|e| PlaysError::filesystem(&path, e))?;
        Ok(file)
    }
}
