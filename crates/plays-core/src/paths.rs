use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Layout constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "plays.yaml";
pub const RECORDS_FILE: &str = "records.yaml";
pub const PLAYBOOKS_DIR: &str = "playbooks";

/// File stem prefix for stored playbooks: `playbook_<id>.<ext>`.
pub const PLAYBOOK_PREFIX: &str = "playbook_";

/// File stem prefix for transient syntax-check files.
pub const SCRATCH_PREFIX: &str = "_validate";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn records_path(root: &Path) -> PathBuf {
    root.join(RECORDS_FILE)
}

pub fn playbooks_dir(root: &Path) -> PathBuf {
    root.join(PLAYBOOKS_DIR)
}

/// Only the numeric id flows into the file name, so a playbook can never
/// resolve outside the playbook directory.
pub fn playbook_file_name(id: u64, extension: &str) -> String {
    format!("{PLAYBOOK_PREFIX}{id}.{extension}")
}

pub fn inventory_path(root: &Path, file_name: &str) -> PathBuf {
    root.join(file_name)
}

/// Inventory file names come from configuration; reject anything that could
/// escape the root.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

/// Playbook extensions must be a bare alphanumeric suffix like `yml`.
pub fn is_valid_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= 16 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
