use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ToolConfig
// ---------------------------------------------------------------------------

/// The external execution tool. `args` are placed before the per-call
/// arguments, which lets a wrapper (`python3 -m ...`, `sh script`) stand in
/// for the tool binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_verbose")]
    pub verbose: bool,
}

fn default_program() -> String {
    "ansible-playbook".to_string()
}

fn default_verbose() -> bool {
    true
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            verbose: default_verbose(),
        }
    }
}

impl ToolConfig {
    /// Locate the program on `PATH` (or as given, if it is a path).
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }
}

// ---------------------------------------------------------------------------
// PlaybooksConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybooksConfig {
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "yml".to_string()
}

impl Default for PlaybooksConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

// ---------------------------------------------------------------------------
// InventoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_file")]
    pub file: String,
    #[serde(default = "default_inventory_content")]
    pub default_content: String,
}

fn default_inventory_file() -> String {
    "inventory.ini".to_string()
}

pub fn default_inventory_content() -> String {
    "[local]\nlocalhost ansible_connection=local\n".to_string()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            file: default_inventory_file(),
            default_content: default_inventory_content(),
        }
    }
}

// ---------------------------------------------------------------------------
// LimitsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Kill the tool after this many seconds. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_max_concurrent_runs() -> usize {
    4
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

impl LimitsConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub playbooks: PlaybooksConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load `<root>/plays.yaml`. A missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.tool.program.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "tool.program is empty".to_string(),
            });
        } else if self.tool.locate().is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("tool '{}' not found on PATH", self.tool.program),
            });
        }

        if !paths::is_valid_extension(&self.playbooks.extension) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "playbooks.extension '{}' must be alphanumeric",
                    self.playbooks.extension
                ),
            });
        }

        if !paths::is_plain_file_name(&self.inventory.file) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "inventory.file '{}' must be a plain file name",
                    self.inventory.file
                ),
            });
        }

        if self.limits.max_concurrent_runs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "limits.max_concurrent_runs must be at least 1".to_string(),
            });
        }

        if self.limits.timeout_secs == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "limits.timeout_secs is 0; every run will time out".to_string(),
            });
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}
