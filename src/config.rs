use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::storage::RunLayout;

// =============================================================================
// Session Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Loop rate; also the rewind window in steps. 0 runs unpaced.
    pub ticks_per_second: u32,
    pub base_output_dir: PathBuf,
    /// Separates concurrent recording sessions under the same base.
    pub run_label: String,
    pub capture_engine_state: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            base_output_dir: PathBuf::from("data"),
            run_label: "default".to_string(),
            capture_engine_state: true,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open config: {}", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// The run label becomes a single directory name under the base.
    pub fn validate(&self) -> Result<(), SessionError> {
        let label = self.run_label.as_str();
        if label.is_empty() || label == "." || label == ".." || label.contains(['/', '\\']) {
            return Err(SessionError::Config(format!("bad run label '{label}'")));
        }
        Ok(())
    }

    pub fn layout(&self) -> RunLayout {
        RunLayout::new(&self.base_output_dir, &self.run_label)
    }

    /// Steps discarded by one rewind: about one second of play.
    pub fn rewind_window(&self) -> usize {
        self.ticks_per_second as usize
    }
}
