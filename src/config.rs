// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{BlackboxError, Result};
use crate::guard::WaitTimeout;
use crate::record::{ERROR_INFO_HEADER, ERROR_INFO_MAX_LEN};
use crate::storage::ReliableWriter;

/// Runtime configurable blackbox settings.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlackboxConfig {
    /// Directory holding the fault record, dumps and saved last logs.
    pub log_root: PathBuf,
    pub fault_log_file: String,
    pub guard_permits: usize,
    /// Milliseconds; `0` waits forever.
    #[serde(rename = "guard_timeout_ms")]
    pub guard_timeout: WaitTimeout,
    pub max_record_len: usize,
    pub write_stall_limit: u32,
    pub reboot_exit_code: i32,
}

impl Default for BlackboxConfig {
    fn default() -> Self {
        Self {
            log_root: std::env::var("BLACKBOX_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("blackbox")),
            fault_log_file: "error_info.txt".into(),
            guard_permits: 1,
            guard_timeout: std::env::var("BLACKBOX_GUARD_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(WaitTimeout::from)
                .unwrap_or(WaitTimeout::from_millis(5_000)),
            max_record_len: ERROR_INFO_MAX_LEN,
            write_stall_limit: ReliableWriter::DEFAULT_STALL_LIMIT,
            reboot_exit_code: 0,
        }
    }
}

impl BlackboxConfig {
    /// Parse and validate a TOML document. Missing keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text).map_err(|e| BlackboxError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BlackboxError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.guard_permits == 0 {
            return Err(BlackboxError::Config("guard_permits must be at least 1".into()));
        }
        if self.max_record_len <= ERROR_INFO_HEADER.len() {
            return Err(BlackboxError::Config(format!(
                "max_record_len {} cannot hold the record header",
                self.max_record_len
            )));
        }
        if self.write_stall_limit == 0 {
            return Err(BlackboxError::Config("write_stall_limit must be at least 1".into()));
        }
        if self.fault_log_file.is_empty() {
            return Err(BlackboxError::Config("fault_log_file is empty".into()));
        }
        Ok(())
    }

    pub fn fault_log_path(&self) -> PathBuf {
        self.log_root.join(&self.fault_log_file)
    }

    /// Where a previous record is moved before being overwritten.
    pub fn last_log_dir(&self) -> PathBuf {
        self.log_root.join("last_log")
    }

    pub fn dump_dir(&self) -> PathBuf {
        self.log_root.join("dump")
    }
}

static CONFIG: Lazy<RwLock<BlackboxConfig>> = Lazy::new(|| RwLock::new(BlackboxConfig::default()));

/// Replace the process-wide configuration.
pub fn set_config(cfg: BlackboxConfig) -> Result<()> {
    cfg.validate()?;
    let mut guard = CONFIG.write().map_err(|_| BlackboxError::LockPoisoned)?;
    *guard = cfg;
    Ok(())
}

/// Get a clone of the current configuration.
pub fn get_config() -> Result<BlackboxConfig> {
    CONFIG
        .read()
        .map_err(|_| BlackboxError::LockPoisoned)
        .map(|g| g.clone())
}
