// CLASSIFICATION: COMMUNITY
// Filename: host.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Adapter implementations for hosted targets with a regular file system.

use std::convert::Infallible;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};

use super::{ModuleOps, Platform};
use crate::config::BlackboxConfig;
use crate::error::{BlackboxError, Result};
use crate::record::{self, ErrorInfo, ERROR_INFO_MAX_LEN};
use crate::storage::{ReliableWriter, StdStorage, Storage, WriteMode};

/// Module whose fault record lives in a single file.
#[derive(Clone, Debug)]
pub struct FileModule {
    name: String,
    record_path: PathBuf,
    max_record_len: usize,
}

impl FileModule {
    pub fn new(name: &str, record_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            record_path: record_path.into(),
            max_record_len: ERROR_INFO_MAX_LEN,
        }
    }

    /// Module on the configured fault log path, dumping with the same
    /// record bound the orchestrator persists with.
    pub fn from_config(name: &str, cfg: &BlackboxConfig) -> Self {
        Self::new(name, cfg.fault_log_path()).with_max_record_len(cfg.max_record_len)
    }

    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    fn file_name(&self) -> String {
        self.record_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.log", self.name))
    }
}

impl ModuleOps for FileModule {
    fn name(&self) -> &str {
        &self.name
    }

    /// Appends a timestamped copy of the record to `<log_dir>/<name>.dump`.
    fn dump(&self, log_dir: &Path, info: &mut ErrorInfo) -> Result<()> {
        StdStorage.create_dir_all(log_dir).map_err(|e| {
            warn!("bbox: cannot create dump dir {}: {e}", log_dir.display());
            BlackboxError::adapter("dump", -1)
        })?;
        let mut raw = format!("[{}]\r\n", Utc::now().to_rfc3339()).into_bytes();
        raw.extend(record::render_bounded(info, self.max_record_len)?);
        let path = log_dir.join(format!("{}.dump", self.name));
        ReliableWriter::new(&StdStorage).write_all(&path, &raw, WriteMode::Append)
    }

    fn reset(&self, info: &ErrorInfo) {
        info!("bbox: module {} reset after {}", self.name, info.event());
    }

    fn last_log_info(&self) -> Result<Option<ErrorInfo>> {
        let bytes = match fs::read(&self.record_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("bbox: cannot read {}: {e}", self.record_path.display());
                return Err(BlackboxError::adapter("get_last_log_info", -1));
            }
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        match record::parse_record(&bytes) {
            Ok(info) => Ok(Some(info)),
            Err(e) => {
                // still worth preserving: keep the raw text as the description
                warn!("bbox: previous record of {} unreadable: {e}", self.name);
                let text = String::from_utf8_lossy(&bytes);
                Ok(Some(ErrorInfo::new("UNPARSED", &self.name, &text)))
            }
        }
    }

    fn save_last_log(&self, log_dir: &Path, _info: &ErrorInfo) -> Result<()> {
        StdStorage.create_dir_all(log_dir).map_err(|e| {
            warn!("bbox: cannot create {}: {e}", log_dir.display());
            BlackboxError::adapter("save_last_log", -1)
        })?;
        let dest = log_dir.join(self.file_name());
        if fs::rename(&self.record_path, &dest).is_ok() {
            info!("bbox: last log moved to {}", dest.display());
            return Ok(());
        }
        // rename fails across mount points
        fs::copy(&self.record_path, &dest)
            .and_then(|_| fs::remove_file(&self.record_path))
            .map_err(|e| {
                warn!(
                    "bbox: cannot relocate {} to {}: {e}",
                    self.record_path.display(),
                    dest.display()
                );
                BlackboxError::adapter("save_last_log", -1)
            })?;
        info!("bbox: last log copied to {}", dest.display());
        Ok(())
    }
}

/// Platform for hosted targets: records under the configured log root,
/// reboot terminates the process.
#[derive(Clone, Debug)]
pub struct HostPlatform {
    fault_log_path: PathBuf,
    exit_code: i32,
    storage: StdStorage,
}

impl HostPlatform {
    pub fn new(fault_log_path: impl Into<PathBuf>, exit_code: i32) -> Self {
        Self {
            fault_log_path: fault_log_path.into(),
            exit_code,
            storage: StdStorage,
        }
    }

    pub fn from_config(cfg: &BlackboxConfig) -> Self {
        Self::new(cfg.fault_log_path(), cfg.reboot_exit_code)
    }
}

impl Platform for HostPlatform {
    fn fault_log_path(&self) -> PathBuf {
        self.fault_log_path.clone()
    }

    fn storage(&self) -> &dyn Storage {
        &self.storage
    }

    fn reboot(&self) -> Result<Infallible> {
        info!("bbox: rebooting (exit {})", self.exit_code);
        log::logger().flush();
        std::process::exit(self.exit_code)
    }
}
