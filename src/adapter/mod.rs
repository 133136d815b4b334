// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Platform services the blackbox depends on but does not implement.
//!
//! A board support package provides one [`Platform`] and registers a
//! [`ModuleOps`] per faultable subsystem. [`NoopModule`] and
//! [`NoopPlatform`] stand in when nothing was supplied.

pub mod host;

use std::convert::Infallible;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{BlackboxError, Result};
use crate::record::ErrorInfo;
use crate::storage::{StdStorage, Storage};

pub use host::{FileModule, HostPlatform};

/// Per-module fault hooks.
pub trait ModuleOps: Send + Sync {
    /// Name matched against [`ErrorInfo::module`].
    fn name(&self) -> &str;

    /// Fill in `info` and optionally write raw diagnostics under `log_dir`.
    fn dump(&self, log_dir: &Path, info: &mut ErrorInfo) -> Result<()>;

    /// Module-specific state reset ahead of the reboot.
    fn reset(&self, info: &ErrorInfo);

    /// The record left by a previous boot, if one exists.
    fn last_log_info(&self) -> Result<Option<ErrorInfo>>;

    /// Move the previous record to `log_dir` before it is overwritten.
    fn save_last_log(&self, log_dir: &Path, info: &ErrorInfo) -> Result<()>;
}

/// Board-level services.
pub trait Platform: Send + Sync {
    /// Where the current fault record is persisted.
    fn fault_log_path(&self) -> PathBuf;

    fn storage(&self) -> &dyn Storage;

    /// Reset the system. Only returns if the reset could not be issued.
    fn reboot(&self) -> Result<Infallible>;
}

/// Module hooks that do nothing and report no previous record.
#[derive(Clone, Debug)]
pub struct NoopModule {
    name: String,
}

impl NoopModule {
    pub fn new(name: &str) -> Self {
        Self { name: name.into() }
    }
}

impl ModuleOps for NoopModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn dump(&self, _log_dir: &Path, _info: &mut ErrorInfo) -> Result<()> {
        Ok(())
    }

    fn reset(&self, _info: &ErrorInfo) {}

    fn last_log_info(&self) -> Result<Option<ErrorInfo>> {
        Ok(None)
    }

    fn save_last_log(&self, _log_dir: &Path, _info: &ErrorInfo) -> Result<()> {
        Ok(())
    }
}

/// Platform with no fault path and no way to reboot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPlatform {
    storage: StdStorage,
}

impl Platform for NoopPlatform {
    fn fault_log_path(&self) -> PathBuf {
        PathBuf::new()
    }

    fn storage(&self) -> &dyn Storage {
        &self.storage
    }

    fn reboot(&self) -> Result<Infallible> {
        warn!("bbox: no reboot primitive supplied");
        Err(BlackboxError::adapter("reboot", -1))
    }
}
