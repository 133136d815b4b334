// CLASSIFICATION: COMMUNITY
// Filename: orchestrator.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Capture, persist and reboot coordination.
//!
//! A fault notification walks `Idle -> Capturing -> Preserving ->
//! Persisting -> Rebooting`. The whole walk runs under the single-flight
//! guard. Capture, preservation and persistence failures are logged and
//! collected but never stop the walk: a faulted device reboots even when
//! its record could not be written.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::adapter::{ModuleOps, NoopModule, NoopPlatform, Platform};
use crate::config::BlackboxConfig;
use crate::error::{BlackboxError, Result};
use crate::guard::SingleFlightGuard;
use crate::record::{self, ErrorInfo, MODULE_MAX_LEN};
use crate::storage::{ReliableWriter, WriteMode};

/// File name of the rendering written next to a record saved by the
/// boot-time sweep. Never the name of a relocated record.
pub const SAVED_RECORD_FILE: &str = "error_info.rendered.txt";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Capturing,
    Preserving,
    Persisting,
    Rebooting,
}

/// What a capture cycle achieved before reboot (or instead of it).
#[derive(Debug, Default)]
pub struct CycleReport {
    /// The record as it stood after the module dump.
    pub info: ErrorInfo,
    pub previous_saved: bool,
    pub persisted: bool,
    /// Failures that were reported but did not stop the cycle.
    pub failures: Vec<BlackboxError>,
}

/// The fault capture subsystem.
pub struct Blackbox {
    config: BlackboxConfig,
    platform: Arc<dyn Platform>,
    modules: RwLock<BTreeMap<String, Arc<dyn ModuleOps>>>,
    guard: SingleFlightGuard,
    state: Mutex<CycleState>,
}

impl Blackbox {
    pub fn new(config: BlackboxConfig, platform: Arc<dyn Platform>) -> Result<Self> {
        config.validate()?;
        let guard = SingleFlightGuard::new(config.guard_permits)?;
        info!(
            "bbox: initialised, log root {}, {} permit(s)",
            config.log_root.display(),
            config.guard_permits
        );
        Ok(Self {
            config,
            platform,
            modules: RwLock::new(BTreeMap::new()),
            guard,
            state: Mutex::new(CycleState::Idle),
        })
    }

    /// Blackbox on the no-op platform, for boards that supply nothing.
    pub fn with_defaults(config: BlackboxConfig) -> Result<Self> {
        Self::new(config, Arc::new(NoopPlatform::default()))
    }

    pub fn config(&self) -> &BlackboxConfig {
        &self.config
    }

    pub fn guard(&self) -> &SingleFlightGuard {
        &self.guard
    }

    pub fn state(&self) -> CycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the fault hooks of one module.
    pub fn register_module(&self, ops: Arc<dyn ModuleOps>) -> Result<()> {
        let name = ops.name().to_owned();
        if name.is_empty() || name.len() > MODULE_MAX_LEN {
            return Err(BlackboxError::InvalidArgument("module name length"));
        }
        let mut modules = self
            .modules
            .write()
            .map_err(|_| BlackboxError::LockPoisoned)?;
        if modules.contains_key(&name) {
            return Err(BlackboxError::ModuleAlreadyRegistered(name));
        }
        info!("bbox: module {name} registered");
        modules.insert(name, ops);
        Ok(())
    }

    pub fn registered_modules(&self) -> Result<Vec<String>> {
        Ok(self
            .modules
            .read()
            .map_err(|_| BlackboxError::LockPoisoned)?
            .keys()
            .cloned()
            .collect())
    }

    /// Report a fault by its fields.
    ///
    /// With `need_sys_reset` this runs [`Blackbox::handle_fault`] and only
    /// returns on failure; otherwise [`Blackbox::record_fault`].
    pub fn notify_error(
        &self,
        event: &str,
        module: &str,
        error_desc: &str,
        need_sys_reset: bool,
    ) -> Result<CycleReport> {
        let info = ErrorInfo::new(event, module, error_desc);
        if need_sys_reset {
            match self.handle_fault(info) {
                Ok(never) => match never {},
                Err(e) => Err(e),
            }
        } else {
            self.record_fault(info)
        }
    }

    /// Run the full cycle and reboot. Returns only if the guard could not be
    /// taken or the platform reboot came back.
    pub fn handle_fault(&self, info: ErrorInfo) -> Result<Infallible> {
        let report = self.run_cycle(info, true)?;
        if !report.persisted {
            warn!("bbox: rebooting without a persisted record");
        }
        let err = match self.platform.reboot() {
            Ok(never) => match never {},
            Err(e) => e,
        };
        error!("bbox: FATAL reboot returned ({err}), fault handling degraded");
        self.settle_after_reboot();
        Err(BlackboxError::RebootReturned(Box::new(err)))
    }

    /// Capture, preserve and persist without resetting the system.
    pub fn record_fault(&self, info: ErrorInfo) -> Result<CycleReport> {
        self.run_cycle(info, false)
    }

    /// Save every registered module's previous record into a fresh
    /// per-boot directory under the log root. Returns how many were saved.
    pub fn save_last_logs(&self) -> Result<usize> {
        let token = self.guard.acquire(self.config.guard_timeout)?;
        let modules: Vec<_> = self
            .modules
            .read()
            .map_err(|_| BlackboxError::LockPoisoned)?
            .values()
            .cloned()
            .collect();
        let boot_dir = self
            .config
            .log_root
            .join(Utc::now().format("%Y%m%d-%H%M%S%.3f").to_string());

        let mut saved = 0;
        for ops in modules {
            let prev = match ops.last_log_info() {
                Ok(Some(prev)) => prev,
                Ok(None) => continue,
                Err(e) => {
                    warn!("bbox: last log lookup for {} failed: {e}", ops.name());
                    continue;
                }
            };
            let dir = boot_dir.join(ops.name().replace('/', "_"));
            if let Err(e) = ops.save_last_log(&dir, &prev) {
                error!("bbox: saving last log of {} failed: {e}", ops.name());
                continue;
            }
            let rendered = dir.join(SAVED_RECORD_FILE);
            if rendered.exists() {
                // the module relocated its record under this name; keep it as is
                debug!("bbox: {} already present, not rendered", rendered.display());
            } else if let Err(e) = self.persist(&rendered, &prev) {
                warn!("bbox: error info of {} not written: {e}", ops.name());
            }
            saved += 1;
        }
        token.release();
        info!("bbox: saved {saved} last log(s) to {}", boot_dir.display());
        Ok(saved)
    }

    fn run_cycle(&self, mut info: ErrorInfo, need_reset: bool) -> Result<CycleReport> {
        let token = match self.guard.acquire(self.config.guard_timeout) {
            Ok(token) => token,
            Err(e) => {
                error!(
                    "bbox: {} from {} not handled: {e}",
                    info.event(),
                    info.module()
                );
                return Err(e);
            }
        };
        let ops = self.module_ops(info.module());
        let mut report = CycleReport::default();

        self.enter(CycleState::Capturing);
        if let Err(e) = ops.dump(&self.config.dump_dir(), &mut info) {
            error!("bbox: dump of {} failed: {e}", info.module());
            report.failures.push(e);
        }

        self.enter(CycleState::Preserving);
        match ops.last_log_info() {
            Ok(Some(prev)) => match ops.save_last_log(&self.config.last_log_dir(), &prev) {
                Ok(()) => {
                    info!("bbox: previous {} record of {} preserved", prev.event(), prev.module());
                    report.previous_saved = true;
                }
                Err(e) => {
                    error!("bbox: preserving previous record failed: {e}");
                    report.failures.push(e);
                }
            },
            Ok(None) => debug!("bbox: no previous record"),
            Err(e) => {
                error!("bbox: last log lookup failed: {e}");
                report.failures.push(e);
            }
        }

        self.enter(CycleState::Persisting);
        match self.persist(&self.platform.fault_log_path(), &info) {
            Ok(()) => report.persisted = true,
            Err(e) => {
                error!("bbox: persisting {} record failed: {e}", info.event());
                report.failures.push(e);
            }
        }

        if need_reset {
            ops.reset(&info);
            self.enter(CycleState::Rebooting);
        } else {
            self.enter(CycleState::Idle);
        }
        report.info = info;
        token.release();
        Ok(report)
    }

    fn module_ops(&self, name: &str) -> Arc<dyn ModuleOps> {
        let found = self
            .modules
            .read()
            .ok()
            .and_then(|m| m.get(name).cloned());
        found.unwrap_or_else(|| {
            warn!("bbox: module {name:?} not registered, using default hooks");
            Arc::new(NoopModule::new(name))
        })
    }

    fn persist(&self, path: &Path, info: &ErrorInfo) -> Result<()> {
        let bytes = record::render_bounded(info, self.config.max_record_len)?;
        let storage = self.platform.storage();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            storage
                .create_dir_all(parent)
                .map_err(|source| BlackboxError::OpenFailure {
                    path: parent.display().to_string(),
                    source,
                })?;
        }
        ReliableWriter::new(storage)
            .with_stall_limit(self.config.write_stall_limit)
            .write_all(path, &bytes, WriteMode::Truncate)
    }

    /// Back to `Idle` after a returned reboot, unless another cycle has
    /// taken the guard since and moved the state on.
    fn settle_after_reboot(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == CycleState::Rebooting {
            debug!("bbox: Rebooting -> Idle");
            *state = CycleState::Idle;
        }
    }

    fn enter(&self, next: CycleState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("bbox: {:?} -> {:?}", *state, next);
        *state = next;
    }
}
