// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v1.1
// Date Modified: 2026-10-16
// Author: Lukas Bower

//! Blackbox: fault capture and persistence for embedded targets.
//!
//! When a system module faults, [`Blackbox`] dumps its diagnostic state,
//! preserves any unread record from the previous boot, writes the new
//! record with an all-or-nothing writer and reboots the device.

/// Error taxonomy and adapter status codes
pub mod error;

/// Runtime configuration (TOML, environment overrides)
pub mod config;

/// Fault record model and text rendering
pub mod record;

/// Storage services and the reliable writer
pub mod storage;

/// Single-flight guard serializing fault handling
pub mod guard;

/// Platform and per-module adapter surface
pub mod adapter;

/// Capture-persist-reboot state machine
pub mod orchestrator;

pub use adapter::{FileModule, HostPlatform, ModuleOps, NoopModule, NoopPlatform, Platform};
pub use config::{get_config, set_config, BlackboxConfig};
pub use error::{BlackboxError, Result};
pub use guard::{GuardToken, SingleFlightGuard, WaitTimeout};
pub use orchestrator::{Blackbox, CycleReport, CycleState};
pub use record::{parse_record, read_record, render, render_bounded, ErrorInfo};
pub use storage::{full_write_file, ReliableWriter, StdStorage, Storage, WriteMode};
