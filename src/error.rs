// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Error taxonomy shared by every blackbox component.

use std::io;

use thiserror::Error;

/// Errors produced by the blackbox writer, formatter, guard and orchestrator.
#[derive(Debug, Error)]
pub enum BlackboxError {
    /// Bad call parameters, caught before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("failed to open {path}: {source}")]
    OpenFailure {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path} ({written} of {expected} bytes): {source}")]
    WriteFailure {
        path: String,
        written: usize,
        expected: usize,
        #[source]
        source: io::Error,
    },
    /// The storage layer kept accepting zero bytes without reporting an error.
    #[error("no progress writing {path} ({written} of {expected} bytes)")]
    NoProgress {
        path: String,
        written: usize,
        expected: usize,
    },
    #[error("record of {len} bytes exceeds the {max} byte limit")]
    RecordTooLarge { len: usize, max: usize },
    #[error("timed out waiting for the fault guard")]
    GuardTimeout,
    /// A platform primitive reported a nonzero or negative status.
    #[error("adapter {op} failed with status {status}")]
    AdapterFailure { op: &'static str, status: i32 },
    /// The platform reboot primitive came back instead of resetting the system.
    #[error("reboot returned control: {0}")]
    RebootReturned(#[source] Box<BlackboxError>),
    #[error("module {0:?} already registered")]
    ModuleAlreadyRegistered(String),
    #[error("malformed error record: {0}")]
    MalformedRecord(&'static str),
    #[error("blackbox lock poisoned")]
    LockPoisoned,
    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = core::result::Result<T, BlackboxError>;

impl BlackboxError {
    /// C-style status code of the adapter contract: always negative.
    pub fn status(&self) -> i32 {
        match self {
            BlackboxError::InvalidArgument(_) => -1,
            BlackboxError::OpenFailure { .. } => -2,
            BlackboxError::WriteFailure { .. } => -3,
            BlackboxError::NoProgress { .. } => -4,
            BlackboxError::RecordTooLarge { .. } => -5,
            BlackboxError::GuardTimeout => -6,
            BlackboxError::AdapterFailure { status, .. } if *status < 0 => *status,
            BlackboxError::AdapterFailure { .. } => -7,
            BlackboxError::RebootReturned(_) => -8,
            BlackboxError::ModuleAlreadyRegistered(_) => -9,
            BlackboxError::MalformedRecord(_) => -10,
            BlackboxError::LockPoisoned => -11,
            BlackboxError::Config(_) => -12,
        }
    }

    /// Build an [`BlackboxError::AdapterFailure`] from a raw platform status.
    pub fn adapter(op: &'static str, status: i32) -> Self {
        BlackboxError::AdapterFailure { op, status }
    }
}
