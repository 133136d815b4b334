// CLASSIFICATION: COMMUNITY
// Filename: writer.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! All-or-nothing buffer persistence over a partial-write storage layer.

use std::io;
use std::path::Path;

use log::{debug, error};

use super::{Storage, StdStorage, WriteMode};
use crate::error::{BlackboxError, Result};

/// Persists whole buffers, turning partial I/O into success or an error.
pub struct ReliableWriter<'a> {
    storage: &'a dyn Storage,
    stall_limit: u32,
}

impl<'a> ReliableWriter<'a> {
    /// Consecutive zero-byte writes tolerated before giving up.
    pub const DEFAULT_STALL_LIMIT: u32 = 8;

    pub fn new(storage: &'a dyn Storage) -> Self {
        Self {
            storage,
            stall_limit: Self::DEFAULT_STALL_LIMIT,
        }
    }

    pub fn with_stall_limit(mut self, limit: u32) -> Self {
        self.stall_limit = limit.max(1);
        self
    }

    /// Write all of `buf` to `path`.
    ///
    /// Succeeds only when every byte was accepted and synced. The handle is
    /// closed on every return path. Open failures are not retried.
    pub fn write_all(&self, path: &Path, buf: &[u8], mode: WriteMode) -> Result<()> {
        if path.as_os_str().is_empty() {
            error!("bbox: write rejected, empty path");
            return Err(BlackboxError::InvalidArgument("path is empty"));
        }
        if buf.is_empty() {
            error!("bbox: write to {} rejected, empty buffer", path.display());
            return Err(BlackboxError::InvalidArgument("buffer is empty"));
        }

        let display = path.display().to_string();
        let mut file = self.storage.open(path, mode).map_err(|source| {
            error!("bbox: create file [{display}] failed: {source}");
            BlackboxError::OpenFailure {
                path: display.clone(),
                source,
            }
        })?;

        let expected = buf.len();
        let mut written = 0usize;
        let mut stalls = 0u32;
        while written < expected {
            match file.write(&buf[written..]) {
                Ok(0) => {
                    stalls += 1;
                    if stalls >= self.stall_limit {
                        error!("bbox: no progress writing {display} at {written}/{expected}");
                        return Err(BlackboxError::NoProgress {
                            path: display,
                            written,
                            expected,
                        });
                    }
                }
                Ok(n) => {
                    stalls = 0;
                    written += n;
                }
                Err(source) => {
                    error!("bbox: failed to write file {display}: {source}");
                    return Err(BlackboxError::WriteFailure {
                        path: display,
                        written,
                        expected,
                        source,
                    });
                }
            }
        }
        if written != expected {
            error!("bbox: storage over-reported {written}/{expected} bytes for {display}");
            return Err(BlackboxError::WriteFailure {
                path: display,
                written,
                expected,
                source: io::Error::new(io::ErrorKind::InvalidData, "write count overrun"),
            });
        }
        file.sync().map_err(|source| BlackboxError::WriteFailure {
            path: display.clone(),
            written,
            expected,
            source,
        })?;
        debug!("bbox: wrote {expected} bytes to {display} ({mode:?})");
        Ok(())
    }
}

/// Exported form of the writer: `0` on success, negative on failure.
pub fn full_write_file(path: &str, buf: &[u8], is_append: bool) -> i32 {
    let mode = if is_append {
        WriteMode::Append
    } else {
        WriteMode::Truncate
    };
    match ReliableWriter::new(&StdStorage).write_all(Path::new(path), buf, mode) {
        Ok(()) => 0,
        Err(e) => e.status(),
    }
}
