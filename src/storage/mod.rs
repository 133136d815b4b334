// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Storage services consumed by the blackbox.
//!
//! The platform supplies a [`Storage`] that opens files for writing; the
//! [`writer`] module layers the all-or-nothing write on top of it.

pub mod writer;

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

pub use writer::{full_write_file, ReliableWriter};

/// How an existing target is treated when opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Truncate,
    Append,
}

/// An open, writable handle. Dropping it closes the handle.
pub trait RawFile {
    /// Write some prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Push written bytes to the backing medium.
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// File creation primitives of the underlying storage layer.
pub trait Storage: Send + Sync {
    fn open(&self, path: &Path, mode: WriteMode) -> io::Result<Box<dyn RawFile + '_>>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// [`Storage`] backed by the host file system.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdStorage;

struct StdFile(File);

impl RawFile for StdFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.0.sync_all()
    }
}

impl Storage for StdStorage {
    fn open(&self, path: &Path, mode: WriteMode) -> io::Result<Box<dyn RawFile + '_>> {
        let mut opts = OpenOptions::new();
        opts.create(true);
        match mode {
            WriteMode::Truncate => opts.write(true).truncate(true),
            WriteMode::Append => opts.append(true),
        };
        Ok(Box::new(StdFile(opts.open(path)?)))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}
