// CLASSIFICATION: COMMUNITY
// Filename: record.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

//! Fault record model and its on-disk text rendering.
//!
//! A rendered record is a fixed header line followed by the `event`,
//! `module` and `errorDesc` fields, each terminated by `\r\n`. When the
//! rendering would exceed the length limit the tail of `errorDesc` is
//! dropped; the header, event and module lines are never altered.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::debug;

use crate::error::{BlackboxError, Result};

pub const ERROR_INFO_HEADER: &str = "#### error info ####\r\n";
pub const ERROR_INFO_MAX_LEN: usize = 768;
pub const EVENT_MAX_LEN: usize = 32;
pub const MODULE_MAX_LEN: usize = 32;
pub const ERROR_DESC_MAX_LEN: usize = 512;

const EVENT_PREFIX: &str = "event: ";
const MODULE_PREFIX: &str = "module: ";
const DESC_PREFIX: &str = "errorDesc: ";
const LINE_END: &str = "\r\n";

/// A single fault record passed through one capture cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    event: String,
    module: String,
    error_desc: String,
}

impl ErrorInfo {
    /// Build a record, bounding each field to its maximum length.
    pub fn new(event: &str, module: &str, error_desc: &str) -> Self {
        let mut info = Self::default();
        info.set_event(event);
        info.set_module(module);
        info.set_error_desc(error_desc);
        info
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn error_desc(&self) -> &str {
        &self.error_desc
    }

    pub fn set_event(&mut self, event: &str) {
        self.event = single_line(bounded(event, EVENT_MAX_LEN));
    }

    pub fn set_module(&mut self, module: &str) {
        self.module = single_line(bounded(module, MODULE_MAX_LEN));
    }

    /// The description may span several lines; only its length is bounded.
    pub fn set_error_desc(&mut self, error_desc: &str) {
        self.error_desc = bounded(error_desc, ERROR_DESC_MAX_LEN).to_owned();
    }
}

/// Cut at the first NUL, then to at most `max` bytes on a char boundary.
fn bounded(s: &str, max: usize) -> &str {
    let s = s.split('\0').next().unwrap_or_default();
    truncate_at_boundary(s, max)
}

fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Render `info` against the default 768 byte limit.
pub fn render(info: &ErrorInfo) -> Result<Vec<u8>> {
    render_bounded(info, ERROR_INFO_MAX_LEN)
}

/// Render `info` so the result is at most `max_len` bytes.
///
/// Returns [`BlackboxError::RecordTooLarge`] only when the header, event and
/// module lines alone cannot fit.
pub fn render_bounded(info: &ErrorInfo, max_len: usize) -> Result<Vec<u8>> {
    let fixed = ERROR_INFO_HEADER.len()
        + EVENT_PREFIX.len()
        + info.event.len()
        + LINE_END.len()
        + MODULE_PREFIX.len()
        + info.module.len()
        + LINE_END.len()
        + DESC_PREFIX.len()
        + LINE_END.len();
    if fixed > max_len {
        return Err(BlackboxError::RecordTooLarge {
            len: fixed,
            max: max_len,
        });
    }
    let desc = truncate_at_boundary(&info.error_desc, max_len - fixed);
    if desc.len() < info.error_desc.len() {
        debug!(
            "bbox: errorDesc of {} truncated from {} to {} bytes",
            info.module,
            info.error_desc.len(),
            desc.len()
        );
    }

    let mut out = String::with_capacity(fixed + desc.len());
    out.push_str(ERROR_INFO_HEADER);
    for (prefix, value) in [
        (EVENT_PREFIX, info.event.as_str()),
        (MODULE_PREFIX, info.module.as_str()),
        (DESC_PREFIX, desc),
    ] {
        out.push_str(prefix);
        out.push_str(value);
        out.push_str(LINE_END);
    }
    Ok(out.into_bytes())
}

/// Parse a rendered record back into an [`ErrorInfo`].
pub fn parse_record(bytes: &[u8]) -> Result<ErrorInfo> {
    let text =
        std::str::from_utf8(bytes).map_err(|_| BlackboxError::MalformedRecord("not utf-8"))?;
    let body = text
        .strip_prefix(ERROR_INFO_HEADER)
        .ok_or(BlackboxError::MalformedRecord("missing header"))?;
    let (event, rest) = take_line(body, EVENT_PREFIX)?;
    let (module, rest) = take_line(rest, MODULE_PREFIX)?;
    let desc = rest
        .strip_prefix(DESC_PREFIX)
        .and_then(|d| d.strip_suffix(LINE_END))
        .ok_or(BlackboxError::MalformedRecord("bad errorDesc line"))?;
    Ok(ErrorInfo::new(event, module, desc))
}

/// Read the record at `path`. A missing file is `Ok(None)`; any other read
/// failure is an error, as is a file that does not parse.
pub fn read_record(path: &Path) -> Result<Option<ErrorInfo>> {
    match fs::read(path) {
        Ok(bytes) => parse_record(&bytes).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(BlackboxError::OpenFailure {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn take_line<'a>(s: &'a str, prefix: &'static str) -> Result<(&'a str, &'a str)> {
    s.strip_prefix(prefix)
        .and_then(|s| s.split_once(LINE_END))
        .ok_or(BlackboxError::MalformedRecord(prefix))
}
