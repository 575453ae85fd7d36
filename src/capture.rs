//! Capture path: turn a finished job's piped output and exit code into a
//! stored result.

use std::io::{self, Read};

use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{NewOperationResult, OperationResult, ResultStore, StoreError};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no application name supplied")]
    MissingApplication,

    #[error("stdin must be a pipe")]
    NotAPipe,

    #[error("cannot read input: {0}")]
    Read(#[from] io::Error),

    #[error("could not save result: {0}")]
    Store(#[from] StoreError),
}

/// Read standard input to EOF, refusing anything that is not a pipe.
pub fn read_piped_stdin() -> Result<Vec<u8>, CaptureError> {
    if !stdin_is_pipe()? {
        return Err(CaptureError::NotAPipe);
    }
    read_all(io::stdin().lock())
}

#[cfg(unix)]
fn stdin_is_pipe() -> io::Result<bool> {
    use std::os::unix::fs::FileTypeExt;
    Ok(std::fs::metadata("/dev/stdin")?.file_type().is_fifo())
}

#[cfg(not(unix))]
fn stdin_is_pipe() -> io::Result<bool> {
    use std::io::IsTerminal;
    Ok(!io::stdin().is_terminal())
}

pub fn read_all<R: Read>(mut reader: R) -> Result<Vec<u8>, CaptureError> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Store one job outcome. Empty captures are dropped and yield `Ok(None)`.
///
/// Output is decoded lossily and cut to `max_output_bytes` on a character
/// boundary before it reaches the store.
pub fn record(
    store: &dyn ResultStore,
    application: &str,
    exit_code: i32,
    captured: &[u8],
    max_output_bytes: usize,
) -> Result<Option<OperationResult>, CaptureError> {
    if application.is_empty() {
        return Err(CaptureError::MissingApplication);
    }
    if captured.is_empty() {
        debug!(%application, "job produced no output, nothing to record");
        return Ok(None);
    }

    let output = truncate_on_char_boundary(String::from_utf8_lossy(captured).into_owned(), max_output_bytes);
    let result = store.create(NewOperationResult {
        application: application.to_string(),
        success: exit_code == 0,
        output,
    })?;

    info!(id = %result.id, %application, exit_code, "recorded job result");
    Ok(Some(result))
}

fn truncate_on_char_boundary(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
    s
}
