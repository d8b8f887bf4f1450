//! Sentinel-based command framing.
//!
//! The shell's stdio is an unframed byte stream, so each submitted
//! command is followed by `echo '<sentinel>'` to guarantee a
//! deterministic end-of-output marker regardless of how the command
//! itself exits. Completion is then the first of:
//!
//! - the sentinel appearing on stdout (searched across chunk boundaries,
//!   so a marker split by the pipe buffer is still detected), or
//! - the first stderr chunk, after a settle window that lets trailing
//!   error writes coalesce — shells emit to stderr without continuing
//!   execution predictably, so no sentinel is required on that path.
//!
//! Whichever stream fires first resolves the command; output from the
//! other stream accumulated so far is still reported.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

use super::process::ProcessHandle;
use crate::{AppError, Result};

const READ_CHUNK: usize = 8192;

/// Captured result of one framed command.
///
/// Both fields are optional: a field is present iff its stream delivered
/// any bytes. Text is not trimmed here; trimming belongs to the caller
/// boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Accumulated stdout with the sentinel stripped.
    pub output: Option<String>,
    /// Accumulated stderr with the sentinel stripped if present.
    pub error_output: Option<String>,
}

/// Submit `command` to the shell and await its framed completion.
///
/// The write of `<command>; echo '<sentinel>'` is awaited in full before
/// the command counts as submitted. The overall deadline is enforced by
/// the caller; this function only resolves on sentinel, stderr settle,
/// or process death.
///
/// # Errors
///
/// Returns `AppError::Io` on a pipe read/write failure and
/// `AppError::ProcessExited` when both streams reach EOF without the
/// sentinel arriving.
pub async fn execute(
    handle: &mut ProcessHandle,
    command: &str,
    sentinel: &str,
    output_settle: Duration,
) -> Result<CommandOutput> {
    let marker = sentinel.as_bytes();
    let mut out_acc: Vec<u8> = Vec::new();
    let mut err_acc: Vec<u8> = Vec::new();
    let mut out_buf = [0u8; READ_CHUNK];
    let mut err_buf = [0u8; READ_CHUNK];
    let mut stdout_open = true;
    let mut stderr_open = true;

    // Discard stale bytes a previous command may have left behind, such
    // as the sentinel echoed after an error-resolved command.
    let mut scratch = Vec::new();
    drain_ready(&mut handle.stdout, &mut out_buf, &mut scratch, marker).await;
    scratch.clear();
    drain_ready(&mut handle.stderr, &mut err_buf, &mut scratch, marker).await;
    drop(scratch);

    let framed = format!("{command}; echo '{sentinel}'\n");
    handle.stdin.write_all(framed.as_bytes()).await?;
    handle.stdin.flush().await?;

    while stdout_open || stderr_open {
        tokio::select! {
            // Error output resolves the command on first arrival, so when
            // both pipes hold data the error branch must win the race
            // deterministically.
            biased;

            read = handle.stderr.read(&mut err_buf), if stderr_open => {
                let n = read?;
                if n == 0 {
                    stderr_open = false;
                    continue;
                }
                err_acc.extend_from_slice(&err_buf[..n]);
                strip_sentinel(&mut err_acc, marker, 0);

                // Drain whatever else lands on stderr within the settle
                // window before finalizing.
                let deadline = Instant::now() + output_settle;
                loop {
                    match tokio::time::timeout_at(deadline, handle.stderr.read(&mut err_buf)).await {
                        Ok(Ok(n)) if n > 0 => {
                            let scan_from = rescan_start(err_acc.len(), marker.len());
                            err_acc.extend_from_slice(&err_buf[..n]);
                            strip_sentinel(&mut err_acc, marker, scan_from);
                        }
                        // EOF, read error, or settle expiry all finalize.
                        Ok(_) | Err(_) => break,
                    }
                }
                return Ok(CommandOutput {
                    output: non_empty(&out_acc),
                    error_output: Some(lossy(&err_acc)),
                });
            }
            read = handle.stdout.read(&mut out_buf), if stdout_open => {
                let n = read?;
                if n == 0 {
                    stdout_open = false;
                    continue;
                }
                // Settle before finalizing, so trailing writes of the
                // same logical block land in subsequent iterations.
                tokio::time::sleep(output_settle).await;
                let scan_from = rescan_start(out_acc.len(), marker.len());
                out_acc.extend_from_slice(&out_buf[..n]);
                if strip_sentinel(&mut out_acc, marker, scan_from) {
                    // Stderr written before the sentinel echo is already
                    // buffered in the pipe; collect it without waiting.
                    if stderr_open {
                        drain_ready(&mut handle.stderr, &mut err_buf, &mut err_acc, marker).await;
                    }
                    return Ok(CommandOutput {
                        output: Some(lossy(&out_acc)),
                        error_output: non_empty(&err_acc),
                    });
                }
            }
        }
    }

    // Both streams hit EOF before the sentinel: the shell died under us.
    Err(AppError::ProcessExited(handle.exit_code().unwrap_or(-1)))
}

/// Append whatever is already readable on `stream` without blocking.
///
/// A zero timeout polls the read exactly once per iteration, so only
/// bytes the OS has buffered are collected.
async fn drain_ready<R: tokio::io::AsyncRead + Unpin>(
    stream: &mut R,
    buf: &mut [u8],
    acc: &mut Vec<u8>,
    marker: &[u8],
) {
    loop {
        match tokio::time::timeout(Duration::ZERO, stream.read(buf)).await {
            Ok(Ok(n)) if n > 0 => {
                let scan_from = rescan_start(acc.len(), marker.len());
                acc.extend_from_slice(&buf[..n]);
                strip_sentinel(acc, marker, scan_from);
            }
            Ok(_) | Err(_) => break,
        }
    }
}

/// Position to resume a sentinel search from after appending a chunk.
///
/// Backs up by `marker_len - 1` bytes so a marker split across the chunk
/// boundary is found in the concatenation.
fn rescan_start(buf_len: usize, marker_len: usize) -> usize {
    buf_len.saturating_sub(marker_len.saturating_sub(1))
}

/// Remove the first occurrence of `marker` at or after `scan_from`.
///
/// Returns true when the marker was found and removed.
pub(crate) fn strip_sentinel(buf: &mut Vec<u8>, marker: &[u8], scan_from: usize) -> bool {
    if marker.is_empty() || scan_from >= buf.len() {
        return false;
    }
    match find_subslice(&buf[scan_from..], marker) {
        Some(offset) => {
            let start = scan_from + offset;
            buf.drain(start..start + marker.len());
            true
        }
        None => false,
    }
}

/// First index of `needle` inside `haystack`, if any.
pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn non_empty(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(lossy(bytes))
    }
}
