// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-pane event loop: input writer, output demux, lifecycle.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use nix::libc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use troupe_core::{PaneId, PaneState};

use super::nbio::{read_chunk, write_all};
use super::pty::NativePty;
use super::{InputCmd, PaneActivity, PaneRegistry};
use crate::protocol::DaemonEvent;

const READ_BUF_BYTES: usize = 8 * 1024;

/// Run one pane to completion: forward input, demux output, reap the child.
pub(crate) async fn run_pane(
    registry: Arc<PaneRegistry>,
    pane_id: PaneId,
    pty: NativePty,
    mut input_rx: mpsc::Receiver<InputCmd>,
    activity: Arc<PaneActivity>,
    cancel: CancellationToken,
) {
    registry.mark_state(pane_id, PaneState::Alive);
    let mut buf = vec![0u8; READ_BUF_BYTES];
    let mut applied_geometry = registry.pending_geometry(pane_id);
    let mut down_reason = "exited";

    loop {
        // Coalesced resize: apply only the latest requested geometry.
        let wanted = registry.pending_geometry(pane_id);
        if wanted != applied_geometry {
            if let Some(geometry) = wanted {
                if let Err(e) = pty.resize(geometry) {
                    warn!(pane = %pane_id, error = %e, "resize failed");
                }
            }
            applied_geometry = wanted;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                down_reason = "killed";
                break;
            }
            result = read_chunk(pty.master(), &mut buf) => {
                match result {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = &buf[..n];
                        let now_ms = registry.now_ms();
                        activity.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
                        activity.last_output_ms.store(now_ms, Ordering::Relaxed);
                        registry.emit(DaemonEvent::PtyData {
                            pane_id,
                            byte_len: n,
                            meaningful: is_meaningful(chunk),
                            bytes: Some(String::from_utf8_lossy(chunk).into_owned()),
                            at_ms: now_ms,
                        });
                    }
                    // EIO is the normal end-of-stream for a closed PTY.
                    Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                    Err(e) => {
                        warn!(pane = %pane_id, error = %e, "pane read error");
                        break;
                    }
                }
            }
            input = input_rx.recv() => {
                match input {
                    Some(InputCmd { data, reply }) => {
                        let result = write_all(pty.master(), &data).await;
                        if result.is_ok() {
                            activity.bytes_written.fetch_add(data.len() as u64, Ordering::Relaxed);
                        } else {
                            activity.failed_writes.fetch_add(1, Ordering::Relaxed);
                        }
                        let _ = reply.send(result);
                    }
                    None => {
                        debug!(pane = %pane_id, "input channel closed");
                        down_reason = "detached";
                        break;
                    }
                }
            }
        }
    }

    registry.mark_state(pane_id, PaneState::Dead);

    // Reap on a blocking thread; drop tears the PTY down (HUP then KILL).
    let pid = pty.pid();
    drop(pty);
    let status = tokio::task::spawn_blocking(move || NativePty::wait_for_exit(pid)).await;
    let exit_code = match status {
        Ok(Ok(status)) => status.code,
        _ => None,
    };

    info!(pane = %pane_id, ?exit_code, reason = down_reason, "pane down");
    registry.emit(DaemonEvent::PtyDown {
        pane_id,
        exit_code,
        reason: down_reason.to_string(),
    });
}

/// Rough classification of output chunks: meaningful activity is anything
/// beyond bare control sequences and whitespace echo.
pub(crate) fn is_meaningful(chunk: &[u8]) -> bool {
    let mut printable = 0usize;
    let mut in_escape = false;
    for &byte in chunk {
        match byte {
            0x1b => in_escape = true,
            // Escape sequences end on a final byte in 0x40..=0x7e.
            0x40..=0x7e if in_escape => in_escape = false,
            _ if in_escape => {}
            b' ' | b'\t' | b'\r' | b'\n' => {}
            0x20..=0x7e => printable += 1,
            _ => {}
        }
        if printable >= 3 {
            return true;
        }
    }
    false
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
