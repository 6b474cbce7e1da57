// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Native PTY backend: one child process behind a pseudo-terminal.

use std::ffi::CString;
use std::os::fd::AsRawFd;

use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, Pid};
use thiserror::Error;
use tokio::io::unix::AsyncFd;

use troupe_core::{PaneGeometry, PaneSpec};

use super::nbio::{set_nonblocking, PtyFd};

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("empty command for pane {0}")]
    EmptyCommand(troupe_core::PaneId),

    #[error("forkpty failed: {0}")]
    Fork(nix::errno::Errno),

    #[error("exec failed: {0}")]
    Exec(String),

    #[error("PTY I/O setup failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Exit status of a reaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A spawned child attached to a PTY master.
pub struct NativePty {
    master: AsyncFd<PtyFd>,
    child_pid: Pid,
}

impl NativePty {
    /// Spawn the pane's child process on a new PTY.
    // forkpty requires unsafe: the child is partially initialized post-fork
    #[allow(unsafe_code)]
    pub fn spawn(spec: &PaneSpec) -> Result<Self, PtyError> {
        if spec.command.is_empty() {
            return Err(PtyError::EmptyCommand(spec.pane_id));
        }
        let winsize = Winsize {
            ws_col: spec.geometry.cols,
            ws_row: spec.geometry.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        // SAFETY: forkpty is unsafe because the child is in a
        // partially-initialized state after fork. We set env and exec
        // immediately, nothing else.
        let result = unsafe { forkpty(&winsize, None) }.map_err(PtyError::Fork)?;

        match result {
            ForkptyResult::Child => {
                std::env::set_var("TERM", "xterm-256color");
                std::env::set_var(troupe_core::env::PANE_ID, spec.pane_id.to_string());
                std::env::set_var(troupe_core::env::ROLE, spec.role.to_string());
                for (key, value) in &spec.env {
                    std::env::set_var(key, value);
                }

                let c_args: Vec<CString> = spec
                    .command
                    .iter()
                    .map(|s| CString::new(s.as_bytes()))
                    .collect::<Result<_, _>>()
                    .map_err(|e| PtyError::Exec(e.to_string()))?;

                execvp(&c_args[0], &c_args).map_err(|e| PtyError::Exec(e.to_string()))?;
                unreachable!();
            }
            ForkptyResult::Parent { child, master } => {
                set_nonblocking(&master)?;
                let master = AsyncFd::new(PtyFd(master))?;
                Ok(Self { master, child_pid: child })
            }
        }
    }

    pub fn master(&self) -> &AsyncFd<PtyFd> {
        &self.master
    }

    pub fn child_pid(&self) -> u32 {
        self.child_pid.as_raw() as u32
    }

    /// Apply a new window size to the PTY.
    // TIOCSWINSZ ioctl requires unsafe for the libc::ioctl call
    #[allow(unsafe_code)]
    pub fn resize(&self, geometry: PaneGeometry) -> std::io::Result<()> {
        let ws = Winsize {
            ws_col: geometry.cols,
            ws_row: geometry.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        // SAFETY: TIOCSWINSZ is a well-defined ioctl that sets the window
        // size on the PTY master fd; the Winsize struct is fully initialized.
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    /// Send a signal to the child.
    pub fn signal(&self, signal: Signal) -> nix::Result<()> {
        kill(self.child_pid, signal)
    }

    /// Block until the child exits (call on a blocking thread).
    pub fn wait_for_exit(pid: Pid) -> std::io::Result<ExitStatus> {
        loop {
            match waitpid(pid, None) {
                Ok(WaitStatus::Exited(_, code)) => {
                    return Ok(ExitStatus { code: Some(code), signal: None })
                }
                Ok(WaitStatus::Signaled(_, sig, _)) => {
                    return Ok(ExitStatus { code: None, signal: Some(sig as i32) })
                }
                Ok(_) => continue,
                Err(nix::errno::Errno::EINTR) => continue,
                Err(e) => return Err(std::io::Error::from(e)),
            }
        }
    }

    pub fn pid(&self) -> Pid {
        self.child_pid
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        // Graceful then forced: SIGHUP, short grace, SIGKILL, reap.
        let _ = kill(self.child_pid, Signal::SIGHUP);
        std::thread::sleep(std::time::Duration::from_millis(50));
        let _ = kill(self.child_pid, Signal::SIGKILL);
        let _ = waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG));
    }
}

/// Checks whether a process with the given PID is alive.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid_i32) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(pid_i32), None).is_ok()
}
