//! Spawn a command under a pty with a non-blocking master fd.
//!
//! The forkpty recipe here follows the classic rexpect approach: open a pty master, fork, make
//! the slave side the child's controlling terminal, exec. The crawler only ever needs to spawn,
//! poll liveness, and tear down, so that is the whole surface.

use crate::errors::CrawlError;
use nix::fcntl::{
    open,
    OFlag,
};
use nix::pty::{
    grantpt,
    posix_openpt,
    ptsname_r,
    unlockpt,
    PtyMaster,
};
use nix::sys::signal;
use nix::sys::stat::Mode;
use nix::sys::termios;
use nix::sys::wait::{
    waitpid,
    WaitPidFlag,
    WaitStatus,
};
use nix::unistd::{
    dup2,
    fork,
    setsid,
    ForkResult,
    Pid,
};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

const STDIN_FD: i32 = 0;
const STDOUT_FD: i32 = 1;
const STDERR_FD: i32 = 2;

/// A command running under a forked pty. Dropping the struct terminates the child if it is still
/// alive; the pty master fd closes with the `PtyMaster`.
pub struct PtyChild {
    /// The pty master side -- reads and writes against the child go through this fd.
    pub master: PtyMaster,
    child: Pid,
}

impl PtyChild {
    /// Fork the given command under a fresh pty. The master fd is opened `O_NONBLOCK` so
    /// transport reads can poll without stalling the channel read loop.
    ///
    /// # Errors
    ///
    /// Returns `CrawlError::Connection` if any step of the pty dance fails.
    pub fn spawn(mut command: Command) -> Result<Self, CrawlError> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY | OFlag::O_NONBLOCK)
            .map_err(|err| CrawlError::Connection(format!("posix_openpt failed: {err}")))?;

        grantpt(&master)
            .map_err(|err| CrawlError::Connection(format!("grantpt failed: {err}")))?;
        unlockpt(&master)
            .map_err(|err| CrawlError::Connection(format!("unlockpt failed: {err}")))?;

        let slave_name = ptsname_r(&master)
            .map_err(|err| CrawlError::Connection(format!("ptsname failed: {err}")))?;

        // SAFETY: only async-signal-safe calls happen on the child side of the fork.
        match unsafe { fork() }
            .map_err(|err| CrawlError::Connection(format!("fork failed: {err}")))?
        {
            ForkResult::Child => {
                // child becomes session leader so the slave pty can be its controlling terminal
                let _ = setsid();

                let slave = match open(Path::new(&slave_name), OFlag::O_RDWR, Mode::empty()) {
                    Ok(fd) => fd,
                    Err(_) => std::process::exit(1),
                };

                let _ = dup2(slave, STDIN_FD);
                let _ = dup2(slave, STDOUT_FD);
                let _ = dup2(slave, STDERR_FD);

                // echo off, otherwise every credential we send comes straight back at the parser
                if let Ok(mut flags) = termios::tcgetattr(STDIN_FD) {
                    flags.local_flags &= !termios::LocalFlags::ECHO;
                    let _ = termios::tcsetattr(STDIN_FD, termios::SetArg::TCSANOW, &flags);
                }

                let _ = command.exec();

                std::process::exit(1);
            }
            ForkResult::Parent { child } => Ok(Self { master, child }),
        }
    }

    /// Non-blocking child status check. Returns true while the child process is still running.
    pub fn alive(&self) -> bool {
        matches!(
            waitpid(self.child, Some(WaitPidFlag::WNOHANG)),
            Ok(WaitStatus::StillAlive | WaitStatus::Continued(_))
        )
    }

    /// Terminate the child. Sends SIGTERM and reaps; if the child already exited this is a no-op.
    pub fn shutdown(&mut self) {
        match signal::kill(self.child, signal::Signal::SIGTERM) {
            Ok(()) => {
                let _ = waitpid(self.child, None);
            }
            // ESRCH: already gone, already reaped
            Err(_) => {}
        }
    }
}

impl Drop for PtyChild {
    fn drop(&mut self) {
        if self.alive() {
            self.shutdown();
        }
    }
}
