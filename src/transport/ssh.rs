use crate::errors::CrawlError;
use crate::transport::base::{
    InChannelAuthData,
    InChannelAuthType,
    Transport,
    TransportArgs,
};
use crate::util::pty::PtyChild;
use log::debug;
use nix::poll::{
    poll,
    PollFd,
    PollFlags,
};
use nix::unistd::dup;
use std::fs::File;
use std::io::{
    Read,
    Write,
};
use std::os::unix::io::{
    AsRawFd,
    FromRawFd,
};
use std::process::Command;

/// The binary used to open the ssh transport.
pub const SSH_BIN: &str = "ssh";

/// Milliseconds the read poll waits before deciding nothing is ready.
const POLL_WAIT_MILLIS: i32 = 5;

/// The ssh transport: the system `ssh` binary running under a pty, so the device sees exactly
/// the terminal client it expects and we stay compatible with every key-exchange the installed
/// ssh supports. Password entry happens in-channel (the channel answers the password prompt).
pub struct Ssh {
    args: TransportArgs,
    /// Whether to verify host keys. Crawl runs default to *off*; a discovery crawler visiting
    /// hundreds of first-contact devices has no prior known_hosts entries to verify against.
    pub strict_key: bool,
    /// Extra arguments appended to the ssh invocation (cipher/kex pins for old gear).
    pub extra_args: Vec<String>,
    child: Option<PtyChild>,
    file: Option<File>,
}

impl Ssh {
    /// Returns a new `Ssh` transport for the given args.
    #[must_use]
    pub const fn new(args: TransportArgs) -> Self {
        Self {
            args,
            strict_key: false,
            extra_args: vec![],
            child: None,
            file: None,
        }
    }

    fn build_command(&self) -> Command {
        let mut command = Command::new(SSH_BIN);

        command
            .arg(&self.args.host)
            .args(["-p", &self.args.port.to_string()])
            .args([
                "-o",
                &format!("ConnectTimeout={}", self.args.timeout_socket.as_secs()),
            ])
            .args(["-o", "NumberOfPasswordPrompts=1"]);

        if !self.args.user.is_empty() {
            command.args(["-l", &self.args.user]);
        }

        if self.strict_key {
            command.args(["-o", "StrictHostKeyChecking=yes"]);
        } else {
            command
                .args(["-o", "StrictHostKeyChecking=no"])
                .args(["-o", "UserKnownHostsFile=/dev/null"]);
        }

        command.args(&self.extra_args);

        command
    }
}

impl Transport for Ssh {
    fn open(&mut self) -> Result<(), CrawlError> {
        let command = self.build_command();

        debug!(
            "opening ssh transport to {}:{} as '{}'",
            self.args.host, self.args.port, self.args.user
        );

        let child = PtyChild::spawn(command)?;

        let fd = dup(child.master.as_raw_fd()).map_err(|err| {
            CrawlError::Connection(format!("failed duplicating pty file handle: {err}"))
        })?;

        // SAFETY: dup just handed us a valid, owned descriptor.
        self.file = Some(unsafe { File::from_raw_fd(fd) });
        self.child = Some(child);

        Ok(())
    }

    fn close(&mut self) -> Result<(), CrawlError> {
        self.file = None;

        if let Some(mut child) = self.child.take() {
            child.shutdown();
        }

        Ok(())
    }

    fn alive(&mut self) -> bool {
        self.child.as_ref().map_or(false, PtyChild::alive)
    }

    fn read(&mut self) -> Result<Vec<u8>, CrawlError> {
        let Some(file) = self.file.as_mut() else {
            return Err(CrawlError::Connection(String::from(
                "attempting to read from ssh transport that is not open",
            )));
        };

        let fd = PollFd::new(file.as_raw_fd(), PollFlags::POLLIN);

        match poll(&mut [fd], POLL_WAIT_MILLIS) {
            Ok(ready) => {
                if ready != 1 {
                    return Ok(vec![]);
                }
            }
            Err(err) => {
                return Err(CrawlError::Connection(format!(
                    "error polling ssh pty fd: {err}"
                )))
            }
        }

        let mut buf = vec![0_u8; usize::from(self.args.read_size)];

        match file.read(buf.as_mut_slice()) {
            Ok(n) => {
                buf.truncate(n);

                Ok(buf)
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(vec![]),
            Err(err) => Err(CrawlError::Connection(format!(
                "error reading from ssh pty after poll: {err}"
            ))),
        }
    }

    fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), CrawlError> {
        let Some(file) = self.file.as_mut() else {
            return Err(CrawlError::Connection(String::from(
                "attempting to write to ssh transport that is not open",
            )));
        };

        file.write_all(b)
            .map_err(|err| CrawlError::Connection(format!("failed writing to ssh pty: {err}")))?;

        file.flush()
            .map_err(|err| CrawlError::Connection(format!("failed flushing ssh pty: {err}")))
    }

    fn host(&self) -> String {
        self.args.host.clone()
    }

    fn port(&self) -> u16 {
        self.args.port
    }

    fn auth_data(&self) -> InChannelAuthData {
        InChannelAuthData {
            auth_type: InChannelAuthType::Ssh,
            user: self.args.user.clone(),
            password: self.args.password.clone(),
        }
    }
}
