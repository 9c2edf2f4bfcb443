use crate::channel::{
    enable_prompt_pattern,
    Args as ChannelArgs,
    Channel,
};
use crate::credentials::Credential;
use crate::errors::CrawlError;
use crate::transport::base::{
    probe_port,
    TransportArgs,
    SSH_PORT,
    TELNET_PORT,
};
use crate::transport::ssh::Ssh;
use crate::transport::telnet::Telnet;
use core::time::Duration;
use log::{
    debug,
    info,
    warn,
};
use std::thread;

/// The default number of attempts for a retried CLI operation.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// The default base delay between retried CLI operations.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// A predicate run against command output -- returning false counts the attempt as failed.
pub type CheckFn = fn(&str) -> bool;

/// An explicit retry policy for CLI operations. Retrying is a *returned status* affair here: a
/// failed check never raises through the retry loop, it just burns an attempt.
#[derive(Clone, Copy)]
pub struct Retry {
    /// Total attempts before giving up.
    pub attempts: u32,
    /// Sleep before the second attempt.
    pub base_delay: Duration,
    /// Each subsequent sleep is the previous one times this.
    pub multiplier: u32,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            multiplier: 2,
        }
    }
}

impl Retry {
    /// The sleep to take after failed attempt `n` (1-based).
    #[must_use]
    pub fn delay_after(
        &self,
        attempt: u32,
    ) -> Duration {
        let mut delay = self.base_delay;

        for _ in 1..attempt {
            delay *= self.multiplier;
        }

        delay
    }
}

/// Which wire transport a session ended up on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// ssh, port 22 flavored.
    Ssh,
    /// telnet, port 23 flavored.
    Telnet,
}

impl TransportKind {
    /// Short name for logs and the device record.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Telnet => "telnet",
        }
    }
}

/// A live, authenticated CLI session against one device. Owns the channel; all device
/// interrogation goes through `send_expect`.
pub struct Session {
    channel: Channel,
    /// The management IP this session is connected to.
    pub host: String,
    /// The transport flavor that won.
    pub transport: TransportKind,
    /// The credential that authenticated.
    pub credential: Credential,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("transport", &self.transport)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap an already-open channel as a session. The normal path is [`connect`]; this exists
    /// for embedders and tests that supply their own transport.
    #[must_use]
    pub const fn new(
        channel: Channel,
        host: String,
        transport: TransportKind,
        credential: Credential,
    ) -> Self {
        Self {
            channel,
            host,
            transport,
            credential,
        }
    }

    /// Fetch the current device prompt as a string.
    ///
    /// # Errors
    ///
    /// Propagates channel errors; `Timeout` when no prompt appears.
    pub fn get_prompt(&mut self) -> Result<String, CrawlError> {
        let b = self.channel.get_prompt()?;

        Ok(String::from_utf8_lossy(&b).into_owned())
    }

    /// Send a command and return its output, retrying per `retry`. When `check` is provided,
    /// output failing the predicate counts as a failed attempt.
    ///
    /// # Errors
    ///
    /// `CliCommand` once the attempt budget is exhausted; `Timeout`/`Connection` immediately if
    /// the transport dies underneath us.
    pub fn send_expect(
        &mut self,
        command: &str,
        retry: &Retry,
        check: Option<CheckFn>,
    ) -> Result<String, CrawlError> {
        let mut last_failure = String::new();

        for attempt in 1..=retry.attempts {
            match self.channel.send_input(command) {
                Ok(b) => {
                    let text = String::from_utf8_lossy(&b).into_owned();

                    match check {
                        Some(check_fn) if !check_fn(&text) => {
                            last_failure =
                                format!("output of '{command}' failed check on attempt {attempt}");

                            debug!("{last_failure}");
                        }
                        _ => return Ok(text),
                    }
                }
                Err(err @ (CrawlError::Timeout(_) | CrawlError::Connection(_))) => {
                    // dead transport; retrying the same corpse helps nobody
                    return Err(err);
                }
                Err(err) => {
                    last_failure = format!("'{command}' attempt {attempt} errored: {err}");

                    debug!("{last_failure}");
                }
            }

            if attempt < retry.attempts {
                thread::sleep(retry.delay_after(attempt));
            }
        }

        Err(CrawlError::CliCommand(last_failure))
    }

    /// Enter privileged (enable) mode. Returns `Ok` exactly once the enable prompt is verified;
    /// returns `Err` when the attempt budget is exhausted -- there is no silent third outcome.
    ///
    /// # Errors
    ///
    /// `Auth` when the device refuses escalation after all attempts; transport errors pass
    /// through.
    pub fn enable(
        &mut self,
        secret: &str,
        retry: &Retry,
    ) -> Result<(), CrawlError> {
        let enable_pattern = enable_prompt_pattern();

        for attempt in 1..=retry.attempts {
            let prompt = self.get_prompt()?;

            if enable_pattern.is_match(prompt.as_bytes()) {
                debug!("already in enable mode");

                return Ok(());
            }

            self.channel.write_and_return(b"enable")?;

            // the device answers with either a password prompt or (no enable secret set) goes
            // straight to the privileged prompt
            let deadline = chrono::Utc::now() + chrono::Duration::seconds(10);
            let watch = [
                self.channel.args.password_pattern.clone(),
                self.channel.args.prompt_pattern.clone(),
            ];

            let answer = self.channel.read_until_any(&watch, deadline)?;

            if self.channel.args.password_pattern.is_match(&answer) {
                self.channel.write_and_return(secret.as_bytes())?;
            }

            let prompt = self.get_prompt()?;

            if enable_pattern.is_match(prompt.as_bytes()) {
                info!("entered enable mode on {}", self.host);

                return Ok(());
            }

            warn!(
                "enable attempt {attempt} on {} did not reach privileged prompt",
                self.host
            );

            if attempt < retry.attempts {
                thread::sleep(retry.delay_after(attempt));
            }
        }

        Err(CrawlError::Auth(format!(
            "failed entering enable mode on {} after {} attempts",
            self.host, retry.attempts
        )))
    }

    /// Close the session and underlying transport. Errors during teardown are logged, not
    /// returned -- every pipeline exit path calls this.
    pub fn disconnect(&mut self) {
        if let Err(err) = self.channel.close() {
            debug!("error closing session to {}: {err}", self.host);
        }
    }
}

fn try_open(
    kind: TransportKind,
    ip: &str,
    port: u16,
    cred: &Credential,
    timeout_socket: Duration,
) -> Result<Session, CrawlError> {
    let mut args = TransportArgs::new(ip);
    args.port = port;
    args.user = cred.username.clone();
    args.password = cred.password.clone();
    args.timeout_socket = timeout_socket;

    let mut channel = match kind {
        TransportKind::Ssh => Channel::new(ChannelArgs::default(), Ssh::new(args)),
        TransportKind::Telnet => Channel::new(ChannelArgs::default(), Telnet::new(args)),
    };

    match channel.open() {
        Ok(()) => Ok(Session {
            channel,
            host: ip.to_owned(),
            transport: kind,
            credential: cred.clone(),
        }),
        Err(err) => {
            // tear the half-open transport down before reporting
            let _ = channel.close();

            Err(err)
        }
    }
}

/// Open an authenticated session to `ip`: probe ports 22 and 23, then for each reachable
/// transport walk the credential list in order. A rejected credential moves to the next one; a
/// timeout abandons that transport entirely (the device is unreachable, do not thrash).
///
/// # Errors
///
/// `Connection` when no transport is reachable or every credential failed everywhere.
pub fn connect(
    ip: &str,
    creds: &[Credential],
    port_override: Option<u16>,
    timeout_socket: Duration,
) -> Result<Session, CrawlError> {
    if creds.is_empty() {
        return Err(CrawlError::Config(String::from(
            "connect called with an empty credential list",
        )));
    }

    let candidates: Vec<(TransportKind, u16)> = match port_override {
        Some(port) if port == TELNET_PORT => vec![(TransportKind::Telnet, port)],
        Some(port) => vec![(TransportKind::Ssh, port)],
        None => vec![
            (TransportKind::Ssh, SSH_PORT),
            (TransportKind::Telnet, TELNET_PORT),
        ],
    };

    let mut any_port_open = false;

    for (kind, port) in candidates {
        if !probe_port(ip, port, timeout_socket) {
            debug!("{ip}:{port} closed, skipping {} transport", kind.as_str());

            continue;
        }

        any_port_open = true;

        for cred in creds {
            debug!(
                "trying {} to {ip}:{port} with credential {}",
                kind.as_str(),
                cred.redacted()
            );

            match try_open(kind, ip, port, cred, timeout_socket) {
                Ok(session) => {
                    info!(
                        "connected to {ip}:{port} over {} as {}",
                        kind.as_str(),
                        cred.redacted()
                    );

                    return Ok(session);
                }
                Err(CrawlError::Auth(msg)) => {
                    debug!("credential {} rejected by {ip}: {msg}", cred.redacted());
                }
                Err(err) if err.aborts_transport() => {
                    warn!(
                        "{} transport to {ip} aborted, not trying remaining credentials: {err}",
                        kind.as_str()
                    );

                    break;
                }
                Err(err) => {
                    debug!("error opening {} to {ip}: {err}", kind.as_str());
                }
            }
        }
    }

    if any_port_open {
        Err(CrawlError::Connection(format!(
            "all credentials failed against {ip}"
        )))
    } else {
        Err(CrawlError::Connection(format!(
            "no management ports open on {ip}"
        )))
    }
}
