use crate::errors::CrawlError;
use core::time::Duration;
use std::net::{
    SocketAddr,
    TcpStream,
    ToSocketAddrs,
};

/// The standard ssh port, tried first for every target.
pub const SSH_PORT: u16 = 22;

/// The telnet port, the fallback when ssh is closed or exhausted.
pub const TELNET_PORT: u16 = 23;

/// The default time (in seconds) to use for socket connect timeouts.
pub const DEFAULT_TIMEOUT_SOCKET_SECONDS: u64 = 10;

/// The default transport read size per poll.
pub const DEFAULT_READ_SIZE: u16 = 8_192;

/// Transport is the trait both netcrawl transports (ssh, telnet) implement so the channel can
/// consume them interchangeably.
pub trait Transport {
    /// Open the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if the connection cannot be established.
    fn open(&mut self) -> Result<(), CrawlError>;

    /// Close the underlying transport. Must be safe to call on an already-dead transport.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if teardown itself fails.
    fn close(&mut self) -> Result<(), CrawlError>;

    /// Indicates if the transport is "alive".
    fn alive(&mut self) -> bool;

    /// Read whatever bytes are ready, up to the transport read size. Implementations *must be
    /// non-blocking* -- an empty vec means nothing was ready, not end-of-stream.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if the read fails for a reason other than "nothing ready".
    fn read(&mut self) -> Result<Vec<u8>, CrawlError>;

    /// Write to the underlying transport.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if the write fails.
    fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), CrawlError>;

    /// Returns the host of the transport.
    fn host(&self) -> String;

    /// Returns the port of the transport.
    fn port(&self) -> u16;

    /// Returns the data the channel needs to run in-channel authentication.
    fn auth_data(&self) -> InChannelAuthData;
}

/// A struct holding generic arguments that apply to both transport flavors.
#[derive(Clone)]
pub struct TransportArgs {
    /// The actual host to connect to.
    pub host: String,
    /// The port to connect to the host on.
    pub port: u16,
    /// The username for authenticating to the host.
    pub user: String,
    /// The password for authenticating to the host.
    pub password: String,
    /// The timeout duration for initial socket connection.
    pub timeout_socket: Duration,
    /// The read size for each read of the transport.
    pub read_size: u16,
}

impl TransportArgs {
    /// Return a new instance of `TransportArgs` for the given host -- everything else gets a
    /// sane default.
    #[must_use]
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_owned(),
            port: SSH_PORT,
            user: String::new(),
            password: String::new(),
            timeout_socket: Duration::from_secs(DEFAULT_TIMEOUT_SOCKET_SECONDS),
            read_size: DEFAULT_READ_SIZE,
        }
    }
}

/// An enum indicating the type of *in channel* authentication the channel should run for a
/// transport.
pub enum InChannelAuthType {
    /// Telnet in channel auth -- expect a username prompt first.
    Telnet,
    /// SSH in channel auth -- expect (at most) a password prompt.
    Ssh,
}

/// Data a `Channel` needs to drive in-channel authentication for a transport.
pub struct InChannelAuthData {
    /// Indicates the flavor of in channel authentication.
    pub auth_type: InChannelAuthType,
    /// The user to use for authentication.
    pub user: String,
    /// The password to use for authentication.
    pub password: String,
}

/// Resolve `host:port` to a socket address, preferring IPv4 (management networks here are v4).
///
/// # Errors
///
/// Returns `CrawlError::Connection` when the host does not resolve.
pub fn resolve(
    host: &str,
    port: u16,
) -> Result<SocketAddr, CrawlError> {
    let mut addrs = (host, port).to_socket_addrs().map_err(|err| {
        CrawlError::Connection(format!("failed resolving {host}:{port}: {err}"))
    })?;

    addrs
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| CrawlError::Connection(format!("no ipv4 address for {host}")))
}

/// TCP-probe a single port. Used before any login attempt so we never burn credential retries
/// against a port that is not even open.
#[must_use]
pub fn probe_port(
    host: &str,
    port: u16,
    timeout: Duration,
) -> bool {
    let Ok(addr) = resolve(host, port) else {
        return false;
    };

    TcpStream::connect_timeout(&addr, timeout).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_ipv4_literal() {
        let addr = resolve("127.0.0.1", 22).unwrap();

        assert!(addr.is_ipv4());
        assert_eq!(addr.port(), 22);
    }

    #[test]
    fn probe_closed_port_is_false() {
        // port 1 on loopback should be closed just about anywhere tests run
        assert!(!probe_port("127.0.0.1", 1, Duration::from_millis(200)));
    }
}
