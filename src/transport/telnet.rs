use crate::errors::CrawlError;
use crate::transport::base::{
    resolve,
    InChannelAuthData,
    InChannelAuthType,
    Transport,
    TransportArgs,
};
use log::debug;
use std::io::{
    Read,
    Write,
};
use std::net::{
    Shutdown,
    TcpStream,
};

/// Telnet IAC (interpret-as-command) byte.
const IAC: u8 = 255;
/// Telnet option negotiation verbs.
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
/// Start of a subnegotiation block, terminated by IAC SE.
const SB: u8 = 250;
const SE: u8 = 240;

/// The telnet transport: a plain `TcpStream` in non-blocking mode with just enough option
/// negotiation to keep a management CLI happy -- every option the device proposes is refused, so
/// both ends settle on the base NVT. Login happens in-channel (username and password prompts).
pub struct Telnet {
    args: TransportArgs,
    stream: Option<TcpStream>,
}

impl Telnet {
    /// Returns a new `Telnet` transport for the given args.
    #[must_use]
    pub const fn new(args: TransportArgs) -> Self {
        Self { args, stream: None }
    }

    /// Strips telnet command sequences from a read buffer, queueing refusals for every option
    /// the peer tried to negotiate. Returns the cleaned application bytes and the refusal bytes
    /// to write back.
    fn strip_commands(b: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut cleaned = Vec::with_capacity(b.len());
        let mut refusals = vec![];
        let mut i = 0;

        while i < b.len() {
            if b[i] != IAC {
                cleaned.push(b[i]);
                i += 1;

                continue;
            }

            match b.get(i + 1) {
                Some(&DO) => {
                    if let Some(&opt) = b.get(i + 2) {
                        refusals.extend([IAC, WONT, opt]);
                    }

                    i += 3;
                }
                Some(&WILL) => {
                    if let Some(&opt) = b.get(i + 2) {
                        refusals.extend([IAC, DONT, opt]);
                    }

                    i += 3;
                }
                Some(&DONT | &WONT) => {
                    i += 3;
                }
                Some(&SB) => {
                    // skip forward to IAC SE
                    let mut j = i + 2;

                    while j + 1 < b.len() && !(b[j] == IAC && b[j + 1] == SE) {
                        j += 1;
                    }

                    i = j + 2;
                }
                Some(&IAC) => {
                    // escaped 0xff data byte
                    cleaned.push(IAC);
                    i += 2;
                }
                _ => {
                    i += 2;
                }
            }
        }

        (cleaned, refusals)
    }
}

impl Transport for Telnet {
    fn open(&mut self) -> Result<(), CrawlError> {
        let addr = resolve(&self.args.host, self.args.port)?;

        debug!(
            "opening telnet transport to {}:{}",
            self.args.host, self.args.port
        );

        let stream =
            TcpStream::connect_timeout(&addr, self.args.timeout_socket).map_err(|err| {
                CrawlError::Connection(format!(
                    "failed connecting to {}:{}: {err}",
                    self.args.host, self.args.port
                ))
            })?;

        stream.set_nonblocking(true).map_err(|err| {
            CrawlError::Connection(format!("failed setting stream non-blocking: {err}"))
        })?;

        self.stream = Some(stream);

        Ok(())
    }

    fn close(&mut self) -> Result<(), CrawlError> {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }

        Ok(())
    }

    fn alive(&mut self) -> bool {
        self.stream.is_some()
    }

    fn read(&mut self) -> Result<Vec<u8>, CrawlError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(CrawlError::Connection(String::from(
                "attempting to read from telnet transport that is not open",
            )));
        };

        let mut buf = vec![0_u8; usize::from(self.args.read_size)];

        let n = match stream.read(buf.as_mut_slice()) {
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => return Ok(vec![]),
            Err(err) => {
                return Err(CrawlError::Connection(format!(
                    "error reading from telnet stream: {err}"
                )))
            }
        };

        if n == 0 {
            // orderly remote close
            self.stream = None;

            return Err(CrawlError::Connection(String::from(
                "telnet peer closed the connection",
            )));
        }

        buf.truncate(n);

        let (cleaned, refusals) = Self::strip_commands(&buf);

        if !refusals.is_empty() {
            stream.write_all(&refusals).map_err(|err| {
                CrawlError::Connection(format!("failed answering telnet negotiation: {err}"))
            })?;
        }

        Ok(cleaned)
    }

    fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), CrawlError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(CrawlError::Connection(String::from(
                "attempting to write to telnet transport that is not open",
            )));
        };

        stream
            .write_all(b)
            .map_err(|err| CrawlError::Connection(format!("failed writing to telnet stream: {err}")))
    }

    fn host(&self) -> String {
        self.args.host.clone()
    }

    fn port(&self) -> u16 {
        self.args.port
    }

    fn auth_data(&self) -> InChannelAuthData {
        InChannelAuthData {
            auth_type: InChannelAuthType::Telnet,
            user: self.args.user.clone(),
            password: self.args.password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_is_refused_and_stripped() {
        // IAC DO ECHO(1), "abc", IAC WILL SGA(3)
        let raw = [IAC, DO, 1, b'a', b'b', b'c', IAC, WILL, 3];

        let (cleaned, refusals) = Telnet::strip_commands(&raw);

        assert_eq!(cleaned, b"abc".to_vec());
        assert_eq!(refusals, vec![IAC, WONT, 1, IAC, DONT, 3]);
    }

    #[test]
    fn escaped_iac_byte_survives() {
        let raw = [b'x', IAC, IAC, b'y'];

        let (cleaned, refusals) = Telnet::strip_commands(&raw);

        assert_eq!(cleaned, vec![b'x', IAC, b'y']);
        assert!(refusals.is_empty());
    }

    #[test]
    fn subnegotiation_blocks_are_skipped() {
        let raw = [b'a', IAC, SB, 31, 0, 80, 0, 24, IAC, SE, b'b'];

        let (cleaned, _) = Telnet::strip_commands(&raw);

        assert_eq!(cleaned, b"ab".to_vec());
    }
}
