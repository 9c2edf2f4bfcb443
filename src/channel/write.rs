use super::Channel;
use crate::errors::CrawlError;
use chrono::{
    Duration as ChronoDuration,
    Utc,
};

impl Channel {
    /// Write `b` bytes to the device -- typically you should use `write_and_return` instead.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if the transport write fails.
    pub fn write(
        &mut self,
        b: &[u8],
    ) -> Result<(), CrawlError> {
        match self.transport.lock() {
            Ok(mut unlocked_transport) => unlocked_transport.write(b),
            Err(err) => Err(CrawlError::Connection(format!(
                "failed acquiring lock on transport: {err}"
            ))),
        }
    }

    /// Writes a return -- the return character by default is "\n", but can be configured.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if the transport write fails.
    pub fn write_return(&mut self) -> Result<(), CrawlError> {
        let return_char = self.args.return_char.clone();

        self.write(return_char.as_bytes())
    }

    /// Write `b` bytes to the device followed by a return.
    ///
    /// # Errors
    ///
    /// Returns a `CrawlError` if the transport write fails.
    pub fn write_and_return(
        &mut self,
        b: &[u8],
    ) -> Result<(), CrawlError> {
        self.write(b)?;
        self.write_return()
    }

    /// Return the current "prompt" from the device -- sends a bare return and scrapes the line
    /// the device answers with.
    ///
    /// # Errors
    ///
    /// `Timeout` if no prompt appears within the ops timeout, otherwise transport errors.
    pub fn get_prompt(&mut self) -> Result<Vec<u8>, CrawlError> {
        let timeout = ChronoDuration::from_std(self.args.timeout_ops).map_err(|err| {
            CrawlError::Fatal(format!("failed casting ops timeout duration: {err}"))
        })?;

        self.write_return()?;

        let nb = self.read_until_prompt(Utc::now() + timeout)?;

        self.args.prompt_pattern.find(nb.as_slice()).map_or_else(
            || {
                Err(CrawlError::CliCommand(String::from(
                    "read until prompt, but couldn't re-match prompt, this is a bug",
                )))
            },
            |m| Ok(m.as_bytes().to_vec()),
        )
    }
}
