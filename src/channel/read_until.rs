use super::constants::NEW_LINE_BYTE;
use super::Channel;
use crate::errors::CrawlError;
use chrono::{
    DateTime,
    Utc,
};
use regex::bytes::Regex;
use std::thread;

impl Channel {
    /// Trims the accumulated read buffer down to the region a prompt could plausibly be in --
    /// the last `prompt_search_depth` bytes, aligned forward to a line start -- so the prompt
    /// regex never chews through megabytes of config text.
    fn prompt_search_window<'a>(
        &self,
        rb: &'a [u8],
    ) -> &'a [u8] {
        if rb.len() <= usize::from(self.args.prompt_search_depth) {
            return rb;
        }

        let mut window = &rb[rb.len() - usize::from(self.args.prompt_search_depth)..];

        if let Some(idx) = window.iter().position(|&b| b == NEW_LINE_BYTE) {
            if idx > 0 {
                window = &window[idx..];
            }
        }

        window
    }

    /// One poll step: drain anything new into `rb`, report whether any of `patterns` now match
    /// the tail of the buffer.
    pub(super) fn read_and_check(
        &mut self,
        rb: &mut Vec<u8>,
        patterns: &[Regex],
    ) -> Result<bool, CrawlError> {
        let nb = self.read()?;

        if nb.is_empty() {
            return Ok(false);
        }

        rb.extend(nb);

        let window = self.prompt_search_window(rb.as_slice()).to_vec();

        Ok(patterns.iter().any(|p| p.is_match(&window)))
    }

    /// Read until the channel's prompt pattern is seen or `deadline` passes.
    ///
    /// # Errors
    ///
    /// `Timeout` when the deadline passes first, otherwise whatever the transport read produced.
    pub fn read_until_prompt(
        &mut self,
        deadline: DateTime<Utc>,
    ) -> Result<Vec<u8>, CrawlError> {
        let patterns = [self.args.prompt_pattern.clone()];

        self.read_until_any(&patterns, deadline)
    }

    /// Read until any pattern in `patterns` matches or `deadline` passes.
    ///
    /// # Errors
    ///
    /// `Timeout` when the deadline passes first, otherwise whatever the transport read produced.
    pub fn read_until_any(
        &mut self,
        patterns: &[Regex],
        deadline: DateTime<Utc>,
    ) -> Result<Vec<u8>, CrawlError> {
        let mut rb: Vec<u8> = vec![];

        loop {
            if Utc::now() >= deadline {
                return Err(CrawlError::Timeout(String::from(
                    "timed out waiting for device prompt",
                )));
            }

            if self.read_and_check(&mut rb, patterns)? {
                return Ok(rb);
            }

            thread::sleep(self.args.read_delay);
        }
    }
}
