use super::constants::NEW_LINE_BYTE;
use super::Channel;
use crate::errors::CrawlError;
use crate::util::bytes::{
    contains_sub,
    trim_cutset,
    trim_cutset_right,
};
use chrono::{
    Duration as ChronoDuration,
    Utc,
};
use std::thread;

impl Channel {
    /// Normalizes line endings, strips the trailing prompt, and trims leftover newlines/returns
    /// from a finished command's output.
    fn process_output(
        &self,
        b: &[u8],
    ) -> Vec<u8> {
        let mut clean_lines: Vec<Vec<u8>> = vec![];

        for line in b.split(|byte| byte == &NEW_LINE_BYTE) {
            let line = trim_cutset_right(line, b"\r");

            clean_lines.push([line, &[NEW_LINE_BYTE]].concat());
        }

        let joined = clean_lines.concat();

        let stripped = self
            .args
            .prompt_pattern
            .replace(joined.as_slice(), vec![])
            .to_vec();

        let mut cutset = vec![NEW_LINE_BYTE];
        cutset.extend(self.args.return_char.as_bytes());

        trim_cutset(stripped.as_slice(), cutset.as_slice()).to_vec()
    }

    /// Send an input to the device and read until the echo of the input is seen, then until the
    /// prompt returns. Returns the cleaned output of the command.
    ///
    /// # Errors
    ///
    /// `Timeout` when the operation timeout lapses, otherwise transport errors.
    pub fn send_input(
        &mut self,
        input: &str,
    ) -> Result<Vec<u8>, CrawlError> {
        let timeout = ChronoDuration::from_std(self.args.timeout_ops).map_err(|err| {
            CrawlError::Fatal(format!("failed casting ops timeout duration: {err}"))
        })?;

        let deadline = Utc::now() + timeout;

        self.write(input.as_bytes())?;

        // wait for the device to echo the input back before sending the return, so a slow
        // device doesn't interleave our return into the middle of the echo
        let mut rb: Vec<u8> = vec![];

        loop {
            if Utc::now() >= deadline {
                return Err(CrawlError::Timeout(format!(
                    "timed out sending input '{input}' to device"
                )));
            }

            let nb = self.read()?;

            if !nb.is_empty() {
                rb.extend(nb);

                if contains_sub(rb.as_slice(), input.as_bytes()) {
                    break;
                }
            }

            thread::sleep(self.args.read_delay);
        }

        self.write_return()?;

        let mut rb: Vec<u8> = vec![];
        let patterns = [self.args.prompt_pattern.clone()];

        loop {
            if Utc::now() >= deadline {
                return Err(CrawlError::Timeout(format!(
                    "timed out waiting for output of '{input}'"
                )));
            }

            if self.read_and_check(&mut rb, &patterns)? {
                return Ok(self.process_output(rb.as_slice()));
            }

            thread::sleep(self.args.read_delay);
        }
    }
}
