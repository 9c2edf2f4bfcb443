use super::constants::{
    PASSWORD_SEEN_MAX,
    USER_SEEN_MAX,
};
use super::Channel;
use crate::errors::CrawlError;
use chrono::{
    DateTime,
    Duration as ChronoDuration,
    Utc,
};
use log::debug;
use std::thread;

impl Channel {
    fn auth_deadline(&self) -> Result<DateTime<Utc>, CrawlError> {
        let timeout = ChronoDuration::from_std(self.args.timeout_auth).map_err(|err| {
            CrawlError::Fatal(format!("failed casting auth timeout duration: {err}"))
        })?;

        Ok(Utc::now() + timeout)
    }

    /// Answer username/password prompts until the device prompt appears. Used by the telnet
    /// transport where the login conversation happens entirely in the data stream.
    ///
    /// Returns the bytes read past the device prompt, so the channel can hand them back to the
    /// session.
    pub(super) fn authenticate_telnet(
        &mut self,
        user: &[u8],
        password: &[u8],
    ) -> Result<Vec<u8>, CrawlError> {
        let deadline = self.auth_deadline()?;

        let mut user_seen_count = 0_u8;
        let mut password_seen_count = 0_u8;

        let mut rb: Vec<u8> = vec![];

        loop {
            if Utc::now() >= deadline {
                return Err(CrawlError::Timeout(String::from(
                    "timed out during telnet authentication",
                )));
            }

            let nb = self.read()?;

            if nb.is_empty() {
                thread::sleep(self.args.read_delay);

                continue;
            }

            rb.extend(nb);

            if self.args.prompt_pattern.is_match(&rb) {
                debug!("telnet auth reached device prompt");

                return Ok(rb);
            }

            if self.args.username_pattern.is_match(&rb) {
                user_seen_count += 1;

                if user_seen_count > USER_SEEN_MAX {
                    return Err(CrawlError::Auth(String::from(
                        "username prompt seen multiple times, assuming authentication failed",
                    )));
                }

                self.write_and_return(user)?;

                rb = vec![];

                continue;
            }

            if self.args.password_pattern.is_match(&rb) {
                password_seen_count += 1;

                if password_seen_count > PASSWORD_SEEN_MAX {
                    return Err(CrawlError::Auth(String::from(
                        "password prompt seen multiple times, assuming authentication failed",
                    )));
                }

                self.write_and_return(password)?;

                rb = vec![];
            }
        }
    }

    /// Answer the ssh password prompt until the device prompt appears. The ssh binary handles
    /// the key exchange; we only see the keyboard-interactive tail.
    ///
    /// Returns the bytes read past the device prompt.
    pub(super) fn authenticate_ssh(
        &mut self,
        password: &[u8],
    ) -> Result<Vec<u8>, CrawlError> {
        let deadline = self.auth_deadline()?;

        let mut password_seen_count = 0_u8;

        let mut rb: Vec<u8> = vec![];

        loop {
            if Utc::now() >= deadline {
                return Err(CrawlError::Timeout(String::from(
                    "timed out during ssh authentication",
                )));
            }

            let nb = self.read()?;

            if nb.is_empty() {
                thread::sleep(self.args.read_delay);

                continue;
            }

            rb.extend(nb);

            if self.args.prompt_pattern.is_match(&rb) {
                debug!("ssh auth reached device prompt");

                return Ok(rb);
            }

            // the ssh binary surfaces remote rejection in the data stream
            if crate::util::bytes::contains_sub(&rb, b"Permission denied") {
                return Err(CrawlError::Auth(String::from(
                    "ssh reported permission denied",
                )));
            }

            if self.args.password_pattern.is_match(&rb) {
                password_seen_count += 1;

                if password_seen_count > PASSWORD_SEEN_MAX {
                    return Err(CrawlError::Auth(String::from(
                        "password prompt seen multiple times, assuming authentication failed",
                    )));
                }

                self.write_and_return(password)?;

                rb = vec![];
            }
        }
    }
}
