use super::constants::{
    DEFAULT_PROMPT_SEARCH_DEPTH,
    DEFAULT_READ_DELAY,
    DEFAULT_RETURN_CHAR,
    DEFAULT_TIMEOUT_AUTH,
    DEFAULT_TIMEOUT_OPS,
};
use super::patterns::{
    default_password_pattern,
    default_prompt_pattern,
    default_username_pattern,
};
use core::time::Duration;
use regex::bytes::Regex;

/// Tunables for one `Channel`. Everything has a crawl-sensible default; the only knob callers
/// commonly touch is `timeout_ops` for known-slow gear.
#[allow(clippy::module_name_repetitions)]
pub struct Args {
    /// How far back from the end of accumulated output the prompt hunt looks. Smaller is less
    /// regex work per poll; too small and a prompt can slip past, deadlocking until timeout.
    pub prompt_search_depth: u16,
    /// What a settled device prompt looks like.
    pub prompt_pattern: Regex,
    /// What the login username prompt looks like (telnet auth).
    pub username_pattern: Regex,
    /// What the login/enable password prompt looks like.
    pub password_pattern: Regex,
    /// Byte sequence that submits a line, `\n` unless a device insists otherwise.
    pub return_char: String,
    /// Pause between polls of the transport queue.
    pub read_delay: Duration,
    /// Budget for one command send, write to settled prompt.
    pub timeout_ops: Duration,
    /// Budget for the login conversation to reach a device prompt.
    pub timeout_auth: Duration,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            prompt_search_depth: DEFAULT_PROMPT_SEARCH_DEPTH,
            prompt_pattern: default_prompt_pattern(),
            username_pattern: default_username_pattern(),
            password_pattern: default_password_pattern(),
            return_char: DEFAULT_RETURN_CHAR.to_owned(),
            read_delay: DEFAULT_READ_DELAY,
            timeout_ops: DEFAULT_TIMEOUT_OPS,
            timeout_auth: DEFAULT_TIMEOUT_AUTH,
        }
    }
}

impl Args {
    /// Defaults with a different per-command budget.
    #[must_use]
    pub fn with_ops_timeout(timeout: Duration) -> Self {
        Self {
            timeout_ops: timeout,
            ..Self::default()
        }
    }
}
