use std::time::Duration;

/// How far back from the end of buffered output the prompt hunt reaches by default.
pub const DEFAULT_PROMPT_SEARCH_DEPTH: u16 = 1024;

/// Line submission sequence. A couple of telnet stacks want `\r\n`; everything this crawler
/// targets is happy with a bare newline.
pub const DEFAULT_RETURN_CHAR: &str = "\n";

/// Pause between polls of the transport queue.
pub const DEFAULT_READ_DELAY: Duration = Duration::from_micros(250);

/// Per-command budget, write to settled prompt.
pub const DEFAULT_TIMEOUT_OPS: Duration = Duration::from_secs(30);

/// Budget for the login conversation to produce a device prompt.
pub const DEFAULT_TIMEOUT_AUTH: Duration = Duration::from_secs(20);

/// The ANSI escape byte, the tell that output needs scrubbing before parsing.
pub const ANSI_ESCAPE_BYTE: u8 = 0x1b;

/// Newline, as a byte.
pub const NEW_LINE_BYTE: u8 = 0x0a;

/// Username prompts tolerated before a credential is declared rejected.
pub const USER_SEEN_MAX: u8 = 2;

/// Password prompts tolerated before a credential is declared rejected.
pub const PASSWORD_SEEN_MAX: u8 = 2;
