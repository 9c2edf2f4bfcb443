use thiserror::Error;

/// `CrawlError` is the error type for all netcrawl operations. The variants map onto the crawl
/// failure policy -- the dispatcher and pipeline decide what is fatal for a device based on which
/// variant they see, so functions should pick the variant that describes what actually went wrong
/// rather than defaulting to the most generic one.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// TCP/SSH/Telnet could not establish a session, or every credential failed on every
    /// reachable transport. Always fatal for the device being processed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A single credential was rejected -- the caller should continue with the next credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The transport hung past its retry budget. Treated like `Connection` for the device, and
    /// aborts remaining credentials on the same transport (the device is unreachable, don't
    /// thrash it).
    #[error("timed out: {0}")]
    Timeout(String),

    /// A command's output failed its check predicate after all retry attempts.
    #[error("command failed: {0}")]
    CliCommand(String),

    /// A parser found zero records in non-empty output.
    #[error("no records parsed: {0}")]
    ParseEmpty(String),

    /// Any database error. Unique-constraint violations are normally swallowed at the store
    /// layer (idempotent enqueue) -- see [`is_duplicate`].
    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    /// Filesystem or socket level I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Bad settings, empty credential list, malformed CLI target, and friends. These abort
    /// startup rather than a single device.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operator interrupt or an unrecoverable internal state -- the dispatcher poison-pills all
    /// workers and exits.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CrawlError {
    /// Indicates whether the error should abort the whole credential iteration for a transport
    /// (unreachable device) as opposed to just moving to the next credential.
    #[must_use]
    pub const fn aborts_transport(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}

/// Returns true when a database error is a unique/not-null constraint violation -- the
/// idempotent-enqueue path that stores tolerate silently.
#[must_use]
pub fn is_duplicate(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            matches!(e.code, rusqlite::ErrorCode::ConstraintViolation)
        }
        _ => false,
    }
}
