use once_cell::sync::OnceCell;
use regex::bytes::Regex;

/// Returns (compiling once) the default prompt pattern -- matches exec and privileged-exec
/// prompts on the cisco-style CLIs this crawler interrogates.
///
/// # Panics
///
/// Panics if the static pattern fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
pub fn default_prompt_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)^[a-z\d.\-_@()/:]{1,63}[#>]\s*$")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Returns (compiling once) the privileged-exec (enable mode) prompt pattern.
///
/// # Panics
///
/// Panics if the static pattern fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
pub fn enable_prompt_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)^[a-z\d.\-_@()/:]{1,63}#\s*$")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Returns (compiling once) the username/login prompt pattern seen during telnet authentication.
///
/// # Panics
///
/// Panics if the static pattern fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
pub fn default_username_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)^(.*username:)|(.*login:)\s?$")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Returns (compiling once) the password prompt pattern seen during ssh/telnet/enable
/// authentication.
///
/// # Panics
///
/// Panics if the static pattern fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
pub fn default_password_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)(.*@.*)?password:\s?$").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Returns (compiling once) the ansi escape sequence matching pattern.
///
/// # Panics
///
/// Panics if the static pattern fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
pub fn ansi_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?:\x1b\[[0-9;?]*[ -/]*[@-~])|(?:\x1b[@-Z\\^_])")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Strips ansi escape sequences out of the given byte slice.
#[must_use]
pub fn strip_ansi(b: &[u8]) -> Vec<u8> {
    ansi_pattern().replace_all(b, vec![]).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_matches_exec_and_enable() {
        assert!(default_prompt_pattern().is_match(b"core-sw01>"));
        assert!(default_prompt_pattern().is_match(b"core-sw01#"));
        assert!(enable_prompt_pattern().is_match(b"core-sw01#"));
        assert!(!enable_prompt_pattern().is_match(b"core-sw01>"));
    }

    #[test]
    fn auth_prompts_match() {
        assert!(default_username_pattern().is_match(b"Username: "));
        assert!(default_password_pattern().is_match(b"Password:"));
        assert!(default_password_pattern().is_match(b"admin@10.0.0.1's password: "));
    }

    #[test]
    fn ansi_is_stripped() {
        let dirty = b"\x1b[2Jswitch#".to_vec();

        assert_eq!(strip_ansi(&dirty), b"switch#".to_vec());
    }
}
