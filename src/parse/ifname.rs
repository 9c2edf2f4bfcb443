use once_cell::sync::OnceCell;
use regex::Regex;

/// Returns (compiling once) the interface token splitter -- leading letters (plus the odd dash),
/// then the numeric tail of digits, slashes, and dots.
///
/// # Panics
///
/// Panics if the static pattern fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
fn split_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z-]+)\s*([\d/.]+)$").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// An interface token split into its type prefix and numeric tail, e.g.
/// `("GigabitEthernet", "1/0/1")`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitName {
    /// The alphabetic type portion.
    pub prefix: String,
    /// The digits/slashes/dots portion.
    pub number: String,
}

/// Decompose a free-form interface token. Returns `None` for tokens that are not
/// interface-shaped -- `Switch` (no digits), empty strings, pure numbers.
#[must_use]
pub fn split(token: &str) -> Option<SplitName> {
    let captures = split_pattern().captures(token.trim())?;

    Some(SplitName {
        prefix: captures.get(1)?.as_str().to_owned(),
        number: captures.get(2)?.as_str().to_owned(),
    })
}

/// Given a short interface token as seen in MAC or neighbor output (`Gi1/0/1`), find the unique
/// full interface name it abbreviates (`GigabitEthernet1/0/1`). The letter prefix must start the
/// full name's prefix and the numeric tails must be identical. Returns `None` when zero or more
/// than one interface matches.
///
/// The short token is user-supplied device output -- it is split, not interpolated into any
/// pattern, so hostile tokens can't smuggle metacharacters into a regex.
#[must_use]
pub fn partial_match<'a>(
    short: &str,
    names: &'a [String],
) -> Option<&'a String> {
    let short_split = split(short)?;

    let short_prefix = short_split.prefix.to_lowercase();

    let mut found: Option<&String> = None;

    for name in names {
        let Some(full_split) = split(name) else {
            continue;
        };

        if !full_split
            .prefix
            .to_lowercase()
            .starts_with(&short_prefix)
        {
            continue;
        }

        if full_split.number != short_split.number {
            continue;
        }

        if found.is_some() {
            // ambiguous -- safer to attach nothing than to attach wrong
            return None;
        }

        found = Some(name);
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_standard_tokens() {
        assert_eq!(
            split("GigabitEthernet1/0/24"),
            Some(SplitName {
                prefix: String::from("GigabitEthernet"),
                number: String::from("1/0/24"),
            })
        );

        assert_eq!(
            split("Vlan100"),
            Some(SplitName {
                prefix: String::from("Vlan"),
                number: String::from("100"),
            })
        );

        assert_eq!(
            split("Gi1/0/1"),
            Some(SplitName {
                prefix: String::from("Gi"),
                number: String::from("1/0/1"),
            })
        );
    }

    #[test]
    fn letter_only_token_is_not_an_interface() {
        assert_eq!(split("Switch"), None);
        assert_eq!(split(""), None);
        assert_eq!(split("1234"), None);
    }

    #[test]
    fn partial_match_finds_unique_expansion() {
        let names = vec![
            String::from("GigabitEthernet1/0/1"),
            String::from("GigabitEthernet1/0/2"),
            String::from("TenGigabitEthernet1/1/1"),
        ];

        assert_eq!(
            partial_match("Gi1/0/1", &names),
            Some(&String::from("GigabitEthernet1/0/1"))
        );
        assert_eq!(
            partial_match("Te1/1/1", &names),
            Some(&String::from("TenGigabitEthernet1/1/1"))
        );
        assert_eq!(partial_match("Fa0/1", &names), None);
    }

    #[test]
    fn ambiguous_partial_matches_nothing() {
        // "Gi" starts both GigabitEthernet and... GigabitEthernet again with same tail
        let names = vec![
            String::from("GigabitEthernet1/0/1"),
            String::from("GibberishEthernet1/0/1"),
        ];

        assert_eq!(partial_match("Gi1/0/1", &names), None);
    }

    #[test]
    fn hostile_tokens_do_not_match() {
        let names = vec![String::from("GigabitEthernet1/0/1")];

        assert_eq!(partial_match(".*1/0/1", &names), None);
        assert_eq!(partial_match("Switch", &names), None);
    }
}
