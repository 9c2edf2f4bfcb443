use crate::device::model::MacEntry;
use crate::errors::CrawlError;
use once_cell::sync::OnceCell;
use regex::Regex;

/// The broadcast/flood address -- never a real station, never inserted.
const BROADCAST_MAC: &str = "FFFF.FFFF.FFFF";

#[allow(clippy::expect_used)]
fn mac_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // grouped hex digits joined by one separator flavor: aabb.ccdd.eeff, aa:bb:cc:dd:ee:ff,
        // aa-bb-cc-dd-ee-ff -- both cisco dialects and everything in between
        Regex::new(r"\b(?:[0-9A-Fa-f]{2,4}[:.\-]){2,5}[0-9A-Fa-f]{2,4}\b")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn interface_token_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // an interface-looking token: at least two letters then digits/slashes/dots
        Regex::new(r"\b([A-Za-z]{2,}[\d/.]+)\s*$|\b([A-Za-z]{2,}[\d/.]+)\b")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Normalize any separator flavor of MAC into the canonical uppercase dotted form
/// (`AABB.CCDD.EEFF`). Returns `None` when the token does not contain exactly 12 hex digits.
#[must_use]
pub fn normalize_mac(raw: &str) -> Option<String> {
    let hex: String = raw
        .chars()
        .filter(char::is_ascii_hexdigit)
        .collect::<String>()
        .to_uppercase();

    if hex.len() != 12 {
        return None;
    }

    Some(format!("{}.{}.{}", &hex[0..4], &hex[4..8], &hex[8..12]))
}

/// Parse `show mac address-table` (or the hyphenated older spelling) output. For each line,
/// find a MAC and -- after whatever filler the dialect prints -- an interface token; lines
/// without both are ignored, as is the broadcast address.
///
/// # Errors
///
/// `ParseEmpty` when non-empty output yields zero entries.
pub fn mac_table(text: &str) -> Result<Vec<MacEntry>, CrawlError> {
    let mut result = vec![];

    for line in text.lines() {
        let Some(mac_match) = mac_pattern().find(line) else {
            continue;
        };

        let Some(mac) = normalize_mac(mac_match.as_str()) else {
            continue;
        };

        if mac == BROADCAST_MAC {
            continue;
        }

        // the interface column comes after the mac on every dialect we scrape
        let after = &line[mac_match.end()..];

        let Some(captures) = interface_token_pattern().captures(after) else {
            continue;
        };

        let interface = captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|m| m.as_str().to_owned());

        let Some(interface) = interface else {
            continue;
        };

        result.push(MacEntry { mac, interface });
    }

    if result.is_empty() {
        return Err(CrawlError::ParseEmpty(String::from(
            "no mac table entries found in output",
        )));
    }

    Ok(result)
}
