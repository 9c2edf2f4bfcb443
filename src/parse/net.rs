use crate::errors::CrawlError;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::net::Ipv4Addr;

/// Returns (compiling once) the strict dotted-octet IPv4 pattern -- every octet 0-255, no
/// partial matches inside longer digit runs.
///
/// # Panics
///
/// Panics if the static pattern fails to compile, which would be a bug.
#[allow(clippy::expect_used)]
pub fn ipv4_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
        )
        .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Returns true when `s` is exactly one valid dotted-quad IPv4 address.
#[must_use]
pub fn is_ipv4(s: &str) -> bool {
    s.parse::<Ipv4Addr>().is_ok()
}

/// Extract every strictly-dotted IPv4 address appearing in `text`, in order of appearance.
#[must_use]
pub fn find_ipv4s(text: &str) -> Vec<String> {
    ipv4_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_owned())
        .collect()
}

/// Convert a CIDR prefix length to a dotted netmask. Identity partner of [`netmask_to_cidr`].
///
/// # Errors
///
/// `Config` when `prefix` is outside 0..=32.
pub fn cidr_to_netmask(prefix: u8) -> Result<String, CrawlError> {
    if prefix > 32 {
        return Err(CrawlError::Config(format!(
            "cidr prefix {prefix} out of range 0..=32"
        )));
    }

    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };

    Ok(Ipv4Addr::from(mask).to_string())
}

/// Convert a dotted netmask to its CIDR prefix length.
///
/// # Errors
///
/// `Config` when `mask` is not a valid contiguous netmask.
pub fn netmask_to_cidr(mask: &str) -> Result<u8, CrawlError> {
    let addr: Ipv4Addr = mask
        .parse()
        .map_err(|_| CrawlError::Config(format!("'{mask}' is not a dotted netmask")))?;

    let bits = u32::from(addr);
    let prefix = bits.leading_ones();

    // a real netmask is all ones then all zeros
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(CrawlError::Config(format!(
            "'{mask}' is not a contiguous netmask"
        )));
    }

    #[allow(clippy::cast_possible_truncation)]
    Ok(prefix as u8)
}

/// Compute the network address for an interface: `ip AND mask`, rendered dotted.
///
/// # Errors
///
/// `Config` when either input does not parse.
pub fn network_address(
    ip: &str,
    mask: &str,
) -> Result<String, CrawlError> {
    let ip_addr: Ipv4Addr = ip
        .parse()
        .map_err(|_| CrawlError::Config(format!("'{ip}' is not an ipv4 address")))?;

    let mask_addr: Ipv4Addr = mask
        .parse()
        .map_err(|_| CrawlError::Config(format!("'{mask}' is not a dotted netmask")))?;

    let network = u32::from(ip_addr) & u32::from(mask_addr);

    Ok(Ipv4Addr::from(network).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_octets_only() {
        assert!(is_ipv4("10.0.0.1"));
        assert!(!is_ipv4("10.0.0.256"));
        assert!(!is_ipv4("10.0.0"));

        assert_eq!(find_ipv4s("ip 192.168.1.300 then 10.1.2.3 ok"), {
            // 192.168.1.300 must not yield a partial 192.168.1.30
            vec![String::from("10.1.2.3")]
        });
    }

    #[test]
    fn cidr_netmask_round_trip() {
        for prefix in 0..=32_u8 {
            let mask = cidr_to_netmask(prefix).unwrap();

            assert_eq!(netmask_to_cidr(&mask).unwrap(), prefix);
        }
    }

    #[test]
    fn out_of_range_prefix_errors() {
        assert!(cidr_to_netmask(33).is_err());
    }

    #[test]
    fn non_contiguous_mask_errors() {
        assert!(netmask_to_cidr("255.0.255.0").is_err());
        assert!(netmask_to_cidr("banana").is_err());
    }

    #[test]
    fn network_is_bitwise_and() {
        assert_eq!(
            network_address("10.1.2.130", "255.255.255.128").unwrap(),
            "10.1.2.128"
        );
        assert_eq!(
            network_address("172.16.5.9", "255.255.0.0").unwrap(),
            "172.16.0.0"
        );
    }
}
