use crate::device::model::Interface;
use crate::errors::CrawlError;
use crate::parse::net::find_ipv4s;
use once_cell::sync::OnceCell;
use regex::Regex;

/// Configs smaller than this are a paging artifact or an error banner, not a running-config --
/// the fetch step retries rather than parsing them.
pub const MIN_CONFIG_BYTES: usize = 250;

#[allow(clippy::expect_used)]
fn hostname_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?m)^hostname\s+(\S+)").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn interface_block_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // a block runs from "interface X" to the next "!" alone on a line
        Regex::new(r"(?ms)^interface[ \t]+(\S+)[ \t]*\r?\n(.*?)^!\s*$")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn ip_address_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // dotted mask form: "ip address 10.0.0.1 255.255.255.0"
        // slash form (nx-os): "ip address 10.0.0.1/24"
        Regex::new(r"(?m)^\s*ip address\s+(\d{1,3}(?:\.\d{1,3}){3})(?:\s*/\s*(\d{1,2})|\s+(\d{1,3}(?:\.\d{1,3}){3}))?")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn description_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*description\s+(.+?)\s*$")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn redundancy_ip_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // glbp/hsrp/standby virtual addresses, e.g. "standby 1 ip 10.0.0.254"
        Regex::new(r"(?m)^\s*(?:glbp|hsrp|standby)\s+(?:\d+\s+)?ip\s+(\d{1,3}(?:\.\d{1,3}){3})")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Extract the hostname from a running-config: the first `hostname <name>` line.
///
/// # Errors
///
/// `ParseEmpty` when no hostname line exists -- the pipeline falls back to prompt scraping.
pub fn hostname(config: &str) -> Result<String, CrawlError> {
    hostname_pattern()
        .captures(config)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
        .ok_or_else(|| CrawlError::ParseEmpty(String::from("no hostname line in config")))
}

/// Derive a device name from an interactive prompt string: everything up to the trailing
/// `#`/`>` marker.
#[must_use]
pub fn hostname_from_prompt(prompt: &str) -> Option<String> {
    let trimmed = prompt.trim();

    let name = trimmed
        .split_once('#')
        .or_else(|| trimmed.split_once('>'))
        .map_or(trimmed, |(name, _)| name);

    // nx-os admin contexts render as "switch(config)" etc -- keep the bare name
    let name = name.split('(').next().unwrap_or(name).trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_owned())
    }
}

/// Parse one interface config block body into the supplied record.
fn fill_from_block(
    interface: &mut Interface,
    body: &str,
) {
    if let Some(captures) = ip_address_pattern().captures(body) {
        interface.ip = captures.get(1).map(|m| m.as_str().to_owned());

        if let Some(prefix) = captures.get(2) {
            interface.cidr = prefix.as_str().parse().ok();
        }

        if let Some(mask) = captures.get(3) {
            interface.netmask = Some(mask.as_str().to_owned());
        }
    }

    if let Some(captures) = description_pattern().captures(body) {
        interface.description = captures.get(1).map(|m| m.as_str().to_owned());
    }

    if let Some(captures) = redundancy_ip_pattern().captures(body) {
        interface.virtual_ip = captures.get(1).map(|m| m.as_str().to_owned());
    }
}

/// Parse every interface block out of a running-config. Blocks start at `interface X` and end at
/// `!` alone on a line.
///
/// # Errors
///
/// `ParseEmpty` when the config contains no interface blocks at all.
pub fn interfaces(config: &str) -> Result<Vec<Interface>, CrawlError> {
    let mut result = vec![];

    for captures in interface_block_pattern().captures_iter(config) {
        let (Some(name), Some(body)) = (captures.get(1), captures.get(2)) else {
            continue;
        };

        let mut interface = Interface::new(name.as_str());
        interface.raw_config = Some(body.as_str().to_owned());

        fill_from_block(&mut interface, body.as_str());

        result.push(interface);
    }

    if result.is_empty() {
        return Err(CrawlError::ParseEmpty(String::from(
            "no interface blocks found in config",
        )));
    }

    Ok(result)
}

/// Extract redundancy-protocol (glbp/hsrp/standby) virtual IPs from anywhere in the config.
/// These are addresses the device answers on that no interface claims as its own.
#[must_use]
pub fn other_ips(config: &str) -> Vec<String> {
    let mut result: Vec<String> = vec![];

    for captures in redundancy_ip_pattern().captures_iter(config) {
        if let Some(ip) = captures.get(1) {
            let ip = ip.as_str().to_owned();

            if !result.contains(&ip) {
                result.push(ip);
            }
        }
    }

    // belt and braces: any line mentioning the protocols with an address not already captured
    for line in config.lines() {
        let lowered = line.to_lowercase();

        if !(lowered.contains("glbp") || lowered.contains("hsrp") || lowered.contains("standby")) {
            continue;
        }

        for ip in find_ipv4s(line) {
            if !result.contains(&ip) {
                result.push(ip);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "\
version 15.2
hostname core-sw01
!
interface GigabitEthernet1/0/1
 description uplink to dist-sw02
 ip address 10.10.1.1 255.255.255.0
 standby 1 ip 10.10.1.254
!
interface Vlan100
 ip address 172.16.100.2/24
!
interface GigabitEthernet1/0/2
 shutdown
!
line vty 0 4
!
";

    #[test]
    fn hostname_from_config() {
        assert_eq!(hostname(CONFIG).unwrap(), "core-sw01");
        assert!(hostname("no such line here").is_err());
    }

    #[test]
    fn prompt_fallback_strips_markers() {
        assert_eq!(
            hostname_from_prompt("core-sw01#").as_deref(),
            Some("core-sw01")
        );
        assert_eq!(
            hostname_from_prompt("edge-rtr(config)#").as_deref(),
            Some("edge-rtr")
        );
        assert_eq!(hostname_from_prompt("#"), None);
    }

    #[test]
    fn interface_blocks_parse_both_mask_forms() {
        let parsed = interfaces(CONFIG).unwrap();

        assert_eq!(parsed.len(), 3);

        assert_eq!(parsed[0].name, "GigabitEthernet1/0/1");
        assert_eq!(parsed[0].ip.as_deref(), Some("10.10.1.1"));
        assert_eq!(parsed[0].netmask.as_deref(), Some("255.255.255.0"));
        assert_eq!(parsed[0].description.as_deref(), Some("uplink to dist-sw02"));
        assert_eq!(parsed[0].virtual_ip.as_deref(), Some("10.10.1.254"));

        assert_eq!(parsed[1].name, "Vlan100");
        assert_eq!(parsed[1].ip.as_deref(), Some("172.16.100.2"));
        assert_eq!(parsed[1].cidr, Some(24));

        assert_eq!(parsed[2].name, "GigabitEthernet1/0/2");
        assert_eq!(parsed[2].ip, None);
    }

    #[test]
    fn no_interfaces_is_parse_empty() {
        let err = interfaces("hostname x\n!\n").unwrap_err();

        assert!(matches!(err, CrawlError::ParseEmpty(_)));
    }

    #[test]
    fn redundancy_ips_found() {
        let found = other_ips(CONFIG);

        assert_eq!(found, vec![String::from("10.10.1.254")]);
    }
}
