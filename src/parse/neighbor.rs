use crate::device::model::Neighbor;
use crate::device::platform::Platform;
use crate::errors::CrawlError;
use crate::parse::net::find_ipv4s;
use once_cell::sync::OnceCell;
use regex::Regex;

#[allow(clippy::expect_used)]
fn block_separator_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // blocks in "show cdp neighbor detail" are separated by runs of four or more dashes
        Regex::new(r"(?m)^-{4,}\s*$").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn device_id_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)^device id:\s*(\S+)").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn system_name_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)^system name:\s*(\S+)").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn platform_line_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)^platform:\s*([^,]+),").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn interface_line_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        // "Interface: Gi1/0/1,  Port ID (outgoing port): GigabitEthernet0/1"
        Regex::new(r"(?im)^interface:\s*([^,\s]+)\s*,[^:]*:\s*(\S+)")
            .expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

#[allow(clippy::expect_used)]
fn version_line_pattern() -> Regex {
    static RE: OnceCell<Regex> = OnceCell::new();

    RE.get_or_init(|| {
        Regex::new(r"(?im)^version\s*:?\s*\r?\n(.+)").expect("failed compiling pattern, this is a bug")
    })
    .clone()
}

/// Strip a DNS suffix from an advertised device name -- `dist-sw02.corp.example.com` becomes
/// `dist-sw02`. Serial-suffixed NX-OS names (`switch(FOC1234ABCD)`) lose the parenthetical too.
#[must_use]
pub fn clean_device_name(raw: &str) -> String {
    let name = raw.split('(').next().unwrap_or(raw);
    let name = name.split('.').next().unwrap_or(name);

    name.trim().to_owned()
}

/// Guess the crawlable platform tag for a neighbor from its advertised platform and software
/// strings.
#[must_use]
pub fn guess_platform(
    system_platform: &str,
    software: &str,
) -> Platform {
    let haystack = format!("{system_platform} {software}").to_lowercase();

    if haystack.contains("nx-os") || haystack.contains("nexus") {
        return Platform::CiscoNxos;
    }

    if haystack.contains("ios") || haystack.contains("cisco") {
        return Platform::CiscoIos;
    }

    Platform::Unknown
}

fn parse_block(block: &str) -> Option<Neighbor> {
    let mut neighbor = Neighbor::default();

    // prefer the System Name form; fall back to Device ID
    if let Some(captures) = system_name_pattern().captures(block) {
        neighbor.device_name = clean_device_name(captures.get(1)?.as_str());
    } else if let Some(captures) = device_id_pattern().captures(block) {
        neighbor.device_name = clean_device_name(captures.get(1)?.as_str());
    }

    if let Some(captures) = platform_line_pattern().captures(block) {
        neighbor.system_platform = Some(captures.get(1)?.as_str().trim().to_owned());
    }

    if let Some(captures) = interface_line_pattern().captures(block) {
        neighbor.source_interface = Some(captures.get(1)?.as_str().to_owned());
        neighbor.neighbor_interface = Some(captures.get(2)?.as_str().to_owned());
    }

    if let Some(captures) = version_line_pattern().captures(block) {
        neighbor.software = Some(captures.get(1)?.as_str().trim().to_owned());
    }

    neighbor.ips = find_ipv4s(block);

    neighbor.platform = guess_platform(
        neighbor.system_platform.as_deref().unwrap_or(""),
        neighbor.software.as_deref().unwrap_or(""),
    );

    if neighbor.device_name.is_empty() && neighbor.ips.is_empty() {
        return None;
    }

    neighbor.raw_advertisement = Some(block.trim().to_owned());

    Some(neighbor)
}

/// Parse `show cdp neighbor detail`-style output into neighbor records.
///
/// # Errors
///
/// `ParseEmpty` when non-empty output yields zero neighbors.
pub fn neighbors(text: &str) -> Result<Vec<Neighbor>, CrawlError> {
    let result: Vec<Neighbor> = block_separator_pattern()
        .split(text)
        .filter_map(parse_block)
        .collect();

    if result.is_empty() {
        return Err(CrawlError::ParseEmpty(String::from(
            "no neighbors found in output",
        )));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDP_DETAIL: &str = "\
-------------------------
Device ID: dist-sw02.corp.example.com
Entry address(es):
  IP address: 10.0.0.2
Platform: cisco WS-C3750X-48P,  Capabilities: Switch IGMP
Interface: GigabitEthernet1/0/1,  Port ID (outgoing port): GigabitEthernet0/24
Holdtime : 143 sec

Version :
Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.2(4)E6
advertisement version: 2

-------------------------
Device ID: n9k-leaf01(FOC1234ABCD)
System Name: n9k-leaf01
Entry address(es):
  IP address: 10.0.0.3
  IP address: 10.255.0.3
Platform: N9K-C9396PX,  Capabilities: Router Switch
Interface: GigabitEthernet1/0/2,  Port ID (outgoing port): Ethernet1/47
Holdtime : 155 sec

Version :
Cisco Nexus Operating System (NX-OS) Software, Version 7.0(3)I7(6)
";

    #[test]
    fn blocks_split_and_parse() {
        let parsed = neighbors(CDP_DETAIL).unwrap();

        assert_eq!(parsed.len(), 2);

        assert_eq!(parsed[0].device_name, "dist-sw02");
        assert_eq!(parsed[0].ips, vec![String::from("10.0.0.2")]);
        assert_eq!(
            parsed[0].system_platform.as_deref(),
            Some("cisco WS-C3750X-48P")
        );
        assert_eq!(
            parsed[0].source_interface.as_deref(),
            Some("GigabitEthernet1/0/1")
        );
        assert_eq!(
            parsed[0].neighbor_interface.as_deref(),
            Some("GigabitEthernet0/24")
        );
        assert_eq!(parsed[0].platform, Platform::CiscoIos);
        assert!(parsed[0]
            .software
            .as_deref()
            .unwrap()
            .starts_with("Cisco IOS Software"));
    }

    #[test]
    fn system_name_preferred_and_cleaned() {
        let parsed = neighbors(CDP_DETAIL).unwrap();

        assert_eq!(parsed[1].device_name, "n9k-leaf01");
        assert_eq!(parsed[1].ips.len(), 2);
        // first address is the management ip
        assert_eq!(parsed[1].ips[0], "10.0.0.3");
        assert_eq!(parsed[1].platform, Platform::CiscoNxos);
    }

    #[test]
    fn garbage_is_parse_empty() {
        let err = neighbors("% CDP is not enabled").unwrap_err();

        assert!(matches!(err, CrawlError::ParseEmpty(_)));
    }

    #[test]
    fn name_cleaning_rules() {
        assert_eq!(clean_device_name("sw1.example.com"), "sw1");
        assert_eq!(clean_device_name("n9k(FOC123)"), "n9k");
        assert_eq!(clean_device_name("plain"), "plain");
    }
}
