use crate::device::platform::Platform;
use crate::parse::ifname;
use crate::parse::net::{
    is_ipv4,
    network_address,
};

/// Marker placed on interface stubs synthesized for MAC entries whose interface token matched
/// nothing the config declared.
pub const MAC_STUB_MARKER: &str = "**matched from MAC address**";

/// How many hex characters of the serial hash go into the unique name.
const UNIQUE_NAME_HASH_LEN: usize = 5;

/// One hardware-inventory line from `show inventory`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Serial {
    /// Slot/component name as the device reports it.
    pub name: String,
    /// Human description of the component.
    pub description: String,
    /// Product id, when the output carried one.
    pub product_id: Option<String>,
    /// Vendor id, when the output carried one.
    pub vendor_id: Option<String>,
    /// The serial number itself.
    pub serial_number: String,
}

/// A forwarding-table row: normalized MAC plus the (possibly abbreviated) interface it was
/// learned on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MacEntry {
    /// Canonical uppercase dotted MAC (`AABB.CCDD.EEFF`).
    pub mac: String,
    /// Interface token as printed by the device.
    pub interface: String,
}

/// One advertised adjacency learned from the neighbor protocol.
#[derive(Clone, Debug, Default)]
pub struct Neighbor {
    /// Advertised device name, DNS suffix stripped.
    pub device_name: String,
    /// Advertised addresses; the first one is treated as the management IP.
    pub ips: Vec<String>,
    /// Our local interface the advertisement arrived on.
    pub source_interface: Option<String>,
    /// The neighbor's interface on the far end of the link.
    pub neighbor_interface: Option<String>,
    /// Crawlable platform tag guessed from the advertisement.
    pub platform: Platform,
    /// The platform string as advertised (`cisco WS-C3750X-48P`).
    pub system_platform: Option<String>,
    /// Software/version line from the advertisement.
    pub software: Option<String>,
    /// The raw advertisement block.
    pub raw_advertisement: Option<String>,
}

impl Neighbor {
    /// The management IP of the neighbor -- the first advertised address.
    #[must_use]
    pub fn management_ip(&self) -> Option<&str> {
        self.ips.first().map(String::as_str)
    }
}

/// One logical interface on a device.
#[derive(Clone, Debug, Default)]
pub struct Interface {
    /// Full interface name, unique per device.
    pub name: String,
    /// Alphabetic type portion of the name (`GigabitEthernet`).
    pub type_prefix: Option<String>,
    /// Numeric tail of the name (`1/0/1`).
    pub number: Option<String>,
    /// Configured address.
    pub ip: Option<String>,
    /// Dotted netmask, when configured that way.
    pub netmask: Option<String>,
    /// CIDR prefix length, when configured that way.
    pub cidr: Option<u8>,
    /// Interface description line.
    pub description: Option<String>,
    /// Virtual/standby address from a redundancy protocol.
    pub virtual_ip: Option<String>,
    /// The raw config block for the interface.
    pub raw_config: Option<String>,
    /// Network address (`ip AND mask`), computed at the end of the pipeline.
    pub network_ip: Option<String>,
    /// MAC entries learned on this interface.
    pub macs: Vec<MacEntry>,
    /// Neighbors whose advertisements arrived on this interface.
    pub neighbors: Vec<Neighbor>,
}

impl Interface {
    /// New interface with the type/number split precomputed from the name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let split = ifname::split(name);

        Self {
            name: name.to_owned(),
            type_prefix: split.as_ref().map(|s| s.prefix.clone()),
            number: split.map(|s| s.number),
            ..Self::default()
        }
    }

    /// A stub for a MAC entry that matched no configured interface.
    #[must_use]
    pub fn mac_stub(name: &str) -> Self {
        let mut interface = Self::new(name);
        interface.description = Some(String::from(MAC_STUB_MARKER));

        interface
    }

    /// Overwrite this interface with every field the newcomer actually supplies; fields the
    /// newcomer leaves unset keep their current value.
    pub fn merge(
        &mut self,
        newcomer: &Self,
    ) {
        if newcomer.type_prefix.is_some() {
            self.type_prefix = newcomer.type_prefix.clone();
        }
        if newcomer.number.is_some() {
            self.number = newcomer.number.clone();
        }
        if newcomer.ip.is_some() {
            self.ip = newcomer.ip.clone();
        }
        if newcomer.netmask.is_some() {
            self.netmask = newcomer.netmask.clone();
        }
        if newcomer.cidr.is_some() {
            self.cidr = newcomer.cidr;
        }
        if newcomer.description.is_some() {
            self.description = newcomer.description.clone();
        }
        if newcomer.virtual_ip.is_some() {
            self.virtual_ip = newcomer.virtual_ip.clone();
        }
        if newcomer.raw_config.is_some() {
            self.raw_config = newcomer.raw_config.clone();
        }
        if newcomer.network_ip.is_some() {
            self.network_ip = newcomer.network_ip.clone();
        }

        self.macs.extend(newcomer.macs.iter().cloned());
        self.neighbors.extend(newcomer.neighbors.iter().cloned());
    }
}

/// The credential that successfully authenticated to a device, with the password reduced to its
/// redacted form before it ever lands on the record.
#[derive(Clone, Debug, Default)]
pub struct UsedCredential {
    /// Username that authenticated.
    pub username: String,
    /// Redacted password rendering (prefix only).
    pub password_redacted: String,
    /// Credential type tag.
    pub cred_type: String,
}

/// One physical chassis observed on the network. Exclusively owned by the worker processing it
/// from claim until its result lands on the result channel; frozen once persisted.
#[derive(Clone, Debug, Default)]
pub struct Device {
    /// Management IP the crawl reached the device on.
    pub ip: String,
    /// Device name from the config `hostname` line (or prompt fallback).
    pub device_name: String,
    /// Vendor platform tag.
    pub platform: Platform,
    /// System platform string (`WS-C3750X-48P`).
    pub system_platform: Option<String>,
    /// Software/version string.
    pub software: Option<String>,
    /// Raw running-config text.
    pub raw_config: String,
    /// Raw neighbor advertisement text.
    pub raw_neighbors: String,
    /// Whether TCP/22 answered during the connect probe.
    pub ssh_reachable: bool,
    /// Whether TCP/23 answered during the connect probe.
    pub telnet_reachable: bool,
    /// The credential that won, redacted.
    pub credential: Option<UsedCredential>,
    /// Set when processing failed badly enough that the device must not be persisted.
    pub failed: bool,
    /// Accumulated per-device error log lines.
    pub error_log: Vec<String>,
    /// Owned interfaces.
    pub interfaces: Vec<Interface>,
    /// Owned hardware inventory lines.
    pub serials: Vec<Serial>,
    /// Neighbors that could not be attached to a specific interface.
    pub neighbors: Vec<Neighbor>,
    /// Redundancy-protocol addresses and other IPs the device answers on.
    pub other_ips: Vec<String>,
}

impl Device {
    /// New device record for the given management IP and platform hint.
    #[must_use]
    pub fn new(
        ip: &str,
        platform: Platform,
    ) -> Self {
        Self {
            ip: ip.to_owned(),
            platform,
            ..Self::default()
        }
    }

    /// Idempotent insert into the other-IPs list.
    pub fn add_ip(
        &mut self,
        ip: &str,
    ) {
        if !self.other_ips.iter().any(|existing| existing == ip) {
            self.other_ips.push(ip.to_owned());
        }
    }

    /// Union of interface IPs and other IPs, filtered to valid IPv4.
    #[must_use]
    pub fn get_ips(&self) -> Vec<String> {
        let mut result: Vec<String> = vec![];

        for interface in &self.interfaces {
            if let Some(ip) = &interface.ip {
                if is_ipv4(ip) && !result.contains(ip) {
                    result.push(ip.clone());
                }
            }
        }

        for ip in &self.other_ips {
            if is_ipv4(ip) && !result.contains(ip) {
                result.push(ip.clone());
            }
        }

        result
    }

    /// Deterministic device identity: the device name joined with the first
    /// [`UNIQUE_NAME_HASH_LEN`] hex chars of the MD5 over the sorted serial numbers. Degenerate
    /// forms when only one half exists; `None` when neither does.
    #[must_use]
    pub fn unique_name(&self) -> Option<String> {
        let serial_hash = if self.serials.is_empty() {
            None
        } else {
            let mut numbers: Vec<&str> = self
                .serials
                .iter()
                .map(|s| s.serial_number.as_str())
                .collect();
            numbers.sort_unstable();

            let digest = md5::compute(numbers.join(",").as_bytes());

            Some(format!("{digest:x}")[..UNIQUE_NAME_HASH_LEN].to_owned())
        };

        match (self.device_name.is_empty(), serial_hash) {
            (false, Some(hash)) => Some(format!("{}_{hash}", self.device_name)),
            (false, None) => Some(self.device_name.clone()),
            (true, Some(hash)) => Some(hash),
            (true, None) => None,
        }
    }

    /// Merge incoming interfaces: match by name and let the newcomer's supplied fields win;
    /// append interfaces with no current match.
    pub fn merge_interfaces(
        &mut self,
        incoming: Vec<Interface>,
    ) {
        for newcomer in incoming {
            match self
                .interfaces
                .iter_mut()
                .find(|existing| existing.name == newcomer.name)
            {
                Some(existing) => existing.merge(&newcomer),
                None => self.interfaces.push(newcomer),
            }
        }
    }

    /// Device-level neighbors followed by per-interface neighbors.
    #[must_use]
    pub fn all_neighbors(&self) -> Vec<&Neighbor> {
        let mut result: Vec<&Neighbor> = self.neighbors.iter().collect();

        for interface in &self.interfaces {
            result.extend(interface.neighbors.iter());
        }

        result
    }

    /// The full interface name a short token expands to on this device, if exactly one does.
    #[must_use]
    pub fn match_interface(
        &self,
        short: &str,
    ) -> Option<String> {
        let names: Vec<String> = self.interfaces.iter().map(|i| i.name.clone()).collect();

        ifname::partial_match(short, &names).cloned()
    }

    /// Attach MAC entries: each hangs off the interface its token expands to; tokens matching
    /// nothing get a synthetic stub interface.
    pub fn attach_mac_entries(
        &mut self,
        entries: Vec<MacEntry>,
    ) {
        for entry in entries {
            match self.match_interface(&entry.interface) {
                Some(full_name) => {
                    if let Some(interface) =
                        self.interfaces.iter_mut().find(|i| i.name == full_name)
                    {
                        interface.macs.push(entry);
                    }
                }
                None => {
                    // one stub per unmatched token; subsequent entries pile onto it
                    if let Some(stub) = self
                        .interfaces
                        .iter_mut()
                        .find(|i| i.name == entry.interface)
                    {
                        stub.macs.push(entry);
                    } else {
                        let mut stub = Interface::mac_stub(&entry.interface);
                        stub.macs.push(entry.clone());

                        self.interfaces.push(stub);
                    }
                }
            }
        }
    }

    /// Attach neighbors: each hangs off the interface its source token expands to; the rest stay
    /// on the device's top-level list.
    pub fn attach_neighbors(
        &mut self,
        incoming: Vec<Neighbor>,
    ) {
        for neighbor in incoming {
            let target = neighbor
                .source_interface
                .as_deref()
                .and_then(|source| self.match_interface(source));

            match target {
                Some(full_name) => {
                    if let Some(interface) =
                        self.interfaces.iter_mut().find(|i| i.name == full_name)
                    {
                        interface.neighbors.push(neighbor);
                    }
                }
                None => self.neighbors.push(neighbor),
            }
        }
    }

    /// Normalize CIDR-configured interfaces to dotted netmasks so downstream consumers see one
    /// form.
    pub fn normalize_netmasks(&mut self) {
        for interface in &mut self.interfaces {
            if interface.netmask.is_none() {
                if let Some(prefix) = interface.cidr {
                    if let Ok(mask) = crate::parse::net::cidr_to_netmask(prefix) {
                        interface.netmask = Some(mask);
                    }
                }
            }
        }
    }

    /// Compute `network_ip = ip AND mask` for every interface that has both pieces.
    pub fn compute_network_addresses(&mut self) {
        for interface in &mut self.interfaces {
            let (Some(ip), Some(mask)) = (&interface.ip, &interface.netmask) else {
                continue;
            };

            if let Ok(network) = network_address(ip, mask) {
                interface.network_ip = Some(network);
            }
        }
    }

    /// Append a line to the device's error log.
    pub fn log_error(
        &mut self,
        message: &str,
    ) {
        self.error_log.push(message.to_owned());
    }

    /// Count of MAC entries across all interfaces.
    #[must_use]
    pub fn mac_count(&self) -> usize {
        self.interfaces.iter().map(|i| i.macs.len()).sum()
    }

    /// One-line summary for the console: name, unique name, IP, child counts, config size.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} ({}) {} - {} serials, {} interfaces, {} neighbors, {} macs, {} config bytes",
            if self.device_name.is_empty() {
                "<unnamed>"
            } else {
                &self.device_name
            },
            self.unique_name().unwrap_or_else(|| String::from("-")),
            self.ip,
            self.serials.len(),
            self.interfaces.len(),
            self.all_neighbors().len(),
            self.mac_count(),
            self.raw_config.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial(number: &str) -> Serial {
        Serial {
            name: String::from("Chassis"),
            description: String::from("test"),
            product_id: None,
            vendor_id: None,
            serial_number: number.to_owned(),
        }
    }

    #[test]
    fn unique_name_requires_name_or_serial() {
        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);

        assert_eq!(device.unique_name(), None);

        device.device_name = String::from("core-sw01");
        assert_eq!(device.unique_name().as_deref(), Some("core-sw01"));

        device.serials.push(serial("FDO1709K1AB"));
        let with_hash = device.unique_name().unwrap();

        assert!(with_hash.starts_with("core-sw01_"));
        assert_eq!(with_hash.len(), "core-sw01_".len() + 5);
    }

    #[test]
    fn unique_name_is_deterministic_and_order_independent() {
        let mut a = Device::new("10.0.0.1", Platform::CiscoIos);
        a.device_name = String::from("sw");
        a.serials.push(serial("AAA"));
        a.serials.push(serial("BBB"));

        let mut b = Device::new("10.0.0.2", Platform::CiscoIos);
        b.device_name = String::from("sw");
        b.serials.push(serial("BBB"));
        b.serials.push(serial("AAA"));

        assert_eq!(a.unique_name(), b.unique_name());
        assert_eq!(a.unique_name(), a.unique_name());
    }

    #[test]
    fn different_serials_same_name_diverge() {
        let mut a = Device::new("10.0.0.1", Platform::CiscoIos);
        a.device_name = String::from("sw");
        a.serials.push(serial("AAA"));

        let mut b = Device::new("10.0.0.2", Platform::CiscoIos);
        b.device_name = String::from("sw");
        b.serials.push(serial("ZZZ"));

        assert_ne!(a.unique_name(), b.unique_name());
    }

    #[test]
    fn merge_interfaces_unions_names_and_newcomer_wins() {
        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);

        let mut old = Interface::new("GigabitEthernet1/0/1");
        old.ip = Some(String::from("10.0.0.1"));
        old.description = Some(String::from("old description"));
        device.interfaces.push(old);

        let mut newcomer = Interface::new("GigabitEthernet1/0/1");
        newcomer.description = Some(String::from("new description"));

        let fresh = Interface::new("Vlan100");

        device.merge_interfaces(vec![newcomer, fresh]);

        assert_eq!(device.interfaces.len(), 2);

        let merged = &device.interfaces[0];
        // newcomer supplied description -> overwritten; did not supply ip -> kept
        assert_eq!(merged.description.as_deref(), Some("new description"));
        assert_eq!(merged.ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn add_ip_is_idempotent() {
        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);

        device.add_ip("10.0.0.254");
        device.add_ip("10.0.0.254");

        assert_eq!(device.other_ips.len(), 1);
    }

    #[test]
    fn get_ips_filters_invalid() {
        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);

        let mut interface = Interface::new("Vlan1");
        interface.ip = Some(String::from("10.1.1.1"));
        device.interfaces.push(interface);

        device.other_ips.push(String::from("not-an-ip"));
        device.other_ips.push(String::from("10.2.2.2"));

        assert_eq!(
            device.get_ips(),
            vec![String::from("10.1.1.1"), String::from("10.2.2.2")]
        );
    }

    #[test]
    fn mac_attachment_expands_or_stubs() {
        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);
        device
            .interfaces
            .push(Interface::new("GigabitEthernet1/0/1"));

        device.attach_mac_entries(vec![
            MacEntry {
                mac: String::from("AABB.CCDD.EEFF"),
                interface: String::from("Gi1/0/1"),
            },
            MacEntry {
                mac: String::from("0011.2233.4455"),
                interface: String::from("Po99"),
            },
        ]);

        assert_eq!(device.interfaces[0].macs.len(), 1);

        let stub = device.interfaces.iter().find(|i| i.name == "Po99").unwrap();

        assert_eq!(stub.description.as_deref(), Some(MAC_STUB_MARKER));
        assert_eq!(stub.macs.len(), 1);
    }

    #[test]
    fn neighbor_attachment_prefers_interface() {
        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);
        device
            .interfaces
            .push(Interface::new("GigabitEthernet1/0/1"));

        let mut attached = Neighbor::default();
        attached.device_name = String::from("peer1");
        attached.source_interface = Some(String::from("Gi1/0/1"));

        let mut unattached = Neighbor::default();
        unattached.device_name = String::from("peer2");
        unattached.source_interface = Some(String::from("Gi9/9/9"));

        device.attach_neighbors(vec![attached, unattached]);

        assert_eq!(device.interfaces[0].neighbors.len(), 1);
        assert_eq!(device.neighbors.len(), 1);
        assert_eq!(device.all_neighbors().len(), 2);
        // device-level first, then per-interface
        assert_eq!(device.all_neighbors()[0].device_name, "peer2");
    }

    #[test]
    fn netmask_normalization_and_network_math() {
        let mut device = Device::new("10.0.0.1", Platform::CiscoNxos);

        let mut interface = Interface::new("Vlan100");
        interface.ip = Some(String::from("172.16.100.2"));
        interface.cidr = Some(24);
        device.interfaces.push(interface);

        device.normalize_netmasks();
        device.compute_network_addresses();

        let interface = &device.interfaces[0];

        assert_eq!(interface.netmask.as_deref(), Some("255.255.255.0"));
        assert_eq!(interface.network_ip.as_deref(), Some("172.16.100.0"));
    }
}
