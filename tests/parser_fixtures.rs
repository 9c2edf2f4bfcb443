//! Full captured-output fixtures pushed through the parser surface the way the pipeline does
//! it: config first, then the per-command outputs, assembled onto one device record.

use netcrawl::device::model::{
    Device,
    MAC_STUB_MARKER,
};
use netcrawl::device::platform::Platform;
use netcrawl::parse::{
    config,
    inventory,
    mac,
    neighbor,
};

const RUNNING_CONFIG: &str = "\
Building configuration...

Current configuration : 8742 bytes
!
version 15.2
service timestamps debug datetime msec
hostname dist-sw02
!
boot-start-marker
!
interface GigabitEthernet1/0/1
 description access uplink
 ip address 10.10.1.1 255.255.255.0
 standby 1 ip 10.10.1.254
!
interface GigabitEthernet1/0/24
 description to core
 ip address 10.0.0.2 255.255.255.252
!
interface Vlan200
 ip address 172.16.200.1/24
!
line con 0
line vty 0 4
!
end
";

const SHOW_INVENTORY: &str = r#"NAME: "1", DESCR: "WS-C3750X-48P"
PID: WS-C3750X-48P-L   , VID: V04  , SN: FDO1709K1AB

NAME: "Switch 1 - Power Supply 0", DESCR: "FRU Power Supply"
PID: C3KX-PWR-715WAC   , VID: V01  , SN: LIT17300XYZ
"#;

const SHOW_MAC: &str = "\
          Mac Address Table
-------------------------------------------

Vlan    Mac Address       Type        Ports
----    -----------       --------    -----
 All    ffff.ffff.ffff    STATIC      CPU
 200    aabb.ccdd.0001    DYNAMIC     Gi1/0/1
 200    aabb.ccdd.0002    DYNAMIC     Gi1/0/1
 200    aabb.ccdd.0003    DYNAMIC     Drop7/7
";

const SHOW_CDP: &str = "\
-------------------------
Device ID: core-sw01.corp.example.com
Entry address(es):
  IP address: 10.0.0.1
Platform: cisco WS-C6509-E,  Capabilities: Router Switch IGMP
Interface: GigabitEthernet1/0/24,  Port ID (outgoing port): GigabitEthernet2/1
Holdtime : 132 sec

Version :
Cisco IOS Software, s72033_rp Software, Version 15.1(2)SY11
advertisement version: 2
";

/// Assemble the device the way pipeline steps do, minus the session.
fn build_device() -> Device {
    let mut device = Device::new("10.0.0.2", Platform::CiscoIos);

    device.raw_config = RUNNING_CONFIG.to_owned();
    device.device_name = config::hostname(RUNNING_CONFIG).unwrap();

    device.merge_interfaces(config::interfaces(RUNNING_CONFIG).unwrap());

    device.serials = inventory::serials_ios(SHOW_INVENTORY).unwrap();

    for ip in config::other_ips(RUNNING_CONFIG) {
        device.add_ip(&ip);
    }

    let parsed = neighbor::neighbors(SHOW_CDP).unwrap();
    device.raw_neighbors = SHOW_CDP.to_owned();
    device.attach_neighbors(parsed);

    device.attach_mac_entries(mac::mac_table(SHOW_MAC).unwrap());

    device.normalize_netmasks();
    device.compute_network_addresses();

    device
}

#[test]
fn full_fixture_assembles_one_device() {
    let device = build_device();

    assert_eq!(device.device_name, "dist-sw02");
    assert_eq!(device.interfaces.len(), 4); // 3 configured + 1 mac stub
    assert_eq!(device.serials.len(), 2);

    // unique name is deterministic over the two serials
    let unique = device.unique_name().unwrap();
    assert!(unique.starts_with("dist-sw02_"));
    assert_eq!(unique, build_device().unique_name().unwrap());
}

#[test]
fn mac_entries_attach_to_expanded_interface() {
    let device = build_device();

    let access = device
        .interfaces
        .iter()
        .find(|i| i.name == "GigabitEthernet1/0/1")
        .unwrap();

    // both Gi1/0/1 entries expanded onto the full name; broadcast row never landed
    assert_eq!(access.macs.len(), 2);
    assert!(access.macs.iter().all(|m| m.mac.starts_with("AABB.CCDD")));

    // the unmatched token got a stub
    let stub = device
        .interfaces
        .iter()
        .find(|i| i.name == "Drop7/7")
        .unwrap();

    assert_eq!(stub.description.as_deref(), Some(MAC_STUB_MARKER));
}

#[test]
fn neighbor_attaches_to_source_interface() {
    let device = build_device();

    let uplink = device
        .interfaces
        .iter()
        .find(|i| i.name == "GigabitEthernet1/0/24")
        .unwrap();

    assert_eq!(uplink.neighbors.len(), 1);

    let core = &uplink.neighbors[0];

    assert_eq!(core.device_name, "core-sw01");
    assert_eq!(core.management_ip(), Some("10.0.0.1"));
    assert_eq!(core.platform, Platform::CiscoIos);

    // nothing left dangling at device level
    assert!(device.neighbors.is_empty());
}

#[test]
fn network_math_runs_at_end_of_assembly() {
    let device = build_device();

    let vlan = device
        .interfaces
        .iter()
        .find(|i| i.name == "Vlan200")
        .unwrap();

    // configured as /24, normalized to dotted, then ANDed
    assert_eq!(vlan.netmask.as_deref(), Some("255.255.255.0"));
    assert_eq!(vlan.network_ip.as_deref(), Some("172.16.200.0"));

    let uplink = device
        .interfaces
        .iter()
        .find(|i| i.name == "GigabitEthernet1/0/24")
        .unwrap();

    assert_eq!(uplink.network_ip.as_deref(), Some("10.0.0.0"));

    // the standby address surfaced as an other-ip
    assert_eq!(device.other_ips, vec![String::from("10.10.1.254")]);
    assert!(device.get_ips().contains(&String::from("10.10.1.254")));
}
