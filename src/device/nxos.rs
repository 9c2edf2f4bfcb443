use crate::device::model::{
    Interface,
    MacEntry,
    Neighbor,
    Serial,
};
use crate::device::platform::Platform;
use crate::device::probe::{
    config_big_enough,
    DeviceProbe,
};
use crate::errors::CrawlError;
use crate::parse::{
    config,
    inventory,
    mac,
    neighbor,
    xml,
};
use crate::session::{
    Retry,
    Session,
};
use log::debug;

/// The probe for NX-OS (Nexus) devices. Prefers the structured `| xml` forms where the platform
/// offers them, falling back to the same config-block scraping the IOS probe uses.
pub struct NxosProbe;

/// Build interface records from `show interface | xml` row maps.
fn interfaces_from_xml(text: &str) -> Result<Vec<Interface>, CrawlError> {
    let mut result = vec![];

    for row in xml::rows(text, "ROW_interface") {
        let Some(name) = row.get("interface").filter(|n| !n.is_empty()) else {
            continue;
        };

        let mut interface = Interface::new(name);

        if let Some(desc) = row.get("desc").filter(|d| !d.is_empty()) {
            interface.description = Some(desc.clone());
        }

        if let Some(ip) = row.get("eth_ip_addr").filter(|i| !i.is_empty()) {
            interface.ip = Some(ip.clone());
        }

        if let Some(prefix) = row.get("eth_ip_mask").filter(|m| !m.is_empty()) {
            interface.cidr = prefix.parse().ok();
        }

        result.push(interface);
    }

    if result.is_empty() {
        return Err(CrawlError::ParseEmpty(String::from(
            "xml interface output contained no usable rows",
        )));
    }

    Ok(result)
}

impl DeviceProbe for NxosProbe {
    fn platform(&self) -> Platform {
        Platform::CiscoNxos
    }

    fn prepare(
        &self,
        session: &mut Session,
    ) -> Result<(), CrawlError> {
        session.send_expect("terminal length 0", &Retry::default(), None)?;

        Ok(())
    }

    fn get_config(
        &self,
        session: &mut Session,
    ) -> Result<String, CrawlError> {
        session.send_expect(
            "show running-config",
            &Retry::default(),
            Some(config_big_enough),
        )
    }

    fn parse_hostname(
        &self,
        config_text: &str,
    ) -> Result<String, CrawlError> {
        config::hostname(config_text)
    }

    fn get_interfaces(
        &self,
        session: &mut Session,
        config_text: &str,
    ) -> Result<Vec<Interface>, CrawlError> {
        match session.send_expect("show interface | xml", &Retry::default(), None) {
            Ok(output) if output.contains("<ROW_interface>") => interfaces_from_xml(&output),
            Ok(_) | Err(_) => {
                debug!(
                    "xml interface fetch unusable on {}, falling back to config blocks",
                    session.host
                );

                config::interfaces(config_text)
            }
        }
    }

    fn get_serials(
        &self,
        session: &mut Session,
    ) -> Result<Vec<Serial>, CrawlError> {
        let output = session.send_expect("show inventory | xml", &Retry::default(), None)?;

        // tolerates both the xml rows and the textual fallback some builds emit despite the pipe
        inventory::serials_nxos(&output)
    }

    fn get_other_ips(
        &self,
        config_text: &str,
    ) -> Vec<String> {
        config::other_ips(config_text)
    }

    fn get_neighbors(
        &self,
        session: &mut Session,
    ) -> Result<(String, Vec<Neighbor>), CrawlError> {
        let raw = session.send_expect("show cdp neighbor detail", &Retry::default(), None)?;

        let parsed = neighbor::neighbors(&raw)?;

        Ok((raw, parsed))
    }

    fn get_mac_table(
        &self,
        session: &mut Session,
    ) -> Result<Vec<MacEntry>, CrawlError> {
        let output = session.send_expect("show mac address-table", &Retry::default(), None)?;

        mac::mac_table(&output)
    }
}
