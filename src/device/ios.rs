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
};
use crate::session::{
    Retry,
    Session,
};
use log::debug;

/// The probe for classic IOS / IOS-XE devices. Everything is plain-text scraping; the config is
/// the source of truth for interfaces.
pub struct IosProbe;

impl DeviceProbe for IosProbe {
    fn platform(&self) -> Platform {
        Platform::CiscoIos
    }

    fn prepare(
        &self,
        session: &mut Session,
    ) -> Result<(), CrawlError> {
        session.send_expect("terminal length 0", &Retry::default(), None)?;
        session.send_expect("terminal width 511", &Retry::default(), None)?;

        Ok(())
    }

    fn get_config(
        &self,
        session: &mut Session,
    ) -> Result<String, CrawlError> {
        session.send_expect("show run", &Retry::default(), Some(config_big_enough))
    }

    fn parse_hostname(
        &self,
        config_text: &str,
    ) -> Result<String, CrawlError> {
        config::hostname(config_text)
    }

    fn get_interfaces(
        &self,
        _session: &mut Session,
        config_text: &str,
    ) -> Result<Vec<Interface>, CrawlError> {
        config::interfaces(config_text)
    }

    fn get_serials(
        &self,
        session: &mut Session,
    ) -> Result<Vec<Serial>, CrawlError> {
        // parse only this attempt's output -- a failed fetch must not leave us chewing on text
        // from an earlier attempt
        let output = session.send_expect("show inventory", &Retry::default(), None)?;

        inventory::serials_ios(&output)
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
        // modern spelling first, the hyphenated one for 12.x era gear
        let output = session.send_expect("show mac address-table", &Retry::default(), None)?;

        if output.to_lowercase().contains("invalid input") {
            debug!(
                "'show mac address-table' rejected by {}, trying hyphenated spelling",
                session.host
            );

            let output =
                session.send_expect("show mac-address-table", &Retry::default(), None)?;

            return mac::mac_table(&output);
        }

        mac::mac_table(&output)
    }
}
