use crate::device::ios::IosProbe;
use crate::device::model::{
    Interface,
    MacEntry,
    Neighbor,
    Serial,
};
use crate::device::nxos::NxosProbe;
use crate::device::platform::Platform;
use crate::errors::CrawlError;
use crate::parse::config::MIN_CONFIG_BYTES;
use crate::session::{
    Retry,
    Session,
};
use log::debug;

/// The capability set every crawlable platform implements. One implementation per CLI dialect;
/// they share helpers by calling into the same parse functions, not by inheriting from each
/// other -- the dispatcher maps a platform tag to an implementation via [`probe_for`].
pub trait DeviceProbe {
    /// The platform this probe speaks.
    fn platform(&self) -> Platform;

    /// Put the remote terminal into a scrape-friendly state (no paging, wide output).
    ///
    /// # Errors
    ///
    /// Transport/CLI errors pass through; the pipeline treats failure here as fatal since every
    /// later fetch would arrive paged.
    fn prepare(
        &self,
        session: &mut Session,
    ) -> Result<(), CrawlError>;

    /// Fetch the running configuration. Must retry until the output clears the minimum size
    /// threshold.
    ///
    /// # Errors
    ///
    /// `CliCommand` when the config never clears the threshold.
    fn get_config(
        &self,
        session: &mut Session,
    ) -> Result<String, CrawlError>;

    /// Extract the hostname from config text.
    ///
    /// # Errors
    ///
    /// `ParseEmpty` when the config carries no hostname -- callers fall back to the prompt.
    fn parse_hostname(
        &self,
        config: &str,
    ) -> Result<String, CrawlError>;

    /// Collect interface records, from config text or a richer device command.
    ///
    /// # Errors
    ///
    /// `ParseEmpty` when no interfaces can be found -- fatal for the device, a chassis with no
    /// interfaces is not a device we can do anything with.
    fn get_interfaces(
        &self,
        session: &mut Session,
        config: &str,
    ) -> Result<Vec<Interface>, CrawlError>;

    /// Collect hardware inventory serials.
    ///
    /// # Errors
    ///
    /// `CliCommand`/`ParseEmpty` per the usual taxonomy; optional step, the pipeline decides
    /// fatality.
    fn get_serials(
        &self,
        session: &mut Session,
    ) -> Result<Vec<Serial>, CrawlError>;

    /// Redundancy-protocol (hsrp/glbp/standby) addresses from config.
    fn get_other_ips(
        &self,
        config: &str,
    ) -> Vec<String>;

    /// Fetch and parse neighbor advertisements. Returns the raw text alongside the records so
    /// the device keeps the evidence.
    ///
    /// # Errors
    ///
    /// `CliCommand`/`ParseEmpty` per the usual taxonomy; optional step.
    fn get_neighbors(
        &self,
        session: &mut Session,
    ) -> Result<(String, Vec<Neighbor>), CrawlError>;

    /// Fetch and parse the MAC forwarding table.
    ///
    /// # Errors
    ///
    /// `CliCommand`/`ParseEmpty` per the usual taxonomy; optional step.
    fn get_mac_table(
        &self,
        session: &mut Session,
    ) -> Result<Vec<MacEntry>, CrawlError>;
}

/// Map a platform tag to its probe implementation. `Unknown` has no probe -- autodetect first.
#[must_use]
pub fn probe_for(platform: Platform) -> Option<Box<dyn DeviceProbe + Send>> {
    match platform {
        Platform::CiscoIos => Some(Box::new(IosProbe)),
        Platform::CiscoNxos => Some(Box::new(NxosProbe)),
        Platform::Unknown => None,
    }
}

/// Check predicate for config fetches: output must clear the minimum size threshold before we
/// believe it is a running-config and not a banner or paging artifact.
#[must_use]
pub fn config_big_enough(output: &str) -> bool {
    output.len() >= MIN_CONFIG_BYTES
}

/// Pull the software description and hardware platform strings out of a `show version` banner:
/// the first line naming the operating system, and the first line opening with `cisco <model>`.
#[must_use]
pub fn version_strings(banner: &str) -> (Option<String>, Option<String>) {
    let mut software = None;
    let mut system_platform = None;

    for line in banner.lines() {
        let trimmed = line.trim();

        if software.is_none()
            && (trimmed.contains("Software") || trimmed.contains("Operating System"))
        {
            software = Some(trimmed.to_owned());
        }

        if system_platform.is_none() && trimmed.to_lowercase().starts_with("cisco ") {
            // "cisco WS-C3750X-48P (PowerPC405) processor ..." -- the model is the second token
            let model: Vec<&str> = trimmed.split_whitespace().take(2).collect();

            system_platform = Some(model.join(" ").trim_end_matches(',').to_owned());
        }

        if software.is_some() && system_platform.is_some() {
            break;
        }
    }

    (system_platform, software)
}

/// Classify a `show version` banner into a platform tag.
#[must_use]
pub fn classify_version_banner(banner: &str) -> Platform {
    let lowered = banner.to_lowercase();

    if lowered.contains("nx-os") || lowered.contains("nexus") {
        return Platform::CiscoNxos;
    }

    if lowered.contains("ios") {
        return Platform::CiscoIos;
    }

    Platform::Unknown
}

/// Autodetect the platform of an already-open session by scraping the `show version` banner.
/// This is the probe session's only job; the worker re-dispatches to the concrete probe
/// afterwards.
///
/// # Errors
///
/// `CliCommand` when the banner cannot be fetched, `ParseEmpty` when it matches no known
/// platform signature.
pub fn detect_platform(session: &mut Session) -> Result<Platform, CrawlError> {
    let banner = session.send_expect("show version", &Retry::default(), None)?;

    let platform = classify_version_banner(&banner);

    debug!(
        "platform autodetect on {} classified banner as {}",
        session.host, platform
    );

    if platform.is_known() {
        Ok(platform)
    } else {
        Err(CrawlError::ParseEmpty(format!(
            "version banner from {} matched no known platform",
            session.host
        )))
    }
}
