use crate::credentials::Credential;
use crate::device::model::Device;
use crate::device::platform::Platform;
use crate::device::probe::{
    detect_platform,
    probe_for,
    DeviceProbe,
};
use crate::errors::CrawlError;
use crate::parse::config::hostname_from_prompt;
use crate::session::{
    connect,
    Retry,
    Session,
};
use crate::transport::base::{
    probe_port,
    SSH_PORT,
    TELNET_PORT,
};
use core::time::Duration;
use log::{
    debug,
    info,
    warn,
};
use std::thread;

/// Options threaded into every per-device interrogation.
#[derive(Clone)]
pub struct PipelineOptions {
    /// When true, optional-step failures are fatal for the device instead of logged-and-skipped.
    pub raise_exceptions: bool,
    /// Socket connect timeout for port probes and transports.
    pub socket_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            raise_exceptions: false,
            socket_timeout: Duration::from_secs(
                crate::transport::base::DEFAULT_TIMEOUT_SOCKET_SECONDS,
            ),
        }
    }
}

/// What one interrogation produced: the device record (possibly partial) and the error that
/// stopped it, if one did. The device is persisted only when `error` is `None`.
pub struct PipelineOutcome {
    /// The device record as far as interrogation got.
    pub device: Device,
    /// The fatal error, rendered; `None` on success.
    pub error: Option<String>,
}

impl PipelineOutcome {
    fn failed(
        mut device: Device,
        err: &CrawlError,
    ) -> Self {
        device.failed = true;
        device.log_error(&err.to_string());

        Self {
            device,
            error: Some(err.to_string()),
        }
    }
}

/// Scrape the hostname from the interactive prompt, used when the config has no hostname line.
/// Retries with increasing delay -- freshly-booted gear sometimes answers with banner garbage
/// before settling.
fn hostname_from_session(
    session: &mut Session,
    retry: &Retry,
) -> Result<String, CrawlError> {
    for attempt in 1..=retry.attempts {
        let prompt = session.get_prompt()?;

        if let Some(name) = hostname_from_prompt(&prompt) {
            return Ok(name);
        }

        debug!(
            "prompt '{prompt}' from {} yielded no hostname on attempt {attempt}",
            session.host
        );

        if attempt < retry.attempts {
            thread::sleep(retry.delay_after(attempt));
        }
    }

    Err(CrawlError::ParseEmpty(format!(
        "could not derive hostname from prompt on {}",
        session.host
    )))
}

/// Resolve the platform when the hint is unknown: open a probe session whose only job is to
/// classify the version banner, then tear it down. The real interrogation session comes after.
fn resolve_platform(
    ip: &str,
    hint: Platform,
    creds: &[Credential],
    options: &PipelineOptions,
) -> Result<Platform, CrawlError> {
    if hint.is_known() {
        return Ok(hint);
    }

    info!("platform for {ip} unknown, opening autodetect probe session");

    let mut probe_session = connect(ip, creds, None, options.socket_timeout)?;

    let detected = detect_platform(&mut probe_session);

    probe_session.disconnect();

    detected
}

/// One optional step: run it, and either log-and-continue or abort per `raise_exceptions`.
fn optional_step<F>(
    device: &mut Device,
    options: &PipelineOptions,
    step_name: &str,
    step: F,
) -> Result<(), CrawlError>
where
    F: FnOnce(&mut Device) -> Result<(), CrawlError>,
{
    match step(device) {
        Ok(()) => Ok(()),
        Err(err) => {
            warn!("optional step '{step_name}' failed on {}: {err}", device.ip);

            device.log_error(&format!("{step_name}: {err}"));

            if options.raise_exceptions {
                Err(err)
            } else {
                Ok(())
            }
        }
    }
}

fn interrogate(
    device: &mut Device,
    probe: &dyn DeviceProbe,
    session: &mut Session,
    options: &PipelineOptions,
) -> Result<(), CrawlError> {
    // -- mandatory steps, in order ------------------------------------------------------------

    session.enable(&session.credential.password.clone(), &Retry::default())?;

    probe.prepare(session)?;

    let config = probe.get_config(session)?;
    device.raw_config = config.clone();

    device.device_name = match probe.parse_hostname(&config) {
        Ok(name) => name,
        Err(err) => {
            debug!(
                "no hostname in config for {}, scraping prompt instead: {err}",
                device.ip
            );

            hostname_from_session(session, &Retry::default())?
        }
    };

    let interfaces = probe.get_interfaces(session, &config)?;
    device.merge_interfaces(interfaces);

    // -- optional steps, in order -------------------------------------------------------------

    optional_step(device, options, "version strings", |d| {
        let banner = session.send_expect("show version", &Retry::default(), None)?;

        let (system_platform, software) = crate::device::probe::version_strings(&banner);

        d.system_platform = system_platform;
        d.software = software;

        Ok(())
    })?;

    optional_step(device, options, "serials", |d| {
        d.serials = probe.get_serials(session)?;

        Ok(())
    })?;

    optional_step(device, options, "other ips", |d| {
        for ip in probe.get_other_ips(&config) {
            d.add_ip(&ip);
        }

        Ok(())
    })?;

    optional_step(device, options, "neighbors", |d| {
        let (raw, parsed) = probe.get_neighbors(session)?;

        d.raw_neighbors = raw;
        d.attach_neighbors(parsed);

        Ok(())
    })?;

    optional_step(device, options, "mac table", |d| {
        let entries = probe.get_mac_table(session)?;

        d.attach_mac_entries(entries);

        Ok(())
    })?;

    optional_step(device, options, "netmask normalization", |d| {
        d.normalize_netmasks();

        Ok(())
    })?;

    optional_step(device, options, "network addresses", |d| {
        d.compute_network_addresses();

        Ok(())
    })?;

    Ok(())
}

/// Run the full interrogation pipeline for one target: connect (autodetecting platform when the
/// hint is unknown), enable, fetch, parse, populate. The session is torn down on every exit
/// path; persistence is the dispatcher's job, never done from here.
#[must_use]
pub fn run(
    ip: &str,
    platform_hint: Platform,
    creds: &[Credential],
    options: &PipelineOptions,
) -> PipelineOutcome {
    let mut device = Device::new(ip, platform_hint);

    device.ssh_reachable = probe_port(ip, SSH_PORT, options.socket_timeout);
    device.telnet_reachable = probe_port(ip, TELNET_PORT, options.socket_timeout);

    let platform = match resolve_platform(ip, platform_hint, creds, options) {
        Ok(platform) => platform,
        Err(err) => return PipelineOutcome::failed(device, &err),
    };

    device.platform = platform;

    let Some(probe) = probe_for(platform) else {
        return PipelineOutcome::failed(
            device,
            &CrawlError::Connection(format!("no probe available for platform {platform}")),
        );
    };

    let mut session = match connect(ip, creds, None, options.socket_timeout) {
        Ok(session) => session,
        Err(err) => return PipelineOutcome::failed(device, &err),
    };

    device.credential = Some(crate::device::model::UsedCredential {
        username: session.credential.username.clone(),
        password_redacted: session.credential.redacted(),
        cred_type: format!("{:?}", session.credential.cred_type),
    });

    let result = interrogate(&mut device, probe.as_ref(), &mut session, options);

    session.disconnect();

    match result {
        Ok(()) => {
            info!("{}", device.summary());

            PipelineOutcome {
                device,
                error: None,
            }
        }
        Err(err) => PipelineOutcome::failed(device, &err),
    }
}
