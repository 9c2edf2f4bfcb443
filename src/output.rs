use crate::device::model::Device;
use crate::errors::CrawlError;
use crate::settings::Settings;
use chrono::Local;
use log::debug;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Filesystem outputs of a run: the append-only event log and per-device config snapshots.
/// Event lines are short and written in one call each, so concurrent appenders can share the
/// file -- OS write atomicity is all the locking needed.
pub struct RunOutput {
    settings: Settings,
}

impl RunOutput {
    /// Create the runtime directory layout and return the output handle.
    ///
    /// # Errors
    ///
    /// Filesystem errors creating the directories.
    pub fn new(settings: Settings) -> Result<Self, CrawlError> {
        std::fs::create_dir_all(settings.devices_dir())?;

        Ok(Self { settings })
    }

    /// Append one structured event line: pretty timestamp, source tag, message.
    pub fn log_event(
        &self,
        source: &str,
        message: &str,
    ) {
        let stamp = Local::now().format(&self.settings.time_formats.pretty);

        let line = format!("{stamp} [{source}] {message}\n");

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.settings.event_log_path())
            .and_then(|mut file| file.write_all(line.as_bytes()));

        // the event log is best-effort; a full disk should not kill the crawl
        if let Err(err) = result {
            debug!("failed appending event log line: {err}");
        }
    }

    /// Write one config snapshot for a device:
    /// `<root>/netcrawl/devices/<unique_name>/<timestamp>.cfg`. Devices with no identity yet
    /// land under their management IP.
    ///
    /// # Errors
    ///
    /// Filesystem errors.
    pub fn write_config_snapshot(
        &self,
        device: &Device,
    ) -> Result<PathBuf, CrawlError> {
        let dir_name = device.unique_name().unwrap_or_else(|| device.ip.clone());

        let dir = self.settings.devices_dir().join(dir_name);

        std::fs::create_dir_all(&dir)?;

        let stamp = Local::now().format(&self.settings.time_formats.file);
        let path = dir.join(format!("{stamp}.cfg"));

        std::fs::write(&path, &device.raw_config)?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::platform::Platform;

    fn settings_under(root: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.filepaths.root_path = root.to_string_lossy().into_owned();

        settings
    }

    #[test]
    fn snapshot_lands_under_unique_name() {
        let tmp = tempfile::tempdir().unwrap();
        let output = RunOutput::new(settings_under(tmp.path())).unwrap();

        let mut device = Device::new("10.0.0.1", Platform::CiscoIos);
        device.device_name = String::from("core-sw01");
        device.raw_config = String::from("hostname core-sw01\n");

        let path = output.write_config_snapshot(&device).unwrap();

        assert!(path.to_string_lossy().contains("core-sw01"));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "hostname core-sw01\n"
        );
    }

    #[test]
    fn nameless_device_snapshots_under_ip() {
        let tmp = tempfile::tempdir().unwrap();
        let output = RunOutput::new(settings_under(tmp.path())).unwrap();

        let device = Device::new("10.0.0.7", Platform::Unknown);

        let path = output.write_config_snapshot(&device).unwrap();

        assert!(path.to_string_lossy().contains("10.0.0.7"));
    }

    #[test]
    fn event_lines_append() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = settings_under(tmp.path());
        let log_path = settings.event_log_path();

        let output = RunOutput::new(settings).unwrap();

        output.log_event("dispatch", "first line");
        output.log_event("worker-1", "second line");

        let content = std::fs::read_to_string(log_path).unwrap();

        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("[dispatch] first line"));
    }
}
