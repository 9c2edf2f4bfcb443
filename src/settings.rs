use crate::errors::CrawlError;
use serde::{
    Deserialize,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};

/// Default chrono format for human-facing timestamps (console, event log).
pub const DEFAULT_PRETTY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default chrono format for timestamps embedded in filenames (config snapshots).
pub const DEFAULT_FILE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Multiplier applied to the CPU count to get the default worker pool size. Workers spend nearly
/// all their time blocked on remote CLIs, so heavy oversubscription is the point.
pub const WORKERS_PER_CPU: usize = 16;

/// The `options` section of the settings file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Enables debug behavior (verbose channel logging, keep partial output on failures).
    pub debug: bool,
    /// Console verbosity 0-6 -- see [`Settings::level_filter`].
    pub verbosity: u8,
    /// Worker pool size override. When unset the pool is CPU count x [`WORKERS_PER_CPU`].
    pub workers: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            debug: false,
            verbosity: 3,
            workers: None,
        }
    }
}

/// One `*_database` section. The embedded engine only consumes `dbname` (the database file under
/// the run root); `server`, `port` and `username` are carried for compatibility with the external
/// credential vault contract, which stores a matching record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Host the legacy deployments pointed at. Unused by the embedded engine.
    pub server: String,
    /// Port the legacy deployments pointed at. Unused by the embedded engine.
    pub port: u16,
    /// Database file name, created under `<root_path>/netcrawl/`.
    pub dbname: String,
    /// Username recorded in the vault contract. Unused by the embedded engine.
    pub username: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            server: String::from("localhost"),
            port: 0,
            dbname: String::from("main.db"),
            username: String::from("netcrawl"),
        }
    }
}

/// The `time_formats` section -- chrono format strings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeFormats {
    /// Human-facing timestamp format.
    pub pretty: String,
    /// Filename-safe timestamp format.
    pub file: String,
}

impl Default for TimeFormats {
    fn default() -> Self {
        Self {
            pretty: String::from(DEFAULT_PRETTY_TIME_FORMAT),
            file: String::from(DEFAULT_FILE_TIME_FORMAT),
        }
    }
}

/// The `filepaths` section.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePaths {
    /// Root under which the `netcrawl/` runtime directory (logs, databases, device configs) is
    /// created.
    pub root_path: String,
}

impl Default for FilePaths {
    fn default() -> Self {
        Self {
            root_path: String::from("."),
        }
    }
}

/// Process-wide settings, loaded once at startup and handed to workers by snapshot (`Arc`).
/// Workers never mutate settings -- anything runtime-variable lives elsewhere.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// General options.
    pub options: Options,
    /// Crawl-state database section (pending/visited).
    pub main_database: DatabaseSection,
    /// Inventory database section (devices and children).
    pub inventory_database: DatabaseSection,
    /// Timestamp format strings.
    pub time_formats: TimeFormats,
    /// Filesystem layout.
    pub filepaths: FilePaths,
}

impl Settings {
    /// Load settings from a YAML file. A missing file yields the defaults -- the legacy
    /// key=value loader is an external collaborator, this is the native format.
    ///
    /// # Errors
    ///
    /// Returns `CrawlError::Config` when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CrawlError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|err| {
            CrawlError::Config(format!("failed reading settings file {path:?}: {err}"))
        })?;

        serde_yaml::from_str(&raw).map_err(|err| {
            CrawlError::Config(format!("failed parsing settings file {path:?}: {err}"))
        })
    }

    /// The runtime directory: `<root_path>/netcrawl/`.
    #[must_use]
    pub fn run_root(&self) -> PathBuf {
        PathBuf::from(&self.filepaths.root_path).join("netcrawl")
    }

    /// Directory holding one subdirectory of config snapshots per device.
    #[must_use]
    pub fn devices_dir(&self) -> PathBuf {
        self.run_root().join("devices")
    }

    /// The append-only event log file.
    #[must_use]
    pub fn event_log_path(&self) -> PathBuf {
        self.run_root().join("netcrawl.log")
    }

    /// Path of the crawl-state database file.
    #[must_use]
    pub fn main_db_path(&self) -> PathBuf {
        self.run_root().join(&self.main_database.dbname)
    }

    /// Path of the inventory database file.
    #[must_use]
    pub fn inventory_db_path(&self) -> PathBuf {
        self.run_root().join(&self.inventory_database.dbname)
    }

    /// Effective worker pool size.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.options
            .workers
            .unwrap_or_else(|| num_cpus::get() * WORKERS_PER_CPU)
    }

    /// Maps verbosity 0-6 onto a `log::LevelFilter`.
    #[must_use]
    pub const fn level_filter(&self) -> log::LevelFilter {
        match self.options.verbosity {
            0 => log::LevelFilter::Off,
            1 => log::LevelFilter::Error,
            2 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Info,
            4 | 5 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}
