use clap::{
    ArgGroup,
    Parser,
};
use std::path::PathBuf;

/// Recursive network topology discovery crawler for cisco ios/nx-os estates.
///
/// Exactly one run mode is required: a recursive crawl, a single-device poll, a network sweep,
/// or credential management.
#[derive(Debug, Parser)]
#[command(name = "netcrawl", version, about)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["recursive", "single", "netscan", "manage"])
))]
pub struct Cli {
    /// Run a recursive crawl from the pending queue (optionally seeded with --target).
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Poll a single device; requires --target.
    #[arg(short = 'S', long, requires = "target")]
    pub single: bool,

    /// Sweep a network range for live management ports and enqueue responders; requires
    /// --target.
    #[arg(short = 'N', long, requires = "target")]
    pub netscan: bool,

    /// Manage stored credentials (delegated to the external credential menu).
    #[arg(short = 'm', long)]
    pub manage: bool,

    /// Target host or network (seed IP for crawls, range for sweeps).
    #[arg(short = 't', long)]
    pub target: Option<String>,

    /// Platform hint for the seed/single target (cisco_ios, cisco_nxos).
    #[arg(short = 'p', long, default_value = "unknown")]
    pub platform: String,

    /// Console verbosity 0-6.
    #[arg(short = 'v', long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub verbosity: u8,

    /// Debug mode: optional-step failures become fatal and channel chatter is logged.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Delete both databases before starting.
    #[arg(short = 'c', long)]
    pub clean: bool,

    /// Ignore (clear) the visited table so every target is re-crawled.
    #[arg(short = 'i', long)]
    pub ignore_visited: bool,

    /// Update run: re-poll everything (implies --ignore-visited).
    #[arg(short = 'u', long)]
    pub update: bool,

    /// Treat the (ip, device name) pair as the visited identity instead of the ip alone.
    #[arg(long)]
    pub skip_named_duplicates: bool,

    /// Settings file path.
    #[arg(long, default_value = "netcrawl.yml")]
    pub settings: PathBuf,

    /// Credential file path (native YAML list; the encrypted vault is the external
    /// alternative).
    #[arg(long, default_value = "credentials.yml")]
    pub credentials: PathBuf,
}

impl Cli {
    /// Effective ignore-visited policy: `--update` implies it.
    #[must_use]
    pub const fn effective_ignore_visited(&self) -> bool {
        self.ignore_visited || self.update
    }
}
