#![deny(clippy::all)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::style)]
#![warn(clippy::pedantic)]
#![deny(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! netcrawl is a recursive network-topology discovery crawler: seed it with one management IP,
//! and it logs into the device (ssh first, telnet fallback), scrapes config, inventory,
//! forwarding tables and CDP advertisements, persists everything to a relational inventory, and
//! queues every advertised neighbor for the same treatment.

/// The CLI argument surface of the `netcrawl` binary.
pub mod cli;

/// Channel is the object that consumes from and writes to netcrawl transports -- the byte-level
/// plumbing under a `Session`.
pub mod channel;

/// Credential records, loading, and the (externally implemented) encrypted vault contract.
pub mod credentials;

/// Device-side types: the data model, platform tags, per-platform probes, and the
/// interrogation pipeline.
pub mod device {
    /// IOS probe implementation.
    pub mod ios;

    /// The device/interface/neighbor/serial records and their merge rules.
    pub mod model;

    /// NX-OS probe implementation.
    pub mod nxos;

    /// The ordered per-device interrogation pipeline.
    pub mod pipeline;

    /// Platform tags.
    pub mod platform;

    /// The `DeviceProbe` capability set and the platform → probe factory.
    pub mod probe;
}

/// The crawl engine: dispatcher, worker pool, and the channels between them.
pub mod engine {
    /// The single-threaded dispatcher over the task/result channels.
    pub mod dispatcher;

    /// Worker threads and the pluggable task runner.
    pub mod worker;
}

/// netcrawl errors.
pub mod errors;

/// Filesystem outputs: the event log and per-device config snapshots.
pub mod output;

/// Pure text → record parsers for everything the devices print at us.
pub mod parse {
    /// Running-config scraping: hostname, interface blocks, redundancy addresses.
    pub mod config;

    /// Interface-name splitting and partial → full matching.
    pub mod ifname;

    /// `show inventory` scraping, textual and xml forms.
    pub mod inventory;

    /// MAC forwarding-table scraping and normalization.
    pub mod mac;

    /// CDP-style neighbor advertisement scraping.
    pub mod neighbor;

    /// IPv4 and netmask helpers.
    pub mod net;

    /// Just-enough xml row scraping for the NX-OS `| xml` forms.
    pub mod xml;
}

/// Host-sweep mode: probe an address range for live management ports and enqueue responders.
pub mod scan;

/// Authenticated CLI sessions: connect with transport fallback and credential iteration,
/// command send with explicit retry records, enable-mode entry.
pub mod session;

/// Process-wide settings and the runtime filesystem layout.
pub mod settings;

/// The two durable stores: crawl state (pending/visited) and the device inventory.
pub mod store {
    /// The pending/visited tables with claim/release semantics.
    pub mod crawl;

    /// Transactional device persistence plus the support queries (MAC locator, subnets).
    pub mod inventory;
}

/// Transport module holds the base transport trait and the ssh/telnet implementations.
pub mod transport {
    /// Base transport trait, shared args, and the TCP port probe.
    pub mod base;

    /// The system-ssh-under-a-pty transport.
    pub mod ssh;

    /// The plain-TCP telnet transport.
    pub mod telnet;
}

/// netcrawl utilities.
pub mod util {
    /// Simple bytes helper functions.
    pub(crate) mod bytes;

    /// Spawning commands under a pty.
    pub(crate) mod pty;

    /// The locking byte queue used in the channel.
    pub(crate) mod queue;
}

pub use crate::device::platform::Platform;
pub use crate::errors::CrawlError;
