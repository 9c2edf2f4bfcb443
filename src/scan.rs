use crate::device::platform::Platform;
use crate::errors::CrawlError;
use crate::store::crawl::{
    CrawlStore,
    PendingRecord,
};
use crate::transport::base::{
    probe_port,
    SSH_PORT,
    TELNET_PORT,
};
use core::time::Duration;
use crossbeam_channel::unbounded;
use ipnet::Ipv4Net;
use log::{
    debug,
    info,
};
use std::net::Ipv4Addr;
use std::thread;

/// Concurrency bound for sweep probes. Port probing is cheap; this mostly caps file
/// descriptors.
const SWEEP_WORKERS: usize = 32;

/// Connect timeout per probed port during a sweep -- tighter than crawl connects, a sweep wants
/// breadth over patience.
const SWEEP_TIMEOUT: Duration = Duration::from_millis(750);

/// What a sweep did.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepSummary {
    /// Addresses probed.
    pub probed: usize,
    /// Hosts with at least one management port open.
    pub responders: usize,
}

/// Expand a sweep target -- a bare address or a CIDR network -- into the host list to probe.
///
/// # Errors
///
/// `Config` when the target is neither form.
pub fn expand_target(target: &str) -> Result<Vec<Ipv4Addr>, CrawlError> {
    if let Ok(addr) = target.parse::<Ipv4Addr>() {
        return Ok(vec![addr]);
    }

    if let Ok(net) = target.parse::<Ipv4Net>() {
        return Ok(net.hosts().collect());
    }

    Err(CrawlError::Config(format!(
        "'{target}' is neither an ipv4 address nor a cidr network"
    )))
}

/// Probe a single host's management ports. Returns true when either answers.
fn host_responds(addr: Ipv4Addr) -> bool {
    let host = addr.to_string();

    probe_port(&host, SSH_PORT, SWEEP_TIMEOUT) || probe_port(&host, TELNET_PORT, SWEEP_TIMEOUT)
}

/// Sweep an address range: probe every host for open management ports and enqueue responders as
/// crawl targets with platform `unknown` (the crawl autodetects when it gets there).
///
/// # Errors
///
/// `Config` for a malformed target; store errors from the enqueue.
pub fn sweep(
    target: &str,
    store: &CrawlStore,
) -> Result<SweepSummary, CrawlError> {
    let hosts = expand_target(target)?;

    info!("sweeping {} hosts from target '{target}'", hosts.len());

    let (address_sender, address_receiver) = unbounded::<Ipv4Addr>();
    let (found_sender, found_receiver) = unbounded::<Ipv4Addr>();

    for host in &hosts {
        // unbounded send to live receivers cannot fail
        let _ = address_sender.send(*host);
    }

    drop(address_sender);

    let worker_count = SWEEP_WORKERS.min(hosts.len().max(1));

    let mut handles = Vec::with_capacity(worker_count);

    for _ in 0..worker_count {
        let address_receiver = address_receiver.clone();
        let found_sender = found_sender.clone();

        handles.push(thread::spawn(move || {
            while let Ok(addr) = address_receiver.recv() {
                if host_responds(addr) {
                    let _ = found_sender.send(addr);
                } else {
                    debug!("{addr} has no management ports open");
                }
            }
        }));
    }

    drop(found_sender);

    let mut summary = SweepSummary {
        probed: hosts.len(),
        responders: 0,
    };

    while let Ok(addr) = found_receiver.recv() {
        summary.responders += 1;

        store.add_pending(&PendingRecord::seed(&addr.to_string(), Platform::Unknown))?;
    }

    for handle in handles {
        let _ = handle.join();
    }

    info!(
        "sweep complete: {} probed, {} responders enqueued",
        summary.probed, summary.responders
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_address_expands_to_itself() {
        let hosts = expand_target("10.0.0.1").unwrap();

        assert_eq!(hosts, vec!["10.0.0.1".parse::<Ipv4Addr>().unwrap()]);
    }

    #[test]
    fn cidr_expands_to_hosts() {
        let hosts = expand_target("192.0.2.0/30").unwrap();

        // /30 has two usable hosts
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].to_string(), "192.0.2.1");
        assert_eq!(hosts[1].to_string(), "192.0.2.2");
    }

    #[test]
    fn garbage_target_is_config_error() {
        assert!(matches!(
            expand_target("not-a-network"),
            Err(CrawlError::Config(_))
        ));
    }
}
