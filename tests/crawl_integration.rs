//! End-to-end crawl scenarios driven through the public engine API with scripted task runners
//! and in-memory stores -- no network, no real devices.

use netcrawl::device::model::{
    Device,
    MacEntry,
    Neighbor,
    Serial,
};
use netcrawl::device::pipeline::PipelineOutcome;
use netcrawl::device::platform::Platform;
use netcrawl::device::probe::{
    classify_version_banner,
    probe_for,
};
use netcrawl::engine::dispatcher::{
    Engine,
    EngineOptions,
};
use netcrawl::engine::worker::{
    TaskRunner,
    TaskOutcome,
};
use netcrawl::output::RunOutput;
use netcrawl::settings::Settings;
use netcrawl::store::crawl::{
    CrawlStore,
    CrawlTable,
    PendingRecord,
    VisitedRecord,
};
use netcrawl::store::inventory::InventoryStore;
use std::collections::HashMap;
use std::sync::Arc;

fn fixtures(root: &std::path::Path) -> (CrawlStore, InventoryStore, RunOutput) {
    let crawl = CrawlStore::in_memory().unwrap();
    let inventory = InventoryStore::in_memory().unwrap();

    let mut settings = Settings::default();
    settings.filepaths.root_path = root.to_string_lossy().into_owned();

    let output = RunOutput::new(settings).unwrap();

    (crawl, inventory, output)
}

fn engine_options(workers: usize) -> EngineOptions {
    EngineOptions {
        workers,
        skip_named_duplicates: false,
    }
}

/// A runner that replays a script: each IP maps to the device it should "discover". Targets
/// missing from the script fail with a connection error.
struct ScriptedRunner {
    script: HashMap<String, Device>,
}

impl TaskRunner for ScriptedRunner {
    fn run(
        &self,
        request: &PendingRecord,
    ) -> PipelineOutcome {
        match self.script.get(&request.ip) {
            Some(device) => PipelineOutcome {
                device: device.clone(),
                error: None,
            },
            None => {
                let mut device = Device::new(&request.ip, request.platform);
                device.failed = true;

                PipelineOutcome {
                    device,
                    error: Some(format!("connection failed: {} is not scripted", request.ip)),
                }
            }
        }
    }
}

fn healthy_device(
    ip: &str,
    name: &str,
) -> Device {
    let mut device = Device::new(ip, Platform::CiscoIos);
    device.device_name = name.to_owned();
    device.raw_config = format!("hostname {name}\n!\n");

    device
}

fn neighbor_to(
    ip: &str,
    name: &str,
) -> Neighbor {
    let mut neighbor = Neighbor::default();
    neighbor.device_name = name.to_owned();
    neighbor.platform = Platform::CiscoIos;
    neighbor.ips = vec![ip.to_owned()];

    neighbor
}

// S1: a seed that was already visited is explicitly re-crawled -- the caller removes the
// visited row, enqueues the seed, and the engine processes it as new.
#[test]
fn s1_seed_with_cached_visit_is_recrawled() {
    let tmp = tempfile::tempdir().unwrap();
    let (crawl, inventory, output) = fixtures(tmp.path());

    crawl
        .add_visited(&VisitedRecord {
            visited_id: 0,
            ip: String::from("10.0.0.1"),
            device_name: Some(String::from("core-sw01")),
        })
        .unwrap();

    // the explicit-seed path: remove the cached visit, enqueue, run
    crawl.remove_visited("10.0.0.1").unwrap();
    crawl
        .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
        .unwrap();

    let mut script = HashMap::new();
    script.insert(
        String::from("10.0.0.1"),
        healthy_device("10.0.0.1", "core-sw01"),
    );

    let engine = Engine::new(&crawl, &inventory, &output, engine_options(2));
    let summary = engine.run(Arc::new(ScriptedRunner { script })).unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.skipped, 0);
    assert!(crawl.ip_exists("10.0.0.1", CrawlTable::Visited).unwrap());
}

// S2: platform "unknown" resolves through the version banner to the NX-OS probe, whose
// interface path is the xml form.
#[test]
fn s2_autodetect_selects_nxos_probe() {
    let banner = "Cisco Nexus Operating System (NX-OS) Software, Version 7.0(3)I7(6)";

    let platform = classify_version_banner(banner);

    assert_eq!(platform, Platform::CiscoNxos);

    let probe = probe_for(platform).unwrap();

    assert_eq!(probe.platform(), Platform::CiscoNxos);

    // and an unknown platform has no probe until autodetect runs
    assert!(probe_for(Platform::Unknown).is_none());
}

// S3: a device whose inventory step produced nothing is still persisted, with the rest of its
// children intact.
#[test]
fn s3_partial_failure_still_persists() {
    let tmp = tempfile::tempdir().unwrap();
    let (crawl, inventory, output) = fixtures(tmp.path());

    let mut device = healthy_device("10.0.0.1", "core-sw01");
    // serials stayed empty (the optional step logged and moved on)...
    device.serials = vec![];
    device.log_error("serials: no records parsed: no inventory entries found in output");
    // ...but macs that did succeed are present
    device
        .interfaces
        .push(netcrawl::device::model::Interface::new("GigabitEthernet1/0/1"));
    device.attach_mac_entries(vec![MacEntry {
        mac: String::from("AABB.CCDD.EEFF"),
        interface: String::from("Gi1/0/1"),
    }]);

    assert!(!device.failed);

    let mut script = HashMap::new();
    script.insert(String::from("10.0.0.1"), device);

    crawl
        .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
        .unwrap();

    let engine = Engine::new(&crawl, &inventory, &output, engine_options(2));
    let summary = engine.run(Arc::new(ScriptedRunner { script })).unwrap();

    assert_eq!(summary.persisted, 1);
    assert_eq!(summary.failed, 0);

    let locations = inventory.locate_mac("AABB.CCDD.EEFF").unwrap();

    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].device_name, "core-sw01");
    assert_eq!(locations[0].interface_name, "GigabitEthernet1/0/1");
}

// S4: two devices advertising the same neighbor IP produce exactly one pending row.
#[test]
fn s4_duplicate_neighbor_enqueues_once() {
    let tmp = tempfile::tempdir().unwrap();
    let (crawl, inventory, output) = fixtures(tmp.path());

    let mut first = healthy_device("10.0.0.1", "sw1");
    first.neighbors.push(neighbor_to("10.0.0.99", "shared-peer"));

    let mut second = healthy_device("10.0.0.2", "sw2");
    second.neighbors.push(neighbor_to("10.0.0.99", "shared-peer"));

    let shared = healthy_device("10.0.0.99", "shared-peer");

    let mut script = HashMap::new();
    script.insert(String::from("10.0.0.1"), first);
    script.insert(String::from("10.0.0.2"), second);
    script.insert(String::from("10.0.0.99"), shared);

    crawl
        .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
        .unwrap();
    crawl
        .add_pending(&PendingRecord::seed("10.0.0.2", Platform::CiscoIos))
        .unwrap();

    let engine = Engine::new(&crawl, &inventory, &output, engine_options(1));
    let summary = engine.run(Arc::new(ScriptedRunner { script })).unwrap();

    // 2 seeds + the shared neighbor exactly once
    assert_eq!(summary.processed, 3);
    assert_eq!(inventory.device_count().unwrap(), 3);
    assert!(crawl.ip_exists("10.0.0.99", CrawlTable::Visited).unwrap());
}

// S5: same device_name, different serials -> different unique names; uniqueNameExists is
// per-unique-name, not per-device_name.
#[test]
fn s5_unique_name_collision_diverges_on_serials() {
    let inventory = InventoryStore::in_memory().unwrap();

    let mut first = healthy_device("10.0.0.1", "stack-sw");
    first.serials.push(Serial {
        name: String::from("1"),
        description: String::from("member"),
        product_id: None,
        vendor_id: None,
        serial_number: String::from("AAA111"),
    });

    let mut second = healthy_device("10.0.0.2", "stack-sw");
    second.serials.push(Serial {
        name: String::from("1"),
        description: String::from("member"),
        product_id: None,
        vendor_id: None,
        serial_number: String::from("ZZZ999"),
    });

    let first_unique = first.unique_name().unwrap();
    let second_unique = second.unique_name().unwrap();

    assert_ne!(first_unique, second_unique);

    inventory.add_device(&first).unwrap();

    assert!(inventory.unique_name_exists(&first_unique).unwrap());
    assert!(!inventory.unique_name_exists(&second_unique).unwrap());

    inventory.add_device(&second).unwrap();

    assert!(inventory.unique_name_exists(&second_unique).unwrap());
}

// S6: the MAC locator finds exactly the row the crawl persisted, in any input separator flavor.
#[test]
fn s6_mac_locator_round_trip() {
    let inventory = InventoryStore::in_memory().unwrap();

    let mut device = healthy_device("10.0.0.1", "access-sw");
    let mut interface = netcrawl::device::model::Interface::new("GigabitEthernet1/0/1");
    interface.macs.push(MacEntry {
        mac: String::from("AABB.CCDD.EEFF"),
        interface: String::from("GigabitEthernet1/0/1"),
    });
    device.interfaces.push(interface);

    inventory.add_device(&device).unwrap();

    for spelling in ["AABBCCDDEEFF", "aabb.ccdd.eeff", "aa:bb:cc:dd:ee:ff"] {
        let locations = inventory.locate_mac(spelling).unwrap();

        assert_eq!(locations.len(), 1, "spelling {spelling}");
        assert_eq!(locations[0].device_name, "access-sw");
        assert_eq!(locations[0].interface_name, "GigabitEthernet1/0/1");
        assert!(locations[0].neighbor_name.is_none());
    }
}

// Re-crawling with ignore-visited yields the same inventory row counts -- the idempotence
// property over a full run.
#[test]
fn repeat_run_with_ignore_visited_matches_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let (crawl, inventory, output) = fixtures(tmp.path());

    let mut script = HashMap::new();

    let mut seed = healthy_device("10.0.0.1", "sw1");
    seed.neighbors.push(neighbor_to("10.0.0.2", "sw2"));
    script.insert(String::from("10.0.0.1"), seed);
    script.insert(String::from("10.0.0.2"), healthy_device("10.0.0.2", "sw2"));

    let runner: Arc<dyn TaskRunner> = Arc::new(ScriptedRunner { script });

    crawl
        .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
        .unwrap();

    let engine = Engine::new(&crawl, &inventory, &output, engine_options(2));
    let first = engine.run(Arc::clone(&runner)).unwrap();

    let first_count = inventory.device_count().unwrap();

    // second run: clear visited, reseed, same script
    crawl.startup(true).unwrap();
    crawl
        .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
        .unwrap();

    let engine = Engine::new(&crawl, &inventory, &output, engine_options(2));
    let second = engine.run(runner).unwrap();

    assert_eq!(first.processed, second.processed);
    assert_eq!(
        inventory.device_count().unwrap() - first_count,
        first_count
    );
}

// The outcome type keeps the original request alongside the device -- what the dispatcher
// needs to do its bookkeeping regardless of success.
#[test]
fn outcome_carries_request_identity() {
    let request = PendingRecord::seed("10.0.0.1", Platform::CiscoIos);

    let outcome = TaskOutcome {
        device: healthy_device("10.0.0.1", "sw1"),
        request: request.clone(),
        error: None,
        log: String::from("ok"),
    };

    assert_eq!(outcome.request.ip, request.ip);
    assert!(outcome.error.is_none());
}
