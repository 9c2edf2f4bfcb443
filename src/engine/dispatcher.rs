use crate::engine::worker::{
    Task,
    TaskOutcome,
    TaskRunner,
    Worker,
};
use crate::errors::CrawlError;
use crate::output::RunOutput;
use crate::store::crawl::{
    CrawlStore,
    CrawlTable,
    PendingRecord,
    VisitedRecord,
};
use crate::store::inventory::InventoryStore;
use crossbeam_channel::{
    bounded,
    unbounded,
    RecvTimeoutError,
    Sender,
};
use core::time::Duration;
use log::{
    debug,
    info,
    warn,
};
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

/// Task channel capacity as a multiple of the worker count. Two tasks per worker keeps everyone
/// busy without claiming half the pending table into memory.
const TASK_CHANNEL_FACTOR: usize = 2;

/// How long the dispatcher blocks on the result channel when it has nothing else to do.
const RESULT_WAIT: Duration = Duration::from_millis(200);

/// Engine tuning knobs.
#[derive(Clone)]
pub struct EngineOptions {
    /// Worker pool size.
    pub workers: usize,
    /// Treat the (ip, device_name) pair as the visited identity instead of the ip alone.
    pub skip_named_duplicates: bool,
}

/// What a crawl run did, for the final console summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlSummary {
    /// Targets handed to workers.
    pub processed: usize,
    /// Devices persisted to inventory.
    pub persisted: usize,
    /// Targets that failed terminally.
    pub failed: usize,
    /// Pending rows dropped because they were already visited.
    pub skipped: usize,
}

/// The crawl engine: a single-threaded dispatcher over a bounded task channel and a result
/// channel, with a pool of identical stateless workers on the far side.
pub struct Engine<'a> {
    crawl: &'a CrawlStore,
    inventory: &'a InventoryStore,
    output: &'a RunOutput,
    options: EngineOptions,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Engine<'a> {
    /// Build an engine over the two stores and the run output.
    #[must_use]
    pub fn new(
        crawl: &'a CrawlStore,
        inventory: &'a InventoryStore,
        output: &'a RunOutput,
        options: EngineOptions,
    ) -> Self {
        Self {
            crawl,
            inventory,
            output,
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The flag an interrupt handler flips to stop the run: the dispatcher notices, poison-pills
    /// every worker, and returns.
    #[must_use]
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// True when this record has already been visited under the configured identity policy.
    fn already_visited(
        &self,
        record: &PendingRecord,
    ) -> Result<bool, CrawlError> {
        if self.options.skip_named_duplicates {
            if let Some(name) = &record.device_name {
                return self
                    .crawl
                    .ip_or_name_exists(&record.ip, name, CrawlTable::Visited);
            }
        }

        self.crawl.ip_exists(&record.ip, CrawlTable::Visited)
    }

    /// Claim pending rows into the task channel until it fills or the table runs dry. Rows
    /// already visited are dropped on the floor (and out of pending). Returns how many were
    /// dispatched.
    fn fill_task_channel(
        &self,
        task_sender: &Sender<Task>,
        summary: &mut CrawlSummary,
    ) -> Result<usize, CrawlError> {
        let mut dispatched = 0;

        while !task_sender.is_full() {
            let Some(record) = self.crawl.get_next()? else {
                break;
            };

            if self.already_visited(&record)? {
                debug!("dropping {}: already visited", record.ip);

                self.crawl.remove_pending(record.pending_id)?;
                summary.skipped += 1;

                continue;
            }

            // capacity was checked above and we are the only producer
            if task_sender.send(Task::Target(record)).is_err() {
                return Err(CrawlError::Fatal(String::from(
                    "task channel closed with workers still expected",
                )));
            }

            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// [`Self::handle_outcome`], but database trouble with one device never takes down the
    /// dispatcher -- log it and move on to the next device.
    fn handle_outcome_logged(
        &self,
        outcome: &TaskOutcome,
        summary: &mut CrawlSummary,
    ) {
        if let Err(err) = self.handle_outcome(outcome, summary) {
            warn!(
                "bookkeeping for {} failed, continuing with next device: {err}",
                outcome.request.ip
            );

            self.output.log_event(
                "dispatch",
                &format!("bookkeeping for {} failed: {err}", outcome.request.ip),
            );
        }
    }

    /// Process one finished task: bookkeeping in the crawl store, persistence and neighbor
    /// enqueue when the worker succeeded.
    fn handle_outcome(
        &self,
        outcome: &TaskOutcome,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        summary.processed += 1;

        self.crawl.remove_pending(outcome.request.pending_id)?;

        let device_name = if outcome.device.device_name.is_empty() {
            outcome.request.device_name.clone()
        } else {
            Some(outcome.device.device_name.clone())
        };

        self.crawl.add_visited(&VisitedRecord {
            visited_id: 0,
            ip: outcome.request.ip.clone(),
            device_name,
        })?;

        println!("{}", outcome.log);
        self.output.log_event("dispatch", &outcome.log);

        if outcome.error.is_some() || outcome.device.failed {
            summary.failed += 1;

            return Ok(());
        }

        self.inventory.add_device(&outcome.device)?;
        summary.persisted += 1;

        let enqueued = self.crawl.add_device_neighbors(&outcome.device)?;

        if enqueued > 0 {
            debug!(
                "enqueued {enqueued} neighbors advertised by {}",
                outcome.request.ip
            );
        }

        match self.output.write_config_snapshot(&outcome.device) {
            Ok(path) => debug!("config snapshot written to {path:?}"),
            Err(err) => warn!(
                "failed writing config snapshot for {}: {err}",
                outcome.request.ip
            ),
        }

        Ok(())
    }

    /// Run the crawl to completion (or interrupt): claim, dispatch, drain, persist, repeat;
    /// poison-pill the pool once pending is empty and nothing is in flight.
    ///
    /// # Errors
    ///
    /// Store-level errors abort the run; per-device failures do not.
    pub fn run(
        &self,
        runner: Arc<dyn TaskRunner>,
    ) -> Result<CrawlSummary, CrawlError> {
        let worker_count = self.options.workers.max(1);

        let (task_sender, task_receiver) = bounded(worker_count * TASK_CHANNEL_FACTOR);
        let (outcome_sender, outcome_receiver) = unbounded::<TaskOutcome>();

        let mut workers = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            workers.push(Worker::spawn(
                id,
                Arc::clone(&runner),
                task_receiver.clone(),
                outcome_sender.clone(),
            )?);
        }

        // the dispatcher's clone is the only other sender; workers own the rest
        drop(outcome_sender);

        info!("crawl engine started with {worker_count} workers");

        let mut summary = CrawlSummary::default();
        let mut in_flight: usize = 0;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!("shutdown requested, stopping dispatch");

                break;
            }

            // drain whatever has finished, so freshly-enqueued neighbors are claimable below
            while let Ok(outcome) = outcome_receiver.try_recv() {
                self.handle_outcome_logged(&outcome, &mut summary);

                in_flight -= 1;
            }

            let dispatched = self.fill_task_channel(&task_sender, &mut summary)?;
            in_flight += dispatched;

            // nothing running and nothing left to claim: done. (An unclaimable row whose
            // bookkeeping failed stays behind for the next startup reset rather than spinning
            // us here forever.)
            if in_flight == 0 && dispatched == 0 {
                break;
            }

            if dispatched == 0 {
                // nothing new to hand out; wait for the next result instead of spinning
                match outcome_receiver.recv_timeout(RESULT_WAIT) {
                    Ok(outcome) => {
                        self.handle_outcome_logged(&outcome, &mut summary);

                        in_flight -= 1;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(CrawlError::Fatal(String::from(
                            "all workers died with tasks in flight",
                        )));
                    }
                }
            }
        }

        debug!("sending shutdown pill to each worker");

        for _ in 0..worker_count {
            let _ = task_sender.send(Task::Shutdown);
        }

        // collect stragglers so their bookkeeping lands before we report
        while in_flight > 0 {
            match outcome_receiver.recv_timeout(RESULT_WAIT * 10) {
                Ok(outcome) => {
                    self.handle_outcome_logged(&outcome, &mut summary);

                    in_flight -= 1;
                }
                Err(_) => break,
            }
        }

        drop(task_sender);

        for worker in workers {
            worker.join();
        }

        info!(
            "crawl finished: {} processed, {} persisted, {} failed, {} skipped",
            summary.processed, summary.persisted, summary.failed, summary.skipped
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::model::{
        Device,
        Neighbor,
    };
    use crate::device::pipeline::PipelineOutcome;
    use crate::device::platform::Platform;
    use crate::settings::Settings;

    /// A runner that fabricates a healthy device for every target and advertises one scripted
    /// neighbor chain: 10.0.0.N advertises 10.0.0.N+1 up to a limit.
    struct ChainRunner {
        limit: u8,
    }

    impl TaskRunner for ChainRunner {
        fn run(
            &self,
            request: &PendingRecord,
        ) -> PipelineOutcome {
            let mut device = Device::new(&request.ip, Platform::CiscoIos);

            let last_octet: u8 = request
                .ip
                .rsplit('.')
                .next()
                .and_then(|o| o.parse().ok())
                .unwrap_or(0);

            device.device_name = format!("sw{last_octet}");
            device.raw_config = format!("hostname sw{last_octet}\n");

            if last_octet < self.limit {
                let mut neighbor = Neighbor::default();
                neighbor.device_name = format!("sw{}", last_octet + 1);
                neighbor.platform = Platform::CiscoIos;
                neighbor.ips = vec![format!("10.0.0.{}", last_octet + 1)];

                device.neighbors.push(neighbor);
            }

            PipelineOutcome {
                device,
                error: None,
            }
        }
    }

    fn test_fixtures(root: &std::path::Path) -> (CrawlStore, InventoryStore, RunOutput) {
        let crawl = CrawlStore::in_memory().unwrap();
        let inventory = InventoryStore::in_memory().unwrap();

        let mut settings = Settings::default();
        settings.filepaths.root_path = root.to_string_lossy().into_owned();

        let output = RunOutput::new(settings).unwrap();

        (crawl, inventory, output)
    }

    #[test]
    fn recursive_chain_crawls_to_the_end() {
        let tmp = tempfile::tempdir().unwrap();
        let (crawl, inventory, output) = test_fixtures(tmp.path());

        crawl
            .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
            .unwrap();

        let engine = Engine::new(
            &crawl,
            &inventory,
            &output,
            EngineOptions {
                workers: 4,
                skip_named_duplicates: false,
            },
        );

        let summary = engine.run(Arc::new(ChainRunner { limit: 5 })).unwrap();

        // seeds 1 through 5 all processed and persisted
        assert_eq!(summary.processed, 5);
        assert_eq!(summary.persisted, 5);
        assert_eq!(inventory.device_count().unwrap(), 5);
        assert_eq!(crawl.count_pending().unwrap(), 0);

        for octet in 1..=5 {
            assert!(crawl
                .ip_exists(&format!("10.0.0.{octet}"), CrawlTable::Visited)
                .unwrap());
        }
    }

    #[test]
    fn visited_rows_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let (crawl, inventory, output) = test_fixtures(tmp.path());

        crawl
            .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
            .unwrap();

        crawl
            .add_visited(&VisitedRecord {
                visited_id: 0,
                ip: String::from("10.0.0.1"),
                device_name: None,
            })
            .unwrap();

        let engine = Engine::new(
            &crawl,
            &inventory,
            &output,
            EngineOptions {
                workers: 2,
                skip_named_duplicates: false,
            },
        );

        let summary = engine.run(Arc::new(ChainRunner { limit: 1 })).unwrap();

        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 1);
        assert_eq!(inventory.device_count().unwrap(), 0);
    }

    #[test]
    fn failed_devices_are_visited_but_not_persisted() {
        struct FailingRunner;

        impl TaskRunner for FailingRunner {
            fn run(
                &self,
                request: &PendingRecord,
            ) -> PipelineOutcome {
                let mut device = Device::new(&request.ip, request.platform);
                device.failed = true;
                device.log_error("connection failed: scripted");

                PipelineOutcome {
                    device,
                    error: Some(String::from("connection failed: scripted")),
                }
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let (crawl, inventory, output) = test_fixtures(tmp.path());

        crawl
            .add_pending(&PendingRecord::seed("10.0.0.1", Platform::CiscoIos))
            .unwrap();

        let engine = Engine::new(
            &crawl,
            &inventory,
            &output,
            EngineOptions {
                workers: 1,
                skip_named_duplicates: false,
            },
        );

        let summary = engine.run(Arc::new(FailingRunner)).unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(inventory.device_count().unwrap(), 0);
        // failed targets still become visited so only an explicit request re-crawls them
        assert!(crawl.ip_exists("10.0.0.1", CrawlTable::Visited).unwrap());
        assert_eq!(crawl.count_pending().unwrap(), 0);
    }
}
