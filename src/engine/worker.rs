use crate::credentials::Credential;
use crate::device::model::Device;
use crate::device::pipeline::{
    self,
    PipelineOptions,
    PipelineOutcome,
};
use crate::store::crawl::PendingRecord;
use crossbeam_channel::{
    Receiver,
    Sender,
};
use log::{
    debug,
    error,
    info,
};
use std::panic::{
    catch_unwind,
    AssertUnwindSafe,
};
use std::sync::Arc;
use std::thread::{
    self,
    JoinHandle,
};

/// One unit of work handed to a worker. `Shutdown` is the poison pill -- a worker that receives
/// it acknowledges by exiting.
pub enum Task {
    /// Interrogate this pending target.
    Target(PendingRecord),
    /// Stop the worker.
    Shutdown,
}

/// What a worker always answers with, success or not: the device as far as it got, the original
/// request, the fatal error if one occurred, and a short log line for the console.
pub struct TaskOutcome {
    /// The device record produced (possibly partial, possibly failed).
    pub device: Device,
    /// The pending record this work came from.
    pub request: PendingRecord,
    /// The fatal error, rendered; `None` on success.
    pub error: Option<String>,
    /// One-line human summary of how processing went.
    pub log: String,
}

/// The pluggable unit of per-target work. The production implementation runs the device
/// pipeline; tests inject scripted runners so the engine can be exercised without a network.
pub trait TaskRunner: Send + Sync {
    /// Process one target and report how it went.
    fn run(
        &self,
        request: &PendingRecord,
    ) -> PipelineOutcome;
}

/// The production runner: hands each target to the device pipeline with a snapshot of the
/// process-wide credential list and options.
pub struct PipelineRunner {
    creds: Vec<Credential>,
    options: PipelineOptions,
}

impl PipelineRunner {
    /// Build a runner around a credential snapshot.
    #[must_use]
    pub fn new(
        creds: Vec<Credential>,
        options: PipelineOptions,
    ) -> Self {
        Self { creds, options }
    }
}

impl TaskRunner for PipelineRunner {
    fn run(
        &self,
        request: &PendingRecord,
    ) -> PipelineOutcome {
        pipeline::run(&request.ip, request.platform, &self.creds, &self.options)
    }
}

/// A worker thread: stateless between tasks, pulls from the task channel until the poison pill,
/// and always produces an outcome per task -- panics included get captured into the outcome
/// rather than escaping the thread.
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn worker `id` against the shared channels.
    ///
    /// # Errors
    ///
    /// `Fatal` when the OS refuses to spawn the thread.
    pub fn spawn(
        id: usize,
        runner: Arc<dyn TaskRunner>,
        task_receiver: Receiver<Task>,
        outcome_sender: Sender<TaskOutcome>,
    ) -> Result<Self, crate::errors::CrawlError> {
        let handle = thread::Builder::new()
            .name(format!("crawl-worker-{id}"))
            .spawn(move || worker_loop(id, &runner, &task_receiver, &outcome_sender))
            .map_err(|err| {
                crate::errors::CrawlError::Fatal(format!("failed spawning worker {id}: {err}"))
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Wait for the worker to finish. A panicked worker is logged, not propagated -- its
    /// claimed row returns to the pool at next startup.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("worker {} panicked during shutdown", self.id);
            }
        }
    }
}

fn worker_loop(
    id: usize,
    runner: &Arc<dyn TaskRunner>,
    task_receiver: &Receiver<Task>,
    outcome_sender: &Sender<TaskOutcome>,
) {
    debug!("worker {id} started");

    while let Ok(task) = task_receiver.recv() {
        let request = match task {
            Task::Shutdown => {
                debug!("worker {id} received shutdown pill");

                break;
            }
            Task::Target(request) => request,
        };

        info!("worker {id} processing {}", request.ip);

        let outcome = run_one(runner.as_ref(), &request);

        if outcome_sender.send(outcome).is_err() {
            // dispatcher is gone; nothing left to do
            break;
        }
    }

    debug!("worker {id} exiting");
}

/// Run one task, converting panics into failed outcomes so nothing ever escapes past the
/// result channel.
fn run_one(
    runner: &dyn TaskRunner,
    request: &PendingRecord,
) -> TaskOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| runner.run(request)));

    match result {
        Ok(outcome) => {
            let log = match &outcome.error {
                None => outcome.device.summary(),
                Some(err) => format!("{} failed: {err}", request.ip),
            };

            TaskOutcome {
                device: outcome.device,
                request: request.clone(),
                error: outcome.error,
                log,
            }
        }
        Err(_) => {
            let mut device = Device::new(&request.ip, request.platform);
            device.failed = true;

            let message = format!("worker panicked while processing {}", request.ip);
            device.log_error(&message);

            TaskOutcome {
                device,
                request: request.clone(),
                error: Some(message.clone()),
                log: message,
            }
        }
    }
}
