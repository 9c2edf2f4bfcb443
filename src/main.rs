//! The netcrawl binary: argument parsing, logging/settings bootstrap, and run-mode dispatch.

use clap::Parser;
use log::{
    error,
    info,
    LevelFilter,
};
use netcrawl::cli::Cli;
use netcrawl::credentials::{
    ensure_not_empty,
    load_credentials,
    Credential,
};
use netcrawl::device::pipeline::{
    self,
    PipelineOptions,
};
use netcrawl::device::platform::Platform;
use netcrawl::engine::dispatcher::{
    Engine,
    EngineOptions,
};
use netcrawl::engine::worker::PipelineRunner;
use netcrawl::errors::CrawlError;
use netcrawl::output::RunOutput;
use netcrawl::scan;
use netcrawl::settings::Settings;
use netcrawl::store::crawl::{
    CrawlStore,
    PendingRecord,
};
use netcrawl::store::inventory::InventoryStore;
use nix::sys::signal::{
    sigaction,
    SaFlags,
    SigAction,
    SigHandler,
    SigSet,
    Signal,
};
use std::process::ExitCode;
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Flipped by the SIGINT handler; a watcher thread relays it to the engine's shutdown flag.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_: i32) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn install_interrupt_handler() -> Result<(), CrawlError> {
    let action = SigAction::new(
        SigHandler::Handler(on_interrupt),
        SaFlags::empty(),
        SigSet::empty(),
    );

    // SAFETY: the handler only touches an atomic, which is async-signal-safe.
    unsafe { sigaction(Signal::SIGINT, &action) }
        .map_err(|err| CrawlError::Fatal(format!("failed installing SIGINT handler: {err}")))?;

    Ok(())
}

fn relay_interrupt(flag: &Arc<AtomicBool>) {
    let flag = Arc::clone(flag);

    thread::spawn(move || loop {
        if INTERRUPTED.load(Ordering::SeqCst) {
            flag.store(true, Ordering::SeqCst);

            return;
        }

        thread::sleep(Duration::from_millis(200));
    });
}

fn init_logging(level: LevelFilter) {
    let mut builder = env_logger::Builder::from_default_env();

    builder.target(env_logger::Target::Stderr);
    builder.filter_level(level);

    builder.init();
}

/// Merge CLI flags over the settings file: explicit flags win.
fn effective_settings(
    cli: &Cli,
    mut settings: Settings,
) -> Settings {
    settings.options.verbosity = cli.verbosity;

    if cli.debug {
        settings.options.debug = true;
    }

    settings
}

fn load_device_credentials(cli: &Cli) -> Result<Vec<Credential>, CrawlError> {
    let creds = load_credentials(&cli.credentials)?;

    ensure_not_empty(creds)
}

fn clean_databases(settings: &Settings) -> Result<(), CrawlError> {
    for path in [settings.main_db_path(), settings.inventory_db_path()] {
        if path.exists() {
            info!("clean requested, deleting {path:?}");

            std::fs::remove_file(&path)?;
        }
    }

    Ok(())
}

fn run_netscan(
    cli: &Cli,
    settings: &Settings,
) -> Result<(), CrawlError> {
    let target = cli
        .target
        .as_deref()
        .ok_or_else(|| CrawlError::Config(String::from("netscan requires --target")))?;

    let crawl = CrawlStore::open(&settings.main_db_path())?;

    let summary = scan::sweep(target, &crawl)?;

    println!(
        "sweep of {target}: {} probed, {} responders enqueued as crawl targets",
        summary.probed, summary.responders
    );

    Ok(())
}

fn run_single(
    cli: &Cli,
    settings: &Settings,
) -> Result<(), CrawlError> {
    let target = cli
        .target
        .as_deref()
        .ok_or_else(|| CrawlError::Config(String::from("single mode requires --target")))?;

    let creds = load_device_credentials(cli)?;

    let options = PipelineOptions {
        raise_exceptions: settings.options.debug,
        ..PipelineOptions::default()
    };

    let outcome = pipeline::run(target, Platform::parse(&cli.platform), &creds, &options);

    if let Some(err) = outcome.error {
        return Err(CrawlError::Connection(format!(
            "failed processing {target}: {err}"
        )));
    }

    let inventory = InventoryStore::open(&settings.inventory_db_path())?;
    inventory.add_device(&outcome.device)?;

    let output = RunOutput::new(settings.clone())?;
    output.write_config_snapshot(&outcome.device)?;

    println!("{}", outcome.device.summary());

    Ok(())
}

fn run_recursive(
    cli: &Cli,
    settings: &Settings,
) -> Result<(), CrawlError> {
    let creds = load_device_credentials(cli)?;

    let crawl = CrawlStore::open(&settings.main_db_path())?;
    let inventory = InventoryStore::open(&settings.inventory_db_path())?;
    let output = RunOutput::new(settings.clone())?;

    crawl.startup(cli.effective_ignore_visited())?;

    if let Some(target) = cli.target.as_deref() {
        // an explicit seed always gets re-crawled, visited or not
        crawl.remove_visited(target)?;
        crawl.add_pending(&PendingRecord::seed(target, Platform::parse(&cli.platform)))?;
    }

    if crawl.count_pending()? == 0 {
        return Err(CrawlError::Config(String::from(
            "nothing to crawl: pending queue is empty and no --target given",
        )));
    }

    let engine = Engine::new(
        &crawl,
        &inventory,
        &output,
        EngineOptions {
            workers: settings.worker_count(),
            skip_named_duplicates: cli.skip_named_duplicates,
        },
    );

    install_interrupt_handler()?;
    relay_interrupt(&engine.shutdown_flag());

    let pipeline_options = PipelineOptions {
        raise_exceptions: settings.options.debug,
        ..PipelineOptions::default()
    };

    let runner = Arc::new(PipelineRunner::new(creds, pipeline_options));

    let summary = engine.run(runner)?;

    println!(
        "crawl finished: {} processed, {} persisted, {} failed, {} skipped",
        summary.processed, summary.persisted, summary.failed, summary.skipped
    );

    Ok(())
}

fn run(cli: &Cli) -> Result<(), CrawlError> {
    let settings = effective_settings(cli, Settings::load(&cli.settings)?);

    init_logging(settings.level_filter());

    if cli.clean {
        clean_databases(&settings)?;
    }

    if cli.manage {
        println!(
            "credential management is handled by the external credential menu; \
             point it at the vault under {:?}",
            settings.run_root().join("vault")
        );

        return Ok(());
    }

    if cli.netscan {
        return run_netscan(cli, &settings);
    }

    if cli.single {
        return run_single(cli, &settings);
    }

    run_recursive(cli, &settings)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ CrawlError::Config(_)) => {
            error!("{err}");
            eprintln!("netcrawl: {err}");

            ExitCode::from(2)
        }
        Err(err) => {
            error!("{err}");
            eprintln!("netcrawl: {err}");

            ExitCode::FAILURE
        }
    }
}
