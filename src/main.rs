use playa_session::cli::Args;
use playa_session::config::{self, Settings};
use playa_session::engine::sim::SimEngine;
use playa_session::{EventKind, Instance, Media, Session, SessionEvent, SubscriptionId};

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{Receiver, RecvTimeoutError, unbounded};
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval for `--poll` mode.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn init_logging(args: &Args, path_config: &config::PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file("playa_session.log", path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// How the demo learns about end of stream.
enum Waiter {
    Subscribed(Receiver<()>, Vec<SubscriptionId>),
    Polled,
}

impl Waiter {
    /// Subscribe (or not) before playback starts so no event is missed.
    fn attach(session: &Session, poll: bool) -> Self {
        if poll {
            return Waiter::Polled;
        }
        let (tx, rx) = unbounded();
        let printer = session.events().subscribe_all(|e| println!("event: {e}"));
        let end = session.events().subscribe(EventKind::ReachedEnd, move |_| {
            let _ = tx.send(());
        });
        Waiter::Subscribed(rx, vec![printer, end])
    }

    /// Block until end of stream. Returns `false` on timeout.
    fn wait(self, session: &Session, timeout: Duration) -> Result<bool> {
        match self {
            Waiter::Subscribed(rx, ids) => {
                let reached = match rx.recv_timeout(timeout) {
                    Ok(()) => true,
                    Err(RecvTimeoutError::Timeout) => false,
                    Err(RecvTimeoutError::Disconnected) => {
                        anyhow::bail!("session closed while waiting")
                    }
                };
                for id in ids {
                    session.events().unsubscribe(id);
                }
                Ok(reached)
            }
            Waiter::Polled => {
                let deadline = Instant::now() + timeout;
                while Instant::now() < deadline {
                    for event in session.events().poll() {
                        println!("event: {event}");
                        if event == SessionEvent::ReachedEnd {
                            return Ok(true);
                        }
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Ok(false)
            }
        }
    }
}

fn run(args: &Args, settings: Settings) -> Result<()> {
    let engine = Arc::new(SimEngine::new(settings.sim.clone()));
    let instance = Instance::new(engine.clone(), settings.instance.clone());

    let media = match &args.title {
        Some(title) => Media::with_title(&instance, args.mrl.as_str(), title.as_str()),
        None => Media::new(&instance, args.mrl.as_str()),
    };
    let session = Session::with_media(&media).context("Failed to create session")?;
    debug!("{:?}", session);

    let waiter = Waiter::attach(&session, args.poll);

    session.play().with_context(|| format!("Failed to play '{}'", args.mrl))?;
    println!("playing '{}' ({:?})", media.mrl(), session.state());

    if let Some(rate) = args.rate {
        session.set_rate(rate).context("Failed to set rate")?;
    }
    if let Some(ms) = args.seek_ms {
        session.set_time(ms).context("Failed to seek")?;
    }
    if let Some(ms) = args.pause_ms {
        session.pause().context("Failed to pause")?;
        println!("paused ({:?})", session.state());
        thread::sleep(Duration::from_millis(ms));
        session.pause().context("Failed to resume")?;
    }

    if !waiter.wait(&session, Duration::from_secs(args.timeout_secs))? {
        warn!("No end of stream after {}s", args.timeout_secs);
    }

    println!(
        "finished: state={:?} time={}ms length={}ms media={:?}",
        session.state(),
        session.time().unwrap_or(-1),
        session.length().unwrap_or(-1),
        media.state()
    );

    session.release();
    instance.shutdown();
    info!(
        "Engine stats: created={} destroyed={} commands_after_destroy={}",
        engine.stats().created(),
        engine.stats().destroyed(),
        engine.stats().commands_after_destroy()
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;

    info!("Playa session demo starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = config::config_file(config::SETTINGS_FILE, &path_config);
    info!("Config path: {}", settings_path.display());
    let mut settings = Settings::load(&settings_path)?;

    if let Some(length_ms) = args.length_ms {
        settings.sim.length_ms = length_ms;
    }
    if args.poll {
        settings.instance.queue_events = true;
    }
    if args.save_config {
        settings.save(&settings_path)?;
    }

    run(&args, settings)
}
