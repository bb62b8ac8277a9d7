//! limudcache - daily study content that keeps working offline.
//!
//! One-shot commands read through the local-first cache; `daemon` keeps the
//! cache warm in the background until interrupted.

mod app;

use std::io;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use limudcache_core::progress::ProgressView;
use limudcache_core::sync::{self, SyncUpdate};
use limudcache_core::{spawn_network_watch, Config, LoadedText, Reachability, SyncTrigger};

use app::{parse_date, App};

// ============================================================================
// Constants
// ============================================================================

/// How often the daemon probes the network for online/offline transitions
const NETWORK_WATCH_SECS: u64 = 60;

/// Log file prefix for the daemon's daily-rolling log
const LOG_FILE_PREFIX: &str = "limudcache.log";

const USAGE: &str = "\
Usage: limudcache <command> [args]

Commands:
  today [path] [date]          Show a day's study with its text
  text <ref> [ref...]          Show one or more references merged
  done <path> <date> <index>   Mark a passage complete
  undo <path> <date> <index>   Unmark a passage
  bookmark <path> <date>       Toggle a day's bookmark
  sync                         Run one background sync now
  sweep                        Evict entries outside the retention window
  migrate                      Import the legacy cache file
  offline | online             Choose to work offline, or stop
  status                       Connectivity and cache summary
  reset                        Delete all cached content
  daemon                       Keep the cache warm until interrupted

Dates are YYYY-MM-DD or \"today\". Set RUST_LOG to control logging.";

/// Initialize the tracing subscriber for logging.
///
/// Returns the file writer guard, which must live as long as logging does.
fn init_tracing(log_dir: Option<&std::path::Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");
    let rest: Vec<&str> = args.iter().skip(1).map(String::as_str).collect();

    let config = Config::load()?;
    let log_dir = if command == "daemon" {
        Some(config.cache_dir()?.join("logs"))
    } else {
        None
    };
    let _guard = init_tracing(log_dir.as_deref());

    let mut app = App::new(config)?;
    match command {
        "today" => cmd_today(&app, &rest).await,
        "text" => cmd_text(&app, &rest).await,
        "done" => cmd_progress(&app, &rest, true),
        "undo" => cmd_progress(&app, &rest, false),
        "bookmark" => cmd_bookmark(&app, &rest),
        "sync" => cmd_sync(&app).await,
        "sweep" => cmd_sweep(&app).await,
        "migrate" => cmd_migrate(&app).await,
        "offline" => {
            app.set_user_offline(true)?;
            println!("Working offline. Cached content only.");
            Ok(())
        }
        "online" => {
            app.set_user_offline(false)?;
            println!("Back online.");
            Ok(())
        }
        "status" => cmd_status(&app).await,
        "reset" => {
            app.cache.reset().await?;
            println!("Cache cleared.");
            Ok(())
        }
        "daemon" => cmd_daemon(&app).await,
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command {:?}\n\n{}", other, USAGE),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_today(app: &App, args: &[&str]) -> Result<()> {
    let path = app.path(args.first().copied())?;
    let date = parse_date(args.get(1).copied())?;

    let day = app.fetcher.get_day(date, path).await?;
    let progress = app.open_progress()?;
    let entry = &day.entry;

    println!("{} | {}", entry.localized.gregorian, entry.localized.hebrew_en);
    println!("{}", entry.localized.hebrew);
    println!();
    println!("{} ({})", entry.display.en, entry.display.he);
    let done = progress.day_progress(&path.id, date).done;
    println!(
        "{} passages, {} done ({}%)",
        entry.count,
        done,
        progress.completion_percentage(&path.id, date, entry.count)
    );
    println!();
    print_text(&day.text, |i| progress.is_done(&path.id, date, i));
    Ok(())
}

async fn cmd_text(app: &App, args: &[&str]) -> Result<()> {
    if args.is_empty() {
        bail!("text needs at least one reference");
    }
    let references: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let text = app.fetcher.get_merged_text(&references).await;
    if text.entry.is_empty() {
        bail!("No text available for {}", references.join("; "));
    }
    print_text(&text, |_| false);
    Ok(())
}

fn cmd_progress(app: &App, args: &[&str], done: bool) -> Result<()> {
    let [path, date, index] = args else {
        bail!("expected <path> <date> <index>");
    };
    let path = app.path(Some(*path))?;
    let date = parse_date(Some(*date))?;
    let index: usize = index.parse()?;

    let mut progress = app.open_progress()?;
    if done {
        progress.mark_done(&path.id, date, index);
    } else {
        progress.unmark(&path.id, date, index);
    }
    progress.save()?;
    let state = if done { "done" } else { "not done" };
    println!("{} {} passage {}: {}", path.id, date, index, state);
    Ok(())
}

fn cmd_bookmark(app: &App, args: &[&str]) -> Result<()> {
    let [path, date] = args else {
        bail!("expected <path> <date>");
    };
    let path = app.path(Some(*path))?;
    let date = parse_date(Some(*date))?;

    let mut progress = app.open_progress()?;
    let bookmarked = progress.toggle_bookmark(&path.id, date);
    progress.save()?;
    println!(
        "{} {} {}",
        path.id,
        date,
        if bookmarked { "bookmarked" } else { "unbookmarked" }
    );
    Ok(())
}

async fn cmd_sync(app: &App) -> Result<()> {
    let scheduler = app.scheduler()?;
    let outcome = scheduler.run(App::today(), SyncTrigger::Manual).await;
    println!("{:?}", outcome);
    Ok(())
}

async fn cmd_sweep(app: &App) -> Result<()> {
    let report = app.scheduler()?.sweep(App::today()).await;
    println!(
        "Deleted {} calendar entries and {} texts; kept {} protected days",
        report.calendar_deleted, report.texts_deleted, report.protected_days
    );
    Ok(())
}

async fn cmd_migrate(app: &App) -> Result<()> {
    let report = app.migrate().await?;
    if report.already_complete {
        println!("Migration already complete.");
    } else {
        println!(
            "Found {} references: {} migrated, {} already cached, {} failed",
            report.found, report.migrated, report.skipped_existing, report.failed
        );
    }
    Ok(())
}

async fn cmd_status(app: &App) -> Result<()> {
    let reachable = app.prober.is_reachable().await;
    let status = app.connectivity.status();
    let summary = app.cache.summary().await?;

    println!("Connectivity: {}", status.label());
    println!("Reachable:    {}", if reachable { "yes" } else { "no" });
    println!("Texts:        {}", summary.texts);
    println!("Calendar:     {}", summary.calendar_entries);
    println!("Updated:      {}", summary.last_updated());
    Ok(())
}

async fn cmd_daemon(app: &App) -> Result<()> {
    info!("limudcache daemon starting");
    let (tx, mut rx) = tokio::sync::mpsc::channel(sync::CHANNEL_BUFFER_SIZE);
    let scheduler = app.scheduler()?.with_updates(tx);
    app.startup(&scheduler).await?;

    let watch = spawn_network_watch(app.prober.clone(), Duration::from_secs(NETWORK_WATCH_SECS));
    let (handle, sync_task) = sync::spawn(scheduler, app.connectivity.subscribe());

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Some(SyncUpdate::Day(day)) => {
                    info!(path = %day.entry.path, date = %day.entry.date, passages = day.entry.count, "Day ready");
                }
                Some(SyncUpdate::Finished { trigger, outcome }) => {
                    info!(?trigger, ?outcome, "Sync run finished");
                }
                None => {
                    warn!("Sync loop ended");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    watch.abort();
    drop(handle);
    sync_task.abort();
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_text(text: &LoadedText, is_done: impl Fn(usize) -> bool) {
    if !text.languages_loaded.en {
        println!("(translation unavailable)");
    }
    if !text.languages_loaded.he {
        println!("(Hebrew unavailable)");
    }
    for (i, passage) in text.entry.passages.iter().enumerate() {
        if passage.first_in_chapter {
            println!("-- Chapter {} --", passage.chapter);
        }
        let mark = if is_done(i) { "x" } else { " " };
        println!("[{}] {:>3}  {}", mark, i, passage.he);
        if let Some(en) = &passage.en {
            println!("         {}", en);
        }
    }
}
