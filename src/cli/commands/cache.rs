//! Cache command - inspect and maintain the persisted bundle cache

use crate::cache::{CacheSnapshot, Invalidator};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, DEFAULT_CACHE_FILE};
use crate::error::{RebundleError, RebundleResult};
use chrono::{DateTime, Local};
use console::style;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> RebundleResult<()> {
    let path = resolve_cache_file(args.file, config)?;
    debug!("Using cache file {}", path.display());

    match args.action {
        CacheAction::Show { format } => show_cache(&path, format).await,
        CacheAction::Check { write } => check_cache(&path, config, write).await,
        CacheAction::Clear => clear_cache(&path).await,
    }
}

/// Cache file from the command line, the configuration, or the default
fn resolve_cache_file(file: Option<PathBuf>, config: &Config) -> RebundleResult<PathBuf> {
    if let Some(file) = file.or_else(|| config.cache.file.clone()) {
        return Ok(file);
    }
    let cwd =
        std::env::current_dir().map_err(|e| RebundleError::io("getting current directory", e))?;
    Ok(cwd.join(DEFAULT_CACHE_FILE))
}

fn format_mtime(mtime_ms: Option<u64>) -> String {
    mtime_ms
        .and_then(|ms| DateTime::from_timestamp_millis(ms as i64))
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

async fn show_cache(path: &Path, format: OutputFormat) -> RebundleResult<()> {
    let snapshot = CacheSnapshot::load(path).await?;

    match format {
        OutputFormat::Table => print_table(path, &snapshot),
        OutputFormat::Json => print_json(&snapshot)?,
        OutputFormat::Plain => print_plain(&snapshot),
    }

    Ok(())
}

fn print_table(path: &Path, snapshot: &CacheSnapshot) {
    println!("{} {}", style("Cache:").bold(), path.display());
    println!();

    if snapshot.dependency_cache.is_empty() {
        println!("No cached modules.");
        return;
    }

    println!(
        "{:<60} {:<6} {:<20}",
        style("MODULE").bold(),
        style("DEPS").bold(),
        style("MODIFIED").bold()
    );
    println!("{}", "-".repeat(88));

    for record in snapshot.dependency_cache.records() {
        println!(
            "{:<60} {:<6} {:<20}",
            record.id,
            record.deps.len(),
            format_mtime(snapshot.timestamps.get(&record.id))
        );
    }

    println!();
    println!("Total: {} module(s)", snapshot.dependency_cache.len());
}

fn print_json(snapshot: &CacheSnapshot) -> RebundleResult<()> {
    #[derive(serde::Serialize)]
    struct ModuleJson<'a> {
        id: &'a str,
        deps: usize,
        entry: bool,
        mtime_ms: Option<u64>,
    }

    let modules: Vec<ModuleJson<'_>> = snapshot
        .dependency_cache
        .records()
        .map(|r| ModuleJson {
            id: r.id.as_str(),
            deps: r.deps.len(),
            entry: r.entry,
            mtime_ms: snapshot.timestamps.get(&r.id),
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&modules)?);
    Ok(())
}

fn print_plain(snapshot: &CacheSnapshot) {
    for id in snapshot.dependency_cache.keys() {
        println!("{}", id);
    }
}

async fn check_cache(path: &Path, config: &Config, write: bool) -> RebundleResult<()> {
    let mut snapshot = CacheSnapshot::load(path).await?;
    let CacheSnapshot {
        dependency_cache,
        timestamps,
    } = &mut snapshot;

    let report = Invalidator::new(config.cache.stat_concurrency)
        .invalidate(dependency_cache, timestamps)
        .await;

    for id in &report.invalidated {
        println!("{} {}", style("stale").yellow(), id);
    }
    for id in &report.unreadable {
        println!("{} {}", style("missing").red(), id);
    }

    println!(
        "{} checked, {} stale, {} unreadable",
        report.checked,
        report.invalidated.len(),
        report.unreadable.len()
    );

    if write {
        snapshot.save(path).await?;
        println!("{} {}", style("Updated").green(), path.display());
    }

    Ok(())
}

async fn clear_cache(path: &Path) -> RebundleResult<()> {
    if !path.exists() {
        println!("No cache file at {}", path.display());
        return Ok(());
    }

    fs::remove_file(path)
        .await
        .map_err(|e| RebundleError::io(format!("removing {}", path.display()), e))?;
    println!("{} {}", style("Removed").green(), path.display());
    Ok(())
}
