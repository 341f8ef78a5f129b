use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::api;
use crate::app::{AppContext, Result};
use crate::domain::{CycleReport, SourceOutcome};
use crate::scheduler::{spawn_scheduler, CycleRunner, SchedulerConfig};
use crate::store::clamp_limit;

/// Run the scheduler and serve HTTP until interrupted.
pub async fn serve(ctx: AppContext, bind: Option<String>) -> Result<()> {
    let ctx = Arc::new(ctx);
    let scheduler_config = ctx.scheduler_config()?;
    let runner: Arc<dyn CycleRunner> = ctx.aggregator.clone();
    let (handle, scheduler_task) = spawn_scheduler(runner, scheduler_config.clone());

    let router = api::router(
        ctx.api_state(handle.clone()),
        ctx.config.server.static_dir.as_deref(),
    );

    let bind = bind.unwrap_or_else(|| ctx.config.server.bind.clone());
    let listener = TcpListener::bind(bind.as_str()).await?;
    info!(
        addr = %listener.local_addr()?,
        sources = ctx.registry.len(),
        interval = %SchedulerConfig::format_interval(scheduler_config.interval.as_secs()),
        "Serving"
    );

    #[cfg(unix)]
    spawn_reload_on_hangup(ctx.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Waiting for the running refresh cycle, if any");
    handle.shutdown();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "Scheduler task ended abnormally");
    }

    Ok(())
}

/// Run a single cycle in the foreground.
pub async fn refresh(ctx: &AppContext) -> Result<()> {
    if ctx.registry.is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    println!("Refreshing {} sources...", ctx.registry.len());
    let report = ctx.aggregator.run_cycle().await;
    print_report(&report);
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let sources = ctx.registry.list();
    if sources.is_empty() {
        println!("No sources");
        return Ok(());
    }

    for source in sources {
        let module = source
            .scraper_module
            .as_deref()
            .map(|m| format!(" [{m}]"))
            .unwrap_or_default();
        println!("{} ({}, {}{})\n  {}", source.name, source.tag, source.kind, module, source.url);
    }

    Ok(())
}

pub fn list_items(ctx: &AppContext, limit: usize, offset: usize) -> Result<()> {
    let total = ctx.store.count()?;
    let items = ctx.store.list(clamp_limit(limit), offset)?;

    if items.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in &items {
        let date = item
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());

        println!("{} [{}] {} ({})", date, item.tag, item.title, item.source_name);
        println!("           {}", item.link);
    }

    println!("\n{} of {} items (offset {})", items.len(), total, offset);
    Ok(())
}

fn print_report(report: &CycleReport) {
    for entry in &report.sources {
        match &entry.outcome {
            SourceOutcome::Succeeded {
                seen,
                inserted,
                updated,
                ..
            } => println!(
                "  {}: {} items ({} new, {} updated)",
                entry.source, seen, inserted, updated
            ),
            SourceOutcome::Failed { kind, reason } => {
                eprintln!("  {}: failed ({:?}): {}", entry.source, kind, reason)
            }
        }
    }

    let totals = report.totals();
    println!(
        "Refresh complete: {} new, {} updated, {} failed sources in {:.1}s",
        totals.inserted,
        totals.updated,
        totals.failed,
        report.elapsed_secs()
    );
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = tokio::signal::ctrl_c() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to set up SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested");
}

/// Reload the source list from the config file on SIGHUP.
#[cfg(unix)]
fn spawn_reload_on_hangup(ctx: Arc<AppContext>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Failed to set up SIGHUP handler");
            return;
        }
    };

    tokio::spawn(async move {
        while sighup.recv().await.is_some() {
            if let Err(e) = ctx.reload_sources() {
                warn!(error = %e, "Source reload failed; keeping current sources");
            }
        }
    });
}
