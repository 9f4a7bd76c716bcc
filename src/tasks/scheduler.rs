use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::services::attempts;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = vec![tokio::spawn(auto_submit_sweep_loop(state.clone(), shutdown_rx))];

    crate::core::shutdown::shutdown_signal("worker").await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

/// Durable fallback for in-process timers: finalizes every overdue started attempt.
async fn auto_submit_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let exam = state.settings().exam();
    let batch = exam.auto_submit_sweep_batch;
    let mut tick = interval(Duration::from_secs(exam.auto_submit_sweep_interval_seconds));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                match attempts::sweep_overdue(&state, primitive_now_utc(), batch).await {
                    Ok(report) if report.scanned > 0 => tracing::info!(
                        scanned = report.scanned,
                        finalized = report.finalized,
                        skipped = report.skipped,
                        "auto-submit sweep finished"
                    ),
                    Ok(_) => {}
                    Err(err) => tracing::error!(error = %err, "auto-submit sweep failed"),
                }
            }
        }
    }
}
