//! In-process auto-submit timers.
//!
//! One tokio task per started attempt sleeps until the deadline and then finalizes it. Timers
//! are lost on restart, so the API re-arms them from the `attempts` table at boot and the worker
//! sweep finalizes anything overdue regardless.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use time::PrimitiveDateTime;
use tokio::task::JoinHandle;

use crate::core::state::AppState;
use crate::core::time::{delay_until, primitive_now_utc};
use crate::repositories;
use crate::services::attempts;

#[derive(Clone, Default)]
pub(crate) struct AutoSubmitScheduler {
    timers: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl AutoSubmitScheduler {
    /// Arms (or re-arms) the timer for `attempt_id`.
    pub(crate) fn schedule(&self, state: &AppState, attempt_id: &str, deadline: PrimitiveDateTime) {
        let delay = delay_until(deadline, primitive_now_utc());
        let task_state = state.clone();
        let id = attempt_id.to_string();

        self.schedule_after(attempt_id, delay, async move {
            tracing::info!(attempt_id = %id, "auto-submit timer fired");
            if let Err(err) = attempts::auto_submit(&task_state, &id).await {
                tracing::error!(attempt_id = %id, error = %err, "auto-submit failed");
            }
        });
    }

    fn schedule_after<F>(&self, attempt_id: &str, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let timers = Arc::clone(&self.timers);
        let id = attempt_id.to_string();

        // Held across spawn so a zero-delay timer cannot deregister before it is registered.
        let mut guard = lock(&self.timers);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&timers).remove(&id);
            job.await;
        });

        if let Some(previous) = guard.insert(attempt_id.to_string(), handle) {
            previous.abort();
        }
    }

    /// Best effort: a timer that already fired still runs to completion.
    pub(crate) fn cancel(&self, attempt_id: &str) -> bool {
        match lock(&self.timers).remove(attempt_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn pending(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Arms a timer for every started attempt. Overdue ones fire immediately.
    pub(crate) async fn rearm_pending(&self, state: &AppState) -> Result<usize, sqlx::Error> {
        let deadlines = repositories::attempts::list_live_deadlines(state.db()).await?;
        for (attempt_id, deadline) in &deadlines {
            self.schedule(state, attempt_id, *deadline);
        }
        Ok(deadlines.len())
    }
}

fn lock(
    timers: &Mutex<HashMap<String, JoinHandle<()>>>,
) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
    timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter_job(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timer_fires_after_delay_and_unregisters() {
        let scheduler = AutoSubmitScheduler::default();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after("a1", Duration::from_secs(30), counter_job(&fired));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let scheduler = AutoSubmitScheduler::default();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after("a1", Duration::from_secs(10), counter_job(&fired));
        assert!(scheduler.cancel("a1"));
        assert!(!scheduler.cancel("a1"));

        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_previous_timer() {
        let scheduler = AutoSubmitScheduler::default();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.schedule_after("a1", Duration::from_secs(5), counter_job(&fired));
        scheduler.schedule_after("a1", Duration::from_secs(20), counter_job(&fired));
        assert_eq!(scheduler.pending(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(15)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
