//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::LruStore;
use crate::error::{CacheError, Result};

// == Sweep Handle ==
/// Owner side of a running sweep. Dropping it also stops the sweep, without
/// waiting for the thread.
#[derive(Debug)]
pub struct SweepHandle {
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<()>,
    interval: Duration,
}

impl SweepHandle {
    /// Signals the sweep to stop and waits for its thread to exit. Consumes
    /// the handle, so the signal can only be sent once.
    ///
    /// Once this returns the sweep takes the store lock no more.
    pub fn stop(self) {
        // The task may already be gone if the store was dropped.
        let _ = self.shutdown.send(());
        if self.thread.thread().id() != thread::current().id() {
            let _ = self.thread.join();
        }
    }

    /// Returns false once the sweep thread has exited, for whatever reason.
    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Spawns a background task that calls `delete_expired` on the store every
/// `interval`.
///
/// The task holds only a weak reference: it exits on the stop signal, when
/// the [`SweepHandle`] is dropped, or when the store itself is gone.
///
/// The task always runs on its own `lru-sweep` thread with a current-thread
/// runtime, so it does not depend on any runtime the caller may be in.
///
/// # Arguments
/// * `store` - Weak reference to the locked store
/// * `interval` - Time between sweeps
pub fn spawn_sweep_task<K, V>(
    store: Weak<Mutex<LruStore<K, V>>>,
    interval: Duration,
) -> Result<SweepHandle>
where
    K: std::hash::Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    let (shutdown, stopped) = oneshot::channel();
    let task = run_sweep(store, interval, stopped);

    let runtime = Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(CacheError::SweepRuntime)?;
    let thread = thread::Builder::new()
        .name("lru-sweep".to_string())
        .spawn(move || runtime.block_on(task))
        .map_err(CacheError::SweepSpawn)?;

    Ok(SweepHandle {
        shutdown,
        thread,
        interval,
    })
}

async fn run_sweep<K, V>(
    store: Weak<Mutex<LruStore<K, V>>>,
    interval: Duration,
    mut stopped: oneshot::Receiver<()>,
) where
    K: std::hash::Hash + Eq + Clone,
{
    info!(
        "Starting expiry sweep with interval of {} ms",
        interval.as_millis()
    );

    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Stop wins over a tick that is ready at the same time.
            biased;
            _ = &mut stopped => break,
            _ = ticker.tick() => {
                let Some(store) = store.upgrade() else {
                    break;
                };
                let removed = store.lock().delete_expired();

                if removed > 0 {
                    info!("Expiry sweep: removed {} expired entries", removed);
                } else {
                    debug!("Expiry sweep: no expired entries found");
                }
            }
        }
    }

    info!("Expiry sweep stopped");
}
