use crate::core::cache::{RateCache, RateStore};
use crate::core::error::{RatesError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Default)]
struct State {
    pending: Option<RateCache>,
    timer: Option<JoinHandle<()>>,
    failure: Option<RatesError>,
}

/// Coalesces bursts of cache writes into a single store write.
///
/// `schedule` keeps only the latest snapshot and writes it once the window
/// elapses. `flush` writes whatever is pending right away and reports any
/// failure of an earlier background write. A snapshot whose write failed
/// stays pending until a later write succeeds. Nothing is written on drop,
/// so owners must `flush` before they go away.
pub struct DebouncedWriter<S: RateStore + 'static> {
    store: Arc<S>,
    window: Duration,
    state: Arc<Mutex<State>>,
}

impl<S: RateStore + 'static> DebouncedWriter<S> {
    pub fn new(store: S, window: Duration) -> Self {
        Self {
            store: Arc::new(store),
            window,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Queues `cache` for writing, replacing any snapshot still pending.
    pub async fn schedule(&self, cache: RateCache) {
        let mut state = self.state.lock().await;
        let coalesced = state.pending.replace(cache).is_some();
        debug!(coalesced, "Rate cache write scheduled");

        if state.timer.is_none() {
            let store = Arc::clone(&self.store);
            let shared = Arc::clone(&self.state);
            let window = self.window;
            state.timer = Some(tokio::spawn(async move {
                tokio::time::sleep(window).await;
                let mut state = shared.lock().await;
                state.timer = None;
                if let Some(cache) = state.pending.take() {
                    if let Err(e) = store.write(&cache).await {
                        warn!(error = %e, "Debounced rate cache write failed");
                        if state.pending.is_none() {
                            state.pending = Some(cache);
                        }
                        state.failure = Some(e);
                    }
                }
            }));
        }
    }

    /// Writes the pending snapshot now.
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        match state.pending.take() {
            Some(cache) => match self.store.write(&cache).await {
                Ok(()) => {
                    state.failure = None;
                    debug!(entries = cache.len(), "Rate cache flushed");
                    Ok(())
                }
                Err(e) => {
                    state.pending = Some(cache);
                    Err(e)
                }
            },
            None => state.failure.take().map_or(Ok(()), Err),
        }
    }
}
