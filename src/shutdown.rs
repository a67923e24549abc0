//! Shutdown hooks for persistent generators.
//!
//! The generator itself never installs signal handlers. The surrounding
//! application chooses how state gets flushed:
//!
//! - [`spawn_signal_listener`] turns SIGINT/SIGTERM into a `watch` notification
//! - [`spawn_save_on_shutdown`] saves once that notification fires
//! - [`FlushGuard`] saves on every scope exit, including unwinding
//! - [`install_panic_flush`] saves from the panic hook before the default report

use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::generator::Generator;

/// Wait for SIGINT (Ctrl+C) or, on Unix, SIGTERM.
pub async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = ctrl_c => {
                result?;
                tracing::info!("Received SIGINT (Ctrl+C), initiating shutdown...");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await?;
        tracing::info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}

/// Spawn a task that flips `shutdown_tx` to `true` on the first signal.
pub fn spawn_signal_listener(shutdown_tx: watch::Sender<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = shutdown_signal().await {
            tracing::error!(error = %err, "Failed to listen for shutdown signals");
            return;
        }
        // Receivers may already be gone
        let _ = shutdown_tx.send(true);
    })
}

/// Spawn a task that saves `generator` once `shutdown_rx` reads `true`.
///
/// The save is best-effort: failures are logged, never propagated, so they
/// cannot hold up process exit. The task resolves to whether a value was
/// written. If every sender is dropped before shutdown is signalled, the
/// task resolves to `false` without saving.
pub fn spawn_save_on_shutdown<C>(
    generator: Arc<Generator<C>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<bool>
where
    C: Clock + 'static,
{
    tokio::spawn(async move {
        let signalled = shutdown_rx.wait_for(|stop| *stop).await.is_ok();
        if !signalled {
            return false;
        }

        // Takes the generator lock, which a caller may hold while spinning
        // on the clock.
        tokio::task::spawn_blocking(move || generator.flush_best_effort())
            .await
            .unwrap_or(false)
    })
}

/// Flushes the wrapped generator when dropped.
///
/// Dereferences to the generator, so it can stand in for it for the
/// lifetime of a scope.
#[derive(Debug)]
pub struct FlushGuard<C: Clock> {
    generator: Arc<Generator<C>>,
}

impl<C: Clock> FlushGuard<C> {
    pub fn new(generator: Arc<Generator<C>>) -> Self {
        Self { generator }
    }

    /// A shared handle to the guarded generator.
    pub fn generator(&self) -> Arc<Generator<C>> {
        Arc::clone(&self.generator)
    }
}

impl<C: Clock> Deref for FlushGuard<C> {
    type Target = Generator<C>;

    fn deref(&self) -> &Self::Target {
        &self.generator
    }
}

impl<C: Clock> Drop for FlushGuard<C> {
    fn drop(&mut self) {
        if !self.generator.is_persistent() {
            return;
        }
        if std::thread::panicking() {
            self.generator.try_flush();
        } else {
            self.generator.flush_best_effort();
        }
    }
}

/// Chain a panic hook that flushes `generator` before the previous hook runs.
///
/// Uses a non-blocking lock attempt, so a panic raised while the generator
/// lock is held skips the flush instead of deadlocking.
pub fn install_panic_flush<C>(generator: Arc<Generator<C>>)
where
    C: Clock + 'static,
{
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if generator.try_flush() {
            tracing::info!(node_id = generator.node_id(), "Flushed state from panic hook");
        }
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::layout::DEFAULT_EPOCH_MS;
    use crate::storage::MemoryStore;

    fn persistent(now: i64) -> (Arc<Generator<ManualClock>>, MemoryStore, ManualClock) {
        let clock = ManualClock::new(now);
        let store = MemoryStore::new();
        let generator = Generator::builder(5)
            .clock(clock.clone())
            .store(store.clone())
            .build()
            .unwrap();
        (Arc::new(generator), store, clock)
    }

    #[tokio::test]
    async fn test_save_on_shutdown_notification() {
        let (generator, store, clock) = persistent(DEFAULT_EPOCH_MS + 100);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = spawn_save_on_shutdown(Arc::clone(&generator), shutdown_rx);

        clock.advance(20);
        generator.next_id().unwrap();
        assert!(!handle.is_finished());

        shutdown_tx.send(true).unwrap();
        let saved = tokio_test::assert_ok!(handle.await);
        assert!(saved);
        assert_eq!(store.value(), Some(DEFAULT_EPOCH_MS + 120));
    }

    #[tokio::test]
    async fn test_no_save_when_sender_dropped() {
        let (generator, store, _clock) = persistent(DEFAULT_EPOCH_MS);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = spawn_save_on_shutdown(generator, shutdown_rx);
        drop(shutdown_tx);

        assert!(!handle.await.unwrap());
        assert_eq!(store.value(), None);
    }

    #[test]
    fn test_flush_guard_saves_on_drop() {
        let (generator, store, clock) = persistent(DEFAULT_EPOCH_MS + 1);

        {
            let guard = FlushGuard::new(Arc::clone(&generator));
            clock.advance(1);
            guard.next_id().unwrap();
        }

        assert_eq!(store.value(), Some(DEFAULT_EPOCH_MS + 2));
    }

    #[test]
    fn test_flush_guard_saves_on_unwind() {
        let (generator, store, clock) = persistent(DEFAULT_EPOCH_MS + 1);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let guard = FlushGuard::new(Arc::clone(&generator));
            clock.advance(4);
            guard.next_id().unwrap();
            panic!("worker fault");
        }));

        assert!(result.is_err());
        assert_eq!(store.value(), Some(DEFAULT_EPOCH_MS + 5));
    }

    #[test]
    fn test_panic_hook_flushes() {
        let (generator, store, clock) = persistent(DEFAULT_EPOCH_MS + 10);
        clock.advance(3);
        generator.next_id().unwrap();

        install_panic_flush(Arc::clone(&generator));
        let result = std::panic::catch_unwind(|| panic!("unrecoverable"));
        let _ = std::panic::take_hook();

        assert!(result.is_err());
        assert_eq!(store.value(), Some(DEFAULT_EPOCH_MS + 13));
    }
}
