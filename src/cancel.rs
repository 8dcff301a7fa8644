use crate::types::SyncError;
use crate::Result;
use std::time::Duration;
use tokio::sync::watch;

/// Cooperative cancellation for a sync run.
///
/// - `cancel()` flips a boolean and wakes sleepers.
/// - Loops check `is_cancelled()` between items.
/// - Pauses select on either the timer or cancellation.
#[derive(Clone, Debug)]
pub struct CancellationState {
    tx: watch::Sender<bool>,
}

impl Default for CancellationState {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Return [`SyncError::Interrupted`] if the run has been cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(SyncError::Interrupted);
        }
        Ok(())
    }

    /// Cancel on the first Ctrl-C and exit the process on the second.
    ///
    /// The handler is installed before this returns. It runs on a runtime
    /// worker, so library calls that block the calling thread still see the
    /// flag at their next check. That needs a multi-thread runtime.
    pub fn cancel_on_ctrl_c(&self) -> Result<()> {
        let mut interrupts = Interrupts::listen()?;
        let state = self.clone();
        tokio::spawn(async move {
            if !interrupts.next().await {
                return;
            }
            log::warn!("Interrupt received, stopping after the current step (press Ctrl-C again to quit now)");
            state.cancel();

            if interrupts.next().await {
                std::process::exit(130);
            }
        });
        Ok(())
    }
}

#[cfg(unix)]
struct Interrupts(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Interrupts {
    fn listen() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self(signal(SignalKind::interrupt())?))
    }

    async fn next(&mut self) -> bool {
        self.0.recv().await.is_some()
    }
}

#[cfg(not(unix))]
struct Interrupts;

#[cfg(not(unix))]
impl Interrupts {
    fn listen() -> Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> bool {
        tokio::signal::ctrl_c().await.is_ok()
    }
}

/// Sleep for `duration` unless the run is cancelled first.
pub async fn sleep_with_cancel(
    mut cancel_rx: watch::Receiver<bool>,
    duration: Duration,
) -> Result<()> {
    if *cancel_rx.borrow() {
        return Err(SyncError::Interrupted);
    }

    let sleeper = tokio::time::sleep(duration);
    tokio::pin!(sleeper);
    tokio::select! {
        _ = &mut sleeper => Ok(()),
        _ = async {
            loop {
                if cancel_rx.changed().await.is_err() {
                    // Sender dropped; the sleep can no longer be cancelled.
                    std::future::pending::<()>().await;
                }
                if *cancel_rx.borrow() {
                    break;
                }
            }
        } => Err(SyncError::Interrupted),
    }
}
