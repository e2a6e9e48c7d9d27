//! Periodic code refresh aligned to wall-clock 30-second windows.
//!
//! `RefreshScheduler::start` emits the current code immediately, then ticks
//! once per interval with a fresh countdown fraction. The code is recomputed
//! only when the window rolls over. Cancelling (or dropping) the returned
//! handle stops the ticker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};
use zeroize::Zeroizing;

use crate::totp::{generate_code, remaining_fraction, time_window, CodeError};

/// Source of wall-clock time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// One displayable refresh result.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CodeTick {
    pub code: String,
    /// Share of the current window still remaining, `1.0` at the window start.
    pub remaining_fraction: f32,
    pub window: u64,
}

#[derive(Clone)]
pub struct RefreshScheduler {
    clock: Arc<dyn Clock>,
    digits: u32,
    tick_interval: Duration,
}

impl RefreshScheduler {
    pub fn new(clock: Arc<dyn Clock>, digits: u32, tick_interval: Duration) -> Self {
        Self {
            clock,
            digits,
            tick_interval,
        }
    }

    /// Start a fresh refresh cycle for `secret`.
    ///
    /// The first tick is computed before this returns, so subscribers see a
    /// code right away. Fails without spawning if the digit count is out of
    /// range or the tick interval is zero. Must be called inside a Tokio
    /// runtime.
    pub fn start(&self, secret: Zeroizing<Vec<u8>>) -> Result<RefreshHandle, CodeError> {
        if self.tick_interval.is_zero() {
            return Err(CodeError::ZeroInterval);
        }

        let now = self.clock.now_millis();
        let first = CodeTick {
            code: generate_code(&secret, now, self.digits)?,
            remaining_fraction: remaining_fraction(now),
            window: time_window(now),
        };
        debug!(
            "Starting code refresh at window {} ({:.3} remaining)",
            first.window, first.remaining_fraction
        );

        let (tick_tx, tick_rx) = watch::channel(first);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let task = tokio::spawn(run_ticker(
            self.clone(),
            secret,
            tick_tx,
            cancel_rx,
        ));

        Ok(RefreshHandle {
            ticks: tick_rx,
            cancel: Some(cancel_tx),
            task: Some(task),
        })
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("digits", &self.digits)
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

async fn run_ticker(
    scheduler: RefreshScheduler,
    secret: Zeroizing<Vec<u8>>,
    tick_tx: watch::Sender<CodeTick>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(scheduler.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and was already emitted by start()
    interval.tick().await;

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                debug!("Code refresh cancelled");
                break;
            }

            _ = interval.tick() => {
                let now = scheduler.clock.now_millis();
                let window = time_window(now);
                let code = if window == tick_tx.borrow().window {
                    tick_tx.borrow().code.clone()
                } else {
                    match generate_code(&secret, now, scheduler.digits) {
                        Ok(code) => {
                            debug!("Window rolled over to {}", window);
                            code
                        }
                        Err(e) => {
                            error!("Code refresh stopped: {}", e);
                            break;
                        }
                    }
                };

                tick_tx.send_replace(CodeTick {
                    code,
                    remaining_fraction: remaining_fraction(now),
                    window,
                });
            }
        }
    }
}

/// Owner of a running refresh cycle.
#[derive(Debug)]
pub struct RefreshHandle {
    ticks: watch::Receiver<CodeTick>,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    /// Subscribe to ticks. The receiver errors once the cycle stops.
    pub fn subscribe(&self) -> watch::Receiver<CodeTick> {
        self.ticks.clone()
    }

    pub fn latest(&self) -> CodeTick {
        self.ticks.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the ticker and wait for its task to exit.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
