//! Authenticator - runs the unlock flow on its own task.
//!
//! The task owns the `UnlockMachine` and is the only writer of its state.
//! User input arrives as commands over a channel; a biometric challenge runs
//! as a separate task while `Locked` and races manual entry. Whichever
//! succeeds first unlocks, and the challenge is aborted if manual entry won.
//! Once unlocked the task runs the code refresh cycle and forwards ticks to
//! subscribers.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use super::biometric::{BiometricChallenger, BiometricOutcome};
use super::error::UnlockError;
use super::machine::UnlockMachine;
use super::state::{Notice, UnlockSnapshot, UnlockStatus};
use crate::clipboard::CodeSink;
use crate::error::{PcAuthError, Result};
use crate::refresh::{CodeTick, RefreshHandle, RefreshScheduler};

type Reply<T> = oneshot::Sender<std::result::Result<T, UnlockError>>;

enum Command {
    SubmitPin {
        input: Zeroizing<String>,
        reply: Reply<UnlockStatus>,
    },
    RetryBiometric {
        reply: Reply<()>,
    },
    CopyCode {
        reply: Reply<()>,
    },
    Shutdown,
}

/// Handle to the running unlock flow.
pub struct Authenticator {
    command_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<UnlockSnapshot>,
    code_rx: watch::Receiver<Option<CodeTick>>,
    task: Option<JoinHandle<()>>,
}

impl Authenticator {
    /// Spawn the driver task. Starts a biometric challenge right away if the
    /// machine is `Locked` and a challenger is supplied.
    pub fn spawn(
        machine: UnlockMachine,
        scheduler: RefreshScheduler,
        biometric: Option<Arc<dyn BiometricChallenger>>,
        sink: Arc<dyn CodeSink>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (code_tx, code_rx) = watch::channel(None);
        let status_rx = machine.subscribe();

        let driver = Driver {
            machine,
            scheduler,
            biometric,
            sink,
            code_tx,
            challenge: None,
            refresh: None,
            ticks: None,
        };
        let task = tokio::spawn(driver.run(command_rx));

        Self {
            command_tx,
            status_rx,
            code_rx,
            task: Some(task),
        }
    }

    /// Submit a PIN to whichever step is active (setup, confirm or login).
    pub async fn submit_pin(&self, input: impl Into<String>) -> Result<UnlockStatus> {
        let input = Zeroizing::new(input.into());
        self.request(|reply| Command::SubmitPin { input, reply }).await
    }

    /// Launch another biometric challenge after a failure or cancellation.
    pub async fn retry_biometric(&self) -> Result<()> {
        self.request(|reply| Command::RetryBiometric { reply }).await
    }

    /// Push the current code to the code sink.
    pub async fn copy_code(&self) -> Result<()> {
        self.request(|reply| Command::CopyCode { reply }).await
    }

    pub fn snapshot(&self) -> UnlockSnapshot {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UnlockSnapshot> {
        self.status_rx.clone()
    }

    /// Subscribe to code ticks. `None` until unlocked.
    pub fn codes(&self) -> watch::Receiver<Option<CodeTick>> {
        self.code_rx.clone()
    }

    /// Cancel any pending biometric prompt and the refresh cycle, then wait
    /// for the driver task to exit.
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn request<T, F>(&self, build: F) -> Result<T>
    where
        F: FnOnce(Reply<T>) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.command_tx
            .send(build(reply))
            .await
            .map_err(|_| PcAuthError::ChannelClosed)?;
        let result = response.await.map_err(|_| PcAuthError::ChannelClosed)?;
        Ok(result?)
    }
}

impl Drop for Authenticator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// A biometric challenge in flight. Dropping it aborts the prompt.
struct Challenge(JoinHandle<BiometricOutcome>);

impl Drop for Challenge {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct Driver {
    machine: UnlockMachine,
    scheduler: RefreshScheduler,
    biometric: Option<Arc<dyn BiometricChallenger>>,
    sink: Arc<dyn CodeSink>,
    code_tx: watch::Sender<Option<CodeTick>>,
    challenge: Option<Challenge>,
    refresh: Option<RefreshHandle>,
    ticks: Option<watch::Receiver<CodeTick>>,
}

impl Driver {
    async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        if self.machine.status() == UnlockStatus::Locked {
            self.start_challenge();
        }

        loop {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::SubmitPin { input, reply }) => {
                        let before = self.machine.status();
                        let result = self.machine.submit_pin(&input).await;
                        self.after_event(before);
                        let _ = reply.send(result);
                    }
                    Some(Command::RetryBiometric { reply }) => {
                        let _ = reply.send(self.retry_challenge());
                    }
                    Some(Command::CopyCode { reply }) => {
                        let _ = reply.send(self.copy_code());
                    }
                    Some(Command::Shutdown) | None => break,
                },

                outcome = wait_challenge(&mut self.challenge) => {
                    self.challenge = None;
                    debug!("Biometric challenge finished: {:?}", outcome);
                    let before = self.machine.status();
                    if let Err(e) = self.machine.submit_biometric(outcome) {
                        debug!("Biometric result not applied: {}", e);
                    }
                    self.after_event(before);
                }

                tick = wait_tick(&mut self.ticks) => match tick {
                    Some(tick) => {
                        self.code_tx.send_replace(Some(tick));
                    }
                    None => {
                        warn!("Code refresh stopped unexpectedly");
                        self.ticks = None;
                    }
                },
            }
        }

        self.teardown().await;
    }

    fn after_event(&mut self, before: UnlockStatus) {
        let now = self.machine.status();
        if now == before {
            return;
        }

        match now {
            UnlockStatus::Locked => self.start_challenge(),
            UnlockStatus::Unlocked => {
                if self.challenge.take().is_some() {
                    debug!("Cancelled pending biometric challenge");
                }
                self.start_refresh();
            }
            _ => {}
        }
    }

    fn start_challenge(&mut self) {
        let Some(challenger) = self.biometric.clone() else {
            return;
        };
        if self.challenge.is_some() {
            return;
        }

        debug!("Starting biometric challenge");
        let task = tokio::spawn(async move { challenger.authenticate().await });
        self.challenge = Some(Challenge(task));
    }

    fn retry_challenge(&mut self) -> std::result::Result<(), UnlockError> {
        let status = self.machine.status();
        if status != UnlockStatus::Locked || self.biometric.is_none() {
            return Err(UnlockError::InvalidEvent {
                event: "Biometric retry",
                status,
            });
        }
        self.start_challenge();
        Ok(())
    }

    fn start_refresh(&mut self) {
        if self.refresh.is_some() {
            return;
        }
        let Some(pin) = self.machine.secret() else {
            return;
        };

        match self.scheduler.start(Zeroizing::new(pin.as_bytes().to_vec())) {
            Ok(handle) => {
                info!("Code refresh started");
                self.code_tx.send_replace(Some(handle.latest()));
                self.ticks = Some(handle.subscribe());
                self.refresh = Some(handle);
            }
            Err(e) => {
                error!("Cannot start code refresh: {}", e);
            }
        }
    }

    fn copy_code(&mut self) -> std::result::Result<(), UnlockError> {
        let code = self.code_tx.borrow().as_ref().map(|tick| tick.code.clone());
        let Some(code) = code else {
            return Err(UnlockError::InvalidEvent {
                event: "Copy code",
                status: self.machine.status(),
            });
        };

        self.sink.push_code(&code);
        self.machine.notify(Notice {
            code: "COPIED".into(),
            message: "Copied!".into(),
        });
        Ok(())
    }

    async fn teardown(&mut self) {
        if self.challenge.take().is_some() {
            debug!("Cancelled pending biometric challenge");
        }
        self.ticks = None;
        if let Some(refresh) = self.refresh.take() {
            refresh.cancel().await;
        }
        info!("Authenticator stopped");
    }
}

async fn wait_challenge(challenge: &mut Option<Challenge>) -> BiometricOutcome {
    match challenge.as_mut() {
        // A panicked or aborted prompt counts as cancelled
        Some(Challenge(task)) => task.await.unwrap_or(BiometricOutcome::Cancelled),
        None => std::future::pending().await,
    }
}

async fn wait_tick(ticks: &mut Option<watch::Receiver<CodeTick>>) -> Option<CodeTick> {
    match ticks.as_mut() {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
