//! Retention daemon lifecycle: run loop, control handle, status events.
//!
//! The run loop owns every state transition:
//!
//! ```text
//! NotStarted → Running (initial sweep, then ticks) → Stopping (terminal sweep) → Stopped
//! ```
//!
//! Callers talk to it only through [`DaemonControl`] (stop / cleanup-now) and
//! observe it through [`DaemonHandle::state`] and [`SweepReport`] events.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use chestkeeper_core::{Cadence, DaemonConfig};

use crate::disposer::Disposer;
use crate::error::DaemonError;
use crate::policy::{SweepEngine, SweepKind, SweepReport, Watermarks};
use crate::scanner::Scanner;

const EVENT_CAPACITY: usize = 64;

/// Stand-in deadline for intervals too long to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DaemonState::NotStarted => "not started",
            DaemonState::Running => "running",
            DaemonState::Stopping => "stopping",
            DaemonState::Stopped => "stopped",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCommand {
    Stop,
    CleanupNow,
}

#[derive(Debug, PartialEq, Eq)]
enum WaitOutcome {
    Elapsed,
    Stop,
}

/// Cloneable, thread-safe sender for the two control signals.
///
/// Dropping every `DaemonControl` (and the owning [`DaemonHandle`]) stops the
/// daemon as if [`request_stop`](Self::request_stop) had been called.
#[derive(Debug, Clone)]
pub struct DaemonControl {
    tx: mpsc::UnboundedSender<ControlCommand>,
}

impl DaemonControl {
    /// Ask the run loop to finish. Idempotent; a no-op once the daemon stopped.
    pub fn request_stop(&self) {
        let _ = self.tx.send(ControlCommand::Stop);
    }

    /// Ask for a full sweep at the next tick. Requests arriving before that
    /// tick coalesce into one sweep.
    pub fn request_cleanup(&self) {
        let _ = self.tx.send(ControlCommand::CleanupNow);
    }
}

/// A configured daemon that has not been started yet.
pub struct RetentionDaemon {
    engine: Arc<SweepEngine>,
    interval: Duration,
    cadence: Cadence,
    control: DaemonControl,
    commands: mpsc::UnboundedReceiver<ControlCommand>,
    state: watch::Sender<DaemonState>,
    events: broadcast::Sender<SweepReport>,
}

impl RetentionDaemon {
    /// Validate `config` and build a daemon whose disposal mode follows
    /// `config.archive_dir`.
    pub fn new(config: DaemonConfig) -> Result<Self, DaemonError> {
        Self::check(&config)?;
        Ok(Self::assemble(&config, SweepEngine::from_config(&config)))
    }

    /// Like [`new`](Self::new) with a caller-provided disposal strategy.
    pub fn with_disposer(
        config: DaemonConfig,
        disposer: Box<dyn Disposer>,
    ) -> Result<Self, DaemonError> {
        Self::check(&config)?;
        let engine = SweepEngine::new(
            Scanner::new(&config.watched_dir),
            disposer,
            Watermarks {
                lower: config.lower_watermark,
                upper: config.upper_watermark,
            },
        );
        Ok(Self::assemble(&config, engine))
    }

    fn check(config: &DaemonConfig) -> Result<(), DaemonError> {
        config.validate()?;
        config.check_directories()?;
        Ok(())
    }

    fn assemble(config: &DaemonConfig, engine: SweepEngine) -> Self {
        let (tx, commands) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(DaemonState::NotStarted);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            engine: Arc::new(engine),
            interval: config.poll_interval(),
            cadence: config.cadence,
            control: DaemonControl { tx },
            commands,
            state,
            events,
        }
    }

    pub fn control(&self) -> DaemonControl {
        self.control.clone()
    }

    /// Subscribe before [`start`](Self::start) to observe the initial sweep.
    pub fn subscribe(&self) -> broadcast::Receiver<SweepReport> {
        self.events.subscribe()
    }

    /// Spawn the run loop on the current Tokio runtime.
    pub fn start(self) -> DaemonHandle {
        let state_rx = self.state.subscribe();
        let events = self.events.clone();
        let control = self.control.clone();

        let task = tokio::spawn(run_loop(
            self.engine,
            self.interval,
            self.cadence,
            self.commands,
            self.state,
            self.events,
        ));

        DaemonHandle {
            control,
            state: state_rx,
            events,
            task,
        }
    }
}

/// Handle to a running daemon.
pub struct DaemonHandle {
    control: DaemonControl,
    state: watch::Receiver<DaemonState>,
    events: broadcast::Sender<SweepReport>,
    task: JoinHandle<()>,
}

impl DaemonHandle {
    pub fn control(&self) -> DaemonControl {
        self.control.clone()
    }

    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    pub fn request_cleanup(&self) {
        self.control.request_cleanup();
    }

    pub fn state(&self) -> DaemonState {
        *self.state.borrow()
    }

    /// A receiver that yields the state on every transition.
    pub fn watch_state(&self) -> watch::Receiver<DaemonState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SweepReport> {
        self.events.subscribe()
    }

    /// Wait for the run loop to finish its terminal sweep.
    pub async fn join(self) -> Result<(), DaemonError> {
        self.task.await.map_err(|source| DaemonError::Task {
            task: "run loop",
            source,
        })
    }
}

async fn run_loop(
    engine: Arc<SweepEngine>,
    interval: Duration,
    cadence: Cadence,
    mut commands: mpsc::UnboundedReceiver<ControlCommand>,
    state: watch::Sender<DaemonState>,
    events: broadcast::Sender<SweepReport>,
) {
    state.send_replace(DaemonState::Running);
    tracing::info!(
        dir = %engine.scanner().dir().display(),
        interval_ms = interval.as_millis() as u64,
        "retention daemon starting"
    );
    run_sweep(&engine, &events, SweepKind::Initial).await;

    let mut cleanup_pending = false;
    loop {
        if wait_for_tick(&mut commands, interval, &mut cleanup_pending).await == WaitOutcome::Stop {
            break;
        }
        if std::mem::take(&mut cleanup_pending) {
            run_sweep(&engine, &events, SweepKind::Instructed).await;
        }
        run_sweep(&engine, &events, SweepKind::Threshold).await;

        if cadence == Cadence::Parity
            && wait_for_tick(&mut commands, interval, &mut cleanup_pending).await
                == WaitOutcome::Stop
        {
            break;
        }
    }

    state.send_replace(DaemonState::Stopping);
    tracing::info!("retention daemon terminating");
    run_sweep(&engine, &events, SweepKind::Terminal).await;
    state.send_replace(DaemonState::Stopped);
}

/// Wait out one interval. Cleanup requests are recorded without ending the
/// wait; a stop request (or every sender gone) ends it early.
async fn wait_for_tick(
    commands: &mut mpsc::UnboundedReceiver<ControlCommand>,
    interval: Duration,
    cleanup_pending: &mut bool,
) -> WaitOutcome {
    let now = Instant::now();
    let deadline = now
        .checked_add(interval)
        .unwrap_or_else(|| now + FAR_FUTURE);
    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return WaitOutcome::Elapsed,
            command = commands.recv() => match command {
                Some(ControlCommand::CleanupNow) => *cleanup_pending = true,
                Some(ControlCommand::Stop) | None => return WaitOutcome::Stop,
            },
        }
    }
}

/// Run one sweep off the async workers. Errors are logged, never fatal.
async fn run_sweep(
    engine: &Arc<SweepEngine>,
    events: &broadcast::Sender<SweepReport>,
    kind: SweepKind,
) {
    let engine = engine.clone();
    match tokio::task::spawn_blocking(move || engine.sweep(kind)).await {
        Ok(Ok(Some(report))) => {
            // No subscribers is fine.
            let _ = events.send(report);
        }
        Ok(Ok(None)) => {}
        Ok(Err(err)) => tracing::warn!(sweep = %kind, error = %err, "sweep aborted"),
        Err(err) => tracing::error!(sweep = %kind, error = %err, "sweep task join failure"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cleanup_requests_coalesce_within_one_wait() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..3 {
            tx.send(ControlCommand::CleanupNow).expect("send");
        }

        let mut pending = false;
        let outcome = wait_for_tick(&mut rx, Duration::from_secs(2), &mut pending).await;
        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert!(pending);
        assert!(rx.try_recv().is_err(), "all requests consumed by one wait");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn stop_ends_wait_early() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ControlCommand::Stop).expect("send");

        let started = Instant::now();
        let mut pending = false;
        let outcome = wait_for_tick(&mut rx, Duration::from_secs(60), &mut pending).await;
        assert_eq!(outcome, WaitOutcome::Stop);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(!pending);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn closed_channel_counts_as_stop() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ControlCommand>();
        drop(tx);
        let mut pending = false;
        let outcome = wait_for_tick(&mut rx, Duration::from_secs(1), &mut pending).await;
        assert_eq!(outcome, WaitOutcome::Stop);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn interval_past_instant_range_still_stops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ControlCommand::Stop).expect("send");

        let mut pending = false;
        let outcome = wait_for_tick(&mut rx, Duration::MAX, &mut pending).await;
        assert_eq!(outcome, WaitOutcome::Stop);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cleanup_then_stop_keeps_pending_flag() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(ControlCommand::CleanupNow).expect("send");
        tx.send(ControlCommand::Stop).expect("send");

        let mut pending = false;
        let outcome = wait_for_tick(&mut rx, Duration::from_secs(1), &mut pending).await;
        assert_eq!(outcome, WaitOutcome::Stop);
        assert!(pending);
    }
}
