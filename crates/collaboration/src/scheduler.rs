//! Timer-driven progression of collaboration runs.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use parley_config::CollaborationConfig;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::CollaborationResult;
use crate::run::{CollaborationRun, Phase};

const SNAPSHOT_CAPACITY: usize = 64;

/// Offsets of every scheduled event, measured from the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollaborationTiming {
    pub log_interval: Duration,
    pub tandem_delay: Duration,
    pub team_delay: Duration,
    pub close_delay: Duration,
    pub log_window: usize,
}

impl CollaborationTiming {
    pub fn from_config(config: &CollaborationConfig) -> Self {
        Self {
            log_interval: config.log_interval(),
            tandem_delay: config.tandem_delay(),
            team_delay: config.team_delay(),
            close_delay: config.close_delay(),
            log_window: config.log_window,
        }
    }
}

impl Default for CollaborationTiming {
    fn default() -> Self {
        Self::from_config(&CollaborationConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Status,
    Advance(Phase),
    Complete,
}

struct RunSlot {
    run: CollaborationRun,
    /// Cancels the driver task of the live run
    cancel: Option<CancellationToken>,
}

struct Shared {
    slot: Mutex<RunSlot>,
    timing: CollaborationTiming,
    updates: broadcast::Sender<CollaborationRun>,
}

impl Shared {
    /// Apply a scheduled step if it still belongs to the live run.
    fn apply(&self, epoch: u64, step: Step) -> bool {
        let mut slot = self.slot.lock();
        let applied = match step {
            Step::Status => slot.run.record_status(epoch, self.timing.log_window),
            Step::Advance(phase) => slot.run.advance(epoch, phase),
            Step::Complete => slot.run.complete(epoch),
        };
        if !applied {
            debug!(epoch, ?step, "discarding step for superseded run");
            return false;
        }
        if matches!(step, Step::Complete) {
            slot.cancel = None;
        }

        match step {
            Step::Status => debug!(epoch, cursor = slot.run.log_cursor, "status line emitted"),
            Step::Advance(phase) => info!(
                epoch,
                %phase,
                participants = slot.run.participants.len(),
                "collaboration advanced"
            ),
            Step::Complete => info!(epoch, "collaboration completed"),
        }
        self.publish(&slot);
        true
    }

    /// Publish the slot's run. Callers hold the slot lock so observers see
    /// snapshots in the order the changes were made.
    fn publish(&self, slot: &RunSlot) {
        // Observers are optional.
        let _ = self.updates.send(slot.run.clone());
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(cancel) = self.slot.get_mut().cancel.take() {
            cancel.cancel();
        }
    }
}

/// Drives at most one collaboration run at a time.
///
/// Every run carries an epoch. Starting or stopping cancels the previous
/// run's driver, and any step that still fires for an older epoch is
/// discarded, so a superseded run can never be mutated.
#[derive(Clone)]
pub struct CollaborationScheduler {
    shared: Arc<Shared>,
}

impl CollaborationScheduler {
    pub fn new(timing: CollaborationTiming) -> Self {
        let (updates, _) = broadcast::channel(SNAPSHOT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(RunSlot {
                    run: CollaborationRun::default(),
                    cancel: None,
                }),
                timing,
                updates,
            }),
        }
    }

    pub fn from_config(config: &CollaborationConfig) -> Self {
        Self::new(CollaborationTiming::from_config(config))
    }

    /// Begin a new run in `Solo`, discarding any run in flight.
    ///
    /// Must be called from within a tokio runtime, which drives the timers.
    pub fn start_processing(&self) -> CollaborationResult<CollaborationRun> {
        let runtime = Handle::try_current()?;
        let started_at = Instant::now();
        let cancel = CancellationToken::new();

        let (epoch, snapshot) = {
            let mut slot = self.shared.slot.lock();
            if let Some(previous) = slot.cancel.take() {
                previous.cancel();
            }

            let epoch = slot.run.epoch + 1;
            slot.run.begin(epoch);
            slot.cancel = Some(cancel.clone());
            self.shared.publish(&slot);
            (epoch, slot.run.clone())
        };

        runtime.spawn(drive_run(
            Arc::downgrade(&self.shared),
            epoch,
            started_at,
            self.shared.timing,
            cancel,
        ));

        info!(epoch, "collaboration started");
        Ok(snapshot)
    }

    /// Abort the live run. Idempotent once closed.
    pub fn stop_processing(&self) -> CollaborationRun {
        let mut slot = self.shared.slot.lock();
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        if slot.run.terminate() {
            info!(epoch = slot.run.epoch, "collaboration stopped");
            self.shared.publish(&slot);
        }
        slot.run.clone()
    }

    pub fn snapshot(&self) -> CollaborationRun {
        self.shared.slot.lock().run.clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.slot.lock().run.phase
    }

    pub fn is_processing(&self) -> bool {
        self.shared.slot.lock().run.is_live()
    }

    /// Receive every snapshot published after a state change
    pub fn subscribe(&self) -> broadcast::Receiver<CollaborationRun> {
        self.shared.updates.subscribe()
    }

    pub fn timing(&self) -> CollaborationTiming {
        self.shared.timing
    }
}

impl Default for CollaborationScheduler {
    fn default() -> Self {
        Self::new(CollaborationTiming::default())
    }
}

async fn drive_run(
    shared: Weak<Shared>,
    epoch: u64,
    started_at: Instant,
    timing: CollaborationTiming,
    cancel: CancellationToken,
) {
    let period = timing.log_interval.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(started_at + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut schedule = [
        (started_at + timing.tandem_delay, Step::Advance(Phase::Tandem)),
        (started_at + timing.team_delay, Step::Advance(Phase::Team)),
        (started_at + timing.close_delay, Step::Complete),
    ]
    .into_iter();
    let mut next = schedule.next();

    while let Some((deadline, step)) = next {
        let fired = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(epoch, "collaboration driver cancelled");
                return;
            }
            _ = time::sleep_until(deadline) => step,
            _ = ticker.tick() => Step::Status,
        };

        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.apply(epoch, fired) {
            return;
        }
        if !matches!(fired, Step::Status) {
            next = schedule.next();
        }
    }
}
