//! Step pulse generation: one worker thread per moving axis.
//!
//! Workers only ever touch their own step line; they never take the hub
//! lock, so pulse timing is independent of I2C traffic. Timing is measured
//! against a monotonic baseline taken at the start of each pulse, so drift
//! does not accumulate across pulses within a move.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use embedded_hal::digital::OutputPin;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::motor::AxisId;

use super::profile::{StepPlan, StepTiming};

/// Emit every pulse of `plan` on `pin`, synchronously.
///
/// Checks `cancel` before each pulse; on cancellation no partial pulse is
/// emitted and the count of completed steps is returned. A completed,
/// uncancelled run always returns exactly `plan.total_steps()`.
pub fn run_plan<P: OutputPin>(
    pin: &mut P,
    plan: &StepPlan,
    timing: &StepTiming,
    cancel: &AtomicBool,
) -> Result<u32> {
    let high = Duration::from_nanos(timing.pulse_high_ns() as u64);
    let low = Duration::from_nanos(timing.pulse_low_ns() as u64);

    let mut done = 0;
    for step in 0..plan.total_steps() {
        if cancel.load(Ordering::Relaxed) {
            return Ok(done);
        }
        let period = Duration::from_nanos(plan.period_ns_at(step, timing));

        let start = Instant::now();
        pin.set_high()
            .map_err(|_| Error::Hardware("step pin write failed"))?;
        wait_until(start + high);
        pin.set_low()
            .map_err(|_| Error::Hardware("step pin write failed"))?;
        wait_until(start + high + low);
        wait_until(start + period);
        done += 1;
    }
    Ok(done)
}

// Sleep for the bulk of the interval, spin the last stretch. Plain sleep
// alone overshoots by scheduler quantum at microsecond periods.
fn wait_until(deadline: Instant) {
    const SPIN_WINDOW: Duration = Duration::from_micros(300);
    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        let remaining = deadline - now;
        if remaining > SPIN_WINDOW {
            thread::sleep(remaining - SPIN_WINDOW);
        } else {
            core::hint::spin_loop();
        }
    }
}

struct Worker<P> {
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    outcome: Receiver<(P, Result<u32>)>,
    handle: JoinHandle<()>,
}

/// The step-pulse channel for one axis.
///
/// Owns the axis's step pin while idle; during a move the pin travels into
/// the worker thread and comes back through the completion channel, which
/// makes "at most one worker per axis" structural rather than a convention.
pub struct StepChannel<P>
where
    P: OutputPin + Send + 'static,
{
    id: AxisId,
    timing: StepTiming,
    pin: Option<P>,
    worker: Option<Worker<P>>,
}

impl<P> StepChannel<P>
where
    P: OutputPin + Send + 'static,
{
    /// Create a channel around an axis's claimed step pin.
    pub fn new(id: AxisId, pin: P, timing: StepTiming) -> Self {
        Self {
            id,
            timing,
            pin: Some(pin),
            worker: None,
        }
    }

    /// Whether a worker is currently emitting pulses.
    pub fn is_busy(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.running.load(Ordering::Acquire))
    }

    /// Launch a worker for `plan`.
    ///
    /// An empty plan succeeds immediately without touching hardware.
    ///
    /// # Errors
    ///
    /// [`Error::Busy`] if the previous worker has not finished.
    pub fn start(&mut self, plan: StepPlan) -> Result<()> {
        if self.is_busy() {
            return Err(Error::Busy(self.id));
        }
        self.reap_finished();

        if plan.is_empty() {
            return Ok(());
        }

        let pin = self.pin.take().ok_or(Error::Hardware("step pin lost"))?;
        let cancel = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        let timing = self.timing;
        let worker_cancel = Arc::clone(&cancel);
        let worker_running = Arc::clone(&running);
        debug!(axis = %self.id, total_steps = plan.total_steps(), "starting step worker");

        let handle = thread::Builder::new()
            .name(format!("stepgen-{}", self.id))
            .spawn(move || {
                let mut pin = pin;
                let result = run_plan(&mut pin, &plan, &timing, &worker_cancel);
                worker_running.store(false, Ordering::Release);
                let _ = tx.send((pin, result));
            })
            .map_err(|_| Error::Hardware("failed to spawn step worker"))?;

        self.worker = Some(Worker {
            cancel,
            running,
            outcome: rx,
            handle,
        });
        Ok(())
    }

    /// Raise the cancellation signal for the in-progress worker.
    ///
    /// Observed at per-pulse granularity; idempotent when idle.
    pub fn stop(&self) {
        if let Some(worker) = &self.worker {
            worker.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Block until the worker completes, returning the steps it emitted.
    ///
    /// Does not cancel the move. Returns `Ok(0)` when no move was pending.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if `timeout` elapses first (the move keeps
    /// running); [`Error::Hardware`] if the worker failed to drive its pin.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<u32> {
        let Some(worker) = self.worker.take() else {
            return Ok(0);
        };

        let (pin, result) = match timeout {
            None => worker
                .outcome
                .recv()
                .map_err(|_| Error::Hardware("step worker vanished"))?,
            Some(timeout) => match worker.outcome.recv_timeout(timeout) {
                Ok(outcome) => outcome,
                Err(RecvTimeoutError::Timeout) => {
                    self.worker = Some(worker);
                    return Err(Error::Timeout(self.id));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Hardware("step worker vanished"))
                }
            },
        };

        let _ = worker.handle.join();
        self.pin = Some(pin);
        result
    }

    // Restore the pin from a worker that has already finished on its own.
    fn reap_finished(&mut self) {
        let finished = self
            .worker
            .as_ref()
            .is_some_and(|w| !w.running.load(Ordering::Acquire));
        if !finished {
            return;
        }
        if let Some(worker) = self.worker.take() {
            match worker.outcome.recv() {
                Ok((pin, result)) => {
                    self.pin = Some(pin);
                    if let Err(e) = result {
                        warn!(axis = %self.id, error = %e, "previous move failed");
                    }
                }
                Err(_) => warn!(axis = %self.id, "step worker vanished without reporting"),
            }
            let _ = worker.handle.join();
        }
    }
}
