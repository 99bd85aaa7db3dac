//! Timed barriers for run sequencing.
//!
//! The orchestrated run is paced by fixed, named waits (stagger, settle,
//! convergence). Durations are configuration, so tests can shrink them to a
//! few milliseconds. Every wait can be cut short by an [`Interrupt`], which
//! the process-wide SIGINT/SIGTERM hook raises.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Named waits of the convergence run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Between two consecutive instance starts
    Stagger,
    /// After the last start, before the first probing round
    Settle,
    /// Between the two probing rounds
    Convergence,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Stagger => "stagger",
            Phase::Settle => "settle",
            Phase::Convergence => "convergence",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durations of every timed step, deserialized from the `timing:` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    #[serde(with = "humantime_serde")]
    pub stagger: Duration,
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub convergence: Duration,
    /// Upper bound on one `status` query
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// How long a stop request waits before killing the router
    #[serde(with = "humantime_serde")]
    pub stop_grace: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            stagger: Duration::from_secs(2),
            settle: Duration::from_secs(10),
            convergence: Duration::from_secs(20),
            probe_timeout: Duration::from_secs(10),
            stop_grace: Duration::from_secs(5),
        }
    }
}

impl Timing {
    /// Duration of a named wait
    pub fn duration_of(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Stagger => self.stagger,
            Phase::Settle => self.settle,
            Phase::Convergence => self.convergence,
        }
    }
}

/// One-shot, process-wide interrupt flag that wakes sleeping waits
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter
    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        let mut raised = flag.lock().unwrap_or_else(|e| e.into_inner());
        *raised = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for `duration` unless interrupted first.
    ///
    /// Returns true if the interrupt fired before or during the wait.
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + duration;
        let mut raised = flag.lock().unwrap_or_else(|e| e.into_inner());
        while !*raised {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            raised = match cvar.wait_timeout(raised, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        true
    }
}

/// Register the SIGINT/SIGTERM hook for the whole process.
///
/// The hook only raises `interrupt`. The control thread wakes up, stops every
/// router and only then removes scratch files, so nothing is deleted while a
/// router can still write to it. Can only be installed once per process.
pub fn install_interrupt_hook(interrupt: Interrupt) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        log::warn!("Interrupt received, stopping routers before cleanup");
        interrupt.trigger();
    })
}

/// How a timed wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Interrupted,
}

/// Fixed-duration waits keyed by [`Phase`]
#[derive(Debug, Clone)]
pub struct TimedBarrier {
    timing: Timing,
    interrupt: Interrupt,
}

impl TimedBarrier {
    pub fn new(timing: Timing, interrupt: Interrupt) -> Self {
        Self { timing, interrupt }
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Block the control thread for the phase's configured duration
    pub fn wait(&self, phase: Phase) -> WaitOutcome {
        let duration = self.timing.duration_of(phase);
        log::info!("Waiting {:?} ({})", duration, phase);
        if self.interrupt.sleep(duration) {
            log::warn!("{} wait cut short by interrupt", phase);
            WaitOutcome::Interrupted
        } else {
            WaitOutcome::Elapsed
        }
    }
}
