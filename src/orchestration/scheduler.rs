//! Adaptive refresh scheduler.
//!
//! Polls every tracked league on an idle cadence and switches to a faster
//! live cadence while any tracked game is in progress. Ticks are skipped
//! (never queued) while the consumer is backgrounded, and repeated
//! rate-limiting stretches the interval.

use crate::store::{MatchupStore, RefreshEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Backoff doubling stops growing after this many consecutive cycles.
const MAX_BACKOFF_STEPS: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub idle_cadence: Duration,
    pub live_cadence: Duration,
    pub max_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            idle_cadence: Duration::from_secs(300),
            live_cadence: Duration::from_secs(30),
            max_backoff: Duration::from_secs(900),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Idle,
    Live,
}

/// Cadence state machine, separated from timers so it can be driven directly.
#[derive(Debug, Clone)]
pub struct CadenceMachine {
    config: SchedulerConfig,
    cadence: Cadence,
    rate_limit_streak: u32,
    fire_now: bool,
}

impl CadenceMachine {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            cadence: Cadence::Idle,
            rate_limit_streak: 0,
            // First tick runs on startup.
            fire_now: true,
        }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn rate_limit_streak(&self) -> u32 {
        self.rate_limit_streak
    }

    /// Current interval between ticks, including rate-limit backoff.
    pub fn interval(&self) -> Duration {
        let base = match self.cadence {
            Cadence::Idle => self.config.idle_cadence,
            Cadence::Live => self.config.live_cadence,
        };
        if self.rate_limit_streak == 0 {
            return base;
        }
        let ceiling = self.config.max_backoff.max(base);
        base.checked_mul(1u32 << self.rate_limit_streak.min(MAX_BACKOFF_STEPS))
            .map_or(ceiling, |d| d.min(ceiling))
    }

    /// Delay until the next tick. Consumes a pending immediate-fire request.
    pub fn next_delay(&mut self) -> Duration {
        if std::mem::take(&mut self.fire_now) {
            Duration::ZERO
        } else {
            self.interval()
        }
    }

    /// Request that the next tick fires without waiting.
    pub fn fire_now(&mut self) {
        self.fire_now = true;
    }

    /// Fold in the result of a completed refresh cycle. Returns the new
    /// cadence when it changed.
    pub fn observe_cycle(&mut self, live: bool, rate_limited: bool) -> Option<Cadence> {
        self.rate_limit_streak = if rate_limited {
            self.rate_limit_streak.saturating_add(1).min(MAX_BACKOFF_STEPS)
        } else {
            0
        };
        let next = if live { Cadence::Live } else { Cadence::Idle };
        (next != self.cadence).then(|| {
            self.cadence = next;
            next
        })
    }

    /// A live game was reported outside a scheduled tick (e.g. by a manual
    /// refresh). Switches to live cadence and fires at once.
    pub fn observe_live_signal(&mut self) -> bool {
        if self.cadence == Cadence::Live {
            return false;
        }
        self.cadence = Cadence::Live;
        self.fire_now = true;
        true
    }
}

/// Foreground/background flag shared between the consumer and the scheduler.
#[derive(Debug, Clone)]
pub struct ActivityHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ActivityHandle {
    pub fn new(foreground: bool) -> Self {
        let (tx, _) = watch::channel(foreground);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_foreground(&self, foreground: bool) {
        let previous = self.tx.send_replace(foreground);
        if previous != foreground {
            debug!(foreground, "Activity changed");
        }
    }

    pub fn is_foreground(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ActivityHandle {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Snapshot of scheduler bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshState {
    pub cadence: Cadence,
    pub interval_ms: u64,
    pub last_tick: Option<DateTime<Utc>>,
    pub in_flight: bool,
    pub rate_limit_streak: u32,
    pub skipped_ticks: u64,
    pub foreground: bool,
}

#[derive(Debug)]
struct Shared {
    machine: CadenceMachine,
    last_tick: Option<DateTime<Utc>>,
    in_flight: bool,
    skipped_ticks: u64,
    /// A tick was skipped in the background and has not been made up.
    missed_tick: bool,
}

/// Read handle to a running scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Mutex<Shared>>,
    activity: ActivityHandle,
}

impl SchedulerHandle {
    pub fn state(&self) -> RefreshState {
        let shared = lock(&self.shared);
        RefreshState {
            cadence: shared.machine.cadence(),
            interval_ms: shared.machine.interval().as_millis() as u64,
            last_tick: shared.last_tick,
            in_flight: shared.in_flight,
            rate_limit_streak: shared.machine.rate_limit_streak(),
            skipped_ticks: shared.skipped_ticks,
            foreground: self.activity.is_foreground(),
        }
    }

    pub fn activity(&self) -> &ActivityHandle {
        &self.activity
    }
}

fn lock(m: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct RefreshScheduler {
    store: MatchupStore,
    activity: ActivityHandle,
    shared: Arc<Mutex<Shared>>,
}

impl RefreshScheduler {
    pub fn new(store: MatchupStore, config: SchedulerConfig, activity: ActivityHandle) -> Self {
        Self {
            store,
            activity,
            shared: Arc::new(Mutex::new(Shared {
                machine: CadenceMachine::new(config),
                last_tick: None,
                in_flight: false,
                skipped_ticks: 0,
                missed_tick: false,
            })),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
            activity: self.activity.clone(),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the store's event channel closes.
    pub async fn run(self) {
        info!("Refresh scheduler started");
        let mut events = self.store.subscribe();
        let mut activity = self.activity.subscribe();
        let mut next_tick = self.next_tick();

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_tick) => {
                    self.tick().await;
                    next_tick = self.next_tick();
                }
                event = events.recv() => match event {
                    Ok(RefreshEvent::Updated { live: true, league, .. }) => {
                        if lock(&self.shared).machine.observe_live_signal() {
                            info!(league = %league, "Live game detected, switching to live cadence");
                            next_tick = self.next_tick();
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Scheduler lagged behind refresh events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                changed = activity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let foreground = *activity.borrow_and_update();
                    let refire = {
                        let mut shared = lock(&self.shared);
                        let missed = foreground && std::mem::take(&mut shared.missed_tick);
                        if missed {
                            shared.machine.fire_now();
                        }
                        missed
                    };
                    if refire {
                        debug!("Foregrounded after a skipped tick, refreshing now");
                        next_tick = self.next_tick();
                    }
                }
            }
        }
        info!("Refresh scheduler stopped");
    }

    /// Deadline for the next tick, measured from now.
    fn next_tick(&self) -> Instant {
        Instant::now() + lock(&self.shared).machine.next_delay()
    }

    async fn tick(&self) {
        if !self.activity.is_foreground() {
            let mut shared = lock(&self.shared);
            shared.skipped_ticks += 1;
            shared.missed_tick = true;
            debug!("Backgrounded, skipping refresh tick");
            return;
        }

        {
            let mut shared = lock(&self.shared);
            shared.in_flight = true;
            shared.last_tick = Some(self.store.now());
        }

        let report = self.store.refresh(None, true).await;
        let live = self.store.any_live();
        let rate_limited = report.any_rate_limited();
        if report.failures() > 0 {
            warn!(
                failures = report.failures(),
                leagues = report.results.len(),
                rate_limited,
                "Refresh cycle had failures"
            );
        }

        let mut shared = lock(&self.shared);
        shared.in_flight = false;
        if let Some(cadence) = shared.machine.observe_cycle(live, rate_limited) {
            info!(?cadence, interval_ms = shared.machine.interval().as_millis() as u64, "Cadence changed");
        }
        if rate_limited {
            warn!(
                streak = shared.machine.rate_limit_streak(),
                interval_ms = shared.machine.interval().as_millis() as u64,
                "Rate limited, backing off"
            );
        }
    }
}
