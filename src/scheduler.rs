//! Sequence scheduler.
//!
//! Owns the set of blinking indicators and a background thread that
//! renders them onto the [`OutputPort`].
//!
//! ```text
//!  dispatch context                      render thread
//!  ────────────────                      ─────────────
//!  upsert / cancel ──▶ ┌──────────────────────┐
//!   (write lock)       │  RwLock<SequenceSet>  │ ◀── render_at (read lock)
//!        │             └──────────────────────┘         │
//!        └── notify ──▶ Condvar ── wakes ──────────────▶ │ ──▶ OutputPort
//! ```
//!
//! Structural changes (insert, replace, remove) only happen under the
//! write lock.  The render pass iterates under the read lock and only
//! touches each entry's `last_rendered` atomic, so concurrent readers
//! never see the map resized under them.
//!
//! The render thread polls every `active_poll` while anything blinks and
//! every `idle_poll` otherwise; the condition variable cuts both the
//! idle-to-active latency and the shutdown latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::app::ports::{Clock, OutputPort};
use crate::drivers::led_patterns::{Frame, LightState, frame_at, tick_duration, tick_index};
use crate::error::Error;

// ═══════════════════════════════════════════════════════════════
//  Sequence
// ═══════════════════════════════════════════════════════════════

/// Sentinel for "nothing rendered yet".
const NOT_RENDERED: i64 = -1;

/// A blink pattern running on one indicator.
#[derive(Debug)]
struct Sequence {
    pattern: String,
    symbols: Vec<char>,
    /// Full passes before freezing, 0 = forever.
    loop_count: u32,
    speed: f64,
    tick: Duration,
    start: Instant,
    /// Written under the read lock by the render pass.
    last_rendered: AtomicI64,
}

impl Sequence {
    fn new(pattern: &str, loop_count: u32, speed: f64, tick: Duration, now: Instant) -> Self {
        Self {
            pattern: pattern.to_owned(),
            symbols: pattern.chars().collect(),
            loop_count,
            speed,
            tick,
            start: now,
            last_rendered: AtomicI64::new(NOT_RENDERED),
        }
    }

    fn snapshot(&self) -> SequenceSnapshot {
        let last = self.last_rendered.load(Ordering::Acquire);
        SequenceSnapshot {
            pattern: self.pattern.clone(),
            loop_count: self.loop_count,
            speed: self.speed,
            start: self.start,
            last_rendered: u64::try_from(last).ok(),
        }
    }
}

/// Point-in-time copy of a running sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSnapshot {
    pub pattern: String,
    pub loop_count: u32,
    pub speed: f64,
    pub start: Instant,
    pub last_rendered: Option<u64>,
}

/// What an [`SequenceSet::upsert_at`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// Same pattern already running; left untouched.
    Unchanged,
    /// A new sequence was started.
    Inserted,
    /// A different pattern replaced the running one and restarted.
    Replaced,
    /// An empty pattern stopped the running sequence.
    Removed,
    /// Empty pattern and nothing running, or an unusable speed.
    Ignored,
}

/// Result of one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Sequences in the set, frozen ones included.
    pub active: usize,
    /// Indicator writes sent this pass.
    pub written: usize,
}

// ═══════════════════════════════════════════════════════════════
//  Sequence set
// ═══════════════════════════════════════════════════════════════

/// Indicator id → at most one [`Sequence`].
#[derive(Debug, Default)]
pub struct SequenceSet {
    sequences: RwLock<HashMap<String, Sequence>>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start, restart, keep or stop the sequence on `indicator`.
    pub fn upsert_at(
        &self,
        indicator: &str,
        pattern: &str,
        loop_count: u32,
        speed: f64,
        now: Instant,
    ) -> Upsert {
        let tick = tick_duration(speed);
        let mut sequences = self.write();

        if pattern.is_empty() {
            return match sequences.remove(indicator) {
                Some(_) => {
                    debug!("Scheduler: stopped sequence on '{}'", indicator);
                    Upsert::Removed
                }
                None => Upsert::Ignored,
            };
        }

        let Some(tick) = tick else {
            warn!("Scheduler: refusing sequence on '{}' with speed {}", indicator, speed);
            return Upsert::Ignored;
        };

        match sequences.get_mut(indicator) {
            Some(running) if running.pattern == pattern => Upsert::Unchanged,
            Some(running) => {
                *running = Sequence::new(pattern, loop_count, speed, tick, now);
                info!("Scheduler: '{}' now blinks '{}' at {}/s", indicator, pattern, speed);
                Upsert::Replaced
            }
            None => {
                sequences.insert(indicator.to_owned(), Sequence::new(pattern, loop_count, speed, tick, now));
                info!(
                    "Scheduler: new sequence for '{}' is '{}', speed {}, loop {}",
                    indicator, pattern, speed, loop_count
                );
                Upsert::Inserted
            }
        }
    }

    /// Stop blinking `indicator`.  Returns whether anything was running.
    pub fn cancel(&self, indicator: &str) -> bool {
        self.write().remove(indicator).is_some()
    }

    pub fn cancel_all(&self) {
        self.write().clear();
    }

    /// One render pass at time `now`.
    ///
    /// For every sequence the tick is re-derived from `now - start`.  A
    /// tick already rendered is skipped, a frozen sequence is skipped, and
    /// a symbol with no state mapping writes nothing.
    pub fn render_at(&self, now: Instant, port: &dyn OutputPort) -> RenderStats {
        let sequences = self.read();
        let mut stats = RenderStats {
            active: sequences.len(),
            written: 0,
        };

        for (indicator, seq) in sequences.iter() {
            let tick = tick_index(now.saturating_duration_since(seq.start), seq.tick);
            let Frame::At(pos) = frame_at(tick, seq.symbols.len(), seq.loop_count) else {
                continue;
            };
            let tick = i64::try_from(tick).unwrap_or(i64::MAX);
            if seq.last_rendered.load(Ordering::Acquire) == tick {
                continue;
            }
            if let Some(state) = LightState::from_symbol(seq.symbols[pos]) {
                match port.set_indicator(indicator, state.as_str()) {
                    Ok(()) => stats.written += 1,
                    Err(e) => warn!("Scheduler: write to '{}' failed: {}", indicator, e),
                }
            }
            seq.last_rendered.store(tick, Ordering::Release);
        }

        stats
    }

    pub fn snapshot(&self, indicator: &str) -> Option<SequenceSnapshot> {
        self.read().get(indicator).map(Sequence::snapshot)
    }

    pub fn is_active(&self, indicator: &str) -> bool {
        self.read().contains_key(indicator)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Sequence>> {
        self.sequences.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Sequence>> {
        self.sequences.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler (set + render thread)
// ═══════════════════════════════════════════════════════════════

/// Render loop poll intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTiming {
    pub active: Duration,
    pub idle: Duration,
}

#[derive(Debug, Default)]
struct Signal {
    stop: bool,
    /// A sequence was registered since the last pass.
    pending: bool,
}

struct Shared {
    set: SequenceSet,
    clock: Arc<dyn Clock>,
    signal: Mutex<Signal>,
    wake: Condvar,
}

impl Shared {
    fn signal(&self) -> MutexGuard<'_, Signal> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The sequence set plus the thread that renders it.
///
/// Dropping the scheduler stops the thread and joins it.
pub struct Scheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the render thread.
    pub fn start(
        port: Arc<dyn OutputPort>,
        clock: Arc<dyn Clock>,
        timing: RenderTiming,
    ) -> Result<Self, Error> {
        let shared = Arc::new(Shared {
            set: SequenceSet::new(),
            clock,
            signal: Mutex::new(Signal::default()),
            wake: Condvar::new(),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("sequence-render".into())
                .spawn(move || render_loop(&shared, port.as_ref(), timing))
                .map_err(Error::Spawn)?
        };

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Start, restart, keep or stop the sequence on `indicator`, timed
    /// from the scheduler's clock.
    pub fn upsert(&self, indicator: &str, pattern: &str, loop_count: u32, speed: f64) -> Upsert {
        let now = self.shared.clock.now();
        let result = self.shared.set.upsert_at(indicator, pattern, loop_count, speed, now);
        if matches!(result, Upsert::Inserted | Upsert::Replaced) {
            self.notify();
        }
        result
    }

    pub fn cancel(&self, indicator: &str) -> bool {
        self.shared.set.cancel(indicator)
    }

    pub fn cancel_all(&self) {
        self.shared.set.cancel_all();
    }

    pub fn sequences(&self) -> &SequenceSet {
        &self.shared.set
    }

    /// Stop the render thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn notify(&self) {
        self.shared.signal().pending = true;
        self.shared.wake.notify_one();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.signal().stop = true;
        self.shared.wake.notify_all();
        if worker.join().is_err() {
            error!("Scheduler: render thread panicked");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_loop(shared: &Shared, port: &dyn OutputPort, timing: RenderTiming) {
    info!("Scheduler: render loop started");
    loop {
        let stats = shared.set.render_at(shared.clock.now(), port);
        let interval = if stats.active > 0 { timing.active } else { timing.idle };

        let mut signal = shared.signal();
        if !signal.stop && !signal.pending {
            signal = match shared.wake.wait_timeout(signal, interval) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        if signal.stop {
            break;
        }
        signal.pending = false;
    }
    info!("Scheduler: render loop stopped");
}
