//! Integration tests for the sequence scheduler's render thread.
//!
//! A real thread renders onto the mock panel while a manual clock is
//! stepped by hand, so every tick boundary is deterministic.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use x52out::adapters::time::ManualClock;
use x52out::scheduler::{RenderTiming, Scheduler, Upsert};

use crate::mock_hw::{MockPanel, wait_for};

const FAST: RenderTiming = RenderTiming {
    active: Duration::from_millis(2),
    idle: Duration::from_millis(5),
};

/// Idle poll long enough that only a condvar wake explains prompt progress.
const SLOW_IDLE: RenderTiming = RenderTiming {
    active: Duration::from_millis(2),
    idle: Duration::from_secs(30),
};

fn start(timing: RenderTiming) -> (Scheduler, Arc<MockPanel>, Arc<ManualClock>) {
    let panel = MockPanel::new();
    let clock = Arc::new(ManualClock::new());
    let scheduler = Scheduler::start(panel.clone(), clock.clone(), timing).unwrap();
    (scheduler, panel, clock)
}

#[test]
fn alternating_pattern_follows_elapsed_time() {
    let (scheduler, panel, clock) = start(FAST);
    assert_eq!(scheduler.upsert("t1", "ag", 0, 2.0), Upsert::Inserted);
    assert!(wait_for(|| panel.indicator_writes("t1") == ["amber"]));

    clock.set(Duration::from_millis(400));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(panel.indicator_writes("t1"), ["amber"]);

    clock.set(Duration::from_millis(600));
    assert!(wait_for(|| panel.indicator_writes("t1") == ["amber", "green"]));

    clock.set(Duration::from_millis(1100));
    assert!(wait_for(|| panel.indicator_writes("t1") == ["amber", "green", "amber"]));
}

#[test]
fn finite_sequence_freezes() {
    let (scheduler, panel, clock) = start(FAST);
    scheduler.upsert("fire", "o", 2, 1.0);
    assert!(wait_for(|| panel.indicator_writes("fire").len() == 1));

    clock.set(Duration::from_secs(1));
    assert!(wait_for(|| panel.indicator_writes("fire").len() == 2));

    clock.set(Duration::from_secs(5));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(panel.indicator_writes("fire").len(), 2);
    assert!(scheduler.sequences().is_active("fire"));
}

#[test]
fn new_sequence_wakes_idle_thread() {
    let (scheduler, panel, _clock) = start(SLOW_IDLE);
    // Let the thread settle into its idle wait.
    thread::sleep(Duration::from_millis(20));
    scheduler.upsert("t2", "r", 0, 1.0);
    assert!(wait_for(|| panel.indicator_writes("t2") == ["red"]));
}

#[test]
fn shutdown_interrupts_idle_wait() {
    let (scheduler, _panel, _clock) = start(SLOW_IDLE);
    thread::sleep(Duration::from_millis(20));
    let t0 = Instant::now();
    scheduler.shutdown();
    assert!(t0.elapsed() < Duration::from_secs(5));
}

#[test]
fn cancelled_sequence_stops_writing() {
    let (scheduler, panel, clock) = start(FAST);
    scheduler.upsert("t1", "ag", 0, 2.0);
    assert!(wait_for(|| !panel.indicator_writes("t1").is_empty()));

    assert!(scheduler.cancel("t1"));
    clock.set(Duration::from_secs(3));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(panel.indicator_writes("t1"), ["amber"]);
}

#[test]
fn drop_joins_render_thread() {
    let (scheduler, _panel, _clock) = start(SLOW_IDLE);
    scheduler.upsert("t1", "a", 0, 1.0);
    drop(scheduler);
}
