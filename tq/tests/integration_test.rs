//! Integration tests for TaskQueue
//!
//! These run the scheduler on the real tokio timer with virtual time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use taskqueue::{Processor, Scheduler, SchedulerConfig, SchedulerError};
use tokio::sync::Notify;
use tokio::time::Instant;

// =============================================================================
// Unbounded Mode
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_unbounded_dispatch_spacing_ignores_processor_duration() {
    let delay = Duration::from_millis(50);
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let drained = Arc::new(Notify::new());

    let sink = Arc::clone(&stamps);
    let processor = Processor::from_async(move |item: u32| {
        sink.lock().unwrap().push((item, Instant::now()));
        async move {
            // Much slower than the dispatch cadence
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    })
    .unwrap();

    let signal = Arc::clone(&drained);
    let scheduler = Scheduler::builder()
        .processor(processor)
        .delay(delay)
        .on_complete(move || signal.notify_one())
        .build()
        .unwrap();

    let started = Instant::now();
    scheduler.enqueue_tail_all(1..=4);

    tokio::time::timeout(Duration::from_secs(5), drained.notified())
        .await
        .expect("queue should drain");

    let stamps = stamps.lock().unwrap().clone();
    let order: Vec<u32> = stamps.iter().map(|(item, _)| *item).collect();
    assert_eq!(order, vec![1, 2, 3, 4]);

    assert!(stamps[0].1 - started < delay, "first dispatch should not wait for the delay");
    for pair in stamps.windows(2) {
        assert!(pair[1].1 - pair[0].1 >= delay, "dispatches should be at least one delay apart");
    }
    assert!(stamps[3].1 - started < Duration::from_secs(1), "dispatch must not wait on completions");
}

// =============================================================================
// Bounded Mode
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_bounded_outstanding_never_exceeds_cap() {
    let outstanding = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let (o, p, f) = (Arc::clone(&outstanding), Arc::clone(&peak), Arc::clone(&finished));
    let processor = Processor::from_async(move |_: u32| {
        let now = o.fetch_add(1, Ordering::SeqCst) + 1;
        p.fetch_max(now, Ordering::SeqCst);
        let (o, f) = (Arc::clone(&o), Arc::clone(&f));
        async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            o.fetch_sub(1, Ordering::SeqCst);
            f.fetch_add(1, Ordering::SeqCst);
        }
    })
    .unwrap();

    let scheduler = Scheduler::builder()
        .processor(processor)
        .delay(Duration::from_millis(10))
        .max_concurrent(2)
        .build()
        .unwrap();

    // Separate adds re-arm the loop while earlier items are still running
    for item in 0..10 {
        scheduler.enqueue_tail(item);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(scheduler.active_count() <= 2);
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while finished.load(Ordering::SeqCst) < 10 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("all items should finish");

    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(scheduler.active_count(), 0);
    assert_eq!(scheduler.stats().total_completed, 10);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_persistent_queue_picks_up_late_work() {
    let seen = Arc::new(AtomicUsize::new(0));
    let completions = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&seen);
    let callbacks = Arc::clone(&completions);
    let scheduler = Scheduler::builder()
        .processor(Processor::sync(move |_: &'static str| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .delay(Duration::from_millis(20))
        .persistent(true)
        .on_complete(move || {
            callbacks.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    scheduler.enqueue_tail("first");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_tick_pending());

    scheduler.enqueue_tail("second");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Run Control
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_start_paused_waits_for_resume() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let scheduler = Scheduler::builder()
        .processor(Processor::sync(move |_: u8| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .delay(Duration::from_millis(10))
        .start_paused(true)
        .build()
        .unwrap();

    assert_eq!(scheduler.enqueue_tail_all([1, 2, 3]), 3);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    scheduler.resume();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 3);
    assert!(scheduler.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_scheduler_stops_ticks() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let scheduler = Scheduler::builder()
        .processor(Processor::sync(move |_: u8| {
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .delay(Duration::from_millis(100))
        .build()
        .unwrap();

    scheduler.enqueue_tail_all([1, 2, 3]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    drop(scheduler);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn test_default_timer_needs_runtime() {
    let result = Scheduler::new(Processor::sync(|_: u8| {}), SchedulerConfig::default());
    assert!(matches!(result, Err(SchedulerError::NoRuntime)));
}
