//! Routine pool integration tests

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tidepool::log::CaptureLog;
use tidepool::{PoolError, RoutinePool, Task};

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Retry the fast path until a worker is ready to take the task
fn hand_off(pool: &RoutinePool, mut task: Task) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        match pool.do_task(task) {
            Ok(()) => return,
            Err(rejected) => task = rejected,
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("no worker accepted the task");
}

/// Task that blocks until the gate's sender is dropped
fn gated(gate: &Receiver<()>) -> Task {
    let gate = gate.clone();
    Task::from_fn(move || {
        let _ = gate.recv();
    })
}

#[test]
fn test_do_task_saturates_free() {
    const N: usize = 4;
    let pool = RoutinePool::new(N).unwrap();
    let (release, gate) = channel::unbounded::<()>();

    for _ in 0..N {
        hand_off(&pool, gated(&gate));
    }
    assert!(wait_until(|| pool.free() == 0));

    // Every worker is busy, so nobody is waiting on the handoff
    assert!(pool.do_task(Task::from_fn(|| {})).is_err());

    drop(release);
    assert!(wait_until(|| pool.free() == N));
    hand_off(&pool, Task::from_fn(|| {}));

    assert_eq!(pool.count(), N);
    pool.shutdown();
}

#[test]
fn test_push_task_applies_backpressure() {
    let pool = RoutinePool::with_options(1, 2, "bp", tidepool::log::default_log()).unwrap();
    let (release, gate) = channel::unbounded::<()>();
    let ran = Arc::new(AtomicUsize::new(0));

    hand_off(&pool, gated(&gate));
    assert!(wait_until(|| pool.free() == 0));

    let counted = |ran: &Arc<AtomicUsize>| {
        let ran = ran.clone();
        Task::from_fn(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        })
    };

    pool.push_task(counted(&ran)).unwrap();
    pool.push_task(counted(&ran)).unwrap();
    assert_eq!(pool.queued(), 2);

    let (done_tx, done_rx) = channel::bounded(1);
    thread::scope(|s| {
        s.spawn(|| {
            let result = pool.push_task(counted(&ran));
            done_tx.send(result.is_ok()).unwrap();
        });

        // Queue is full and the only worker is blocked
        assert_eq!(
            done_rx.recv_timeout(Duration::from_millis(200)),
            Err(RecvTimeoutError::Timeout)
        );

        drop(release);
        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    });

    assert!(wait_until(|| ran.load(Ordering::SeqCst) == 3));
    pool.shutdown();
}

#[test]
fn test_panics_do_not_shrink_pool() {
    let log = Arc::new(CaptureLog::default());
    let pool = RoutinePool::with_options(2, 128, "panicky", log.clone()).unwrap();
    let completed = Arc::new(AtomicUsize::new(0));

    for i in 0..40usize {
        let completed = completed.clone();
        let task = Task::new(
            move |i: usize| {
                if i % 2 == 0 {
                    panic!("task {i} failed");
                }
                completed.fetch_add(1, Ordering::SeqCst);
            },
            i,
        );
        pool.push_task(task).unwrap();
    }

    assert!(wait_until(|| completed.load(Ordering::SeqCst) == 20));
    assert!(wait_until(|| log.errors().len() == 20));
    assert!(wait_until(|| pool.free() == 2));
    assert!(log.errors().iter().all(|e| e.starts_with("panic: task ")));

    pool.shutdown();
}

#[test]
fn test_stop_releases_blocked_producer() {
    let pool = RoutinePool::with_options(1, 1, "stop", tidepool::log::default_log()).unwrap();
    let (_release, gate) = channel::unbounded::<()>();

    hand_off(&pool, gated(&gate));
    assert!(wait_until(|| pool.free() == 0));
    pool.push_task(Task::from_fn(|| {})).unwrap();

    thread::scope(|s| {
        let blocked = s.spawn(|| pool.push_task(Task::from_fn(|| {})));
        thread::sleep(Duration::from_millis(50));
        pool.stop();
        assert!(matches!(blocked.join().unwrap(), Err(PoolError::Stopped)));
    });
}

#[test]
fn test_shutdown_accounts_for_queued_tasks() {
    let pool = RoutinePool::with_options(1, 16, "drain", tidepool::log::default_log()).unwrap();
    let (release, gate) = channel::unbounded::<()>();
    let ran = Arc::new(AtomicUsize::new(0));

    hand_off(&pool, gated(&gate));
    assert!(wait_until(|| pool.free() == 0));
    for _ in 0..3 {
        let ran = ran.clone();
        pool.push_task(Task::from_fn(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }

    pool.stop();
    drop(release);
    let dropped = pool.join();

    assert_eq!(ran.load(Ordering::SeqCst) + dropped, 3);
    assert!(pool.do_task(Task::from_fn(|| {})).is_err());
}
