//! Integration tests for the dispatcher
//!
//! Exercises the public API end to end on a virtual-clock local host.
//! Each test builds its own host and dispatcher; the thread-local singleton
//! is covered by the unit tests.

use nexttick::dispatch::{DispatchConfig, DispatchState, Dispatcher, TimeoutError};
use nexttick::platform::local::LocalHost;
use nexttick::platform::Host;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

fn setup(batch_size: usize) -> (Rc<LocalHost>, Rc<Dispatcher>) {
    let host = Rc::new(LocalHost::new());
    let config = DispatchConfig::default().with_batch_size(batch_size);
    let dispatcher = Dispatcher::new(host.clone(), config).unwrap();
    (host, dispatcher)
}

/// Submit a task that appends `id` to `log`
fn submit_id(dispatcher: &Rc<Dispatcher>, log: &Rc<RefCell<Vec<u32>>>, id: u32) {
    let log = log.clone();
    dispatcher.submit(move || log.borrow_mut().push(id));
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_fifo_across_many_drains() {
    let (host, dispatcher) = setup(7);
    let log = Rc::new(RefCell::new(Vec::new()));

    for id in 0..100 {
        submit_id(&dispatcher, &log, id);
    }
    host.run_until_idle();

    assert_eq!(*log.borrow(), (0..100).collect::<Vec<_>>());
    // ceil(100 / 7) drains
    assert_eq!(dispatcher.stats().drains, 15);
}

#[test]
fn test_fifo_with_submissions_between_turns() {
    let (host, dispatcher) = setup(2);
    let log = Rc::new(RefCell::new(Vec::new()));

    for id in 0..3 {
        submit_id(&dispatcher, &log, id);
    }
    host.run_next_deferred();
    assert_eq!(*log.borrow(), vec![0, 1]);

    // Newer work queues behind the leftover task
    for id in 3..5 {
        submit_id(&dispatcher, &log, id);
    }
    host.run_until_idle();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_tasks_submitted_by_tasks_keep_global_order() {
    let (host, dispatcher) = setup(3);
    let log = Rc::new(RefCell::new(Vec::new()));

    // Each of the first three tasks enqueues a follow-up (10 + id)
    for id in 0..3 {
        let d = dispatcher.clone();
        let log = log.clone();
        dispatcher.submit(move || {
            log.borrow_mut().push(id);
            submit_id(&d, &log, 10 + id);
        });
    }
    submit_id(&dispatcher, &log, 3);

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 10, 11, 12]);
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn test_burst_registers_one_drain() {
    let (host, dispatcher) = setup(1024);

    for _ in 0..500 {
        dispatcher.submit(|| {});
    }

    assert_eq!(host.deferred_registrations(), 1);
    assert_eq!(dispatcher.state(), DispatchState::Armed);

    host.run_until_idle();
    assert_eq!(host.deferred_registrations(), 1);
    assert_eq!(dispatcher.stats().executed, 500);
}

#[test]
fn test_batch_limit_a_to_e() {
    let (host, dispatcher) = setup(3);
    let log = Rc::new(RefCell::new(Vec::new()));

    for name in ["A", "B", "C", "D", "E"] {
        let log = log.clone();
        dispatcher.submit(move || log.borrow_mut().push(name));
    }

    host.run_next_deferred();
    assert_eq!(*log.borrow(), vec!["A", "B", "C"]);
    assert_eq!(dispatcher.pending(), 2);

    host.run_next_deferred();
    assert_eq!(*log.borrow(), vec!["A", "B", "C", "D", "E"]);
    assert_eq!(host.deferred_registrations(), 2);
}

#[test]
fn test_default_batch_limit_is_1024() {
    let (host, dispatcher) = setup(1024);
    let counter = Rc::new(Cell::new(0));

    for _ in 0..1030 {
        let counter = counter.clone();
        dispatcher.submit(move || counter.set(counter.get() + 1));
    }

    host.run_next_deferred();
    assert_eq!(counter.get(), 1024);
    host.run_next_deferred();
    assert_eq!(counter.get(), 1030);
}

#[test]
fn test_drain_yields_between_host_callbacks() {
    let (host, dispatcher) = setup(5);
    let log = Rc::new(RefCell::new(Vec::new()));

    for id in 0..10 {
        submit_id(&dispatcher, &log, id);
    }

    // Someone else's deferred callback registered after the first drain
    // gets its turn before the second drain
    {
        let log = log.clone();
        host.defer(Box::new(move || log.borrow_mut().push(99))).unwrap();
    }

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3, 4, 99, 5, 6, 7, 8, 9]);
}

// ============================================================================
// Delayed submission
// ============================================================================

#[test]
fn test_delayed_tasks_fire_in_deadline_order() {
    let (host, dispatcher) = setup(1);
    let log = Rc::new(RefCell::new(Vec::new()));

    for (id, ms) in [(1, 30), (2, 10), (3, 20)] {
        let log = log.clone();
        dispatcher
            .queue_delay(move || log.borrow_mut().push(id), Duration::from_millis(ms))
            .unwrap();
    }

    host.advance(Duration::from_millis(15));
    assert_eq!(*log.borrow(), vec![2]);

    host.advance(Duration::from_millis(15));
    assert_eq!(*log.borrow(), vec![2, 3, 1]);
    assert_eq!(dispatcher.stats().drains, 0);
}

#[test]
fn test_delayed_task_can_submit_work() {
    let (host, dispatcher) = setup(8);
    let log = Rc::new(RefCell::new(Vec::new()));

    {
        let d = dispatcher.clone();
        let log = log.clone();
        dispatcher
            .queue_delay(
                move || {
                    log.borrow_mut().push(1);
                    submit_id(&d, &log, 2);
                },
                Duration::from_millis(50),
            )
            .unwrap();
    }

    host.advance(Duration::from_millis(50));
    assert_eq!(*log.borrow(), vec![1, 2]);
    assert_eq!(dispatcher.state(), DispatchState::Idle);
}

// ============================================================================
// Failure
// ============================================================================

#[test]
fn test_panicking_task_leaves_dispatcher_usable() {
    let (host, dispatcher) = setup(4);
    let log = Rc::new(RefCell::new(Vec::new()));

    submit_id(&dispatcher, &log, 1);
    dispatcher.submit(|| panic!("boom"));
    submit_id(&dispatcher, &log, 2);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| host.run_until_idle()));
    assert!(result.is_err());
    assert_eq!(*log.borrow(), vec![1]);
    assert!(!dispatcher.is_running());

    host.run_until_idle();
    assert_eq!(*log.borrow(), vec![1, 2]);
    assert_eq!(dispatcher.stats().aborted, 1);
}

// ============================================================================
// Futures
// ============================================================================

#[test]
fn test_timeout_on_channel_style_reply() {
    let (host, dispatcher) = setup(8);
    let (tx, rx) = futures::channel::oneshot::channel::<&str>();
    let mut reply = Box::pin(dispatcher.timeout(rx, Duration::from_millis(100)).unwrap());

    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    assert!(reply.as_mut().poll(&mut cx).is_pending());

    // Nobody answers; the deadline passes
    host.advance(Duration::from_millis(100));
    assert_eq!(reply.as_mut().poll(&mut cx), Poll::Ready(Err(TimeoutError)));
    drop(tx);
}

#[test]
fn test_delay_with_local_executor() {
    let (host, dispatcher) = setup(8);
    let done = Rc::new(Cell::new(false));

    let mut pool = futures::executor::LocalPool::new();
    {
        let delay = dispatcher.delay(Duration::from_millis(25)).unwrap();
        let done = done.clone();
        use futures::task::LocalSpawnExt;
        pool.spawner()
            .spawn_local(async move {
                delay.await;
                done.set(true);
            })
            .unwrap();
    }

    pool.run_until_stalled();
    assert!(!done.get());

    host.advance(Duration::from_millis(25));
    pool.run_until_stalled();
    assert!(done.get());
}
