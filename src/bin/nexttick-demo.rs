//! Dispatcher walkthrough
//!
//! Runs two workloads on a virtual-clock local host and prints what each
//! host turn did:
//! 1. five tasks A..E against a small batch size
//! 2. a task that keeps resubmitting itself, racing a delayed task
//!
//! Usage: nexttick-demo [batch_size]

use nexttick::dispatch::{DispatchConfig, Dispatcher};
use nexttick::platform::local::LocalHost;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

const DEFAULT_BATCH: usize = 3;
const CHAIN_LENGTH: u32 = 50;

fn main() {
    let batch_size = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_BATCH);

    let host = Rc::new(LocalHost::new());
    let config = DispatchConfig::default().with_batch_size(batch_size);
    let dispatcher = match Dispatcher::new(host.clone(), config) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("nexttick-demo: {}", e);
            std::process::exit(1);
        }
    };

    println!("== batch size {}, tasks A..E", batch_size);
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in ["A", "B", "C", "D", "E"] {
        let log = log.clone();
        dispatcher.submit(move || log.borrow_mut().push(name));
    }

    let mut turn = 0;
    while host.run_next_deferred() {
        turn += 1;
        let ran: Vec<&str> = log.borrow_mut().drain(..).collect();
        println!("turn {}: ran {:?}, {} still queued", turn, ran, dispatcher.pending());
    }

    println!("== self-resubmitting chain of {}", CHAIN_LENGTH);
    let count = Rc::new(Cell::new(0u32));
    resubmit(&dispatcher, &count);

    let seen_by_timer = Rc::new(Cell::new(None));
    {
        let count = count.clone();
        let seen_by_timer = seen_by_timer.clone();
        let queued = dispatcher.queue_delay(
            move || seen_by_timer.set(Some(count.get())),
            Duration::from_millis(10),
        );
        if let Err(e) = queued {
            eprintln!("nexttick-demo: {}", e);
            std::process::exit(1);
        }
    }

    let callbacks = host.run_until_idle();
    println!(
        "ran {} host callbacks; chain reached {}; clock at {} ms; timer saw {:?}",
        callbacks,
        count.get(),
        host.now().as_millis(),
        seen_by_timer.get()
    );

    match serde_json::to_string_pretty(&dispatcher.stats()) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("nexttick-demo: {}", e),
    }
}

/// Queue a task that queues its successor until the chain is complete
fn resubmit(dispatcher: &Rc<Dispatcher>, count: &Rc<Cell<u32>>) {
    let next = dispatcher.clone();
    let count = count.clone();
    dispatcher.submit(move || {
        count.set(count.get() + 1);
        if count.get() < CHAIN_LENGTH {
            resubmit(&next, &count);
        }
    });
}
