// ==============================================
// LIMITER FAIRNESS TESTS (integration)
// ==============================================
//
// Grant order must match the order in which callers began waiting. The
// staggered test makes arrival order deterministic by separating entries
// far more than scheduler jitter; the simultaneous test checks that heavy
// contention neither loses nor double-serves a caller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use ratekit::limiter::ContinuousLimiter;

#[test]
fn staggered_waiters_are_granted_in_arrival_order() {
    let interval = Duration::from_millis(50);
    let stagger = Duration::from_millis(10);
    let num_threads = 6;

    let limiter = Arc::new(ContinuousLimiter::with_interval(interval).unwrap());
    let start_line = Arc::new(Barrier::new(num_threads));
    let grant_counter = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|arrival_order| {
            let limiter = Arc::clone(&limiter);
            let start_line = Arc::clone(&start_line);
            let grant_counter = Arc::clone(&grant_counter);

            thread::spawn(move || {
                start_line.wait();
                // Arrivals separated by `stagger`, while each grant takes a
                // full `interval`: every thread joins the queue while all
                // earlier arrivals are still pending.
                thread::sleep(stagger * arrival_order as u32);

                let _ticket = limiter.acquire().unwrap();
                let grant_order = grant_counter.fetch_add(1, Ordering::SeqCst);
                (arrival_order, grant_order)
            })
        })
        .collect();

    for handle in handles {
        let (arrival_order, grant_order) = handle.join().unwrap();
        assert_eq!(
            grant_order, arrival_order,
            "caller arriving {}th was granted {}th",
            arrival_order, grant_order
        );
    }
    assert_eq!(limiter.queue_len(), 0);
}

#[test]
fn simultaneous_contention_serves_every_caller_exactly_once() {
    let interval = Duration::from_millis(10);
    let num_threads = 8;

    let limiter = Arc::new(ContinuousLimiter::with_interval(interval).unwrap());
    let start_line = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let start_line = Arc::clone(&start_line);
            thread::spawn(move || {
                start_line.wait();
                limiter.acquire().unwrap().minted_at()
            })
        })
        .collect();

    let mut mints: Vec<Instant> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    mints.sort();

    assert_eq!(mints.len(), num_threads);
    for pair in mints.windows(2) {
        assert!(
            pair[1] - pair[0] > interval,
            "grants {:?} apart under contention",
            pair[1] - pair[0]
        );
    }
    assert_eq!(limiter.queue_len(), 0);
}

#[test]
fn late_arrival_joins_behind_existing_queue() {
    let interval = Duration::from_millis(40);
    let limiter = Arc::new(ContinuousLimiter::with_interval(interval).unwrap());

    // Consume the trivial grant so every subsequent caller must wait.
    let _ = limiter.acquire().unwrap();

    let early = {
        let limiter = Arc::clone(&limiter);
        thread::spawn(move || limiter.acquire().unwrap().minted_at())
    };
    // Give the early waiter time to enqueue before the late one arrives.
    thread::sleep(interval / 4);
    let late = {
        let limiter = Arc::clone(&limiter);
        thread::spawn(move || limiter.acquire().unwrap().minted_at())
    };

    let early_mint = early.join().unwrap();
    let late_mint = late.join().unwrap();
    assert!(
        early_mint < late_mint,
        "late arrival was served before an already-waiting caller"
    );
}
