//! Interrupt storm across a ring of domains
//!
//! N domains each deliver M interrupts to the next domain in the ring
//! while servicing their own inboxes, then everything joins cleanly.
//!
//! Tunables: `DOMINT_STRESS_DOMAINS` (default 8),
//! `DOMINT_STRESS_MESSAGES` (default 1000).

use domint::{enter, env_get, rpc, spawn, Domain, DomainHandle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

static HANDLED: AtomicUsize = AtomicUsize::new(0);
static SENDERS_DONE: AtomicUsize = AtomicUsize::new(0);
static RING: OnceLock<Vec<DomainHandle>> = OnceLock::new();

fn tick(_d: &Domain, _data: *mut ()) {
    HANDLED.fetch_add(1, Ordering::SeqCst);
}

fn ring() -> &'static [DomainHandle] {
    loop {
        if let Some(r) = RING.get() {
            return r;
        }
        std::thread::yield_now();
    }
}

fn storm(d: &Domain, idx: usize, domains: usize, messages: usize) {
    let next = ring()[(idx + 1) % domains];
    for _ in 0..messages {
        // The neighbour may still be starting up; keep servicing our
        // own inbox while we wait for it.
        while !rpc(next.domain(), tick, std::ptr::null_mut()) {
            d.poll();
            std::thread::yield_now();
        }
    }
    SENDERS_DONE.fetch_add(1, Ordering::SeqCst);
    // Stay alive until every sender has finished, or a late interrupt
    // aimed at this domain would be refused.
    while SENDERS_DONE.load(Ordering::SeqCst) < domains {
        d.poll();
        std::thread::yield_now();
    }
}

fn main() {
    let domains: usize = env_get("DOMINT_STRESS_DOMAINS", 8);
    let messages: usize = env_get("DOMINT_STRESS_MESSAGES", 1000);
    println!(
        "=== domint stress: {} domains x {} interrupts ===",
        domains, messages
    );

    let start = Instant::now();
    enter(|_me| {
        let mut handles = Vec::with_capacity(domains);
        for idx in 0..domains {
            let handle =
                spawn(move |d| storm(d, idx, domains, messages)).expect("spawn ring domain");
            handles.push(handle);
        }
        RING.set(handles.clone()).expect("ring already set");

        for handle in &handles {
            handle.join().expect("join ring domain");
        }
    })
    .expect("enter main domain");

    let elapsed = start.elapsed();
    let expected = domains * messages;
    assert_eq!(HANDLED.load(Ordering::SeqCst), expected);
    println!(
        "delivered {} interrupts in {:.2?} ({:.0} per second)",
        expected,
        elapsed,
        expected as f64 / elapsed.as_secs_f64()
    );
}
