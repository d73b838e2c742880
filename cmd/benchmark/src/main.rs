//! Interrupt round-trip latency
//!
//! Measures a synchronous rpc against two kinds of target: one that is
//! busy polling (deliveries land in the sender's spin window) and one
//! that is parked (every delivery crosses the condvar).
//!
//! Tunable: `DOMINT_BENCH_ROUNDS` (default 100000).

use domint::{enter, env_get, rpc, spawn, Domain};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

static STOP_POLLER: AtomicBool = AtomicBool::new(false);
static STOP_PARKED: AtomicBool = AtomicBool::new(false);

fn nop(_: &Domain, _: *mut ()) {}

fn wait_up(target: &Domain) {
    while !rpc(target, nop, std::ptr::null_mut()) {
        std::thread::yield_now();
    }
}

fn report(label: &str, rounds: usize, elapsed: Duration) {
    println!(
        "{:<14} {:>8} rpcs in {:>10.2?}  ({:>6} ns/rpc)",
        label,
        rounds,
        elapsed,
        elapsed.as_nanos() as usize / rounds
    );
}

fn main() {
    let rounds: usize = env_get("DOMINT_BENCH_ROUNDS", 100_000);
    println!("=== domint rpc round-trip benchmark ===\n");

    enter(|_me| {
        // Busy target
        let poller = spawn(|d| {
            while !STOP_POLLER.load(Ordering::Relaxed) {
                d.poll();
                std::hint::spin_loop();
            }
        })
        .expect("spawn poller domain");

        wait_up(poller.domain());
        let start = Instant::now();
        for _ in 0..rounds {
            assert!(rpc(poller.domain(), nop, std::ptr::null_mut()));
        }
        report("busy target:", rounds, start.elapsed());
        STOP_POLLER.store(true, Ordering::Relaxed);
        poller.join().expect("join poller domain");

        // Parked target
        let parked = spawn(|d| {
            while !STOP_PARKED.load(Ordering::Relaxed) {
                d.yield_until_interrupted();
            }
        })
        .expect("spawn parked domain");

        wait_up(parked.domain());
        let parked_rounds = (rounds / 10).max(1);
        let start = Instant::now();
        for _ in 0..parked_rounds {
            assert!(rpc(parked.domain(), nop, std::ptr::null_mut()));
        }
        report("parked target:", parked_rounds, start.elapsed());

        // One more interrupt so the parked domain notices the flag
        STOP_PARKED.store(true, Ordering::Relaxed);
        assert!(rpc(parked.domain(), nop, std::ptr::null_mut()));
        parked.join().expect("join parked domain");
    })
    .expect("enter main domain");
}
