//! Basic domain example
//!
//! Spawns a worker domain, delivers a few interrupts to it, then joins.

use domint::{enter, rpc, spawn, Domain, InterruptHandler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static TOTAL: AtomicUsize = AtomicUsize::new(0);
static DONE: AtomicBool = AtomicBool::new(false);

fn add(d: &Domain, data: *mut ()) {
    let n = data as usize;
    let total = TOTAL.fetch_add(n, Ordering::SeqCst) + n;
    println!("[domain {}] add({}) -> total {}", d.id(), n, total);
}

fn nop(_: &Domain, _: *mut ()) {}

fn send_retry(target: &Domain, handler: InterruptHandler, data: *mut ()) {
    // The target may still be starting up
    while !rpc(target, handler, data) {
        std::thread::yield_now();
    }
}

fn main() {
    println!("=== domint basic example ===\n");

    enter(|me| {
        println!("main bound to domain {}", me.id());

        let worker = spawn(|d| {
            println!("[domain {}] worker up", d.id());
            while !DONE.load(Ordering::SeqCst) {
                d.yield_until_interrupted();
            }
            println!("[domain {}] worker down", d.id());
        })
        .expect("spawn worker domain");

        for n in 1..=5usize {
            send_retry(worker.domain(), add, n as *mut ());
        }

        // One last interrupt so the worker notices the flag
        DONE.store(true, Ordering::SeqCst);
        send_retry(worker.domain(), nop, std::ptr::null_mut());

        worker.join().expect("join worker");
        println!(
            "\nworker terminated, total = {}",
            TOTAL.load(Ordering::SeqCst)
        );
        assert_eq!(TOTAL.load(Ordering::SeqCst), 15);
    })
    .expect("enter main domain");
}
