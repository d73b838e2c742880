//! # domint - Inter-Domain Interrupts
//!
//! Synchronous cross-thread signalling for runtimes hosting multiple
//! independent execution domains.
//!
//! A domain is one mutator thread. When a domain must run code on
//! another domain's thread (a stop-the-world request, a promotion out
//! of a remote minor heap, statistics sampling), it sends an interrupt:
//! the request is queued on the target, the target's GC-polling word is
//! flagged, and the sender waits (servicing its own inbox the whole
//! time) until the target runs the handler and signals completion.
//!
//! ## Quick Start
//!
//! ```ignore
//! use domint::{enter, rpc, spawn, Domain};
//!
//! fn greet(d: &Domain, _data: *mut ()) {
//!     println!("handler running on domain {}", d.id());
//! }
//!
//! fn main() {
//!     domint::enter(|_me| {
//!         let worker = spawn(|d| {
//!             // stay responsive while idle
//!             d.yield_until_interrupted();
//!         })
//!         .unwrap();
//!
//!         while !rpc(worker.domain(), greet, std::ptr::null_mut()) {
//!             // worker still starting up
//!             std::thread::yield_now();
//!         }
//!
//!         worker.join().unwrap();
//!     })
//!     .unwrap();
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        User Code                           │
//! │            spawn(), enter(), rpc(), join()                 │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │                      Domain Table                          │
//! │        fixed slots, free-list recycling, TLS binding       │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Domain   │      │  Domain   │      │  Domain   │
//!    │  thread   │◀────▶│  thread   │◀────▶│  thread   │
//!    └───────────┘      └───────────┘      └───────────┘
//!       one Interruptor each: lock, condvar, FIFO queues,
//!       interrupt word, generation counter
//! ```
//!
//! ## Guarantees
//!
//! - A handler runs exactly once, on the target's thread, before the
//!   send reports success
//! - Per target, requests are served in the order senders enqueued
//! - Two domains interrupting each other cannot deadlock: a waiting
//!   sender keeps draining its own inbox
//! - Joins are keyed by a 64-bit generation, so a recycled domain slot
//!   never satisfies a stale join

// Re-export core types
pub use domint_core::constants;
pub use domint_core::{DomainError, DomainId, DomainIdent, DomainResult, InterruptWord, WaitQueue};

// Re-export kprint macros for debug logging
pub use domint_core::{kdebug, kerror, kinfo, kprintln, ktrace, kwarn};
pub use domint_core::kprint::{init as init_logging, set_log_level, LogLevel};

// Re-export env utilities
pub use domint_core::{env_get, env_get_bool};

// Re-export runtime types
pub use domint_runtime::{
    by_id, current, enter, init, rpc, spawn, try_current, Domain, DomainHandle,
    InterruptHandler, Interruptor, RuntimeConfig,
};

/// Check if the current thread is bound to a domain
#[inline]
pub fn is_domain_thread() -> bool {
    domint_runtime::tls::is_domain_thread()
}
