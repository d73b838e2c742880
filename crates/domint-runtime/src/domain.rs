//! Domains and their lifecycle
//!
//! A domain is an independently scheduled mutator thread. This module
//! owns the global domain table, binds OS threads to table slots, and
//! provides the public spawn/enter/rpc/join surface over the interrupt
//! machinery.
//!
//! Slots are recycled through a free list; the interruptor's generation
//! counter is what keeps a stale handle from matching a slot's next life.

use crate::config::RuntimeConfig;
use crate::interruptor::{InterruptHandler, Interruptor};
use crate::tls;
use domint_core::{kdebug, kerror};
use domint_core::{DomainError, DomainId, DomainIdent, DomainResult, InterruptWord};
use crossbeam_queue::ArrayQueue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

/// One mutator thread's worth of runtime state.
///
/// Lives in the global table for the life of the process; threads bind
/// to it for the duration of one domain lifetime.
pub struct Domain {
    id: DomainId,

    /// Shared with the interruptor; senders flag it, we restore it
    word: Arc<InterruptWord>,

    /// Allocation-limit value the word holds when no interrupt is pending
    young_limit: AtomicUsize,

    interruptor: Interruptor,
}

impl Domain {
    fn new(id: DomainId) -> Self {
        let word = Arc::new(InterruptWord::new(0));
        Domain {
            id,
            word: Arc::clone(&word),
            young_limit: AtomicUsize::new(0),
            interruptor: Interruptor::new(word),
        }
    }

    /// This domain's identifier
    #[inline]
    pub fn id(&self) -> DomainId {
        self.id
    }

    /// The domain's interrupt machinery
    #[inline]
    pub fn interruptor(&self) -> &Interruptor {
        &self.interruptor
    }

    /// Flag our own interrupt word, forcing the next allocation check
    /// into the slow path
    pub fn interrupt_self(&self) {
        self.word.set_pending();
    }

    /// Whether the interrupt word currently holds the sentinel
    #[inline]
    pub fn interrupt_pending(&self) -> bool {
        self.word.is_pending()
    }

    /// Set the allocation limit the word is restored to after draining
    pub fn set_young_limit(&self, limit: usize) {
        self.young_limit.store(limit, Ordering::Relaxed);
        self.word.store_limit(limit);
    }

    /// Slow path of the allocation check.
    ///
    /// If the word holds the sentinel, restore the young limit and drain
    /// the inbox. Restoring first means a send that lands mid-drain
    /// re-flags the word for the next check. Returns handlers invoked.
    ///
    /// Must be called on the domain's own thread.
    pub fn handle_pending(&self) -> usize {
        debug_assert!(self.is_current());
        if !self.word.is_pending() {
            return 0;
        }
        self.word.store_limit(self.young_limit.load(Ordering::Relaxed));
        self.interruptor.poll()
    }

    /// Drain the inbox once. Must be called on the domain's own thread.
    pub fn poll(&self) -> usize {
        debug_assert!(self.is_current());
        self.interruptor.poll()
    }

    /// Park until at least one interrupt has been handled. Must be
    /// called on the domain's own thread.
    pub fn yield_until_interrupted(&self) {
        debug_assert!(self.is_current());
        self.interruptor.yield_until_interrupted();
    }

    fn is_current(&self) -> bool {
        tls::current_index() == Some(self.id.index())
    }
}

struct DomainTable {
    slots: Box<[Domain]>,
    free: ArrayQueue<usize>,
}

impl DomainTable {
    fn new(config: &RuntimeConfig) -> Self {
        let n = config.max_domains;
        let slots: Box<[Domain]> = (0..n).map(|i| Domain::new(DomainId::new(i))).collect();
        let free = ArrayQueue::new(n);
        for i in 0..n {
            let _ = free.push(i);
        }
        DomainTable { slots, free }
    }
}

static TABLE: OnceLock<DomainTable> = OnceLock::new();

fn table() -> &'static DomainTable {
    TABLE.get_or_init(|| DomainTable::new(&RuntimeConfig::default()))
}

/// Size the domain table explicitly.
///
/// Optional: first use of the runtime falls back to
/// `RuntimeConfig::default()`. Fails if the table already exists.
pub fn init(config: RuntimeConfig) -> DomainResult<()> {
    config.validate()?;
    let mut fresh = false;
    TABLE.get_or_init(|| {
        fresh = true;
        DomainTable::new(&config)
    });
    if fresh {
        Ok(())
    } else {
        Err(DomainError::AlreadyInitialized)
    }
}

/// The domain bound to the current thread.
///
/// Handlers run on their target's thread, so this is the domain a
/// handler receives. Panics on a thread not bound to any domain.
pub fn current() -> &'static Domain {
    try_current().expect("current thread is not bound to a domain")
}

/// The domain bound to the current thread, if any
pub fn try_current() -> Option<&'static Domain> {
    tls::current_index().map(|idx| &table().slots[idx])
}

/// Look up a domain slot by identifier
pub fn by_id(id: DomainId) -> Option<&'static Domain> {
    table().slots.get(id.index())
}

/// Send an interrupt from the current domain to `target`.
///
/// Blocks until the handler has completed on the target's thread
/// (returning true), or returns false if the target was not running.
/// The calling thread must be bound to a domain.
pub fn rpc(target: &Domain, handler: InterruptHandler, data: *mut ()) -> bool {
    let me = current();
    me.interruptor.send(&target.interruptor, handler, data)
}

/// Handle to one life of a domain slot
#[derive(Debug, Clone, Copy)]
pub struct DomainHandle {
    ident: DomainIdent,
}

impl DomainHandle {
    /// Full identity (slot plus generation) of this life
    pub fn ident(&self) -> DomainIdent {
        self.ident
    }

    /// Identifier of the underlying slot
    pub fn id(&self) -> DomainId {
        self.ident.id()
    }

    /// The underlying domain slot.
    ///
    /// The slot outlives the domain; after termination it may host a
    /// later life. `rpc` to a terminated domain returns false.
    pub fn domain(&self) -> &'static Domain {
        &table().slots[self.ident.id().index()]
    }

    /// Whether this life of the slot has terminated
    pub fn is_terminated(&self) -> bool {
        self.ident.is_stale(self.domain().interruptor.generation())
    }

    /// One interruptible wait for termination.
    ///
    /// Ok(true) once the domain has stopped; Ok(false) if the wait was
    /// cut short by an incoming interrupt (which has been handled), in
    /// which case the caller retries with the same handle. The calling thread must be bound to
    /// a domain.
    pub fn join_interruptible(&self) -> DomainResult<bool> {
        let me = try_current().ok_or(DomainError::NotADomain)?;
        let target = self.domain();
        Ok(me.interruptor.join(&target.interruptor, self.ident.generation()))
    }

    /// Wait until the domain has terminated, servicing incoming
    /// interrupts along the way
    pub fn join(&self) -> DomainResult<()> {
        while !self.join_interruptible()? {}
        Ok(())
    }
}

/// Spawn a new domain running `f` on its own OS thread.
///
/// The thread starts the slot's interruptor before `f` runs and stops it
/// afterwards (draining the inbox and waking joiners), then recycles the
/// slot. A panic in `f` is caught and logged; teardown still runs.
pub fn spawn<F>(f: F) -> DomainResult<DomainHandle>
where
    F: FnOnce(&Domain) + Send + 'static,
{
    let t = table();
    let idx = t.free.pop().ok_or(DomainError::NoSlotsAvailable)?;
    let d: &'static Domain = &t.slots[idx];
    let generation = d.interruptor.generation();

    let builder = thread::Builder::new().name(format!("domint-domain-{}", idx));
    match builder.spawn(move || domain_main(idx, f)) {
        Ok(_) => {
            let ident = DomainIdent::new(d.id(), generation);
            kdebug!("spawned domain {}", ident);
            Ok(DomainHandle { ident })
        }
        Err(_) => {
            let _ = t.free.push(idx);
            Err(DomainError::SpawnFailed)
        }
    }
}

fn domain_main<F>(idx: usize, f: F)
where
    F: FnOnce(&Domain),
{
    let d: &'static Domain = &table().slots[idx];
    tls::bind(idx);
    d.interruptor.start();

    let result = catch_unwind(AssertUnwindSafe(|| f(d)));

    // Stop while still bound: the final drain runs handlers, and
    // handlers resolve the current domain.
    d.interruptor.stop();
    if result.is_err() {
        kerror!("domain {} body panicked", idx);
    }
    tls::unbind();
    let _ = table().free.push(idx);
}

/// Run `f` with the calling thread bound to a domain.
///
/// The original thread of a program is not a domain; this is how it
/// becomes one long enough to spawn, rpc, and join others.
pub fn enter<F, T>(f: F) -> DomainResult<T>
where
    F: FnOnce(&Domain) -> T,
{
    if tls::is_domain_thread() {
        return Err(DomainError::AlreadyADomain);
    }
    let t = table();
    let idx = t.free.pop().ok_or(DomainError::NoSlotsAvailable)?;
    let d: &'static Domain = &t.slots[idx];

    tls::bind(idx);
    d.interruptor.start();

    let result = catch_unwind(AssertUnwindSafe(|| f(d)));

    d.interruptor.stop();
    tls::unbind();
    let _ = t.free.push(idx);

    match result {
        Ok(v) => Ok(v),
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domint_core::constants::MAX_DOMAINS;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Barrier, OnceLock};

    struct TestCell {
        hits: AtomicUsize,
        value: AtomicUsize,
        ran_on: AtomicU32,
    }

    impl TestCell {
        fn leaked() -> &'static TestCell {
            Box::leak(Box::new(TestCell {
                hits: AtomicUsize::new(0),
                value: AtomicUsize::new(0),
                ran_on: AtomicU32::new(u32::MAX),
            }))
        }
    }

    fn nop(_: &Domain, _: *mut ()) {}

    fn bump(d: &Domain, data: *mut ()) {
        let cell = unsafe { &*(data as *const TestCell) };
        cell.hits.fetch_add(1, Ordering::Relaxed);
        cell.value.store(42, Ordering::Relaxed);
        cell.ran_on.store(d.id().as_u32(), Ordering::Relaxed);
    }

    fn cell_ptr(cell: &'static TestCell) -> *mut () {
        cell as *const TestCell as *mut ()
    }

    fn leaked_flag() -> &'static AtomicBool {
        Box::leak(Box::new(AtomicBool::new(false)))
    }

    /// Worker that stays responsive until the flag is set. Needs one
    /// final interrupt after the flag flips to notice it.
    fn spawn_parked(stop: &'static AtomicBool) -> DomainHandle {
        spawn(move |d| {
            while !stop.load(Ordering::SeqCst) {
                d.yield_until_interrupted();
            }
        })
        .unwrap()
    }

    fn rpc_retry(target: &Domain, handler: InterruptHandler, data: *mut ()) {
        // The target thread may not have started its interruptor yet
        while !rpc(target, handler, data) {
            std::thread::yield_now();
        }
    }

    fn shut_down(stop: &'static AtomicBool, worker: DomainHandle) {
        stop.store(true, Ordering::SeqCst);
        rpc_retry(worker.domain(), nop, std::ptr::null_mut());
        worker.join().unwrap();
    }

    #[test]
    fn test_single_send() {
        let cell = TestCell::leaked();
        let stop = leaked_flag();
        enter(|me| {
            let worker = spawn_parked(stop);
            rpc_retry(worker.domain(), bump, cell_ptr(cell));

            // Handler ran exactly once, on the worker's thread, and its
            // writes are visible now that the send has returned.
            assert_eq!(cell.hits.load(Ordering::Relaxed), 1);
            assert_eq!(cell.value.load(Ordering::Relaxed), 42);
            assert_eq!(cell.ran_on.load(Ordering::Relaxed), worker.id().as_u32());
            assert_ne!(cell.ran_on.load(Ordering::Relaxed), me.id().as_u32());

            // The sender flagged the word; nothing restored it.
            assert!(worker.domain().interrupt_pending());

            shut_down(stop, worker);
        })
        .unwrap();
    }

    #[test]
    fn test_send_exactly_once_repeated() {
        let cell = TestCell::leaked();
        let stop = leaked_flag();
        enter(|_me| {
            let worker = spawn_parked(stop);
            for _ in 0..200 {
                rpc_retry(worker.domain(), bump, cell_ptr(cell));
            }
            assert_eq!(cell.hits.load(Ordering::Relaxed), 200);
            shut_down(stop, worker);
        })
        .unwrap();
    }

    #[test]
    fn test_mutual_send() {
        let cell = TestCell::leaked();
        let pair: &'static OnceLock<(DomainHandle, DomainHandle)> =
            Box::leak(Box::new(OnceLock::new()));
        let barrier: &'static Barrier = Box::leak(Box::new(Barrier::new(2)));

        let body = move |side: usize| {
            move |d: &Domain| {
                let (a, b) = loop {
                    if let Some(p) = pair.get() {
                        break *p;
                    }
                    std::thread::yield_now();
                };
                let target = if side == 0 { b } else { a };
                // Both cross the barrier with running interruptors, then
                // interrupt each other before either polls.
                barrier.wait();
                assert!(rpc(target.domain(), bump, cell_ptr(cell)));
                // Stay alive until both deliveries happened, servicing
                // whatever is still queued here.
                while cell.hits.load(Ordering::SeqCst) < 2 {
                    d.poll();
                    std::thread::yield_now();
                }
            }
        };

        let a = spawn(body(0)).unwrap();
        let b = spawn(body(1)).unwrap();
        pair.set((a, b)).unwrap();

        enter(|_me| {
            a.join().unwrap();
            b.join().unwrap();
        })
        .unwrap();

        assert_eq!(cell.hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_join_interrupted_by_send() {
        let cell = TestCell::leaked();
        let stop = leaked_flag();
        enter(|me| {
            let me_id = me.id();
            let target = spawn_parked(stop);

            // A third domain interrupts us while we wait on the target.
            let pestered = spawn(move |_d| {
                let main = by_id(me_id).unwrap();
                assert!(rpc(main, bump, cell_ptr(cell)));
            })
            .unwrap();

            // The interrupt arrives before the target stops, so the
            // first wait is cut short after servicing it.
            let first = target.join_interruptible().unwrap();
            assert!(!first);
            assert_eq!(cell.hits.load(Ordering::Relaxed), 1);

            shut_down(stop, target);
            pestered.join().unwrap();
            assert!(target.is_terminated());
        })
        .unwrap();
    }

    #[test]
    fn test_handler_sends() {
        struct Relay {
            dest: DomainId,
            cell: &'static TestCell,
        }

        fn relay(_d: &Domain, data: *mut ()) {
            // Runs on the middle domain; forwards to the destination.
            // No lock is held here, so the nested send is free to take
            // its own.
            let relay = unsafe { &*(data as *const Relay) };
            let dest = by_id(relay.dest).unwrap();
            assert!(rpc(dest, bump, cell_ptr(relay.cell)));
        }

        let cell = TestCell::leaked();
        let stop_mid = leaked_flag();
        let stop_dest = leaked_flag();
        enter(|_me| {
            let dest = spawn_parked(stop_dest);
            let mid = spawn_parked(stop_mid);
            // Destination must be up before the relay fires.
            rpc_retry(dest.domain(), nop, std::ptr::null_mut());

            let relay_ctx: &'static Relay = Box::leak(Box::new(Relay {
                dest: dest.id(),
                cell,
            }));
            rpc_retry(
                mid.domain(),
                relay,
                relay_ctx as *const Relay as *mut (),
            );
            assert_eq!(cell.hits.load(Ordering::Relaxed), 1);
            assert_eq!(cell.ran_on.load(Ordering::Relaxed), dest.id().as_u32());

            shut_down(stop_mid, mid);
            shut_down(stop_dest, dest);
        })
        .unwrap();
    }

    #[test]
    fn test_stop_absorbs_racing_sends() {
        let cell = TestCell::leaked();
        let go = leaked_flag();
        enter(|_me| {
            let worker = spawn_parked(go);

            // First delivery is guaranteed: the worker cannot exit
            // before `go` flips.
            rpc_retry(worker.domain(), bump, cell_ptr(cell));
            let mut delivered = 1;

            // Now race further sends against the worker's teardown.
            // Each either completes (possibly absorbed by the stop
            // drain) or observes a stopped target.
            go.store(true, Ordering::SeqCst);
            loop {
                if rpc(worker.domain(), bump, cell_ptr(cell)) {
                    delivered += 1;
                } else {
                    break;
                }
            }
            worker.join().unwrap();
            assert_eq!(cell.hits.load(Ordering::Relaxed), delivered);
        })
        .unwrap();
    }

    #[test]
    fn test_join_requires_domain() {
        let handle = spawn(|_d| {}).unwrap();
        // Not bound to a domain on this thread yet.
        assert_eq!(handle.join(), Err(DomainError::NotADomain));
        enter(|_me| handle.join().unwrap()).unwrap();
        assert!(handle.is_terminated());
    }

    #[test]
    fn test_enter_returns_value_and_rejects_nesting() {
        let out = enter(|me| {
            assert!(me.interruptor().running());
            assert_eq!(enter(|_| ()), Err(DomainError::AlreadyADomain));
            7
        })
        .unwrap();
        assert_eq!(out, 7);
    }

    #[test]
    fn test_interrupt_word_glue() {
        enter(|me| {
            me.set_young_limit(0x4000);
            assert!(!me.interrupt_pending());
            assert_eq!(me.handle_pending(), 0);

            me.interrupt_self();
            assert!(me.interrupt_pending());

            // Nothing queued: the word is restored, no handlers run.
            assert_eq!(me.handle_pending(), 0);
            assert!(!me.interrupt_pending());
        })
        .unwrap();
    }

    #[test]
    fn test_init_twice_fails() {
        let _ = init(RuntimeConfig::default());
        assert_eq!(
            init(RuntimeConfig::default()),
            Err(DomainError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_by_id_bounds() {
        let _ = table();
        assert!(by_id(DomainId::new(0)).is_some());
        assert!(by_id(DomainId::new(MAX_DOMAINS)).is_none());
    }
}
