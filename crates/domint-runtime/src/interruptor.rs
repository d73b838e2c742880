//! Inter-domain interrupt delivery
//!
//! Each domain owns one `Interruptor`: a mailbox other domains use to run
//! a handler on this domain's thread and wait for it to finish. The same
//! machinery carries lifecycle joins.
//!
//! To avoid deadlock, some rules are important:
//!
//! - Don't hold interruptor locks for long
//! - Don't hold two interruptor locks at the same time
//! - Continue to handle incoming interrupts even when waiting for a
//!   response

use crate::arch;
use crate::domain::{self, Domain};
use domint_core::constants::SEND_SPIN_ITERATIONS;
use domint_core::{ktrace, InterruptWord, WaitQueue};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Callback run on the target domain's thread.
///
/// Receives the target domain (the one executing the handler) and the
/// opaque data the sender supplied.
pub type InterruptHandler = fn(&Domain, *mut ());

fn noop_handler(_: &Domain, _: *mut ()) {}

/// A one-shot interrupt request.
///
/// Embedded in its owning interruptor: a domain runs one thread and a
/// send is synchronous, so at most one outbound request per domain is
/// ever in flight and a single record suffices.
pub struct InterruptRecord {
    body: UnsafeCell<RecordBody>,
    completed: AtomicBool,
}

struct RecordBody {
    handler: InterruptHandler,
    data: *mut (),
}

// Safety: `body` is written by the owning domain's thread while it holds
// the target's lock, before the owner is enqueued there; the target's
// thread reads it only after dequeueing under that same lock. The owner
// does not rewrite it until `completed` has been observed true.
unsafe impl Send for InterruptRecord {}
unsafe impl Sync for InterruptRecord {}

impl InterruptRecord {
    fn new() -> Self {
        InterruptRecord {
            body: UnsafeCell::new(RecordBody {
                handler: noop_handler,
                data: std::ptr::null_mut(),
            }),
            completed: AtomicBool::new(false),
        }
    }

    /// Fill the record for a new send. Caller holds the target's lock.
    fn arm(&self, handler: InterruptHandler, data: *mut ()) {
        unsafe {
            *self.body.get() = RecordBody { handler, data };
        }
        self.completed.store(false, Ordering::Release);
    }

    /// Read the request. Called on the target's thread after dequeueing.
    fn request(&self) -> (InterruptHandler, *mut ()) {
        let body = unsafe { &*self.body.get() };
        (body.handler, body.data)
    }

    /// Publish completion: every write the handler made happens-before
    /// the sender's acquire-load observing true.
    fn complete(&self) {
        self.completed.store(true, Ordering::Release);
    }

    #[inline]
    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

/// State behind the interruptor's lock
struct State {
    /// True between `start` and `stop`; only then are sends accepted
    running: bool,

    /// Bumped once per `stop`. Distinguishes two lives of a reused
    /// domain slot.
    generation: u64,

    /// Written by a join target when it stops, read in the join loop
    join_target_generation: u64,

    /// Domains waiting to deliver a request here
    interrupts: WaitQueue<&'static Interruptor>,

    /// Domains waiting for this one to terminate
    joiners: WaitQueue<&'static Interruptor>,
}

/// Per-domain mailbox and wait machinery.
///
/// One per domain, same lifetime as the domain's slot. All mutable state
/// sits behind one mutex; the condvar is signalled when a request is
/// enqueued, completed, or the lifecycle advances.
pub struct Interruptor {
    /// The domain's GC-polling word; flagged on every send
    word: Arc<InterruptWord>,

    state: Mutex<State>,
    cond: Condvar,

    /// This interruptor's outbound request record
    current_interrupt: InterruptRecord,
}

impl Interruptor {
    /// Create an interruptor bound to the domain's interrupt word
    pub fn new(word: Arc<InterruptWord>) -> Self {
        Interruptor {
            word,
            state: Mutex::new(State {
                running: false,
                generation: 0,
                join_target_generation: 0,
                interrupts: WaitQueue::new(),
                joiners: WaitQueue::new(),
            }),
            cond: Condvar::new(),
            current_interrupt: InterruptRecord::new(),
        }
    }

    /// Whether the domain currently accepts interrupts
    pub fn running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Current lifecycle generation
    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    /// Begin accepting interrupts.
    ///
    /// Must be called by the owning domain's thread before any other
    /// domain addresses it.
    pub fn start(&self) {
        let mut st = self.state.lock().unwrap();
        assert!(st.interrupts.is_empty(), "interrupts queued before start");
        assert!(!st.running, "interruptor started twice");
        st.running = true;
    }

    /// Stop accepting interrupts and wake all joiners.
    ///
    /// Drains until one full pass handles nothing, so requests enqueued
    /// by the handlers themselves are absorbed before the domain goes
    /// away. Late senders observe `running == false` and get a false
    /// return from `send`.
    pub fn stop(&self) {
        let mut st = self.state.lock().unwrap();
        loop {
            let (guard, handled) = self.handle_incoming(st);
            st = guard;
            if handled == 0 {
                break;
            }
        }
        st.running = false;
        st.generation += 1;
        let generation = st.generation;

        // Hand off to each joiner one at a time: drop our lock, take the
        // joiner's, publish the generation, broadcast, then come back.
        while let Some(joiner) = st.joiners.remove() {
            drop(st);
            let mut jst = joiner.state.lock().unwrap();
            jst.join_target_generation = generation;
            joiner.cond.notify_all();
            drop(jst);
            st = self.state.lock().unwrap();
        }
        drop(st);
        ktrace!("interruptor stopped, generation {}", generation);
    }

    /// Deliver a request to `target` and wait for its handler to finish.
    ///
    /// Returns true once the handler has run to completion on the
    /// target's thread; false if the target was not running at the
    /// moment of send.
    pub fn send(
        &'static self,
        target: &Interruptor,
        handler: InterruptHandler,
        data: *mut (),
    ) -> bool {
        let req = &self.current_interrupt;
        {
            let mut tst = target.state.lock().unwrap();
            if !tst.running {
                return false;
            }
            req.arm(handler, data);
            tst.interrupts.add(self);
            // The target may be parked waiting for its own request to
            // complete elsewhere; wake it so it drains us.
            target.cond.notify_all();
        }

        target.word.set_pending();

        // Handlers are usually fast, so spin for a bit before waiting
        for _ in 0..SEND_SPIN_ITERATIONS {
            if req.is_completed() {
                return true;
            }
            arch::cpu_relax();
        }

        ktrace!("send: spin exhausted, taking the wait path");
        let mut st = self.state.lock().unwrap();
        loop {
            // Service our own inbox while parked; two domains
            // interrupting each other would otherwise deadlock.
            let (guard, _) = self.handle_incoming(st);
            st = guard;
            if req.is_completed() {
                break;
            }
            st = self.cond.wait(st).unwrap();
        }
        drop(st);
        true
    }

    /// Drain this interruptor's inbox once. Returns handlers invoked.
    pub fn poll(&self) -> usize {
        let st = self.state.lock().unwrap();
        let (st, handled) = self.handle_incoming(st);
        drop(st);
        handled
    }

    /// Park until at least one interrupt has been handled.
    ///
    /// Used by an idle domain that has nothing to do but must remain
    /// responsive.
    pub fn yield_until_interrupted(&self) {
        let mut st = self.state.lock().unwrap();
        loop {
            let (guard, handled) = self.handle_incoming(st);
            st = guard;
            if handled > 0 {
                break;
            }
            st = self.cond.wait(st).unwrap();
        }
    }

    /// Wait until the target life identified by `target_gen` has ended.
    ///
    /// Returns true once `target.generation > target_gen`; false if an
    /// incoming interrupt was serviced first, in which case the caller
    /// may retry with the same `target_gen`.
    pub fn join(&'static self, target: &Interruptor, target_gen: u64) -> bool {
        {
            // Reset before parking. The target writes this field under
            // our lock when it stops; nothing can write it while we are
            // not on a joiners queue.
            let mut st = self.state.lock().unwrap();
            st.join_target_generation = 0;
        }
        {
            let mut tst = target.state.lock().unwrap();
            if tst.generation > target_gen {
                return true;
            }
            tst.joiners.add(self);
        }

        let mut done = false;
        let mut interrupted = false;
        let mut st = self.state.lock().unwrap();
        loop {
            let (guard, handled) = self.handle_incoming(st);
            st = guard;
            if handled > 0 {
                interrupted = true;
            }
            if st.join_target_generation > target_gen {
                done = true;
            }
            if done || interrupted {
                break;
            }
            st = self.cond.wait(st).unwrap();
        }
        drop(st);

        if !done {
            // The target may have stopped between our wake-up and here;
            // in that case its stop already removed us from the queue.
            let mut tst = target.state.lock().unwrap();
            if tst.generation > target_gen {
                done = true;
            } else {
                let removed = tst.joiners.cancel(|j| std::ptr::eq(*j, self));
                assert!(removed, "joiner missing from join target's queue");
            }
        }
        done
    }

    /// Pop and run queued requests until the inbox is empty.
    ///
    /// The lock is dropped around each handler invocation: handlers may
    /// themselves call `send`, which takes locks of its own.
    fn handle_incoming<'a>(
        &'a self,
        guard: MutexGuard<'a, State>,
    ) -> (MutexGuard<'a, State>, usize) {
        let mut st = guard;
        let mut handled = 0;
        debug_assert!(st.running, "draining a stopped interruptor");
        while let Some(sender) = st.interrupts.remove() {
            let req = &sender.current_interrupt;
            drop(st);

            let (handler, data) = req.request();
            handler(domain::current(), data);
            req.complete();

            // Take the sender's lock around the broadcast so the wake
            // cannot fall between its completed-check and its wait.
            let sender_st = sender.state.lock().unwrap();
            sender.cond.notify_all();
            drop(sender_st);

            st = self.state.lock().unwrap();
            handled += 1;
        }
        (st, handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn leaked() -> &'static Interruptor {
        Box::leak(Box::new(Interruptor::new(Arc::new(InterruptWord::new(0)))))
    }

    #[test]
    fn test_lifecycle_generation() {
        let s = leaked();
        assert!(!s.running());
        assert_eq!(s.generation(), 0);

        s.start();
        assert!(s.running());
        assert_eq!(s.generation(), 0);

        s.stop();
        assert!(!s.running());
        assert_eq!(s.generation(), 1);

        s.start();
        s.stop();
        assert_eq!(s.generation(), 2);
    }

    #[test]
    #[should_panic(expected = "started twice")]
    fn test_double_start_panics() {
        let s = leaked();
        s.start();
        s.start();
    }

    #[test]
    fn test_send_to_never_started() {
        let sender = leaked();
        let target = leaked();
        sender.start();
        assert!(!sender.send(target, noop_handler, std::ptr::null_mut()));
    }

    #[test]
    fn test_send_to_stopped() {
        let sender = leaked();
        let target = leaked();
        sender.start();
        target.start();
        target.stop();
        assert!(!sender.send(target, noop_handler, std::ptr::null_mut()));
    }

    #[test]
    fn test_join_already_stopped() {
        let joiner = leaked();
        let target = leaked();
        joiner.start();
        target.start();
        target.stop();

        assert!(joiner.join(target, 0));
        // Still true on a second call; the generation stays advanced.
        assert!(joiner.join(target, 0));
    }

    #[test]
    fn test_join_woken_by_stop() {
        let joiner = leaked();
        let target = leaked();
        joiner.start();
        target.start();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            target.stop();
        });

        assert!(joiner.join(target, 0));
        assert_eq!(target.generation(), 1);
        stopper.join().unwrap();
    }

    #[test]
    fn test_join_ignores_older_generation() {
        let joiner = leaked();
        let target = leaked();
        joiner.start();
        target.start();
        target.stop();
        target.start();

        // The first life is over; joining it resolves immediately even
        // though the slot is running again.
        assert!(joiner.join(target, 0));
        // The second life has not ended yet.
        assert_eq!(target.generation(), 1);
    }
}
