//! The GC-polling interrupt word
//!
//! Each domain's mutator compares this word against its allocation
//! pointer on every allocation check. Storing the all-ones sentinel makes
//! the comparison fail, steering the mutator into the runtime's slow path
//! without a system call.
//!
//! The interruptor only ever writes the sentinel; restoring the ordinary
//! allocation-limit value is the receiving domain's job after it drains.

use crate::constants::INTERRUPT_MAGIC;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Shared atomic word polled by a domain's mutator.
///
/// Cache-line aligned: the word is written by remote senders and read in
/// the mutator's allocation check, so it must not share a line with other
/// hot state.
#[repr(align(64))]
pub struct InterruptWord {
    word: AtomicUsize,
}

impl InterruptWord {
    /// Create a word holding the given allocation-limit value
    pub const fn new(limit: usize) -> Self {
        InterruptWord {
            word: AtomicUsize::new(limit),
        }
    }

    /// Flag an interrupt: release-store the sentinel.
    ///
    /// Release so that the queue append that precedes it (under the
    /// target's lock) is visible to a mutator that observes the sentinel.
    #[inline]
    pub fn set_pending(&self) {
        self.word.store(INTERRUPT_MAGIC, Ordering::Release);
    }

    /// Check whether the sentinel is currently stored
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.word.load(Ordering::Acquire) == INTERRUPT_MAGIC
    }

    /// Restore an ordinary allocation-limit value.
    ///
    /// `limit` must not be the sentinel.
    #[inline]
    pub fn store_limit(&self, limit: usize) {
        debug_assert_ne!(limit, INTERRUPT_MAGIC);
        self.word.store(limit, Ordering::Release);
    }

    /// Raw load, for the mutator's allocation check
    #[inline]
    pub fn load(&self) -> usize {
        self.word.load(Ordering::Acquire)
    }
}

impl Default for InterruptWord {
    fn default() -> Self {
        InterruptWord::new(0)
    }
}

impl core::fmt::Debug for InterruptWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let v = self.load();
        if v == INTERRUPT_MAGIC {
            write!(f, "InterruptWord(PENDING)")
        } else {
            write!(f, "InterruptWord({:#x})", v)
        }
    }
}
