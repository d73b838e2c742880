//! Thread-local domain binding
//!
//! Maps the current OS thread to its slot in the domain table. Handlers
//! and the interrupt-word glue resolve "the current domain" through this.

use domint_core::constants::DOMAIN_NONE;
use domint_core::kprint;
use std::cell::Cell;

thread_local! {
    /// Slot index of the domain bound to this thread
    static CURRENT_DOMAIN: Cell<u32> = const { Cell::new(DOMAIN_NONE) };
}

/// Bind this thread to a domain slot (called by the runtime)
pub(crate) fn bind(idx: usize) {
    CURRENT_DOMAIN.with(|c| c.set(idx as u32));
    kprint::set_domain_id(idx as u32);
}

/// Unbind this thread (called by the runtime on domain teardown)
pub(crate) fn unbind() {
    CURRENT_DOMAIN.with(|c| c.set(DOMAIN_NONE));
    kprint::clear_domain_id();
}

/// Slot index of the current thread's domain, if bound
#[inline]
pub fn current_index() -> Option<usize> {
    let v = CURRENT_DOMAIN.with(|c| c.get());
    if v == DOMAIN_NONE {
        None
    } else {
        Some(v as usize)
    }
}

/// Check if the current thread is bound to a domain
#[inline]
pub fn is_domain_thread() -> bool {
    current_index().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_unbind() {
        assert_eq!(current_index(), None);
        assert!(!is_domain_thread());

        bind(3);
        assert_eq!(current_index(), Some(3));
        assert!(is_domain_thread());

        unbind();
        assert_eq!(current_index(), None);
    }

    #[test]
    fn test_binding_is_per_thread() {
        bind(1);
        let handle = std::thread::spawn(|| current_index());
        assert_eq!(handle.join().unwrap(), None);
        unbind();
    }
}
