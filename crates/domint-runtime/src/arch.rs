//! Architecture-specific pause hint
//!
//! Used in the sender's spin phase while it watches `completed`.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// Pause the spin loop without yielding the core
        #[inline(always)]
        pub fn cpu_relax() {
            // PAUSE also backs off speculative reads of the watched line
            unsafe { core::arch::asm!("pause", options(nomem, nostack, preserves_flags)) };
        }
    } else if #[cfg(target_arch = "aarch64")] {
        /// Pause the spin loop without yielding the core
        #[inline(always)]
        pub fn cpu_relax() {
            unsafe { core::arch::asm!("yield", options(nomem, nostack, preserves_flags)) };
        }
    } else {
        /// Pause the spin loop without yielding the core
        #[inline(always)]
        pub fn cpu_relax() {
            std::hint::spin_loop();
        }
    }
}
